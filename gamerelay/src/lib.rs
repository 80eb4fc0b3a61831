//! A relay that sits between game clients and their servers, decrypting and re-encrypting
//! everything in between. Sessions survive either side reconnecting: a client that gets
//! redirected, or simply drops, can come back to the same session with its keys renegotiated and
//! its roster and file captures intact.
//!
//! Everything runs on one thread inside a [`tokio::task::LocalSet`]. See [`server::ProxyServer`].

pub mod channel;
pub mod config;
pub mod crypt;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod timer;

#[cfg(test)]
pub(crate) mod test_utils;
