//! Wire formats used by gamerelay: frame headers for every supported game version, and the
//! handful of commands the relay itself needs to look into (server init, login, security data,
//! lobby roster, file transfers and redirects). Everything else travels through the relay as
//! opaque frames.

pub mod commands;
pub mod frame;
pub mod serialize;
pub mod version;
