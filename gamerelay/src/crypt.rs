//! Stream ciphers for the relayed traffic.
//!
//! Every connection negotiates two seeds in its server init: one for what the server sends and
//! one for what the client sends. The relay plays the server towards the game client and the
//! client towards the destination, so it needs a [`CryptPair`] on each side.

use std::fmt;

use aes::{
    cipher::{generic_array::GenericArray, KeyIvInit, StreamCipher},
    Aes128,
};
use sha2::{Digest, Sha256};

/// A keystream applied in place. Encoding and decoding are the same operation.
pub trait CipherStream {
    fn apply(&mut self, data: &mut [u8]);
}

/// Builds a fresh [`CipherStream`] from a negotiated seed.
pub trait CipherFactory {
    fn create(&self, seed: u32) -> Box<dyn CipherStream>;
}

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

struct AesCtrStream(Aes128Ctr);

impl CipherStream for AesCtrStream {
    fn apply(&mut self, data: &mut [u8]) {
        self.0.apply_keystream(data);
    }
}

/// AES-128 in counter mode. The key and the initial counter are the two halves of the SHA-256
/// digest of the little-endian seed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesCtrFactory;

impl CipherFactory for AesCtrFactory {
    fn create(&self, seed: u32) -> Box<dyn CipherStream> {
        let digest = Sha256::digest(seed.to_le_bytes());
        let key = GenericArray::from_slice(&digest[..16]);
        let iv = GenericArray::from_slice(&digest[16..]);
        Box::new(AesCtrStream(Aes128Ctr::new(key, iv)))
    }
}

/// The two seeds carried by a server init frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMaterial {
    pub server_key: u32,
    pub client_key: u32,
}

impl KeyMaterial {
    pub const fn new(server_key: u32, client_key: u32) -> Self {
        Self { server_key, client_key }
    }

    pub fn random() -> Self {
        Self::new(rand::random(), rand::random())
    }
}

/// The decode (remote to local) and encode (local to remote) streams of one channel.
pub struct CryptPair {
    pub decode: Box<dyn CipherStream>,
    pub encode: Box<dyn CipherStream>,
}

impl fmt::Debug for CryptPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CryptPair")
    }
}

impl CryptPair {
    /// For a channel where we sent the server init, so we are the server.
    pub fn for_local_server(factory: &dyn CipherFactory, keys: KeyMaterial) -> Self {
        Self {
            decode: factory.create(keys.client_key),
            encode: factory.create(keys.server_key),
        }
    }

    /// For a channel where the remote end sent the server init.
    pub fn for_local_client(factory: &dyn CipherFactory, keys: KeyMaterial) -> Self {
        Self {
            decode: factory.create(keys.server_key),
            encode: factory.create(keys.client_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_talk_to_each_other() {
        let keys = KeyMaterial::new(0xDEADBEEF, 0x0BADF00D);
        let mut server = CryptPair::for_local_server(&AesCtrFactory, keys);
        let mut client = CryptPair::for_local_client(&AesCtrFactory, keys);

        let mut data = b"login please".to_vec();
        client.encode.apply(&mut data);
        assert_ne!(data, b"login please");
        server.decode.apply(&mut data);
        assert_eq!(data, b"login please");

        let mut reply = b"welcome".to_vec();
        server.encode.apply(&mut reply);
        client.decode.apply(&mut reply);
        assert_eq!(reply, b"welcome");
    }

    #[test]
    fn test_stream_state_carries_across_calls() {
        let mut whole = AesCtrFactory.create(99);
        let mut split = AesCtrFactory.create(99);

        let mut a = vec![0u8; 40];
        whole.apply(&mut a);

        let mut b = vec![0u8; 40];
        let (first, second) = b.split_at_mut(13);
        split.apply(first);
        split.apply(second);

        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds_different_streams() {
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        AesCtrFactory.create(1).apply(&mut a);
        AesCtrFactory.create(2).apply(&mut b);
        assert_ne!(a, b);
    }
}
