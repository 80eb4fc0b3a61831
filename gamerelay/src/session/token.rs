//! The session token the relay hides in the client config blob. The client stores the blob and
//! sends it back on its next login, which is how a new connection finds its session.

use gamerelay_proto::commands::CLIENT_CONFIG_SIZE;

const MAGIC: [u8; 4] = *b"GRLY";
const ID_RANGE: std::ops::Range<usize> = 4..12;

pub fn embed(config: &mut [u8; CLIENT_CONFIG_SIZE], session_id: u64) {
    config[..MAGIC.len()].copy_from_slice(&MAGIC);
    config[ID_RANGE].copy_from_slice(&session_id.to_le_bytes());
}

pub fn with_token(config: &[u8; CLIENT_CONFIG_SIZE], session_id: u64) -> [u8; CLIENT_CONFIG_SIZE] {
    let mut tokenized = *config;
    embed(&mut tokenized, session_id);
    tokenized
}

pub fn extract(config: &[u8; CLIENT_CONFIG_SIZE]) -> Option<u64> {
    if config[..MAGIC.len()] != MAGIC {
        return None;
    }

    let mut id = [0u8; 8];
    id.copy_from_slice(&config[ID_RANGE]);
    Some(u64::from_le_bytes(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_extract() {
        let original = [0xAAu8; CLIENT_CONFIG_SIZE];
        let tokenized = with_token(&original, 0x0102);
        assert_eq!(extract(&tokenized), Some(0x0102));
        assert_eq!(tokenized[12..], original[12..]);
    }

    #[test]
    fn test_fresh_config_has_no_token() {
        assert_eq!(extract(&[0; CLIENT_CONFIG_SIZE]), None);
    }
}
