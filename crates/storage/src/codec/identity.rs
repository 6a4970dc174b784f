//! Identity codec (no transformation).

use super::traits::{CodecError, StorageCodec};

/// Identity codec: bytes pass through unchanged.
///
/// The history blob is stored as plain JSON, which keeps it inspectable
/// with ordinary tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl StorageCodec for IdentityCodec {
    fn encode(&self, data: &[u8]) -> Vec<u8> {
        data.to_vec()
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn codec_id(&self) -> &str {
        "identity"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_passthrough() {
        let codec = IdentityCodec;
        let data = br#"{"currentVersion":1}"#.to_vec();
        assert_eq!(codec.encode(&data), data);
        assert_eq!(codec.decode(&data).unwrap(), data);
    }

    #[test]
    fn test_identity_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<IdentityCodec>();
    }
}
