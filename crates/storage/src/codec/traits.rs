//! Storage codec trait definitions.

/// Byte transformation applied between the history blob and the disk.
///
/// Codecs must be `Send + Sync`: the save scheduler persists from its
/// timer thread.
pub trait StorageCodec: Send + Sync {
    /// Encode bytes for storage.
    fn encode(&self, data: &[u8]) -> Vec<u8>;

    /// Decode bytes read from storage.
    ///
    /// Returns an error if the bytes cannot be decoded (e.g. truncated or
    /// written by a different codec).
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Unique codec identifier, as used in configuration.
    fn codec_id(&self) -> &str;
}

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Decoding failed.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Unknown codec identifier.
    #[error("Unknown codec: {0}")]
    UnknownCodec(String),
}
