//! Storage codec abstraction.
//!
//! Every byte a [`FileStore`](crate::FileStore) writes passes through a
//! codec on the way to disk and back. The seam is where compression or
//! encryption-at-rest would plug in without touching the history blob.
//!
//! Only [`IdentityCodec`] ships today. The codec is selected by id from
//! configuration (`codec = "identity"` in `verso.toml`).
//!
//! # Usage
//!
//! ```
//! use verso_storage::codec::{get_codec, StorageCodec};
//!
//! let codec = get_codec("identity").unwrap();
//! let encoded = codec.encode(b"{}");
//! assert_eq!(codec.decode(&encoded).unwrap(), b"{}".to_vec());
//! ```

mod identity;
mod traits;

pub use identity::IdentityCodec;
pub use traits::{CodecError, StorageCodec};

/// Get a codec by its identifier.
///
/// # Known Codecs
///
/// - `"identity"`: No-op codec (pass-through)
pub fn get_codec(codec_id: &str) -> Result<Box<dyn StorageCodec>, CodecError> {
    match codec_id {
        "identity" => Ok(Box::new(IdentityCodec)),
        _ => Err(CodecError::UnknownCodec(codec_id.to_string())),
    }
}
