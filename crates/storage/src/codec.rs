//! Binary framing for checkpoint bundles
//!
//! A serialized bundle is a fixed magic, a little-endian format version,
//! then the bincode payload. The magic and version are checked before any
//! payload decoding so a foreign or stale file fails fast instead of
//! producing a garbled bundle.

use bytes::Bytes;
use runtime_core::{CheckpointBundle, Error, Result, BUNDLE_FORMAT_VERSION};

/// Magic bytes identifying a checkpoint bundle file
pub const BUNDLE_MAGIC: [u8; 4] = *b"CAIR";

/// Serialize a bundle with its framing header
pub fn encode_bundle(bundle: &CheckpointBundle) -> Result<Bytes> {
    let payload =
        bincode::serialize(bundle).map_err(|e| Error::Serialization(e.to_string()))?;

    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(&BUNDLE_MAGIC);
    out.extend_from_slice(&BUNDLE_FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(Bytes::from(out))
}

/// Deserialize a framed bundle, verifying magic and version
pub fn decode_bundle(data: &[u8]) -> Result<CheckpointBundle> {
    if data.len() < 8 {
        return Err(Error::Serialization(
            "checkpoint bundle truncated before header".to_string(),
        ));
    }

    if data[..4] != BUNDLE_MAGIC {
        return Err(Error::Serialization(
            "not a checkpoint bundle (bad magic)".to_string(),
        ));
    }

    let mut raw = [0u8; 4];
    raw.copy_from_slice(&data[4..8]);
    let version = u32::from_le_bytes(raw);
    if version != BUNDLE_FORMAT_VERSION {
        return Err(Error::Serialization(format!(
            "unsupported bundle format version {} (expected {})",
            version, BUNDLE_FORMAT_VERSION
        )));
    }

    let bundle: CheckpointBundle =
        bincode::deserialize(&data[8..]).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(bundle)
}
