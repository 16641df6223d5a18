use super::envelope::{self, Envelope, VersionInfo};
use super::error::SaveError;

/// Whether a buffer is a legacy file that would benefit from re-wrapping.
pub fn needs_upgrade(bytes: &[u8]) -> Result<bool, SaveError> {
    Ok(envelope::decode(bytes)?.is_legacy())
}

/// Re-wrap a legacy buffer in a versioned envelope.
///
/// Legacy files never recorded writer versions, so the caller supplies the
/// metadata of the build that produced them. Already-versioned input is
/// returned unchanged.
pub fn upgrade_legacy(bytes: &[u8], versions: &VersionInfo) -> Result<Vec<u8>, SaveError> {
    match envelope::decode(bytes)? {
        Envelope::Versioned { .. } => {
            log::debug!("buffer already versioned, nothing to upgrade");
            Ok(bytes.to_vec())
        }
        Envelope::Legacy { class_name, payload } => {
            log::info!(
                "upgrading legacy save of class '{}' ({} payload bytes)",
                class_name,
                payload.len()
            );
            envelope::encode(&class_name, versions, &payload)
        }
    }
}
