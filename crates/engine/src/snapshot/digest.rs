use std::fmt::Write as _;

use sha2::{Digest, Sha256};

use super::{SnapshotError, WorldPayload};

/// SHA-256 over the compact JSON encoding. Two peers with equal simulation
/// state produce equal digests.
pub fn snapshot_digest(payload: &WorldPayload) -> Result<String, SnapshotError> {
    let canonical = serde_json::to_vec(payload).map_err(SnapshotError::Encode)?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(to_hex_lower(&hasher.finalize()))
}

fn to_hex_lower(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut output, byte| {
            let _ = write!(output, "{byte:02x}");
            output
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_lowercase_and_padded() {
        assert_eq!(to_hex_lower(&[0x00, 0x0f, 0xab]), "000fab");
    }
}
