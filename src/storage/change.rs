use sha2::{Digest, Sha256};

/// Result of comparing fetched bytes with a backend's stored copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Unchanged,
    Changed,
    /// No prior artifact; stored like `Changed` but logged separately
    NotPresent,
}

impl Change {
    pub fn needs_write(self) -> bool {
        !matches!(self, Change::Unchanged)
    }
}

/// Hex encoded SHA-256 of `data`
pub fn fingerprint(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Classify `new` against the previously stored bytes. An empty previous
/// artifact counts as not present.
pub fn detect_change(new: &[u8], previous: Option<&[u8]>) -> Change {
    match previous {
        None => Change::NotPresent,
        Some(previous) if previous.is_empty() => Change::NotPresent,
        Some(previous) if fingerprint(previous) == fingerprint(new) => Change::Unchanged,
        Some(_) => Change::Changed,
    }
}
