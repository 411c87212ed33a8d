use serde::Serialize;
use std::fmt;

const GROUP_WIDTH: usize = 4;
const GROUP_DELIMITER: char = '-';

/// Pairing code as shown to a human: fixed-width groups joined by `-`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PairingCode(String);

impl PairingCode {
    /// Group a raw backend code for display. Codes that cannot be grouped
    /// (empty) are kept as-is.
    pub fn format(raw: &str) -> Self {
        let chars: Vec<char> = raw.chars().collect();
        if chars.is_empty() {
            return Self(raw.to_string());
        }
        let grouped = chars
            .chunks(GROUP_WIDTH)
            .map(|group| group.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join(&GROUP_DELIMITER.to_string());
        Self(grouped)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
