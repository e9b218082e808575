//! Translation status machine (§3 Lifecycles, §4.1).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A translation row's lifecycle state.
///
/// Valid transitions: `Pending -> Translating -> {Translated, Failed}`, and
/// `Translated|Failed -> Pending` on a forced retranslation. `Approved` is a
/// terminal human-review state reachable only from `Translated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TranslationStatus {
    Pending,
    Translating,
    Translated,
    Failed,
    Approved,
}

impl TranslationStatus {
    /// Whether a row in this status is eligible to be claimed by
    /// `claim_pending_batch` (optionally including `Failed` for retry sweeps).
    pub fn is_claimable(self, include_failed: bool) -> bool {
        match self {
            TranslationStatus::Pending => true,
            TranslationStatus::Failed => include_failed,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TranslationStatus::Translated | TranslationStatus::Failed | TranslationStatus::Approved)
    }

    pub fn as_db_str(self) -> &'static str {
        match self {
            TranslationStatus::Pending => "PENDING",
            TranslationStatus::Translating => "TRANSLATING",
            TranslationStatus::Translated => "TRANSLATED",
            TranslationStatus::Failed => "FAILED",
            TranslationStatus::Approved => "APPROVED",
        }
    }
}

impl fmt::Display for TranslationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl std::str::FromStr for TranslationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TranslationStatus::Pending),
            "TRANSLATING" => Ok(TranslationStatus::Translating),
            "TRANSLATED" => Ok(TranslationStatus::Translated),
            "FAILED" => Ok(TranslationStatus::Failed),
            "APPROVED" => Ok(TranslationStatus::Approved),
            other => Err(format!("unknown translation status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claimable_rules() {
        assert!(TranslationStatus::Pending.is_claimable(false));
        assert!(!TranslationStatus::Failed.is_claimable(false));
        assert!(TranslationStatus::Failed.is_claimable(true));
        assert!(!TranslationStatus::Translating.is_claimable(true));
    }

    #[test]
    fn roundtrip_db_str() {
        for s in [TranslationStatus::Pending, TranslationStatus::Translating, TranslationStatus::Translated, TranslationStatus::Failed, TranslationStatus::Approved] {
            let parsed: TranslationStatus = s.as_db_str().parse().unwrap();
            assert_eq!(parsed, s);
        }
    }
}
