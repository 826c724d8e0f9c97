//! Push delivery feedback
//!
//! The store layer never calls the push service itself. Broadcast callers
//! fetch recipients through the repository, deliver however they like,
//! and report per-token failures back here; only codes that prove a token
//! is dead lead to pruning.

use serde::{Deserialize, Serialize};

/// Failure codes reported by the push service for one token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushFailureCode {
    /// The device unregistered the token.
    #[serde(rename = "registration-token-not-registered")]
    NotRegistered,
    /// The token is malformed or was never issued.
    #[serde(rename = "invalid-registration-token")]
    Invalid,
    /// Anything else (quota, outage); the token may still be good.
    #[serde(other, rename = "other")]
    Other,
}

impl PushFailureCode {
    pub fn from_code(code: &str) -> Self {
        match code {
            "registration-token-not-registered" => PushFailureCode::NotRegistered,
            "invalid-registration-token" => PushFailureCode::Invalid,
            _ => PushFailureCode::Other,
        }
    }

    /// Whether this failure proves the token is dead.
    pub fn should_prune(self) -> bool {
        matches!(self, PushFailureCode::NotRegistered | PushFailureCode::Invalid)
    }
}

/// One failed delivery, keyed by the recipient client's contact number
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryFailure {
    pub contact: String,
    pub code: PushFailureCode,
}

impl DeliveryFailure {
    pub fn new(contact: impl Into<String>, code: PushFailureCode) -> Self {
        DeliveryFailure {
            contact: contact.into(),
            code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_mapping() {
        assert_eq!(
            PushFailureCode::from_code("registration-token-not-registered"),
            PushFailureCode::NotRegistered
        );
        assert_eq!(
            PushFailureCode::from_code("invalid-registration-token"),
            PushFailureCode::Invalid
        );
        assert_eq!(
            PushFailureCode::from_code("message-rate-exceeded"),
            PushFailureCode::Other
        );
    }

    #[test]
    fn test_only_dead_tokens_prune() {
        assert!(PushFailureCode::NotRegistered.should_prune());
        assert!(PushFailureCode::Invalid.should_prune());
        assert!(!PushFailureCode::Other.should_prune());
    }

    #[test]
    fn test_wire_codes_round_trip() {
        let failure = DeliveryFailure::new("9876543210", PushFailureCode::NotRegistered);
        let wire = serde_json::to_value(&failure).unwrap();
        assert_eq!(
            wire,
            serde_json::json!({
                "contact": "9876543210",
                "code": "registration-token-not-registered",
            })
        );

        let parsed: DeliveryFailure =
            serde_json::from_value(serde_json::json!({ "contact": "1", "code": "who-knows" }))
                .unwrap();
        assert_eq!(parsed.code, PushFailureCode::Other);
    }
}
