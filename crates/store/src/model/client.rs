//! Client entity
//!
//! A client's document id is their normalized contact number, so the
//! `contact` field always equals the id of the document it lives in.
//! The `years` field mirrors the ids of the `years` subcollection; it
//! is maintained by every year mutation, not enforced by the store.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

static PAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub name: String,
    pub contact: String,
    pub pan: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub years: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
}

fn default_active() -> bool {
    true
}

/// What a caller submits; the repository derives the identity from the
/// contact number and re-submitting the same contact merges into the
/// existing record.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ClientInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    /// Normalized by the repository via the path layer
    pub contact: String,

    #[validate(custom(function = validate_pan))]
    pub pan: String,

    #[validate(email)]
    pub email: Option<String>,

    pub push_token: Option<String>,

    pub is_active: bool,
}

impl ClientInput {
    pub fn new(
        name: impl Into<String>,
        contact: impl Into<String>,
        pan: impl Into<String>,
    ) -> Self {
        ClientInput {
            name: name.into(),
            contact: contact.into(),
            pan: pan.into(),
            email: None,
            push_token: None,
            is_active: true,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_push_token(mut self, token: impl Into<String>) -> Self {
        self.push_token = Some(token.into());
        self
    }
}

fn validate_pan(pan: &str) -> Result<(), ValidationError> {
    if PAN.is_match(pan) {
        Ok(())
    } else {
        Err(ValidationError::new("pan_format"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pan_validation() {
        assert!(ClientInput::new("Acme", "9876543210", "ABCDE1234F").validate().is_ok());
        assert!(ClientInput::new("Acme", "9876543210", "abcde1234f").validate().is_err());
        assert!(ClientInput::new("Acme", "9876543210", "ABCDE12345").validate().is_err());
        assert!(ClientInput::new("Acme", "9876543210", "").validate().is_err());
    }

    #[test]
    fn test_email_validation() {
        let ok = ClientInput::new("Acme", "9876543210", "ABCDE1234F").with_email("a@b.com");
        assert!(ok.validate().is_ok());
        let bad = ClientInput::new("Acme", "9876543210", "ABCDE1234F").with_email("not-an-email");
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_client_serde_defaults() {
        let parsed: Client = serde_json::from_str(
            r#"{"name":"Acme","contact":"9876543210","pan":"ABCDE1234F"}"#,
        )
        .unwrap();
        assert!(parsed.is_active);
        assert!(parsed.years.is_empty());
        assert!(parsed.push_token.is_none());
    }

    #[test]
    fn test_client_wire_names_are_camel_case() {
        let client = Client {
            name: "Acme".into(),
            contact: "9876543210".into(),
            pan: "ABCDE1234F".into(),
            email: None,
            is_active: false,
            years: BTreeSet::from(["2024-25".to_string()]),
            push_token: Some("tok".into()),
        };
        let wire = serde_json::to_value(&client).unwrap();
        assert_eq!(wire["isActive"], serde_json::json!(false));
        assert_eq!(wire["pushToken"], serde_json::json!("tok"));
        assert_eq!(wire["years"], serde_json::json!(["2024-25"]));
    }
}
