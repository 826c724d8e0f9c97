//! Tenant profile entity
//!
//! Lives directly on the supernode document (`tenants/{tenantId}`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantProfile {
    /// Display name; defaults to the local part of the email
    #[serde(default)]
    pub name: String,
    /// Sanitized account email (dots replaced by underscores)
    #[serde(default)]
    pub email: String,
}

impl TenantProfile {
    /// Derive a profile from a sanitized email, defaulting the name to
    /// the local part.
    pub fn from_safe_email(safe_email: &str) -> Self {
        let name = safe_email
            .split('@')
            .next()
            .unwrap_or(safe_email)
            .to_string();
        TenantProfile {
            name,
            email: safe_email.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_defaults_name_to_local_part() {
        let profile = TenantProfile::from_safe_email("a_b@x_com");
        assert_eq!(profile.name, "a_b");
        assert_eq!(profile.email, "a_b@x_com");
    }
}
