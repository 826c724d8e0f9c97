//! Fiscal-year entity
//!
//! The year label (`2024-25`) is the document id; the body only carries
//! the derived document counter and a status. Creation and update times
//! live in document metadata.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiscalYear {
    /// Derived count of the `documents` subcollection. Eventually
    /// consistent; reconcile to repair drift.
    #[serde(default)]
    pub document_count: i64,

    #[serde(default)]
    pub status: YearStatus,
}

impl FiscalYear {
    pub fn new() -> Self {
        FiscalYear {
            document_count: 0,
            status: YearStatus::Active,
        }
    }
}

impl Default for FiscalYear {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YearStatus {
    #[default]
    Active,
    Archived,
}
