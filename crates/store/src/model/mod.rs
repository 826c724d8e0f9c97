//! Wire records of the tenant hierarchy
//!
//! Every record (de)serializes with camelCase field names, matching what
//! the console and the legacy data already use. Unknown fields are
//! tolerated on reads: migrated documents carry `migratedAt` /
//! `migratedFrom` audit tags on top of these shapes.

mod attachment;
mod client;
mod document;
mod notification;
mod tenant;
mod year;

pub use attachment::{BlobRef, FileAttachment};
pub use client::{Client, ClientInput};
pub use document::{DocumentInput, DocumentRecord};
pub use notification::{Notification, NotificationInput};
pub use tenant::TenantProfile;
pub use year::{FiscalYear, YearStatus};
