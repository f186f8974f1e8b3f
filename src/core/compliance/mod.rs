//! Protected-data compliance tracking
//!
//! Record tasks describe their protected-field accesses as
//! [`AccessRequest`](crate::domain::AccessRequest) values; the executor replays
//! them into the [`ComplianceTracker`] in dispatch order once a substage drains.

pub mod tracker;

pub use tracker::{
    hash_value, AccessLogEntry, ComplianceEvent, ComplianceReport, ComplianceTracker,
    InventoryEntry,
};
