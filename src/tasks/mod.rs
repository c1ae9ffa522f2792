//! Background Tasks Module
//!
//! Contains the work that runs alongside cache callers.
//!
//! # Tasks
//! - Auditor: periodically sweeps expired items out of the store

mod auditor;
pub mod sweep;

pub use auditor::{AuditJob, Auditor, AuditorState, ErrorHandler};
