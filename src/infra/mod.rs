//! Configuration and external collaborators (authorization, audit).

pub mod audit;
pub mod authz;
pub mod config;

pub use audit::{AuditSink, TracingAuditSink};
pub use authz::{AccessControl, AccessError, RemoteAccessControl};
