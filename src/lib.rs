pub mod app;
pub mod domain;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::catalog_service::CatalogService;
pub use app::scope_resolver::ScopeResolver;
pub use domain::entity::{
    AttributeValue, KeyValue, NewResource, Resource, ResourceKind, ResourcePage, Visibility,
};
pub use domain::error::CatalogError;
pub use domain::scope::{AccessAction, Accessible, AuthorizationScope};
pub use infra::audit::{AuditSink, TracingAuditSink};
pub use infra::authz::{AccessControl, AccessError, RemoteAccessControl};
