//! Pure domain types and logic: the entity model, the predicate compiler,
//! authorization scopes and the error taxonomy. No I/O lives here.

pub mod entity;
pub mod error;
pub mod predicate;
pub mod scope;

pub use entity::{
    AttributeValue, KeyValue, NewResource, Resource, ResourceKind, ResourcePage, Visibility,
};
pub use error::CatalogError;
pub use predicate::{compile, PredicateTree, RawClause};
pub use scope::{AccessAction, Accessible, AuthorizationScope};
