//! Predicate compiler: raw filter clauses -> validated, normalized tree.
//!
//! Clauses sharing a key are OR-ed ("any of these values for this key"),
//! distinct keys are AND-ed. Grouping is stable so the same input always
//! compiles to a structurally identical tree. All value/operator typing is
//! rejected here, before anything reaches the store.

use crate::domain::entity::{validate_attribute_key, validate_tag};
use crate::domain::error::CatalogError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

/// Comparison operators accepted in filter clauses.
#[derive(Serialize, Deserialize, Debug, ToSchema, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
}

/// Declared type of a clause value.
#[derive(Serialize, Deserialize, Debug, ToSchema, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Number,
    String,
    Blob,
}

/// One raw filter clause as supplied by a client.
#[derive(Serialize, Deserialize, Debug, ToSchema, Clone)]
pub struct RawClause {
    pub key: String,
    pub operator: Operator,
    pub value_type: ValueType,
    #[schema(value_type = Object)]
    pub value: JsonValue,
}

/// Core resource columns that filter clauses may reference directly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CoreField {
    Id,
    Owner,
    Name,
    Description,
    Visibility,
    Workspace,
    DateCreated,
    DateUpdated,
}

impl CoreField {
    pub fn resolve(key: &str) -> Option<Self> {
        match key {
            "id" => Some(CoreField::Id),
            "owner" => Some(CoreField::Owner),
            "name" => Some(CoreField::Name),
            "description" => Some(CoreField::Description),
            "visibility" => Some(CoreField::Visibility),
            "workspace" => Some(CoreField::Workspace),
            "date_created" => Some(CoreField::DateCreated),
            "date_updated" => Some(CoreField::DateUpdated),
            _ => None,
        }
    }

    /// Column name in the `resources` table. Closed set; client input never
    /// becomes an identifier.
    pub fn column(&self) -> &'static str {
        match self {
            CoreField::Id => "id",
            CoreField::Owner => "owner",
            CoreField::Name => "name",
            CoreField::Description => "description",
            CoreField::Visibility => "visibility",
            CoreField::Workspace => "workspace",
            CoreField::DateCreated => "date_created",
            CoreField::DateUpdated => "date_updated",
        }
    }

    /// Date columns compare against NUMBER values (epoch milliseconds).
    pub fn is_date(&self) -> bool {
        matches!(self, CoreField::DateCreated | CoreField::DateUpdated)
    }
}

/// What a clause key resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldRef {
    Core(CoreField),
    Tags,
    Attribute(String),
}

/// A clause value after type extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Number(f64),
    Text(String),
    Blob(JsonValue),
}

/// A validated clause within a group.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledClause {
    pub operator: Operator,
    pub value: FilterValue,
}

/// All clauses for one key; matched when ANY clause matches.
#[derive(Debug, Clone, PartialEq)]
pub struct ClauseGroup {
    pub field: FieldRef,
    pub clauses: Vec<CompiledClause>,
}

/// The compiled filter: groups are AND-ed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredicateTree {
    pub groups: Vec<ClauseGroup>,
}

impl PredicateTree {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

const ATTRIBUTE_PREFIX: &str = "attributes.";

fn resolve_field(key: &str) -> Result<FieldRef, CatalogError> {
    if key.is_empty() {
        return Err(CatalogError::InvalidArgument(
            "filter key must not be empty".to_string(),
        ));
    }
    if key == "tags" {
        return Ok(FieldRef::Tags);
    }
    if let Some(attr_key) = key.strip_prefix(ATTRIBUTE_PREFIX) {
        validate_attribute_key(attr_key)?;
        return Ok(FieldRef::Attribute(attr_key.to_string()));
    }
    match CoreField::resolve(key) {
        Some(core) => Ok(FieldRef::Core(core)),
        None => Err(CatalogError::InvalidArgument(format!(
            "unknown filter key '{}'",
            key
        ))),
    }
}

fn extract_value(clause: &RawClause) -> Result<FilterValue, CatalogError> {
    match clause.value_type {
        ValueType::Number => match clause.value.as_f64() {
            Some(n) if n.is_finite() => Ok(FilterValue::Number(n)),
            _ => Err(CatalogError::InvalidArgument(format!(
                "clause on '{}' declares a number but carries {}",
                clause.key, clause.value
            ))),
        },
        ValueType::String => match clause.value.as_str() {
            Some(s) => Ok(FilterValue::Text(s.to_string())),
            None => Err(CatalogError::InvalidArgument(format!(
                "clause on '{}' declares a string but carries {}",
                clause.key, clause.value
            ))),
        },
        ValueType::Blob => Ok(FilterValue::Blob(clause.value.clone())),
    }
}

fn check_compatibility(
    key: &str,
    field: &FieldRef,
    operator: Operator,
    value: &FilterValue,
) -> Result<(), CatalogError> {
    let reject = |why: &str| {
        Err(CatalogError::InvalidArgument(format!(
            "invalid filter on '{}': {}",
            key, why
        )))
    };
    match field {
        FieldRef::Tags => match value {
            FilterValue::Text(tag) => {
                if !matches!(operator, Operator::Eq | Operator::Ne | Operator::Contains) {
                    return reject("tags admit only EQ, NE and CONTAINS");
                }
                validate_tag(tag)
            }
            _ => reject("tags are filtered with string values"),
        },
        FieldRef::Core(core) if core.is_date() => match value {
            FilterValue::Number(_) => {
                if operator == Operator::Contains {
                    return reject("CONTAINS does not apply to date fields");
                }
                Ok(())
            }
            _ => reject("date fields compare against epoch-millisecond numbers"),
        },
        FieldRef::Core(_) => match value {
            FilterValue::Text(_) => Ok(()),
            _ => reject("this field is filtered with string values"),
        },
        FieldRef::Attribute(_) => match value {
            FilterValue::Number(_) => {
                if operator == Operator::Contains {
                    return reject("CONTAINS applies to string values only");
                }
                Ok(())
            }
            FilterValue::Text(_) => Ok(()),
            FilterValue::Blob(_) => {
                if !matches!(operator, Operator::Eq | Operator::Ne) {
                    return reject("blob attributes admit only EQ and NE");
                }
                Ok(())
            }
        },
    }
}

/// Compiles raw clauses into a validated tree. Pure and deterministic:
/// groups appear in first-occurrence order of their key, clauses in input
/// order within a group.
pub fn compile(clauses: &[RawClause]) -> Result<PredicateTree, CatalogError> {
    let mut groups: Vec<ClauseGroup> = Vec::new();
    for clause in clauses {
        let field = resolve_field(&clause.key)?;
        let value = extract_value(clause)?;
        check_compatibility(&clause.key, &field, clause.operator, &value)?;

        let compiled = CompiledClause {
            operator: clause.operator,
            value,
        };
        match groups.iter_mut().find(|g| g.field == field) {
            Some(group) => group.clauses.push(compiled),
            None => groups.push(ClauseGroup {
                field,
                clauses: vec![compiled],
            }),
        }
    }
    Ok(PredicateTree { groups })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clause(key: &str, operator: Operator, value_type: ValueType, value: JsonValue) -> RawClause {
        RawClause {
            key: key.to_string(),
            operator,
            value_type,
            value,
        }
    }

    #[test]
    fn same_key_clauses_group_together_distinct_keys_stay_apart() {
        let tree = compile(&[
            clause("tags", Operator::Eq, ValueType::String, json!("a")),
            clause("owner", Operator::Eq, ValueType::String, json!("u1")),
            clause("tags", Operator::Eq, ValueType::String, json!("b")),
        ])
        .unwrap();

        assert_eq!(tree.groups.len(), 2);
        assert_eq!(tree.groups[0].field, FieldRef::Tags);
        assert_eq!(tree.groups[0].clauses.len(), 2);
        assert_eq!(tree.groups[1].field, FieldRef::Core(CoreField::Owner));
        assert_eq!(tree.groups[1].clauses.len(), 1);
    }

    #[test]
    fn compilation_is_deterministic() {
        let clauses = vec![
            clause("name", Operator::Contains, ValueType::String, json!("mnist")),
            clause("attributes.lr", Operator::Lt, ValueType::Number, json!(0.1)),
            clause("name", Operator::Eq, ValueType::String, json!("baseline")),
        ];
        assert_eq!(compile(&clauses).unwrap(), compile(&clauses).unwrap());
    }

    #[test]
    fn empty_key_is_rejected() {
        let err = compile(&[clause("", Operator::Eq, ValueType::String, json!("x"))]).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }

    #[test]
    fn unknown_core_key_is_rejected() {
        let err =
            compile(&[clause("nope", Operator::Eq, ValueType::String, json!("x"))]).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }

    #[test]
    fn numeric_operator_on_tags_is_rejected() {
        let err =
            compile(&[clause("tags", Operator::Gt, ValueType::String, json!("x"))]).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }

    #[test]
    fn tags_with_number_value_is_rejected() {
        let err =
            compile(&[clause("tags", Operator::Eq, ValueType::Number, json!(3))]).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }

    #[test]
    fn contains_on_number_attribute_is_rejected() {
        let err = compile(&[clause(
            "attributes.epochs",
            Operator::Contains,
            ValueType::Number,
            json!(10),
        )])
        .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }

    #[test]
    fn blob_ordering_is_rejected() {
        let err = compile(&[clause(
            "attributes.config",
            Operator::Gt,
            ValueType::Blob,
            json!({"a": 1}),
        )])
        .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }

    #[test]
    fn date_fields_require_numbers() {
        let err = compile(&[clause(
            "date_updated",
            Operator::Gte,
            ValueType::String,
            json!("2024-01-01"),
        )])
        .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));

        let ok = compile(&[clause(
            "date_updated",
            Operator::Gte,
            ValueType::Number,
            json!(1_700_000_000_000_i64),
        )]);
        assert!(ok.is_ok());
    }

    #[test]
    fn declared_type_must_match_value_shape() {
        let err = compile(&[clause(
            "attributes.lr",
            Operator::Eq,
            ValueType::Number,
            json!("0.1"),
        )])
        .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }

    #[test]
    fn overlong_tag_filter_never_reaches_the_store() {
        let err = compile(&[clause(
            "tags",
            Operator::Eq,
            ValueType::String,
            json!("a".repeat(41)),
        )])
        .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }

    #[test]
    fn attribute_key_charset_is_enforced() {
        let err = compile(&[clause(
            "attributes.bad key",
            Operator::Eq,
            ValueType::String,
            json!("x"),
        )])
        .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }
}
