//! Compilation of predicate trees, scopes, sort and pagination into SQL.
//!
//! Identifiers come from closed resolution tables only; every client-supplied
//! value (including JSONB keys) is bound, never interpolated.

use crate::domain::entity::ResourceKind;
use crate::domain::predicate::{
    ClauseGroup, CompiledClause, FieldRef, FilterValue, Operator, PredicateTree,
};
use crate::domain::scope::Access;
use sqlx::{Postgres, QueryBuilder};

/// Columns selected for a full `Resource` row.
pub const SELECT_COLUMNS: &str = "id, kind, owner, name, description, readme, tags, attributes, \
     visibility, workspace, parent_id, date_created, date_updated, deleted";

/// A resolved sort specification over an indexed core column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: &'static str,
    pub ascending: bool,
}

/// Resolves `sort_key` against the closed set of sortable columns. Unknown
/// keys fall back to `date_updated` descending; documented behavior, not an
/// error path.
pub fn resolve_sort(sort_key: &str, ascending: bool) -> SortSpec {
    let column = match sort_key {
        "id" => Some("id"),
        "name" => Some("name"),
        "owner" => Some("owner"),
        "visibility" => Some("visibility"),
        "date_created" => Some("date_created"),
        "date_updated" => Some("date_updated"),
        _ => None,
    };
    match column {
        Some(column) => SortSpec { column, ascending },
        None => {
            if !sort_key.is_empty() {
                tracing::warn!(sort_key, "unsortable key, falling back to date_updated desc");
            }
            SortSpec {
                column: "date_updated",
                ascending: false,
            }
        }
    }
}

/// Translates the 1-indexed page window into (offset, limit).
/// `page_number = 0` or `page_limit = 0` means "all matching records".
pub fn page_window(page_number: u64, page_limit: u64) -> Option<(i64, i64)> {
    if page_number == 0 || page_limit == 0 {
        return None;
    }
    let offset = (page_number - 1).saturating_mul(page_limit);
    Some((offset as i64, page_limit as i64))
}

/// Builds the page SELECT under predicate and scope with stable ordering.
pub fn build_page_query(
    kind: ResourceKind,
    tree: &PredicateTree,
    scope: &Access,
    sort: SortSpec,
    window: Option<(i64, i64)>,
) -> QueryBuilder<'static, Postgres> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
    qb.push(SELECT_COLUMNS).push(" FROM resources");
    push_where(&mut qb, kind, tree, scope);
    qb.push(" ORDER BY ")
        .push(sort.column)
        .push(if sort.ascending { " ASC" } else { " DESC" })
        // ties are broken by id so pagination stays stable across calls
        .push(", id ASC");
    if let Some((offset, limit)) = window {
        qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
    }
    qb
}

/// Builds the COUNT(*) under the same predicate and scope, independent of the
/// page window.
pub fn build_count_query(
    kind: ResourceKind,
    tree: &PredicateTree,
    scope: &Access,
) -> QueryBuilder<'static, Postgres> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM resources");
    push_where(&mut qb, kind, tree, scope);
    qb
}

fn push_where(
    qb: &mut QueryBuilder<'static, Postgres>,
    kind: ResourceKind,
    tree: &PredicateTree,
    scope: &Access,
) {
    qb.push(" WHERE kind = ")
        .push_bind(kind.as_str())
        .push(" AND NOT deleted");

    if let Access::RestrictedTo(ids) = scope {
        let ids: Vec<String> = ids.iter().cloned().collect();
        qb.push(" AND id = ANY(").push_bind(ids).push(")");
    }

    for group in &tree.groups {
        qb.push(" AND (");
        for (i, clause) in group.clauses.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            push_clause(qb, &group.field, clause);
        }
        qb.push(")");
    }
}

fn push_clause(qb: &mut QueryBuilder<'static, Postgres>, field: &FieldRef, clause: &CompiledClause) {
    match (field, &clause.value) {
        (FieldRef::Tags, FilterValue::Text(tag)) => match clause.operator {
            Operator::Eq => {
                qb.push("jsonb_exists(tags, ").push_bind(tag.clone()).push(")");
            }
            Operator::Ne => {
                qb.push("NOT jsonb_exists(tags, ").push_bind(tag.clone()).push(")");
            }
            Operator::Contains => {
                qb.push(
                    "EXISTS (SELECT 1 FROM jsonb_array_elements_text(tags) AS t(tag) \
                     WHERE t.tag LIKE ",
                )
                .push_bind(like_pattern(tag))
                .push(")");
            }
            // remaining operators are rejected by the compiler
            _ => qb_push_false(qb),
        },
        (FieldRef::Core(core), FilterValue::Number(ms)) if core.is_date() => {
            qb.push("(")
                .push(core.column())
                .push(" ")
                .push(comparison_sql(clause.operator))
                .push(" to_timestamp(")
                .push_bind(*ms)
                .push(" / 1000.0))");
        }
        (FieldRef::Core(core), FilterValue::Text(text)) => match clause.operator {
            Operator::Contains => {
                qb.push("(")
                    .push(core.column())
                    .push(" LIKE ")
                    .push_bind(like_pattern(text))
                    .push(")");
            }
            op => {
                qb.push("(")
                    .push(core.column())
                    .push(" ")
                    .push(comparison_sql(op))
                    .push(" ")
                    .push_bind(text.clone())
                    .push(")");
            }
        },
        (FieldRef::Attribute(key), FilterValue::Number(n)) => {
            // CASE guards the cast so a text attribute under the same key
            // yields NULL (no match) instead of a cast error.
            qb.push(
                "((CASE WHEN jsonb_typeof(attributes -> ",
            )
            .push_bind(key.clone())
            .push(" -> 'value') = 'number' THEN (attributes -> ")
            .push_bind(key.clone())
            .push(" ->> 'value')::float8 END) ")
            .push(comparison_sql(clause.operator))
            .push(" ")
            .push_bind(*n)
            .push(")");
        }
        (FieldRef::Attribute(key), FilterValue::Text(text)) => {
            qb.push("((attributes -> ")
                .push_bind(key.clone())
                .push(" ->> 'value_type') = 'string' AND (attributes -> ")
                .push_bind(key.clone())
                .push(" ->> 'value') ");
            match clause.operator {
                Operator::Contains => {
                    qb.push("LIKE ").push_bind(like_pattern(text));
                }
                op => {
                    qb.push(comparison_sql(op)).push(" ").push_bind(text.clone());
                }
            }
            qb.push(")");
        }
        (FieldRef::Attribute(key), FilterValue::Blob(value)) => {
            qb.push("((attributes -> ")
                .push_bind(key.clone())
                .push(" -> 'value') ")
                .push(match clause.operator {
                    Operator::Ne => "<>",
                    _ => "=",
                })
                .push(" ")
                .push_bind(value.clone())
                .push(")");
        }
        // shapes the compiler never produces
        _ => qb_push_false(qb),
    }
}

fn comparison_sql(op: Operator) -> &'static str {
    match op {
        Operator::Eq => "=",
        Operator::Ne => "<>",
        Operator::Gt => ">",
        Operator::Gte => ">=",
        Operator::Lt => "<",
        Operator::Lte => "<=",
        Operator::Contains => "LIKE",
    }
}

fn qb_push_false(qb: &mut QueryBuilder<'static, Postgres>) {
    qb.push("FALSE");
}

/// Escapes LIKE metacharacters and wraps the needle in wildcards.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::predicate::{compile, RawClause, ValueType};
    use crate::domain::scope::Access;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn tree(clauses: &[RawClause]) -> PredicateTree {
        compile(clauses).unwrap()
    }

    fn clause(key: &str, operator: Operator, value_type: ValueType, value: serde_json::Value) -> RawClause {
        RawClause {
            key: key.to_string(),
            operator,
            value_type,
            value,
        }
    }

    #[test]
    fn sort_falls_back_to_date_updated_desc() {
        assert_eq!(
            resolve_sort("not_a_column", true),
            SortSpec {
                column: "date_updated",
                ascending: false
            }
        );
        assert_eq!(
            resolve_sort("name", true),
            SortSpec {
                column: "name",
                ascending: true
            }
        );
    }

    #[test]
    fn page_window_math() {
        assert_eq!(page_window(0, 10), None);
        assert_eq!(page_window(3, 0), None);
        assert_eq!(page_window(1, 10), Some((0, 10)));
        assert_eq!(page_window(2, 10), Some((10, 10)));
        assert_eq!(page_window(5, 7), Some((28, 7)));
    }

    #[test]
    fn page_query_orders_with_id_tiebreak() {
        let sql = build_page_query(
            ResourceKind::Project,
            &PredicateTree::default(),
            &Access::Unrestricted,
            resolve_sort("date_updated", false),
            Some((10, 10)),
        )
        .into_sql();
        assert!(sql.contains("ORDER BY date_updated DESC, id ASC"));
        assert!(sql.contains("LIMIT"));
        assert!(sql.contains("OFFSET"));
        assert!(sql.contains("NOT deleted"));
    }

    #[test]
    fn unpaged_query_has_no_window() {
        let sql = build_page_query(
            ResourceKind::Project,
            &PredicateTree::default(),
            &Access::Unrestricted,
            resolve_sort("", false),
            None,
        )
        .into_sql();
        assert!(!sql.contains("LIMIT"));
        assert!(!sql.contains("OFFSET"));
    }

    #[test]
    fn restricted_scope_adds_id_constraint_unrestricted_does_not() {
        let scoped = build_count_query(
            ResourceKind::Dataset,
            &PredicateTree::default(),
            &Access::RestrictedTo(BTreeSet::from(["p1".to_string()])),
        )
        .into_sql();
        assert!(scoped.contains("id = ANY("));

        let open = build_count_query(
            ResourceKind::Dataset,
            &PredicateTree::default(),
            &Access::Unrestricted,
        )
        .into_sql();
        assert!(!open.contains("id = ANY("));
    }

    #[test]
    fn same_key_clauses_become_or_distinct_keys_become_and() {
        let t = tree(&[
            clause("tags", Operator::Eq, ValueType::String, json!("a")),
            clause("tags", Operator::Eq, ValueType::String, json!("b")),
            clause("owner", Operator::Eq, ValueType::String, json!("u1")),
        ]);
        let sql = build_count_query(ResourceKind::Project, &t, &Access::Unrestricted).into_sql();
        assert!(sql.contains("jsonb_exists(tags, $2) OR jsonb_exists(tags, $3)"));
        assert!(sql.contains(") AND ((owner = $4))"));
    }

    #[test]
    fn count_and_page_share_the_same_where_clause() {
        let t = tree(&[clause(
            "attributes.lr",
            Operator::Lt,
            ValueType::Number,
            json!(0.1),
        )]);
        let scope = Access::RestrictedTo(BTreeSet::from(["p1".to_string()]));
        let count_sql = build_count_query(ResourceKind::Project, &t, &scope).into_sql();
        let page_sql = build_page_query(
            ResourceKind::Project,
            &t,
            &scope,
            resolve_sort("", false),
            Some((0, 10)),
        )
        .into_sql();

        let count_where = count_sql.split(" WHERE ").nth(1).unwrap();
        let page_where = page_sql
            .split(" WHERE ")
            .nth(1)
            .unwrap()
            .split(" ORDER BY ")
            .next()
            .unwrap();
        assert_eq!(count_where, page_where);
    }

    #[test]
    fn numeric_attribute_filter_guards_the_cast() {
        let t = tree(&[clause(
            "attributes.epochs",
            Operator::Gte,
            ValueType::Number,
            json!(5),
        )]);
        let sql = build_count_query(ResourceKind::Project, &t, &Access::Unrestricted).into_sql();
        assert!(sql.contains("jsonb_typeof"));
        assert!(sql.contains("::float8"));
    }

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("50%_done"), "%50\\%\\_done%");
        assert_eq!(like_pattern("plain"), "%plain%");
    }
}
