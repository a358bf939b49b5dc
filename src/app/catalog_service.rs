//! The catalog service.
//!
//! This module is the data-access layer shared by every resource type. It
//! is responsible for:
//! 1.  Executing paginated, scope-intersected queries against the
//!     `resources` table with an accurate total count.
//! 2.  Set-semantics mutations on tags and attributes under row-level
//!     locking (read-modify-write inside one transaction).
//! 3.  Soft deletes across the ownership graph and deep copies for
//!     ownership hand-off with compensating cleanup.

use crate::domain::entity::{
    merge_tags, remove_tags, validate_attribute_key, validate_attribute_value, validate_name,
    validate_tag, AttributeValue, KeyValue, NewResource, Resource, ResourceKind, ResourcePage,
};
use crate::domain::error::{is_transient, CatalogError};
use crate::domain::predicate::PredicateTree;
use crate::domain::scope::AuthorizationScope;
use crate::infra::audit::AuditSink;
use crate::storage::query::{self, SELECT_COLUMNS};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::{json, Value as JsonValue};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const MAX_TRANSIENT_RETRIES: u32 = 2;

/// The main service managing catalog resources in the store.
pub struct CatalogService {
    pool: PgPool,
    audit: Arc<dyn AuditSink>,
    copy_chunk_size: usize,
}

impl CatalogService {
    pub fn new(pool: PgPool, audit: Arc<dyn AuditSink>, copy_chunk_size: usize) -> Self {
        Self {
            pool,
            audit,
            copy_chunk_size: copy_chunk_size.max(1),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ---- inserts & reads -------------------------------------------------

    /// Inserts a new resource owned by `caller`. Workspace defaults to the
    /// caller's personal namespace.
    pub async fn insert_resource(
        &self,
        spec: NewResource,
        caller: &str,
    ) -> Result<Resource, CatalogError> {
        validate_name(&spec.name)?;
        for tag in &spec.tags {
            validate_tag(tag)?;
        }
        let attributes = collect_attributes(&spec.attributes)?;
        let (tags, _) = merge_tags(&[], &spec.tags);

        if let Some(parent_id) = &spec.parent_id {
            // The parent must be live; a dangling back-reference would break
            // the cascade walk.
            self.get_resource(parent_id).await.map_err(|e| match e {
                CatalogError::NotFound(_) => CatalogError::InvalidArgument(format!(
                    "parent resource '{}' does not exist",
                    parent_id
                )),
                other => other,
            })?;
        }

        let now = Utc::now();
        let resource = Resource {
            id: Uuid::new_v4().to_string(),
            kind: spec.kind,
            owner: caller.to_string(),
            name: spec.name,
            description: spec.description,
            readme: spec.readme,
            tags,
            attributes,
            visibility: spec.visibility,
            workspace: spec.workspace.unwrap_or_else(|| caller.to_string()),
            parent_id: spec.parent_id,
            date_created: now,
            date_updated: now,
            deleted: false,
        };

        let mut tx = self.pool.begin().await?;
        insert_row(&mut tx, &resource).await?;
        tx.commit().await?;

        self.audit
            .record("create", &[resource.id.clone()], json!({}))
            .await;
        Ok(resource)
    }

    /// Fetches one live resource by id.
    pub async fn get_resource(&self, id: &str) -> Result<Resource, CatalogError> {
        let sql = format!(
            "SELECT {} FROM resources WHERE id = $1 AND NOT deleted",
            SELECT_COLUMNS
        );
        let mut attempts: u32 = 0;
        let row = loop {
            let result = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_store_err);
            match result {
                Err(CatalogError::Unavailable(msg)) if attempts < MAX_TRANSIENT_RETRIES => {
                    attempts += 1;
                    transient_backoff(attempts, &msg).await;
                }
                other => break other,
            }
        }?;
        row.as_ref()
            .map(row_to_resource)
            .transpose()?
            .ok_or_else(|| CatalogError::NotFound(format!("resource '{}' not found", id)))
    }

    /// Executes a paginated query under predicate and scope.
    ///
    /// A scope of an empty `RestrictedTo` returns `(empty, 0)` without touching
    /// the store; an authorization scope of "nothing" is never translated
    /// into "no filter".
    pub async fn find_resources(
        &self,
        kind: ResourceKind,
        tree: &PredicateTree,
        scope: &AuthorizationScope,
        sort_key: &str,
        ascending: bool,
        page_number: u64,
        page_limit: u64,
    ) -> Result<ResourcePage, CatalogError> {
        if scope.is_empty() {
            tracing::debug!(kind = kind.as_str(), "empty scope, short-circuiting query");
            return Ok(ResourcePage {
                items: Vec::new(),
                total_records: 0,
            });
        }

        let sort = query::resolve_sort(sort_key, ascending);
        let window = query::page_window(page_number, page_limit);

        let mut attempts: u32 = 0;
        let total_records: i64 = loop {
            let mut qb = query::build_count_query(kind, tree, &scope.access);
            let result = qb
                .build_query_scalar()
                .fetch_one(&self.pool)
                .await
                .map_err(map_store_err);
            match result {
                Err(CatalogError::Unavailable(msg)) if attempts < MAX_TRANSIENT_RETRIES => {
                    attempts += 1;
                    transient_backoff(attempts, &msg).await;
                }
                other => break other,
            }
        }?;

        let mut attempts: u32 = 0;
        let rows = loop {
            let mut qb = query::build_page_query(kind, tree, &scope.access, sort, window);
            let result = qb.build().fetch_all(&self.pool).await.map_err(map_store_err);
            match result {
                Err(CatalogError::Unavailable(msg)) if attempts < MAX_TRANSIENT_RETRIES => {
                    attempts += 1;
                    transient_backoff(attempts, &msg).await;
                }
                other => break other,
            }
        }?;

        let items = rows
            .iter()
            .map(row_to_resource)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ResourcePage {
            items,
            total_records: total_records.max(0) as u64,
        })
    }

    /// Number of live children under the given parents, recomputed from the
    /// store (never inherited from a copy source).
    pub async fn count_children(&self, parent_ids: &[String]) -> Result<u64, CatalogError> {
        let mut attempts: u32 = 0;
        let count: i64 = loop {
            let result = sqlx::query_scalar(
                "SELECT COUNT(*) FROM resources WHERE parent_id = ANY($1) AND NOT deleted",
            )
            .bind(parent_ids)
            .fetch_one(&self.pool)
            .await
            .map_err(map_store_err);
            match result {
                Err(CatalogError::Unavailable(msg)) if attempts < MAX_TRANSIENT_RETRIES => {
                    attempts += 1;
                    transient_backoff(attempts, &msg).await;
                }
                other => break other,
            }
        }?;
        Ok(count.max(0) as u64)
    }

    // ---- tag accessors ---------------------------------------------------

    /// Unions `tags` into the resource's tag sequence. Duplicates are
    /// no-ops; a logical no-op does not bump `date_updated`.
    pub async fn add_tags(&self, id: &str, tags: &[String]) -> Result<Resource, CatalogError> {
        for tag in tags {
            validate_tag(tag)?;
        }
        let mut tx = self.pool.begin().await?;
        let mut resource = lock_live(&mut tx, id).await?;
        let (merged, changed) = merge_tags(&resource.tags, tags);
        if changed {
            let now = Utc::now();
            store_tags(&mut tx, id, &merged, now).await?;
            resource.tags = merged;
            resource.date_updated = now;
        }
        tx.commit().await?;
        self.audit
            .record("update", &[id.to_string()], json!({"field": "tags"}))
            .await;
        Ok(resource)
    }

    /// Removes the listed tags, or all of them under `delete_all` (which
    /// wins over a non-empty explicit list). Absent tags are no-ops.
    pub async fn delete_tags(
        &self,
        id: &str,
        tags: &[String],
        delete_all: bool,
    ) -> Result<Resource, CatalogError> {
        let mut tx = self.pool.begin().await?;
        let mut resource = lock_live(&mut tx, id).await?;
        let (remaining, changed) = remove_tags(&resource.tags, tags, delete_all);
        if changed {
            let now = Utc::now();
            store_tags(&mut tx, id, &remaining, now).await?;
            resource.tags = remaining;
            resource.date_updated = now;
        }
        tx.commit().await?;
        self.audit
            .record("update", &[id.to_string()], json!({"field": "tags"}))
            .await;
        Ok(resource)
    }

    pub async fn get_tags(&self, id: &str) -> Result<Vec<String>, CatalogError> {
        Ok(self.get_resource(id).await?.tags)
    }

    // ---- attribute accessors ---------------------------------------------

    /// Adds attributes; create-once semantics. Any key that already exists
    /// rejects the whole call with `AlreadyExists` and nothing is written.
    pub async fn add_attributes(
        &self,
        id: &str,
        attributes: &[KeyValue],
    ) -> Result<Resource, CatalogError> {
        let incoming = collect_attributes(attributes)?;
        let mut tx = self.pool.begin().await?;
        let mut resource = lock_live(&mut tx, id).await?;
        for key in incoming.keys() {
            if resource.attributes.contains_key(key) {
                return Err(CatalogError::AlreadyExists(format!(
                    "attribute '{}' already exists on resource '{}'",
                    key, id
                )));
            }
        }
        resource.attributes.extend(incoming);
        let now = Utc::now();
        store_attributes(&mut tx, id, &resource.attributes, now).await?;
        resource.date_updated = now;
        tx.commit().await?;
        self.audit
            .record("update", &[id.to_string()], json!({"field": "attributes"}))
            .await;
        Ok(resource)
    }

    /// Single-key upsert. Writing a value equal to the current one is a
    /// no-op reported as zero rows affected; `date_updated` is untouched.
    pub async fn update_attribute(
        &self,
        id: &str,
        attribute: KeyValue,
    ) -> Result<(Resource, u64), CatalogError> {
        validate_attribute_key(&attribute.key)?;
        validate_attribute_value(&attribute.value)?;

        let mut tx = self.pool.begin().await?;
        let mut resource = lock_live(&mut tx, id).await?;
        if resource.attributes.get(&attribute.key) == Some(&attribute.value) {
            tx.commit().await?;
            return Ok((resource, 0));
        }
        resource
            .attributes
            .insert(attribute.key.clone(), attribute.value);
        let now = Utc::now();
        store_attributes(&mut tx, id, &resource.attributes, now).await?;
        resource.date_updated = now;
        tx.commit().await?;
        self.audit
            .record(
                "update",
                &[id.to_string()],
                json!({"field": "attributes", "key": attribute.key}),
            )
            .await;
        Ok((resource, 1))
    }

    /// Deletes attributes by key list, or the whole map under `delete_all`.
    pub async fn delete_attributes(
        &self,
        id: &str,
        keys: &[String],
        delete_all: bool,
    ) -> Result<Resource, CatalogError> {
        let mut tx = self.pool.begin().await?;
        let mut resource = lock_live(&mut tx, id).await?;
        let changed = if delete_all {
            let had_any = !resource.attributes.is_empty();
            resource.attributes.clear();
            had_any
        } else {
            let before = resource.attributes.len();
            for key in keys {
                resource.attributes.remove(key);
            }
            resource.attributes.len() != before
        };
        if changed {
            let now = Utc::now();
            store_attributes(&mut tx, id, &resource.attributes, now).await?;
            resource.date_updated = now;
        }
        tx.commit().await?;
        self.audit
            .record("update", &[id.to_string()], json!({"field": "attributes"}))
            .await;
        Ok(resource)
    }

    /// Fetches attributes by key list, or all of them under `get_all`.
    pub async fn get_attributes(
        &self,
        id: &str,
        keys: &[String],
        get_all: bool,
    ) -> Result<Vec<KeyValue>, CatalogError> {
        if !get_all && keys.is_empty() {
            return Err(CatalogError::InvalidArgument(
                "attribute keys are required unless get_all is set".to_string(),
            ));
        }
        let resource = self.get_resource(id).await?;
        let entries = resource
            .attributes
            .into_iter()
            .filter(|(key, _)| get_all || keys.iter().any(|k| k == key))
            .map(|(key, value)| KeyValue { key, value })
            .collect();
        Ok(entries)
    }

    // ---- scalar field accessors ------------------------------------------

    pub async fn update_name(&self, id: &str, name: &str) -> Result<Resource, CatalogError> {
        validate_name(name)?;
        self.set_text_column(id, "name", name).await
    }

    pub async fn update_description(
        &self,
        id: &str,
        description: &str,
    ) -> Result<Resource, CatalogError> {
        self.set_text_column(id, "description", description).await
    }

    pub async fn update_readme(&self, id: &str, readme: &str) -> Result<Resource, CatalogError> {
        self.set_text_column(id, "readme", readme).await
    }

    /// Column names come from the callers above, never from clients.
    async fn set_text_column(
        &self,
        id: &str,
        column: &'static str,
        value: &str,
    ) -> Result<Resource, CatalogError> {
        let mut tx = self.pool.begin().await?;
        let mut resource = lock_live(&mut tx, id).await?;
        let current = match column {
            "name" => &resource.name,
            "description" => &resource.description,
            _ => &resource.readme,
        };
        if current == value {
            tx.commit().await?;
            return Ok(resource);
        }
        let now = Utc::now();
        sqlx::query(&format!(
            "UPDATE resources SET {} = $1, date_updated = $2 WHERE id = $3",
            column
        ))
        .bind(value)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        match column {
            "name" => resource.name = value.to_string(),
            "description" => resource.description = value.to_string(),
            _ => resource.readme = value.to_string(),
        }
        resource.date_updated = now;
        self.audit
            .record("update", &[id.to_string()], json!({"field": column}))
            .await;
        Ok(resource)
    }

    // ---- soft delete -----------------------------------------------------

    /// Soft-deletes the given resources and all their live descendants.
    /// Idempotent: already-deleted or unknown ids are skipped, not errors.
    /// Returns the ids actually flipped.
    pub async fn delete_resources(&self, ids: &[String]) -> Result<Vec<String>, CatalogError> {
        let mut tx = self.pool.begin().await?;

        let mut to_delete: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut frontier: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM resources WHERE id = ANY($1) AND NOT deleted FOR UPDATE",
        )
        .bind(ids)
        .fetch_all(&mut *tx)
        .await?;

        while !frontier.is_empty() {
            frontier.retain(|id| seen.insert(id.clone()));
            if frontier.is_empty() {
                break;
            }
            to_delete.extend(frontier.iter().cloned());
            frontier = sqlx::query_scalar(
                "SELECT id FROM resources WHERE parent_id = ANY($1) AND NOT deleted FOR UPDATE",
            )
            .bind(&frontier)
            .fetch_all(&mut *tx)
            .await?;
        }

        if !to_delete.is_empty() {
            sqlx::query(
                "UPDATE resources SET deleted = TRUE, date_updated = $1 WHERE id = ANY($2)",
            )
            .bind(Utc::now())
            .bind(&to_delete)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        if !to_delete.is_empty() {
            self.audit.record("delete", &to_delete, json!({})).await;
        }
        Ok(to_delete)
    }

    // ---- deep copy -------------------------------------------------------

    /// Deep-copies a resource and its owned descendants for a new owner.
    ///
    /// Children are inserted in chunks, each chunk its own transaction, so
    /// no long-lived lock spans the whole tree. On any failure every row
    /// created so far is removed again before the error surfaces; a
    /// partial copy is never left behind.
    pub async fn deep_copy_for_owner(
        &self,
        source_id: &str,
        new_owner: &str,
    ) -> Result<Resource, CatalogError> {
        let source = self.get_resource(source_id).await?;
        let descendants = self.load_descendants(source_id).await?;
        let plan = plan_copy(&source, &descendants, new_owner, Utc::now())?;

        let root = plan
            .first()
            .cloned()
            .ok_or_else(|| CatalogError::Internal("copy plan cannot be empty".to_string()))?;

        let mut created: Vec<String> = Vec::new();
        for chunk in plan.chunks(self.copy_chunk_size) {
            let result: Result<(), CatalogError> = async {
                let mut tx = self.pool.begin().await?;
                for resource in chunk {
                    insert_row(&mut tx, resource).await?;
                }
                tx.commit().await?;
                Ok(())
            }
            .await;

            if let Err(err) = result {
                self.compensate_partial_copy(&created).await;
                return Err(err);
            }
            created.extend(chunk.iter().map(|r| r.id.clone()));
        }

        self.audit
            .record(
                "deep_copy",
                &[source_id.to_string(), root.id.clone()],
                json!({"new_owner": new_owner, "copied": created.len()}),
            )
            .await;
        Ok(root)
    }

    /// Breadth-first walk of the live ownership graph under `root_id`.
    /// A visited set guards against reference cycles in the data.
    async fn load_descendants(&self, root_id: &str) -> Result<Vec<Resource>, CatalogError> {
        let sql = format!(
            "SELECT {} FROM resources WHERE parent_id = ANY($1) AND NOT deleted",
            SELECT_COLUMNS
        );
        let mut out: Vec<Resource> = Vec::new();
        let mut seen: HashSet<String> = HashSet::from([root_id.to_string()]);
        let mut frontier = vec![root_id.to_string()];
        while !frontier.is_empty() {
            let rows = sqlx::query(&sql)
                .bind(&frontier)
                .fetch_all(&self.pool)
                .await?;
            frontier = Vec::new();
            for row in &rows {
                let child = row_to_resource(row)?;
                if seen.insert(child.id.clone()) {
                    frontier.push(child.id.clone());
                    out.push(child);
                }
            }
        }
        Ok(out)
    }

    /// Best-effort removal of the rows a failed copy created. The copies
    /// were never visible as a consistent tree, so a hard delete is safe.
    async fn compensate_partial_copy(&self, created: &[String]) {
        if created.is_empty() {
            return;
        }
        match sqlx::query("DELETE FROM resources WHERE id = ANY($1)")
            .bind(created)
            .execute(&self.pool)
            .await
        {
            Ok(_) => {
                tracing::warn!(rows = created.len(), "rolled back partially copied resources");
            }
            Err(e) => {
                tracing::error!(error = %e, rows = created.len(),
                    "compensating cleanup failed; orphaned copies remain");
            }
        }
    }
}

// ---- row mapping and shared SQL helpers ----------------------------------

fn map_store_err(err: sqlx::Error) -> CatalogError {
    if is_transient(&err) {
        CatalogError::Unavailable(err.to_string())
    } else {
        err.into()
    }
}

fn row_to_resource(row: &PgRow) -> Result<Resource, CatalogError> {
    let kind_str: String = row.try_get("kind")?;
    let kind = ResourceKind::parse(&kind_str)
        .ok_or_else(|| CatalogError::Internal(format!("unknown resource kind '{}'", kind_str)))?;
    let visibility_str: String = row.try_get("visibility")?;
    let visibility = crate::domain::entity::Visibility::parse(&visibility_str)
        .ok_or_else(|| CatalogError::Internal(format!("unknown visibility '{}'", visibility_str)))?;

    let tags_json: JsonValue = row.try_get("tags")?;
    let tags: Vec<String> = serde_json::from_value(tags_json)
        .map_err(|e| CatalogError::Internal(format!("malformed tags column: {}", e)))?;
    let attributes_json: JsonValue = row.try_get("attributes")?;
    let attributes: BTreeMap<String, AttributeValue> = serde_json::from_value(attributes_json)
        .map_err(|e| CatalogError::Internal(format!("malformed attributes column: {}", e)))?;

    Ok(Resource {
        id: row.try_get("id")?,
        kind,
        owner: row.try_get("owner")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        readme: row.try_get("readme")?,
        tags,
        attributes,
        visibility,
        workspace: row.try_get("workspace")?,
        parent_id: row.try_get("parent_id")?,
        date_created: row.try_get("date_created")?,
        date_updated: row.try_get("date_updated")?,
        deleted: row.try_get("deleted")?,
    })
}

/// `SELECT ... FOR UPDATE` on one live row; mutations on the same resource
/// serialize on this lock.
async fn lock_live(
    tx: &mut Transaction<'_, Postgres>,
    id: &str,
) -> Result<Resource, CatalogError> {
    let sql = format!(
        "SELECT {} FROM resources WHERE id = $1 AND NOT deleted FOR UPDATE",
        SELECT_COLUMNS
    );
    let row = sqlx::query(&sql).bind(id).fetch_optional(&mut **tx).await?;
    row.as_ref()
        .map(row_to_resource)
        .transpose()?
        .ok_or_else(|| CatalogError::NotFound(format!("resource '{}' not found", id)))
}

async fn insert_row(
    tx: &mut Transaction<'_, Postgres>,
    resource: &Resource,
) -> Result<(), CatalogError> {
    sqlx::query(
        "INSERT INTO resources
         (id, kind, owner, name, description, readme, tags, attributes,
          visibility, workspace, parent_id, date_created, date_updated, deleted)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(&resource.id)
    .bind(resource.kind.as_str())
    .bind(&resource.owner)
    .bind(&resource.name)
    .bind(&resource.description)
    .bind(&resource.readme)
    .bind(serde_json::to_value(&resource.tags).unwrap_or_else(|_| json!([])))
    .bind(serde_json::to_value(&resource.attributes).unwrap_or_else(|_| json!({})))
    .bind(resource.visibility.as_str())
    .bind(&resource.workspace)
    .bind(&resource.parent_id)
    .bind(resource.date_created)
    .bind(resource.date_updated)
    .bind(resource.deleted)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn store_tags(
    tx: &mut Transaction<'_, Postgres>,
    id: &str,
    tags: &[String],
    now: DateTime<Utc>,
) -> Result<(), CatalogError> {
    sqlx::query("UPDATE resources SET tags = $1, date_updated = $2 WHERE id = $3")
        .bind(serde_json::to_value(tags).unwrap_or_else(|_| json!([])))
        .bind(now)
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn store_attributes(
    tx: &mut Transaction<'_, Postgres>,
    id: &str,
    attributes: &BTreeMap<String, AttributeValue>,
    now: DateTime<Utc>,
) -> Result<(), CatalogError> {
    sqlx::query("UPDATE resources SET attributes = $1, date_updated = $2 WHERE id = $3")
        .bind(serde_json::to_value(attributes).unwrap_or_else(|_| json!({})))
        .bind(now)
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Validates a client attribute list and collects it into a map, rejecting
/// duplicate keys within the request itself.
fn collect_attributes(
    attributes: &[KeyValue],
) -> Result<BTreeMap<String, AttributeValue>, CatalogError> {
    let mut out = BTreeMap::new();
    for kv in attributes {
        validate_attribute_key(&kv.key)?;
        validate_attribute_value(&kv.value)?;
        if out.insert(kv.key.clone(), kv.value.clone()).is_some() {
            return Err(CatalogError::InvalidArgument(format!(
                "duplicate attribute key '{}' in request",
                kv.key
            )));
        }
    }
    Ok(out)
}

/// Plans a deep copy: fresh ids, new owner, parent references remapped to
/// the new ids, timestamps reset. Root first, then children in walk order,
/// so every parent is inserted before its children. Pure function.
fn plan_copy(
    source: &Resource,
    descendants: &[Resource],
    new_owner: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Resource>, CatalogError> {
    let mut id_map: BTreeMap<String, String> = BTreeMap::new();
    id_map.insert(source.id.clone(), Uuid::new_v4().to_string());
    for child in descendants {
        id_map.insert(child.id.clone(), Uuid::new_v4().to_string());
    }

    let mut plan = Vec::with_capacity(descendants.len() + 1);
    plan.push(Resource {
        id: id_map[&source.id].clone(),
        owner: new_owner.to_string(),
        name: format!("{} - copy", source.name),
        workspace: new_owner.to_string(),
        visibility: crate::domain::entity::Visibility::Private,
        parent_id: None,
        date_created: now,
        date_updated: now,
        deleted: false,
        ..source.clone()
    });

    for child in descendants {
        let parent_id = child
            .parent_id
            .as_ref()
            .and_then(|old| id_map.get(old))
            .cloned();
        if parent_id.is_none() {
            return Err(CatalogError::Internal(format!(
                "descendant '{}' lost its parent during copy planning",
                child.id
            )));
        }
        plan.push(Resource {
            id: id_map[&child.id].clone(),
            owner: new_owner.to_string(),
            workspace: new_owner.to_string(),
            visibility: crate::domain::entity::Visibility::Private,
            parent_id,
            date_created: now,
            date_updated: now,
            deleted: false,
            ..child.clone()
        });
    }
    Ok(plan)
}

/// Jittered backoff between bounded retries of read-only store operations.
/// Mutations never retry; creates are never retried.
async fn transient_backoff(attempt: u32, msg: &str) {
    let jitter: u64 = rand::thread_rng().gen_range(0..50);
    tracing::warn!(attempt, error = %msg, "transient store failure, retrying");
    tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt) + jitter)).await;
}
