//! End-to-end flow test: create resources, query with filters/scope/pages,
//! mutate tags and attributes, deep copy, soft delete.
//!
//! Runs against a live Postgres when `DATABASE_URL` is set and skips
//! cleanly otherwise, so the suite stays green on machines without a store.

use async_trait::async_trait;
use catalog_api::domain::scope::{AccessAction, Accessible};
use catalog_api::infra::authz::{AccessControl, AccessError};
use catalog_api::{
    transport, CatalogService, ResourceKind, ScopeResolver, TracingAuditSink,
};
use serde_json::{json, Value as JsonValue};
use sqlx::postgres::PgPoolOptions;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Collaborator fake with no grants: scopes reduce to owned ∪ public,
/// single-resource checks pass only for owners.
struct NoGrants;

#[async_trait]
impl AccessControl for NoGrants {
    async fn accessible_ids(
        &self,
        _caller: &str,
        _action: AccessAction,
        _kind: ResourceKind,
    ) -> Result<Accessible, AccessError> {
        Ok(Accessible::Ids(BTreeSet::new()))
    }

    async fn check_permission(
        &self,
        _caller: &str,
        _action: AccessAction,
        _resource_id: &str,
    ) -> Result<bool, AccessError> {
        Ok(false)
    }
}

/// Collaborator fake that never answers in time.
struct Stuck;

#[async_trait]
impl AccessControl for Stuck {
    async fn accessible_ids(
        &self,
        _caller: &str,
        _action: AccessAction,
        _kind: ResourceKind,
    ) -> Result<Accessible, AccessError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Accessible::All)
    }

    async fn check_permission(
        &self,
        _caller: &str,
        _action: AccessAction,
        _resource_id: &str,
    ) -> Result<bool, AccessError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(true)
    }
}

/// Collaborator fake that is hard down.
struct Down;

#[async_trait]
impl AccessControl for Down {
    async fn accessible_ids(
        &self,
        _caller: &str,
        _action: AccessAction,
        _kind: ResourceKind,
    ) -> Result<Accessible, AccessError> {
        Err(AccessError("connection refused".to_string()))
    }

    async fn check_permission(
        &self,
        _caller: &str,
        _action: AccessAction,
        _resource_id: &str,
    ) -> Result<bool, AccessError> {
        Err(AccessError("connection refused".to_string()))
    }
}

fn lazy_pool() -> sqlx::PgPool {
    // Never actually connected in the fail-closed tests: the collaborator
    // fails before any owned-ids query runs.
    PgPoolOptions::new()
        .connect_lazy("postgres://localhost:1/unused")
        .expect("lazy pool")
}

#[tokio::test]
async fn resolver_fails_closed_on_collaborator_timeout() {
    let resolver = ScopeResolver::new(Arc::new(Stuck), lazy_pool(), Duration::from_millis(50));
    let err = resolver
        .resolve(
            Some("u1"),
            AccessAction::Read,
            ResourceKind::Project,
            "u1",
            catalog_api::Visibility::Private,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, catalog_api::CatalogError::Unavailable(_)));
}

#[tokio::test]
async fn resolver_fails_closed_on_collaborator_error() {
    let resolver = ScopeResolver::new(Arc::new(Down), lazy_pool(), Duration::from_millis(500));
    let err = resolver
        .resolve(
            Some("u1"),
            AccessAction::Read,
            ResourceKind::Project,
            "u1",
            catalog_api::Visibility::Private,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, catalog_api::CatalogError::Unavailable(_)));
}

async fn create_resource(
    client: &reqwest::Client,
    base: &str,
    kind: &str,
    caller: &str,
    body: JsonValue,
) -> anyhow::Result<JsonValue> {
    let resp = client
        .post(format!("{}/api/v1/{}", base, kind))
        .header("x-caller", caller)
        .json(&body)
        .send()
        .await?;
    assert!(resp.status().is_success(), "create failed: {}", resp.text().await?);
    let body: JsonValue = resp.json().await?;
    Ok(body["data"]["resource"].clone())
}

async fn find(
    client: &reqwest::Client,
    base: &str,
    kind: &str,
    caller: Option<&str>,
    body: JsonValue,
) -> anyhow::Result<JsonValue> {
    let mut req = client
        .post(format!("{}/api/v1/{}/find", base, kind))
        .json(&body);
    if let Some(caller) = caller {
        req = req.header("x-caller", caller);
    }
    let resp = req.send().await?;
    assert!(resp.status().is_success(), "find failed: {}", resp.text().await?);
    let body: JsonValue = resp.json().await?;
    Ok(body["data"].clone())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_catalog_flow() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let Ok(_) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping test_catalog_flow");
        return Ok(());
    };

    let pool = catalog_api::storage::connect_pool().await?;
    catalog_api::storage::ensure_schema(&pool).await?;
    // Clean slate for deterministic counts.
    sqlx::query("DELETE FROM resources").execute(&pool).await?;

    let resolver = Arc::new(ScopeResolver::new(
        Arc::new(NoGrants),
        pool.clone(),
        Duration::from_secs(5),
    ));
    let catalog = Arc::new(CatalogService::new(pool, Arc::new(TracingAuditSink), 8));
    let app_state = transport::http::AppState { catalog, resolver };
    let router = transport::http::create_router(app_state);

    // Bind to an ephemeral port to avoid conflicts with a running server.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();

    // --- create 25 projects for u1 ---
    let mut u1_ids: Vec<String> = Vec::new();
    for i in 0..25 {
        let resource = create_resource(
            &client,
            &base,
            "projects",
            "u1",
            json!({ "name": format!("proj-{:02}", i), "tags": ["x", "y"] }),
        )
        .await?;
        u1_ids.push(resource["id"].as_str().unwrap().to_string());
    }
    // one project owned by u2, living in u1's workspace
    let u2_project = create_resource(
        &client,
        &base,
        "projects",
        "u2",
        json!({ "name": "intruder", "workspace": "u1" }),
    )
    .await?;
    let u2_id = u2_project["id"].as_str().unwrap().to_string();

    // --- pagination: page 2 of 10 over 25 matches ---
    let all = find(
        &client,
        &base,
        "projects",
        Some("u1"),
        json!({ "sort_key": "date_updated", "page_number": 0, "page_limit": 0 }),
    )
    .await?;
    assert_eq!(all["total_records"], 25);
    let all_ids: Vec<&str> = all["resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(all_ids.len(), 25);

    let page2 = find(
        &client,
        &base,
        "projects",
        Some("u1"),
        json!({ "sort_key": "date_updated", "page_number": 2, "page_limit": 10 }),
    )
    .await?;
    assert_eq!(page2["total_records"], 25);
    let page2_ids: Vec<&str> = page2["resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(page2_ids, &all_ids[10..20], "page 2 is items 11-20");

    // repeated call returns the identical page (stability)
    let page2_again = find(
        &client,
        &base,
        "projects",
        Some("u1"),
        json!({ "sort_key": "date_updated", "page_number": 2, "page_limit": 10 }),
    )
    .await?;
    assert_eq!(page2, page2_again);

    // --- scope: u2 in their own workspace sees nothing of u1's ---
    let u2_view = find(&client, &base, "projects", Some("u2"), json!({})).await?;
    assert_eq!(u2_view["total_records"], 0);

    // --- owner predicate plus id hint: only u1's resource survives ---
    let filtered = find(
        &client,
        &base,
        "projects",
        Some("u1"),
        json!({
            "predicates": [
                { "key": "owner", "operator": "eq", "value_type": "string", "value": "u1" }
            ],
            "resource_ids": [u1_ids[0], u2_id],
        }),
    )
    .await?;
    assert_eq!(filtered["total_records"], 1);
    assert_eq!(filtered["resources"][0]["id"], json!(u1_ids[0]));

    // --- tag filters: OR within key ---
    let tagged = find(
        &client,
        &base,
        "projects",
        Some("u1"),
        json!({
            "predicates": [
                { "key": "tags", "operator": "eq", "value_type": "string", "value": "y" },
                { "key": "tags", "operator": "eq", "value_type": "string", "value": "zz" }
            ],
        }),
    )
    .await?;
    assert_eq!(tagged["total_records"], 25);

    // --- tag mutations ---
    let target = &u1_ids[0];
    let resp: JsonValue = client
        .post(format!("{}/api/v1/resources/{}/tags/add", base, target))
        .header("x-caller", "u1")
        .json(&json!({ "tags": ["y", "z"] }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resp["data"]["resource"]["tags"], json!(["x", "y", "z"]));

    // deleting a tag twice: second call is a clean no-op
    for _ in 0..2 {
        let resp: JsonValue = client
            .post(format!("{}/api/v1/resources/{}/tags/delete", base, target))
            .header("x-caller", "u1")
            .json(&json!({ "tags": ["z"] }))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(resp["data"]["resource"]["tags"], json!(["x", "y"]));
    }

    // --- attribute mutations ---
    let resp: JsonValue = client
        .post(format!("{}/api/v1/resources/{}/attributes/add", base, target))
        .header("x-caller", "u1")
        .json(&json!({ "attributes": [
            { "key": "lr", "value_type": "number", "value": 0.01 },
            { "key": "optimizer", "value_type": "string", "value": "adam" }
        ]}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resp["success"], true);

    // adding the same key again is a conflict
    let resp = client
        .post(format!("{}/api/v1/resources/{}/attributes/add", base, target))
        .header("x-caller", "u1")
        .json(&json!({ "attributes": [
            { "key": "lr", "value_type": "number", "value": 0.5 }
        ]}))
        .send()
        .await?;
    assert_eq!(resp.status(), reqwest::StatusCode::CONFLICT);

    // update with a different value: one row affected
    let resp: JsonValue = client
        .post(format!("{}/api/v1/resources/{}/attributes/update", base, target))
        .header("x-caller", "u1")
        .json(&json!({ "attribute": { "key": "lr", "value_type": "number", "value": 0.02 } }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resp["data"]["rows_affected"], 1);
    let stamp_after_update = resp["data"]["resource"]["date_updated"].clone();

    // update with the same value: zero rows, date_updated untouched
    let resp: JsonValue = client
        .post(format!("{}/api/v1/resources/{}/attributes/update", base, target))
        .header("x-caller", "u1")
        .json(&json!({ "attribute": { "key": "lr", "value_type": "number", "value": 0.02 } }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resp["data"]["rows_affected"], 0);
    assert_eq!(resp["data"]["resource"]["date_updated"], stamp_after_update);

    // numeric attribute filter
    let by_attr = find(
        &client,
        &base,
        "projects",
        Some("u1"),
        json!({
            "predicates": [
                { "key": "attributes.lr", "operator": "lt", "value_type": "number", "value": 0.1 }
            ],
        }),
    )
    .await?;
    assert_eq!(by_attr["total_records"], 1);

    // delete_all wins over the explicit list
    let resp: JsonValue = client
        .post(format!("{}/api/v1/resources/{}/attributes/delete", base, target))
        .header("x-caller", "u1")
        .json(&json!({ "attribute_keys": ["lr"], "delete_all": true }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resp["data"]["resource"]["attributes"], json!({}));

    // --- deep copy with children ---
    let parent = &u1_ids[1];
    let mut child_ids = Vec::new();
    for i in 0..3 {
        let child = create_resource(
            &client,
            &base,
            "experiments",
            "u1",
            json!({ "name": format!("exp-{}", i), "parent_id": parent }),
        )
        .await?;
        child_ids.push(child["id"].as_str().unwrap().to_string());
    }
    // one grandchild under the first experiment
    create_resource(
        &client,
        &base,
        "experiment-runs",
        "u1",
        json!({ "name": "run-0", "parent_id": child_ids[0] }),
    )
    .await?;

    let resp: JsonValue = client
        .post(format!("{}/api/v1/resources/{}/copy", base, parent))
        .header("x-caller", "u3")
        .send()
        .await?
        .json()
        .await?;
    // u3 cannot read u1's private project
    assert_eq!(resp["success"], false);

    let resp: JsonValue = client
        .post(format!("{}/api/v1/resources/{}/copy", base, parent))
        .header("x-caller", "u1")
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resp["success"], true);
    let copy = resp["data"]["resource"].clone();
    let copy_id = copy["id"].as_str().unwrap().to_string();
    assert_ne!(copy_id, *parent);
    assert!(copy["name"].as_str().unwrap().ends_with(" - copy"));

    // the copy has the same number of direct children, recomputed
    let resp: JsonValue = client
        .get(format!("{}/api/v1/resources/{}/children-count", base, copy_id))
        .header("x-caller", "u1")
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resp["data"]["count"], 3);

    // source is unaffected
    let resp: JsonValue = client
        .get(format!("{}/api/v1/resources/{}/children-count", base, parent))
        .header("x-caller", "u1")
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resp["data"]["count"], 3);

    // --- anonymous public listing ---
    create_resource(
        &client,
        &base,
        "datasets",
        "u1",
        json!({ "name": "open-data", "visibility": "public" }),
    )
    .await?;
    create_resource(&client, &base, "datasets", "u1", json!({ "name": "secret-data" })).await?;
    let anon = find(
        &client,
        &base,
        "datasets",
        None,
        json!({ "workspace": "u1" }),
    )
    .await?;
    assert_eq!(anon["total_records"], 1);
    assert_eq!(anon["resources"][0]["name"], "open-data");

    // --- soft delete cascades and stays idempotent ---
    for _ in 0..2 {
        let resp: JsonValue = client
            .post(format!("{}/api/v1/projects/delete", base))
            .header("x-caller", "u1")
            .json(&json!({ "ids": [parent] }))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(resp["success"], true);
    }
    // 25 originals + 1 copy - 1 deleted parent
    let after_delete = find(&client, &base, "projects", Some("u1"), json!({})).await?;
    assert_eq!(after_delete["total_records"], 25);
    // children went down with the parent
    let resp = client
        .get(format!("{}/api/v1/resources/{}", base, child_ids[0]))
        .header("x-caller", "u1")
        .send()
        .await?;
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    println!("--- test_catalog_flow passed ---");
    Ok(())
}
