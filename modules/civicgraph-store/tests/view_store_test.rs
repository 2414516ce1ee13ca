//! Integration tests for ViewStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use std::time::Duration;

use civicgraph_common::{Config, Connection};
use civicgraph_store::{BridgeFilter, GraphSource, ViewStore};
use sqlx::PgPool;

/// Views backed by literal rows, so no tables or fixtures are needed.
const VIEWS: &[&str] = &[
    r#"
    CREATE OR REPLACE VIEW entities_view AS
    SELECT * FROM (VALUES
        (1, 'Megacorp',   'MC',   'Alice|Bob', 10::bigint,    5000::bigint, 'For-Profit', 1, 'https://mega.example'),
        (2, 'Bigco',      NULL,   NULL,        20::bigint,    4000::bigint, 'For-Profit', 1, NULL),
        (3, 'Influencer', NULL,   NULL,        90000::bigint, 5::bigint,    'Individual', 1, NULL),
        (4, 'Small A',    NULL,   NULL,        3::bigint,     3::bigint,    'Non-Profit', 1, NULL),
        (5, 'Hidden',     NULL,   NULL,        99999::bigint, 99999::bigint,'Non-Profit', 0, NULL)
    ) AS v(id, name, nickname, key_people, followers, employees, entity_type, render, url)
    "#,
    r#"
    CREATE OR REPLACE VIEW bridges_view AS
    SELECT * FROM (VALUES
        (1, 3, 'Funding Received',    1000.00::numeric, 2015, 2015, 1),
        (3, 1, 'Funding Given',       1000.00::numeric, 2015, 2015, 1),
        (2, 4, 'Investment Received', NULL::numeric,    NULL::int, NULL::int, 1),
        (1, 2, 'Collaboration',       NULL::numeric,    NULL::int, NULL::int, 1),
        (2, 1, 'Collaboration',       NULL::numeric,    NULL::int, NULL::int, 0)
    ) AS v(entity_1_id, entity_2_id, connection, amount, year, connection_year, render)
    "#,
    r#"
    CREATE OR REPLACE VIEW operations_view AS
    SELECT * FROM (VALUES
        (1, 'Revenue',  2500000::numeric, 2014),
        (4, 'Expenses', 10000::numeric,   2014)
    ) AS v(entity_id, finance, amount, year)
    "#,
    r#"
    CREATE OR REPLACE VIEW cities_view AS
    SELECT * FROM (VALUES
        (100, 'Seattle', 'Washington', 'WA', 'United States', 'US', 47.6, -122.3)
    ) AS v(id, city_name, state_name, state_code, country_name, country_code, city_lat, city_long)
    "#,
    r#"
    CREATE OR REPLACE VIEW locations_view AS
    SELECT * FROM (VALUES
        (10, 1, 100,       '1 Main St', 47.61, -122.33),
        (11, 4, NULL::int, '2 Pine St', NULL::float8, NULL::float8)
    ) AS v(id, entity_id, city_id, address, address_lat, address_long)
    "#,
    r#"
    CREATE OR REPLACE VIEW locations_with_city AS
    SELECT l.*, c.city_name, c.state_name, c.state_code, c.country_name, c.country_code
    FROM locations_view l
    LEFT JOIN cities_view c ON l.city_id = c.id
    "#,
];

/// Get a test database pool with the views in place, or skip.
async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;

    // Tests run in parallel; serialize the catalog updates.
    let mut tx = pool.begin().await.ok()?;
    sqlx::query("SELECT pg_advisory_xact_lock(7341)")
        .execute(&mut *tx)
        .await
        .ok()?;
    for view in VIEWS {
        sqlx::query(view).execute(&mut *tx).await.ok()?;
    }
    tx.commit().await.ok()?;

    Some(pool)
}

// =========================================================================
// Entities
// =========================================================================

#[tokio::test]
async fn top_entities_union_is_sorted_and_deduplicated() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = ViewStore::new(pool);

    let rows = store.top_entities(2).await.unwrap();
    let names: Vec<&str> = rows.iter().map(|e| e.name.as_str()).collect();

    // Bigco is in both rankings and appears once; Hidden never renders.
    assert_eq!(names, vec!["Bigco", "Influencer", "Megacorp"]);
    assert!(rows.iter().all(|e| !e.loaded));
}

#[tokio::test]
async fn top_entities_keep_every_view_column() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = ViewStore::new(pool);

    let rows = store.top_entities(2).await.unwrap();
    let megacorp = rows.iter().find(|e| e.id == 1).unwrap();

    assert_eq!(megacorp.key_people.as_deref(), Some("Alice|Bob"));
    assert_eq!(megacorp.render, Some(true));
    assert_eq!(
        megacorp.extra.get("url"),
        Some(&serde_json::json!("https://mega.example"))
    );
}

#[tokio::test]
async fn entities_excluding_projects_and_filters() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = ViewStore::new(pool);

    let rows = store.entities_excluding(&[1, 2, 3]).await.unwrap();
    let ids: Vec<i64> = rows.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![4]);
    assert_eq!(rows[0].render, None);
    assert!(rows[0].extra.is_empty());

    let all = store.entities_excluding(&[]).await.unwrap();
    assert_eq!(all.len(), 4);
}

// =========================================================================
// Bridges
// =========================================================================

#[tokio::test]
async fn bridges_filter_render_connection_and_endpoints() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = ViewStore::new(pool);

    let all = store.bridges(&BridgeFilter::all()).await.unwrap();
    assert_eq!(all.len(), 4);
    assert!(all.iter().all(|b| b.render));

    let funding = store
        .bridges(&BridgeFilter::of(Connection::FundingReceived))
        .await
        .unwrap();
    assert_eq!(funding.len(), 1);
    assert_eq!(funding[0].amount, Some(1000.0));
    assert_eq!(funding[0].connection_year, Some(2015));

    let scoped = store.bridges(&BridgeFilter::between(vec![1, 2, 3])).await.unwrap();
    assert_eq!(scoped.len(), 3);
    assert!(scoped.iter().all(|b| b.entity_2_id != 4));
}

// =========================================================================
// Operations and locations
// =========================================================================

#[tokio::test]
async fn operations_and_locations_decode() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = ViewStore::new(pool);

    let operations = store.operations().await.unwrap();
    assert_eq!(operations.len(), 2);

    let locations = store.entity_locations().await.unwrap();
    let main_st = locations.iter().find(|l| l.id == Some(10)).unwrap();
    assert_eq!(main_st.entity_id, Some(1));
    assert_eq!(main_st.fields["city_name"], serde_json::json!("Seattle"));

    let cities = store.cities().await.unwrap();
    assert_eq!(cities[0].state_code.as_deref(), Some("WA"));
}

#[tokio::test]
async fn city_locations_left_join_and_order_by_entity() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = ViewStore::new(pool);

    let rows = store.city_locations().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].entity, Some(1));
    assert_eq!(rows[0].city_name.as_deref(), Some("Seattle"));
    assert_eq!(rows[1].entity, Some(4));
    assert_eq!(rows[1].city_name, None);
}

// =========================================================================
// Pool
// =========================================================================

#[tokio::test]
async fn connect_applies_statement_timeout() {
    let Ok(url) = std::env::var("DATABASE_TEST_URL") else {
        return;
    };
    let config = Config {
        database_url: url,
        max_connections: 1,
        acquire_timeout: Duration::from_secs(2),
        statement_timeout: Duration::from_millis(1500),
        top_entity_limit: 10,
    };

    let store = ViewStore::connect(&config).await.unwrap();
    let timeout: String = sqlx::query_scalar("SHOW statement_timeout")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(timeout, "1500ms");
}
