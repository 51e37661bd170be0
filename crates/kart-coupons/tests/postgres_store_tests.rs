//! Postgres store tests using SQLx
//!
//! These need a running database (`DATABASE_URL`); run with
//! `cargo test -- --ignored`. Each test gets a fresh database with the
//! workspace migrations applied.

use kart_coupons::config::LoaderConfig;
use kart_coupons::{CouponLoader, CouponStore, CouponValidator, PgCouponStore};
use sqlx::PgPool;
use std::sync::Arc;

mod common;

use common::{data_dir, lines, loader_config};

async fn row_count(pool: &PgPool, id: &str) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM coupons WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
}

// ============================================================================
// Store Tests
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a Postgres database"]
async fn test_bulk_insert_writes_every_row(pool: PgPool) -> sqlx::Result<()> {
    let store = PgCouponStore::new(pool.clone());
    let keys: Vec<String> = ["abc12345-1", "abc12345-1", "toolongcod-1"]
        .iter()
        .map(|k| k.to_string())
        .collect();

    let written = store.bulk_insert(&keys).await.expect("bulk insert");

    assert_eq!(written, 3);
    assert_eq!(row_count(&pool, "abc12345-1").await?, 2);
    assert_eq!(row_count(&pool, "toolongcod-1").await?, 1);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a Postgres database"]
async fn test_bulk_insert_escapes_copy_text(pool: PgPool) -> sqlx::Result<()> {
    let store = PgCouponStore::new(pool.clone());
    let keys = vec!["a\\b-1".to_string(), "c\td-2".to_string()];

    store.bulk_insert(&keys).await.expect("bulk insert");

    assert_eq!(row_count(&pool, "a\\b-1").await?, 1);
    assert_eq!(row_count(&pool, "c\td-2").await?, 1);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a Postgres database"]
async fn test_empty_insert_is_a_no_op(pool: PgPool) -> sqlx::Result<()> {
    let store = PgCouponStore::new(pool.clone());

    assert_eq!(store.bulk_insert(&[]).await.expect("bulk insert"), 0);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM coupons")
        .fetch_one(&pool)
        .await?;
    assert_eq!(total, 0);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a Postgres database"]
async fn test_contains_point_lookup(pool: PgPool) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO coupons (id) VALUES ($1), ($1)")
        .bind("FIFTYOFF-1")
        .execute(&pool)
        .await?;
    let store = PgCouponStore::new(pool);

    assert!(store.contains("FIFTYOFF-1").await.expect("lookup"));
    assert!(!store.contains("FIFTYOFF-2").await.expect("lookup"));
    Ok(())
}

// ============================================================================
// Pipeline Tests
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a Postgres database"]
async fn test_load_and_check_against_postgres(pool: PgPool) -> sqlx::Result<()> {
    let dir = data_dir(&[
        ("couponbase1", &lines(&["FIFTYOFF", "abc12345"])),
        ("couponbase2", &lines(&["ONEOFF"])),
        ("couponbase3", &lines(&["FIFTYOFF", "  ", "toolongcode123"])),
    ]);
    let store = Arc::new(PgCouponStore::new(pool.clone()));
    let config: LoaderConfig =
        loader_config(dir.path(), &["couponbase1", "couponbase2", "couponbase3"], 2);

    let summary = CouponLoader::new(store.clone(), config).run().await;
    assert_eq!(summary.rows_attempted(), 5);
    assert_eq!(summary.rows_confirmed(), 5);
    assert_eq!(row_count(&pool, "toolongcod-3").await?, 1);

    let validator = CouponValidator::with_tags(store, 3, 2).expect("valid threshold");
    assert!(validator.is_valid("FIFTYOFF").await);
    assert!(!validator.is_valid("ONEOFF").await);
    Ok(())
}
