use sqlx::PgPool;

/// Full bootstrap test: connect, migrate, verify schema.
#[sqlx::test]
async fn test_full_bootstrap(pool: PgPool) {
    // Health check
    reelforge_db::health_check(&pool).await.unwrap();

    // Verify all lookup tables exist and have seed data
    let expected = [
        ("job_statuses", 5),
        ("subscription_tiers", 3),
        ("credit_transaction_types", 6),
    ];

    for (table, rows) in expected {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert_eq!(count.0, rows, "{table} seed data mismatch");
    }
}

/// The pending-claim partial index must exist; claim performance
/// depends on it.
#[sqlx::test]
async fn test_claim_index_present(pool: PgPool) {
    let count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM pg_indexes \
         WHERE tablename = 'jobs' AND indexname = 'idx_jobs_pending_claim'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count.0, 1);
}
