use nb_storage::db::Db;
use nb_testkit::TestDatabase;

#[tokio::test]
async fn db_connects_and_bootstraps() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let db = Db::connect(&test_db.config()).await.expect("Failed to connect to SQLite.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let count: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'files'",
	)
	.fetch_one(&db.pool)
	.await
	.expect("Failed to query schema tables.");

	assert_eq!(count, 1);
	assert!(test_db.path().exists());
}

#[tokio::test]
async fn schema_bootstrap_is_idempotent() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let db = Db::connect(&test_db.config()).await.expect("Failed to connect to SQLite.");

	db.ensure_schema().await.expect("Failed to ensure schema.");
	db.ensure_schema().await.expect("Failed to re-run schema bootstrap.");

	let count: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM sqlite_master WHERE type = 'index' AND name = 'files_live_path_uidx'",
	)
	.fetch_one(&db.pool)
	.await
	.expect("Failed to query schema indexes.");

	assert_eq!(count, 1);
}
