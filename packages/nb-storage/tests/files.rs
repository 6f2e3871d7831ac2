use nb_storage::{
	Error,
	db::Db,
	models::FileContent,
	queries,
};
use nb_testkit::TestDatabase;

const T0: &str = "2024-01-01T00:00:00Z";
const T1: &str = "2024-01-01T00:00:01Z";
const T2: &str = "2024-01-01T00:00:02Z";

fn content<'a>(body: &'a str, version: &'a str) -> FileContent<'a> {
	FileContent {
		slug: "today",
		content: body,
		frontmatter: r#"{"title":"Today"}"#,
		raw_frontmatter: "title: Today\n",
		origin: "fs",
		version,
	}
}

async fn setup() -> (TestDatabase, Db) {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let db = Db::connect(&test_db.config()).await.expect("Failed to connect to SQLite.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	(test_db, db)
}

#[tokio::test]
async fn insert_then_find_live_row() {
	let (_test_db, db) = setup().await;
	let id = queries::insert_file(&db.pool, "daily/today.md", &content("Hello", T0), T0)
		.await
		.expect("Failed to insert file.");
	let record = queries::find_by_path(&db.pool, "daily/today.md")
		.await
		.expect("Failed to find file.")
		.expect("Expected a row.");

	assert_eq!(record.id, id);
	assert_eq!(record.content, "Hello");
	assert_eq!(record.version(), Some(T0));
	assert_eq!(record.created, T0);
	assert!(!record.is_deleted());
}

#[tokio::test]
async fn second_live_row_for_path_conflicts() {
	let (_test_db, db) = setup().await;

	queries::insert_file(&db.pool, "a.md", &content("one", T0), T0)
		.await
		.expect("Failed to insert file.");

	let err = queries::insert_file(&db.pool, "a.md", &content("two", T1), T1)
		.await
		.expect_err("Expected unique path conflict.");

	assert!(matches!(err, Error::Conflict(_)), "Unexpected error: {err}");
}

#[tokio::test]
async fn soft_deleted_row_is_found_and_revived() {
	let (_test_db, db) = setup().await;
	let id = queries::insert_file(&db.pool, "a.md", &content("one", T0), T0)
		.await
		.expect("Failed to insert file.");

	assert!(queries::soft_delete(&db.pool, "a.md", T1).await.expect("Failed to delete file."));
	assert!(!queries::soft_delete(&db.pool, "a.md", T1).await.expect("Failed to delete file."));
	assert!(
		queries::find_live_by_path(&db.pool, "a.md")
			.await
			.expect("Failed to query live row.")
			.is_none()
	);

	let deleted = queries::find_by_path(&db.pool, "a.md")
		.await
		.expect("Failed to find file.")
		.expect("Expected the deleted row.");

	assert_eq!(deleted.id, id);
	assert_eq!(deleted.deleted.as_deref(), Some(T1));

	queries::update_content(&db.pool, &id, &content("two", T2), T2)
		.await
		.expect("Failed to revive file.");

	let revived = queries::find_live_by_path(&db.pool, "a.md")
		.await
		.expect("Failed to query live row.")
		.expect("Expected the revived row.");

	assert_eq!(revived.id, id);
	assert_eq!(revived.content, "two");
	assert_eq!(revived.updated, T2);

	let rows: i64 = sqlx::query_scalar("SELECT count(*) FROM files")
		.fetch_one(&db.pool)
		.await
		.expect("Failed to count rows.");

	assert_eq!(rows, 1);
}

#[tokio::test]
async fn origin_and_version_update_leaves_updated_alone() {
	let (_test_db, db) = setup().await;
	let id = queries::insert_file(&db.pool, "a.md", &content("one", T0), T0)
		.await
		.expect("Failed to insert file.");

	queries::set_origin_version(&db.pool, &id, "db", T2)
		.await
		.expect("Failed to set origin and version.");

	let record = queries::find_live_by_path(&db.pool, "a.md")
		.await
		.expect("Failed to query live row.")
		.expect("Expected a row.");

	assert_eq!(record.origin, "db");
	assert_eq!(record.version, T2);
	assert_eq!(record.updated, T0);
}

#[tokio::test]
async fn update_of_missing_row_is_not_found() {
	let (_test_db, db) = setup().await;
	let err = queries::update_content(&db.pool, "missing", &content("x", T0), T0)
		.await
		.expect_err("Expected missing row.");

	assert!(matches!(err, Error::NotFound(_)), "Unexpected error: {err}");
}

#[tokio::test]
async fn clear_all_removes_deleted_rows_too() {
	let (_test_db, db) = setup().await;

	queries::insert_file(&db.pool, "a.md", &content("one", T0), T0)
		.await
		.expect("Failed to insert file.");
	queries::insert_file(&db.pool, "b.md", &content("two", T0), T0)
		.await
		.expect("Failed to insert file.");
	queries::soft_delete(&db.pool, "b.md", T1).await.expect("Failed to delete file.");

	assert_eq!(queries::list_live(&db.pool).await.expect("Failed to list rows.").len(), 1);
	assert_eq!(queries::clear_all(&db.pool).await.expect("Failed to clear rows."), 2);
	assert!(queries::list_live(&db.pool).await.expect("Failed to list rows.").is_empty());
}
