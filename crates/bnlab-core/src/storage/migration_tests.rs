use super::Storage;

fn migration_count(storage: &Storage, version: &str) -> i64 {
    storage
        .conn
        .query_row(
            "SELECT COUNT(1) FROM schema_migrations WHERE version = ?1",
            [version],
            |row| row.get(0),
        )
        .expect("count migration")
}

#[test]
fn init_tracks_schema_migrations_and_is_idempotent() {
    let storage = Storage::open_in_memory().expect("open in memory");
    storage.init().expect("first init");
    storage.init().expect("second init");

    assert_eq!(migration_count(&storage, "001_init"), 1);
}

#[test]
fn init_keeps_values_written_before_a_second_init() {
    let storage = Storage::open_in_memory().expect("open in memory");
    storage.init().expect("first init");
    storage.put_value("k", "v").expect("put");
    storage.init().expect("second init");
    assert_eq!(storage.get_value("k").expect("get").as_deref(), Some("v"));
}

#[test]
fn existing_kv_table_is_adopted_by_first_migration() {
    let storage = Storage::open_in_memory().expect("open in memory");
    storage
        .conn
        .execute_batch(
            "CREATE TABLE kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            INSERT INTO kv_store (key, value, updated_at) VALUES ('legacy', '{}', 1);",
        )
        .expect("create legacy table");

    storage.init().expect("init over legacy table");
    assert_eq!(migration_count(&storage, "001_init"), 1);
    assert_eq!(
        storage.get_value("legacy").expect("get").as_deref(),
        Some("{}")
    );
}
