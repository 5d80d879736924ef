use concurrentdb_core::db::migrations::latest_version;
use concurrentdb_core::db::{open_store, DbError, StoreConfig};
use rusqlite::Connection;

#[test]
fn memory_store_applies_all_migrations() {
    let conn = open_store(&StoreConfig::ephemeral()).unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "entities");
}

#[test]
fn memory_handles_with_same_identifier_share_data() {
    let config = StoreConfig::ephemeral();
    let first = open_store(&config).unwrap();
    first
        .execute(
            "INSERT INTO entities (entity_type, primary_key, body) VALUES ('t', 'k', '{}');",
            [],
        )
        .unwrap();

    let second = open_store(&config).unwrap();
    let count: i64 = second
        .query_row("SELECT COUNT(*) FROM entities;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);

    let other = open_store(&StoreConfig::ephemeral()).unwrap();
    let count: i64 = other
        .query_row("SELECT COUNT(*) FROM entities;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn opening_same_file_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::file(dir.path().join("store.sqlite3"));

    let conn_first = open_store(&config).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_store(&config).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "entities");
}

#[test]
fn opening_file_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_store(&StoreConfig::file(&path)).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_memory_identifier_is_rejected() {
    let err = open_store(&StoreConfig::memory("  ")).unwrap_err();
    assert!(matches!(err, DbError::InvalidConfig(_)));
}

#[test]
fn entity_body_must_be_json_object() {
    let conn = open_store(&StoreConfig::ephemeral()).unwrap();
    let result = conn.execute(
        "INSERT INTO entities (entity_type, primary_key, body) VALUES ('t', 'k', '[1, 2]');",
        [],
    );
    assert!(result.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table `{table_name}` should exist");
}
