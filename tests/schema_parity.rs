//! Schema Parity Tests
//!
//! Every command bootstraps the catalog through `DbContext::init_schema`,
//! while `blogh db migrate` applies the cetane migration registry. These
//! tests verify the two paths produce identical SQLite schemas.

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::{Connection, Result as SqliteResult};

use blogharvest::migrations;
use blogharvest::repository::DbContext;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnInfo {
    col_type: String,
    not_null: bool,
    default_value: Option<String>,
    primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TableSchema {
    columns: BTreeMap<String, ColumnInfo>,
}

/// An index reduced to its semantic identity. Names may differ between
/// schema sources, but table, column list, and uniqueness must not.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct IndexShape {
    table: String,
    columns: Vec<String>,
    unique: bool,
}

/// Extract user table schemas via PRAGMA table_info.
fn extract_tables(conn: &Connection) -> SqliteResult<BTreeMap<String, TableSchema>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let table_names: Vec<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<SqliteResult<Vec<_>>>()?;

    let mut tables = BTreeMap::new();
    for table_name in table_names {
        let mut pragma = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table_name))?;
        let columns: BTreeMap<String, ColumnInfo> = pragma
            .query_map([], |row| {
                let name: String = row.get(1)?;
                Ok((
                    name,
                    ColumnInfo {
                        col_type: row.get::<_, String>(2)?.to_uppercase(),
                        not_null: row.get(3)?,
                        default_value: row.get(4)?,
                        primary_key: row.get::<_, i32>(5)? > 0,
                    },
                ))
            })?
            .collect::<SqliteResult<BTreeMap<_, _>>>()?;

        tables.insert(table_name, TableSchema { columns });
    }

    Ok(tables)
}

/// Extract explicitly created indexes. UNIQUE-constraint autoindexes have
/// NULL sql and are excluded; both schema sources produce the same ones.
fn extract_indexes(conn: &Connection) -> SqliteResult<BTreeSet<IndexShape>> {
    let mut stmt = conn.prepare(
        "SELECT name, tbl_name, sql FROM sqlite_master WHERE type='index' AND sql IS NOT NULL ORDER BY name",
    )?;
    let index_rows: Vec<(String, String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<SqliteResult<Vec<_>>>()?;

    let mut indexes = BTreeSet::new();
    for (name, table, sql) in index_rows {
        let mut pragma = conn.prepare(&format!("PRAGMA index_info(\"{}\")", name))?;
        let columns: Vec<String> = pragma
            .query_map([], |row| {
                // Column name can be NULL for expression indexes
                row.get::<_, Option<String>>(2)
                    .map(|opt| opt.unwrap_or_else(|| "<expr>".to_string()))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        indexes.insert(IndexShape {
            table,
            columns,
            unique: sql.to_uppercase().contains("UNIQUE"),
        });
    }

    Ok(indexes)
}

/// Normalize type names for comparison (SQLite is flexible with types).
fn normalize_type(t: &str) -> String {
    let t = t.to_uppercase();
    if t.contains("INT") {
        return "INTEGER".to_string();
    }
    if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") {
        return "TEXT".to_string();
    }
    if t.contains("BLOB") {
        return "BLOB".to_string();
    }
    if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") {
        return "REAL".to_string();
    }
    t
}

/// Compare two table maps and return human-readable differences.
fn compare_tables(
    runtime: &BTreeMap<String, TableSchema>,
    migrated: &BTreeMap<String, TableSchema>,
) -> Vec<String> {
    let mut diffs = Vec::new();

    for name in runtime.keys() {
        if !migrated.contains_key(name) {
            diffs.push(format!("Missing table in migrations: {}", name));
        }
    }
    for name in migrated.keys() {
        if !runtime.contains_key(name) {
            diffs.push(format!("Extra table in migrations: {}", name));
        }
    }

    for (name, runtime_table) in runtime {
        let Some(migrated_table) = migrated.get(name) else {
            continue;
        };

        for (col_name, runtime_col) in &runtime_table.columns {
            let Some(migrated_col) = migrated_table.columns.get(col_name) else {
                diffs.push(format!("Missing column in migrations: {}.{}", name, col_name));
                continue;
            };

            if normalize_type(&runtime_col.col_type) != normalize_type(&migrated_col.col_type) {
                diffs.push(format!(
                    "Type mismatch in {}.{}: runtime={}, migrations={}",
                    name, col_name, runtime_col.col_type, migrated_col.col_type
                ));
            }
            if runtime_col.not_null != migrated_col.not_null {
                diffs.push(format!(
                    "NOT NULL mismatch in {}.{}: runtime={}, migrations={}",
                    name, col_name, runtime_col.not_null, migrated_col.not_null
                ));
            }
            if runtime_col.primary_key != migrated_col.primary_key {
                diffs.push(format!(
                    "PRIMARY KEY mismatch in {}.{}: runtime={}, migrations={}",
                    name, col_name, runtime_col.primary_key, migrated_col.primary_key
                ));
            }
            if runtime_col.default_value != migrated_col.default_value {
                diffs.push(format!(
                    "DEFAULT mismatch in {}.{}: runtime={:?}, migrations={:?}",
                    name, col_name, runtime_col.default_value, migrated_col.default_value
                ));
            }
        }

        for col_name in migrated_table.columns.keys() {
            if !runtime_table.columns.contains_key(col_name) {
                diffs.push(format!("Extra column in migrations: {}.{}", name, col_name));
            }
        }
    }

    diffs
}

/// Apply the full cetane registry in dependency order.
fn apply_migrations(conn: &Connection) {
    let registry = migrations::registry();
    let backend = cetane::backend::Sqlite;

    let ordered_names = registry
        .resolve_order()
        .expect("Failed to resolve migration order");

    for name in ordered_names {
        let migration = registry.get(name).expect("Migration not found after resolve");
        for stmt in migration.forward_sql(&backend) {
            if stmt.trim().is_empty() {
                continue;
            }
            conn.execute_batch(&stmt).unwrap_or_else(|e| {
                panic!("Migration {} failed: {}\nSQL: {}", migration.name, e, stmt)
            });
        }
    }
}

#[tokio::test]
async fn test_runtime_bootstrap_matches_migrations() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("runtime.db");

    // Runtime path: the CREATE TABLE IF NOT EXISTS bootstrap every command runs.
    let ctx = DbContext::new(&db_path, dir.path());
    ctx.init_schema().await.expect("Failed to init schema");
    drop(ctx);

    // Migration path: cetane registry over a fresh database.
    let migrated_conn = Connection::open_in_memory().expect("Failed to open migration DB");
    apply_migrations(&migrated_conn);

    let runtime_conn = Connection::open(&db_path).expect("Failed to open runtime DB");

    let runtime_tables = extract_tables(&runtime_conn).expect("Failed to extract runtime tables");
    let migrated_tables =
        extract_tables(&migrated_conn).expect("Failed to extract migrated tables");

    let diffs = compare_tables(&runtime_tables, &migrated_tables);
    if !diffs.is_empty() {
        eprintln!("Table differences:");
        for diff in &diffs {
            eprintln!("  - {}", diff);
        }
        panic!("Schema parity failed with {} table differences", diffs.len());
    }

    let runtime_indexes =
        extract_indexes(&runtime_conn).expect("Failed to extract runtime indexes");
    let migrated_indexes =
        extract_indexes(&migrated_conn).expect("Failed to extract migrated indexes");
    assert_eq!(
        runtime_indexes, migrated_indexes,
        "index sets differ between runtime bootstrap and migrations"
    );

    assert_eq!(runtime_tables.len(), 3, "expected data, blog_content, pdf_files");
    assert_eq!(runtime_indexes.len(), 2);
}

#[test]
fn test_migrations_are_idempotent() {
    // Both paths run with IF NOT EXISTS, so reapplying over an existing
    // catalog must succeed without touching the schema.
    let conn = Connection::open_in_memory().expect("Failed to open DB");
    apply_migrations(&conn);
    let first = extract_tables(&conn).expect("Failed to extract tables");

    apply_migrations(&conn);
    let second = extract_tables(&conn).expect("Failed to extract tables");

    assert_eq!(first, second);
}

#[test]
fn test_migrated_catalog_accepts_rows() {
    let conn = Connection::open_in_memory().expect("Failed to open DB");
    apply_migrations(&conn);

    conn.execute(
        "INSERT INTO data (company, title, tags, year, url) VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            "Acme",
            "Scaling the widget pipeline",
            "infrastructure, rust",
            "2024",
            "https://blog.acme.example/widgets",
        ),
    )
    .expect("Failed to insert discovery row");

    // url is UNIQUE; a duplicate must be rejected.
    let dup = conn.execute(
        "INSERT INTO data (company, title, tags, year, url) VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            "Acme",
            "Scaling the widget pipeline (repost)",
            "",
            "2024",
            "https://blog.acme.example/widgets",
        ),
    );
    assert!(dup.is_err());

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM data", [], |row| row.get(0))
        .expect("Failed to count rows");
    assert_eq!(count, 1);
}
