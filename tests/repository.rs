//! End-to-end tests for the repository facade over the SQLite driver.

use std::sync::Arc;

use repokit::sqlite::SqliteConnection;
use repokit::{
    from_row, params, CarrierWalk, ConnectionState, ConnectionStrings, Params, ProviderRegistry,
    Repository, RepositoryConfig, RepositoryError, SqlRepository,
};
use serde::Serialize;
use tempfile::TempDir;

#[derive(Debug, Default, Clone, PartialEq)]
struct User {
    id: i64,
    name: String,
    age: Option<i32>,
    active: bool,
}

from_row!(User { id, name, age, active });

const SCHEMA: &str = "
    CREATE TABLE users (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        age INTEGER,
        active INTEGER NOT NULL DEFAULT 1
    );
    INSERT INTO users (name, age, active) VALUES ('ada', 36, 1);
    INSERT INTO users (name, age, active) VALUES ('grace', NULL, 1);
    INSERT INTO users (name, age, active) VALUES ('linus', 28, 0);
";

fn file_repo() -> (TempDir, SqlRepository<'static>) {
    let dir = tempfile::tempdir().unwrap();
    let cs = format!("sqlite://{}", dir.path().join("users.db").display());
    let repo = SqlRepository::sqlite(&cs);
    repo.execute(SCHEMA, &[]).unwrap();
    (dir, repo)
}

fn pinned() -> SqliteConnection {
    let mut conn = SqliteConnection::open_new("sqlite::memory:").unwrap();
    SqlRepository::with_connection(&mut conn)
        .execute(SCHEMA, &[])
        .unwrap();
    conn
}

// ============================================================================
// Reads
// ============================================================================

#[test]
fn test_query_maps_rows_in_cursor_order() {
    let (_dir, repo) = file_repo();
    let names: Vec<String> = repo
        .query::<User>("SELECT * FROM users ORDER BY name DESC", &[])
        .unwrap()
        .map(|u| u.name)
        .collect();
    assert_eq!(names, vec!["linus", "grace", "ada"]);
}

#[test]
fn test_fetch_with_null_column_leaves_default() {
    let (_dir, repo) = file_repo();
    let users: Vec<User> = repo.fetch("SELECT * FROM users ORDER BY id", &[]).unwrap();
    assert_eq!(users.len(), 3);
    assert_eq!(users[0].age, Some(36));
    assert_eq!(users[1].age, None);
    assert!(!users[2].active);
}

#[test]
fn test_single_by_id() {
    let (_dir, repo) = file_repo();
    let user: User = repo
        .single("SELECT * FROM users WHERE id = @id", &[&params! { id: 1 }])
        .unwrap();
    assert_eq!(user.name, "ada");
}

#[test]
fn test_single_cardinality() {
    let (_dir, repo) = file_repo();
    let err = repo.single::<User>("SELECT * FROM users", &[]).unwrap_err();
    assert!(matches!(err, RepositoryError::CardinalityError(3)));

    let err = repo
        .single::<User>("SELECT * FROM users WHERE id = @id", &[&params! { id: 99 }])
        .unwrap_err();
    assert!(matches!(err, RepositoryError::EmptyResult));
}

#[test]
fn test_single_or_default() {
    let (_dir, repo) = file_repo();
    let none = repo
        .single_or_default::<User>("SELECT * FROM users WHERE id = @id", &[&params! { id: 99 }])
        .unwrap();
    assert_eq!(none, None);

    let err = repo
        .single_or_default::<User>("SELECT * FROM users", &[])
        .unwrap_err();
    assert!(matches!(err, RepositoryError::CardinalityError(_)));
}

#[test]
fn test_first_and_first_or_default() {
    let (_dir, repo) = file_repo();
    let first: User = repo
        .first("SELECT * FROM users ORDER BY id DESC", &[])
        .unwrap();
    assert_eq!(first.name, "linus");

    let err = repo
        .first::<User>("SELECT * FROM users WHERE 1 = 0", &[])
        .unwrap_err();
    assert!(matches!(err, RepositoryError::EmptyResult));

    let none = repo
        .first_or_default::<User>("SELECT * FROM users WHERE 1 = 0", &[])
        .unwrap();
    assert!(none.is_none());

    let some = repo
        .first_or_default::<User>("SELECT * FROM users ORDER BY id", &[])
        .unwrap();
    assert_eq!(some.map(|u| u.id), Some(1));
}

#[test]
fn test_predicate_variants_filter_client_side() {
    let (_dir, repo) = file_repo();
    let all = "SELECT * FROM users ORDER BY id";

    let active: Vec<User> = repo.fetch_where(all, |u: &User| u.active, &[]).unwrap();
    assert_eq!(active.len(), 2);

    let linus: User = repo.single_where(all, |u: &User| !u.active, &[]).unwrap();
    assert_eq!(linus.name, "linus");

    let err = repo
        .single_where::<User, _>(all, |u: &User| u.active, &[])
        .unwrap_err();
    assert!(matches!(err, RepositoryError::CardinalityError(2)));

    let err = repo
        .single_where::<User, _>(all, |u: &User| u.id > 10, &[])
        .unwrap_err();
    assert!(matches!(err, RepositoryError::EmptyResult));

    let none = repo
        .single_or_default_where::<User, _>(all, |u: &User| u.id > 10, &[])
        .unwrap();
    assert!(none.is_none());

    let grace: User = repo
        .first_where(all, |u: &User| u.age.is_none(), &[])
        .unwrap();
    assert_eq!(grace.name, "grace");

    let err = repo
        .first_where::<User, _>(all, |u: &User| u.name.is_empty(), &[])
        .unwrap_err();
    assert!(matches!(err, RepositoryError::EmptyResult));

    let none = repo
        .first_or_default_where::<User, _>(all, |u: &User| u.name.is_empty(), &[])
        .unwrap();
    assert!(none.is_none());
}

// ============================================================================
// Writes
// ============================================================================

#[test]
fn test_execute_returns_affected_rows() {
    let (_dir, repo) = file_repo();
    let affected = repo
        .execute(
            "UPDATE users SET active = @x WHERE active = @y",
            &[&params! { x: 0 }, &params! { y: 1 }],
        )
        .unwrap();
    assert_eq!(affected, 2);
}

#[test]
fn test_insert_returns_scalar() {
    let (_dir, repo) = file_repo();
    let id: i64 = repo
        .insert(
            "INSERT INTO users (name) VALUES (@name); SELECT last_insert_rowid();",
            &[&params! { name: "barbara" }],
        )
        .unwrap();
    assert_eq!(id, 4);
}

#[test]
fn test_insert_without_scalar_into_option_is_none() {
    let (_dir, repo) = file_repo();
    let id: Option<i64> = repo
        .insert(
            "INSERT INTO users (name) VALUES (@name)",
            &[&params! { name: "edsger" }],
        )
        .unwrap();
    assert_eq!(id, None);
}

#[test]
fn test_insert_without_scalar_into_plain_type_fails() {
    let (_dir, repo) = file_repo();
    let err = repo
        .insert::<i64>(
            "INSERT INTO users (name) VALUES (@name)",
            &[&params! { name: "edsger" }],
        )
        .unwrap_err();
    assert!(matches!(err, RepositoryError::MappingError(_)));
}

#[test]
fn test_serialized_struct_as_carrier() {
    #[derive(Serialize)]
    struct NewUser {
        name: String,
    }

    let (_dir, repo) = file_repo();
    let args = Params::from_serialize(&NewUser {
        name: "margaret".to_string(),
    })
    .unwrap();
    repo.execute("INSERT INTO users (name) VALUES (@name)", &[&args])
        .unwrap();

    let user: User = repo
        .single("SELECT * FROM users WHERE name = @name", &[&args])
        .unwrap();
    assert!(user.active);
    assert_eq!(user.age, None);
}

// ============================================================================
// Connection lifecycle
// ============================================================================

#[test]
fn test_owned_connection_closes_after_each_operation() {
    let (_dir, repo) = file_repo();
    repo.fetch::<User>("SELECT * FROM users", &[]).unwrap();

    assert_eq!(repo.scope().depth(), 0);
    assert!(repo.current_connection().is_none());
    assert!(matches!(
        repo.connection_state(),
        Err(RepositoryError::NoConnection)
    ));
}

#[test]
fn test_state_before_any_operation_is_no_connection() {
    let repo = SqlRepository::sqlite("sqlite::memory:");
    assert!(matches!(
        repo.connection_state(),
        Err(RepositoryError::NoConnection)
    ));
}

#[test]
fn test_failed_statement_releases_scope() {
    let (_dir, repo) = file_repo();
    let err = repo.fetch::<User>("SELECT * FROM missing_table", &[]).unwrap_err();
    assert!(matches!(err, RepositoryError::QueryError(_)));
    assert_eq!(repo.scope().depth(), 0);

    let err = repo
        .fetch::<User>("SELECT * FROM users WHERE id = @id", &[])
        .unwrap_err();
    assert!(matches!(err, RepositoryError::BindingError(_)));
    assert_eq!(repo.scope().depth(), 0);
    assert!(repo.current_connection().is_none());
}

#[test]
fn test_hold_shares_one_in_memory_connection() {
    let repo = SqlRepository::sqlite("sqlite::memory:");
    {
        let guard = repo.hold().unwrap();
        repo.execute(SCHEMA, &[]).unwrap();
        let users: Vec<User> = repo.fetch("SELECT * FROM users", &[]).unwrap();
        assert_eq!(users.len(), 3);
        assert_eq!(guard.depth(), 1);
        assert_eq!(repo.connection_state().unwrap(), ConnectionState::Open);
    }

    // the in-memory database went away with its connection
    let err = repo.fetch::<User>("SELECT * FROM users", &[]).unwrap_err();
    assert!(matches!(err, RepositoryError::QueryError(_)));
}

#[test]
fn test_connection_held_past_hold_is_torn_down() {
    let repo = SqlRepository::sqlite("sqlite::memory:");
    let guard = repo.hold().unwrap();
    let held = repo.current_connection();
    assert!(held.is_some());
    drop(guard);
    drop(held);

    assert_eq!(repo.scope().depth(), 0);
    assert!(matches!(
        repo.connection_state(),
        Err(RepositoryError::NoConnection)
    ));
    assert!(repo.current_connection().is_none());
}

#[test]
fn test_execute_counts_only_changed_rows() {
    let mut conn = pinned();
    let repo = SqlRepository::with_connection(&mut conn);
    assert_eq!(repo.execute("UPDATE users SET active = 1", &[]).unwrap(), 3);
    assert_eq!(repo.execute("CREATE TABLE tags (name TEXT)", &[]).unwrap(), 0);
    assert_eq!(
        repo.execute(
            "DELETE FROM users WHERE id = @id; CREATE TABLE notes (body TEXT)",
            &[&params! { id: 3 }],
        )
        .unwrap(),
        1
    );
}

#[test]
fn test_pinned_connection_stays_open() {
    let mut conn = pinned();
    {
        let repo = SqlRepository::with_connection(&mut conn);
        assert!(repo.scope().is_pinned());
        for _ in 0..3 {
            repo.fetch::<User>("SELECT * FROM users", &[]).unwrap();
            assert_eq!(repo.connection_state().unwrap(), ConnectionState::Open);
        }
        assert_eq!(repo.scope().depth(), 0);
        assert_eq!(
            repo.current_connection().map(|c| c.state()),
            Some(ConnectionState::Open)
        );
    }
    assert!(conn.raw().is_some());
}

#[test]
fn test_pinned_connection_survives_errors() {
    let mut conn = pinned();
    let repo = SqlRepository::with_connection(&mut conn);
    assert!(repo.execute("DELETE FROM nope", &[]).is_err());
    let count: i64 = repo.insert("SELECT COUNT(*) FROM users", &[]).unwrap();
    assert_eq!(count, 3);
}

// ============================================================================
// Configuration and binding policy
// ============================================================================

#[test]
fn test_from_named_configuration_entry() {
    let dir = tempfile::tempdir().unwrap();
    let toml = format!(
        "[connection_strings.main]\nconnection_string = \"sqlite://{}\"\n",
        dir.path().join("main.db").display()
    );
    let strings = ConnectionStrings::from_toml_str(&toml).unwrap();
    let repo = SqlRepository::from_config(
        &strings,
        "main",
        Arc::new(ProviderRegistry::default()),
        RepositoryConfig::default(),
    )
    .unwrap();
    repo.execute(SCHEMA, &[]).unwrap();
    assert_eq!(repo.fetch::<User>("SELECT * FROM users", &[]).unwrap().len(), 3);

    let err = SqlRepository::from_config(
        &strings,
        "other",
        Arc::new(ProviderRegistry::default()),
        RepositoryConfig::default(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, RepositoryError::ConfigError(_)));
}

#[test]
fn test_unknown_provider_fails_on_first_operation() {
    let mut strings = ConnectionStrings::new();
    strings.insert(
        "legacy",
        repokit::ConnectionEntry {
            connection_string: "Server=.;Database=app".to_string(),
            provider_name: Some("System.Data.SqlClient".to_string()),
        },
    );
    let repo = SqlRepository::from_config(
        &strings,
        "legacy",
        Arc::new(ProviderRegistry::default()),
        RepositoryConfig::default(),
    )
    .unwrap();
    let err = repo.execute("SELECT 1", &[]).unwrap_err();
    assert!(matches!(err, RepositoryError::ConnectionError(_)));
}

#[test]
fn test_per_placeholder_walk_is_default() {
    let (_dir, repo) = file_repo();
    let users: Vec<User> = repo
        .fetch(
            "SELECT * FROM users WHERE age > @min AND active = @active",
            &[&params! { min: 20 }, &params! { active: true }],
        )
        .unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "ada");
}

#[test]
fn test_double_advance_walk_skips_alternate_carriers() {
    let mut conn = pinned();
    let repo = SqlRepository::with_connection_config(
        &mut conn,
        RepositoryConfig::new().carrier_walk(CarrierWalk::DoubleAdvance),
    );

    let sql = "SELECT * FROM users WHERE age > @min AND active = @active";
    let users: Vec<User> = repo
        .fetch(
            sql,
            &[&params! { min: 20 }, &params! {}, &params! { active: true }],
        )
        .unwrap();
    assert_eq!(users.len(), 1);

    let err = repo
        .fetch::<User>(sql, &[&params! { min: 20 }, &params! { active: true }])
        .unwrap_err();
    assert!(matches!(err, RepositoryError::BindingError(_)));
}
