use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

pub const LATEST_VERSION: i64 = 3;

struct Migration {
    version: i64,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "initial schema",
        sql: r#"
            CREATE TABLE "groups" (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                name            TEXT NOT NULL,
                created_time    INTEGER NOT NULL
            );

            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                content         TEXT NOT NULL,
                timestamp       INTEGER NOT NULL,
                group_id        INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_messages_group
                ON messages(group_id, timestamp);
        "#,
    },
    Migration {
        version: 2,
        description: "message metadata",
        sql: r#"
            ALTER TABLE messages ADD COLUMN type TEXT NOT NULL DEFAULT 'TEXT';
            ALTER TABLE messages ADD COLUMN attachment_uri TEXT;
            ALTER TABLE messages ADD COLUMN is_edited INTEGER NOT NULL DEFAULT 0;
            ALTER TABLE messages ADD COLUMN edited_timestamp INTEGER;
        "#,
    },
    Migration {
        version: 3,
        description: "users and message senders",
        sql: r#"
            CREATE TABLE users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                name            TEXT NOT NULL,
                avatar_color    TEXT NOT NULL DEFAULT '#FF6200EE',
                created_time    INTEGER NOT NULL,
                is_default      INTEGER NOT NULL DEFAULT 0
            );

            -- Seed the default user every existing message belongs to
            INSERT INTO users (id, name, avatar_color, created_time, is_default)
                VALUES (1, 'Me', '#FF6200EE', CAST(strftime('%s', 'now') AS INTEGER) * 1000, 1);

            ALTER TABLE messages ADD COLUMN sender_id INTEGER NOT NULL DEFAULT 1;
        "#,
    },
];

/// Brings the schema up to the latest version.
pub fn run(conn: &mut Connection) -> Result<()> {
    run_to(conn, LATEST_VERSION)
}

/// Applies every pending migration up to and including `target`.
/// Each migration runs in its own transaction together with its version
/// bump, so a failure leaves the schema at the previous version.
pub fn run_to(conn: &mut Connection, target: i64) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let current = current_version(conn)?;

    for migration in MIGRATIONS
        .iter()
        .filter(|m| m.version > current && m.version <= target)
    {
        info!(
            "Running migration v{} ({})",
            migration.version, migration.description
        );

        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)
            .with_context(|| format!("migration v{} failed", migration.version))?;
        tx.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [migration.version],
        )?;
        tx.commit()?;
    }

    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<i64> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn test_fresh_database_reaches_latest() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();

        assert_eq!(current_version(&conn).unwrap(), LATEST_VERSION);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM users WHERE is_default = 1"), 1);
    }

    #[test]
    fn test_rerun_is_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();
        run(&mut conn).unwrap();

        assert_eq!(count(&conn, "SELECT COUNT(*) FROM schema_version"), LATEST_VERSION);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM users"), 1);
    }

    #[test]
    fn test_upgrade_from_v1_keeps_rows() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_to(&mut conn, 1).unwrap();
        assert_eq!(current_version(&conn).unwrap(), 1);

        conn.execute_batch(
            r#"
            INSERT INTO "groups" (id, name, created_time) VALUES (7, 'old', 1000);
            INSERT INTO messages (content, timestamp, group_id) VALUES ('hello', 2000, 7);
            "#,
        )
        .unwrap();

        run(&mut conn).unwrap();

        let (kind, edited, sender): (String, i64, i64) = conn
            .query_row(
                "SELECT type, is_edited, sender_id FROM messages WHERE content = 'hello'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(kind, "TEXT");
        assert_eq!(edited, 0);
        assert_eq!(sender, 1);
        assert_eq!(count(&conn, r#"SELECT COUNT(*) FROM "groups""#), 1);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM users WHERE id = 1 AND is_default = 1"), 1);
    }
}
