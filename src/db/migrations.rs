//! Versioned schema migrations.
//!
//! The applied version lives in `PRAGMA user_version`; each step runs inside its own
//! transaction, so a half-applied step never bumps the version.

use r2d2_sqlite::rusqlite::Connection;

struct Migration {
    version: i64,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "donations and admins tables",
        sql: "
            CREATE TABLE IF NOT EXISTS donations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                type TEXT NOT NULL CHECK (type IN ('cash', 'in-kind')),
                date TEXT NOT NULL,
                donor_name TEXT NOT NULL,
                street_address TEXT,
                city TEXT,
                state TEXT,
                zip_code TEXT,
                donor_phone TEXT,
                donor_email TEXT,
                amount TEXT,
                items TEXT,
                total_value TEXT,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS admins (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
        ",
    },
    Migration {
        version: 2,
        description: "index donations by gift date",
        sql: "CREATE INDEX IF NOT EXISTS idx_donations_date ON donations (date DESC, id DESC);",
    },
];

pub fn current_version(conn: &Connection) -> r2d2_sqlite::rusqlite::Result<i64> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Apply every pending migration. Returns the versions applied by this call.
pub fn run(conn: &mut Connection) -> anyhow::Result<Vec<i64>> {
    let mut applied = Vec::new();
    let current = current_version(conn)?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tracing::info!(
            version = migration.version,
            "Applying migration: {}",
            migration.description
        );
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        // PRAGMA does not take bound parameters.
        tx.execute_batch(&format!("PRAGMA user_version = {}", migration.version))?;
        tx.commit()?;
        applied.push(migration.version);
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        let first = run(&mut conn).unwrap();
        assert_eq!(first, vec![1, 2]);
        assert_eq!(current_version(&conn).unwrap(), latest_version());

        let second = run(&mut conn).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn versions_are_strictly_increasing() {
        let versions: Vec<i64> = MIGRATIONS.iter().map(|m| m.version).collect();
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }
}
