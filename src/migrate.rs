use sha2::{Digest, Sha256};
use sqlx::{Executor, Row, SqlitePool};
use std::collections::HashMap;

use crate::time::now_ms;
use tracing::{error, info};

fn preview(sql: &str) -> String {
    let one_line = sql.replace(['\n', '\t'], " ");
    let trimmed = one_line.trim();
    match trimmed.char_indices().nth(160) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

pub(crate) static MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_documents.sql",
        include_str!("../migrations/0001_documents.sql"),
    ),
    (
        "0002_documents_indexes.sql",
        include_str!("../migrations/0002_documents_indexes.sql"),
    ),
];

fn cleaned(raw_sql: &str) -> String {
    raw_sql
        .lines()
        .filter(|line| {
            let t = line.trim_start();
            !(t.is_empty() || t.starts_with("--"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn checksum(cleaned_sql: &str) -> String {
    format!("{:x}", Sha256::digest(cleaned_sql.as_bytes()))
}

pub async fn apply_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    pool.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (\
           version   TEXT PRIMARY KEY,\
           applied_at INTEGER NOT NULL,\
           checksum TEXT NOT NULL\
         )",
    )
    .await?;

    let rows = sqlx::query("SELECT version, checksum FROM schema_migrations")
        .fetch_all(pool)
        .await?;
    let mut applied: HashMap<String, String> = HashMap::new();
    for r in rows {
        if let (Ok(v), Ok(c)) = (
            r.try_get::<String, _>("version"),
            r.try_get::<String, _>("checksum"),
        ) {
            applied.insert(v, c);
        }
    }

    for (filename, raw_sql) in MIGRATIONS {
        let cleaned = cleaned(raw_sql);
        let checksum = checksum(&cleaned);

        if let Some(stored) = applied.get(*filename) {
            if stored != &checksum {
                anyhow::bail!("migration {} edited after application", filename);
            }
            info!(target: "landlord", event = "migration_skip_file", file = %filename);
            continue;
        }

        let mut tx = pool.begin().await?;
        for stmt in cleaned.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            let upper = s.to_ascii_uppercase();
            if upper == "BEGIN" || upper == "COMMIT" {
                continue;
            }
            info!(target: "landlord", event = "migration_stmt", file = %filename, sql = %preview(s));
            if let Err(e) = sqlx::query(s).execute(&mut *tx).await {
                error!(target: "landlord", event = "migration_stmt_error", file = %filename, sql = %preview(s), error = %e);
                return Err(e.into());
            }
        }

        sqlx::query(
            "INSERT INTO schema_migrations (version, applied_at, checksum) VALUES (?, ?, ?)",
        )
        .bind(*filename)
        .bind(now_ms())
        .bind(&checksum)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(target: "landlord", event = "migration_file_applied", file = %filename);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_pool;

    #[tokio::test]
    async fn applies_once_and_is_idempotent() {
        let pool = open_memory_pool().await.unwrap();
        apply_migrations(&pool).await.unwrap();
        apply_migrations(&pool).await.unwrap();

        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(n as usize, MIGRATIONS.len());

        let table: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name='documents'",
        )
        .fetch_optional(&pool)
        .await
        .unwrap();
        assert_eq!(table.as_deref(), Some("documents"));
    }

    #[tokio::test]
    async fn edited_migration_is_refused() {
        let pool = open_memory_pool().await.unwrap();
        apply_migrations(&pool).await.unwrap();
        sqlx::query("UPDATE schema_migrations SET checksum = 'bogus' WHERE version = ?")
            .bind(MIGRATIONS[0].0)
            .execute(&pool)
            .await
            .unwrap();
        let err = apply_migrations(&pool).await.unwrap_err();
        assert!(err.to_string().contains("edited after application"));
    }

    #[test]
    fn comments_do_not_affect_checksum() {
        let a = cleaned("-- note\nCREATE TABLE x (a INTEGER);\n");
        let b = cleaned("CREATE TABLE x (a INTEGER);");
        assert_eq!(checksum(&a), checksum(&b));
    }

    #[test]
    fn preview_truncates_long_sql() {
        let long = "x".repeat(400);
        assert!(preview(&long).ends_with('…'));
        assert_eq!(preview("SELECT\n1"), "SELECT 1");
    }
}
