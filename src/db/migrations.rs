//! Schema creation and connection setup.

use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::{debug, info};

/// Open (creating if needed) the SQLite database and apply the schema.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(|conn, _meta| Box::pin(async move { configure_pragmas_conn(conn).await }))
        .connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await?;

    run_migrations(&pool).await?;

    info!(path = %db_path, "database ready");
    Ok(pool)
}

/// Apply `schema.sql`. Every statement is `IF NOT EXISTS`, so reruns are no-ops.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let schema_sql = include_str!("schema.sql");

    let mut applied = 0usize;
    for statement in schema_sql.split(';') {
        let trimmed = statement.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
            applied += 1;
        }
    }

    info!(statements = applied, "schema applied");
    Ok(())
}

async fn configure_pragmas_conn(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    use sqlx::Row;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;

    // journal_mode reports the mode actually in effect
    let row = sqlx::query("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?;
    let journal_mode: String = row.get(0);
    debug!(journal_mode = %journal_mode, "sqlite connection configured");

    // Concurrent evaluations contend for the write lock; wait instead of failing.
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&mut *conn)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn temp_pool() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("nested")
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (pool, temp_dir)
    }

    #[tokio::test]
    async fn test_init_db_creates_parent_dirs() {
        let (_pool, temp_dir) = temp_pool().await;
        assert!(temp_dir.path().join("nested").join("test.db").exists());
    }

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let (pool, _temp) = temp_pool().await;

        for table in [
            "users",
            "loan_types",
            "loan_terms",
            "products",
            "product_required_documents",
            "contracts",
            "documents",
            "loans",
            "payments",
            "evaluation_queue",
        ] {
            let result: (String,) =
                sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name=?")
                    .bind(table)
                    .fetch_one(&pool)
                    .await
                    .expect("query failed");
            assert_eq!(result.0, table);
        }
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let (pool, _temp) = temp_pool().await;
        run_migrations(&pool)
            .await
            .expect("second migration run failed");
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let (pool, _temp) = temp_pool().await;
        let result: (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("query failed");
        assert_eq!(result.0, 1);
    }

    #[tokio::test]
    async fn test_contract_parties_check_constraint() {
        let (pool, _temp) = temp_pool().await;
        sqlx::query(
            "INSERT INTO loan_types (name, interest_rate, min_amount, max_amount) VALUES ('t', '1', '1', '2')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO loan_terms (name, min_months, max_months) VALUES ('m', 1, 2)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO products (loan_type_id, loan_term_id) VALUES (1, 1)")
            .execute(&pool)
            .await
            .unwrap();

        let result = sqlx::query(
            r#"
            INSERT INTO contracts (id, borrower_id, sponsor1_id, sponsor2_id, product_id, loan_type_id,
                amount, term_months, employment_status, status, consent, priority_weight, created_at)
            VALUES ('c1', 'b', 's', 's', 1, 1, '100', 1, 'employed', 'pending_sponsor_approval',
                'awaiting_both', 0, 0)
            "#,
        )
        .execute(&pool)
        .await;
        assert!(result.is_err(), "duplicate sponsor must violate CHECK");
    }
}
