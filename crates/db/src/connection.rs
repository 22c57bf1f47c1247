use std::time::Duration;

use orderflow_core::config::DatabaseConfig;
use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect_with_config(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let mut options = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)));
    if is_private_memory(database_url) {
        // Each connection to a private in-memory URL opens its own empty database.
        options = options.max_connections(1).idle_timeout(None).max_lifetime(None);
    }

    options
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // Slot rows cascade with their order.
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

fn is_private_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") && !database_url.contains("cache=shared")
}

#[cfg(test)]
mod tests {
    use orderflow_core::config::DatabaseConfig;
    use sqlx::Row;

    use super::{connect_with_config, is_private_memory};

    #[tokio::test]
    async fn pool_enables_foreign_keys() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_owned(),
            max_connections: 1,
            timeout_secs: 5,
        };
        let pool = connect_with_config(&config).await.expect("connect");

        let enabled = sqlx::query("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("read pragma")
            .get::<i64, _>(0);

        assert_eq!(enabled, 1);
    }

    #[test]
    fn only_unshared_memory_urls_are_private() {
        assert!(is_private_memory("sqlite::memory:"));
        assert!(!is_private_memory("sqlite::memory:?cache=shared"));
        assert!(!is_private_memory("sqlite://orderflow.db?mode=rwc"));
    }
}
