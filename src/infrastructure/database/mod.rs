pub mod entities;
pub mod migrator;
pub mod repositories;

pub use repositories::SeaOrmHeartbeatRepository;

use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use migrator::Migrator;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://./heartbeats.db?mode=rwc";

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://./heartbeats.db?mode=rwc")
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Create config for a SQLite file, creating it if missing
    pub fn sqlite(path: &str) -> Self {
        Self {
            url: format!("sqlite://{}?mode=rwc", path),
        }
    }
}

/// Connect and bring the schema up to date
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, sea_orm::DbErr> {
    info!(url = %config.url, "Connecting to database");
    let db = Database::connect(&config.url).await?;
    Migrator::up(&db, None).await?;
    info!("Database connected and migrated");
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_config_creates_missing_file() {
        let config = DatabaseConfig::sqlite("/tmp/hb.db");
        assert_eq!(config.url, "sqlite:///tmp/hb.db?mode=rwc");
        assert_eq!(DatabaseConfig::default().url, DEFAULT_DATABASE_URL);
    }

    #[tokio::test]
    async fn init_database_runs_migrations() {
        use sea_orm::{EntityTrait, PaginatorTrait};

        let db = init_database(&DatabaseConfig::new("sqlite::memory:")).await.unwrap();
        let count = entities::Heartbeat::find().count(&db).await.unwrap();
        assert_eq!(count, 0);
    }
}
