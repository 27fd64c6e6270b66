use mongodb::bson::{doc, Document};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};

use crate::utils::error::AppResult;

pub const USERS: &str = "usuarios";
pub const CODES: &str = "codigos";
pub const TRANSACTIONS: &str = "transacciones";
pub const GOALS: &str = "metas";
pub const BUDGETS: &str = "presupuestos";
pub const ALERTS: &str = "alertas";
pub const EVENTS: &str = "eventos";
pub const PHYSICAL_STORES: &str = "tiendas_fisicas";

const DEFAULT_DB_NAME: &str = "finanzas";

#[derive(Clone)]
pub struct MongoDB {
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str) -> AppResult<Self> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(2);
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));
        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        let client = Client::with_options(client_options)?;
        let db = client.database(&database_name(uri));

        // Test connection
        db.list_collection_names().await?;

        let mongodb = Self { db };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Creates the indexes the queries and uniqueness rules rely on.
    async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("🔧 Creating database indexes...");

        self.create_index(USERS, doc! { "email": 1 }, true).await?;

        self.create_index(TRANSACTIONS, doc! { "usuario": 1, "fecha": -1 }, false).await?;
        self.create_index(TRANSACTIONS, doc! { "usuario": 1, "tipo": 1 }, false).await?;
        self.create_index(TRANSACTIONS, doc! { "usuario": 1, "categoria": 1 }, false).await?;

        self.create_index(GOALS, doc! { "usuario": 1 }, false).await?;

        // One budget per user and period
        self.create_index(BUDGETS, doc! { "usuario": 1, "mes": 1, "anio": 1 }, true).await?;

        // One subscription per user and category
        self.create_index(ALERTS, doc! { "usuario": 1, "categoria": 1 }, true).await?;

        self.create_index(EVENTS, doc! { "tipo": 1 }, false).await?;
        self.create_index(EVENTS, doc! { "creadoEn": 1 }, false).await?;

        self.create_index(PHYSICAL_STORES, doc! { "tienda": 1 }, false).await?;
        self.create_index(PHYSICAL_STORES, doc! { "ubicacion": "2dsphere" }, false).await?;

        log::info!("✅ Database indexes ready");

        Ok(())
    }

    async fn create_index(&self, collection: &str, keys: Document, unique: bool) -> AppResult<()> {
        let options = IndexOptions::builder().unique(unique).build();
        let model = IndexModel::builder().keys(keys.clone()).options(options).build();

        self.collection::<Document>(collection).create_index(model).await?;
        log::debug!("   ✅ Index ready: {}({})", collection, keys);

        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Check if the connection is healthy
    pub async fn ping(&self) -> AppResult<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

/// Database name from the URI path (`mongodb://host/finanzas?opts` -> `finanzas`).
pub fn database_name(uri: &str) -> String {
    let without_scheme = uri.split_once("://").map(|(_, rest)| rest).unwrap_or(uri);

    without_scheme
        .split_once('/')
        .map(|(_, path)| path.split('?').next().unwrap_or_default())
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_DB_NAME)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_name_from_uri() {
        assert_eq!(database_name("mongodb://localhost:27017/promos"), "promos");
        assert_eq!(
            database_name("mongodb+srv://u:p@cluster.mongodb.net/promos?retryWrites=true"),
            "promos"
        );
        assert_eq!(database_name("mongodb://localhost:27017"), "finanzas");
        assert_eq!(database_name("mongodb://localhost:27017/?appName=x"), "finanzas");
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_mongodb_connection() {
        dotenv::dotenv().ok();
        let uri = std::env::var("MONGODB_TEST_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let db = MongoDB::new(&format!("{}/finanzas_conn_test", uri)).await;
        assert!(db.is_ok());
        let db = db.unwrap();
        assert!(db.ping().await.is_ok());
        db.database().drop().await.unwrap();
    }
}
