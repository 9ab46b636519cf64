use async_trait::async_trait;
use mongodb::bson::{self, Document};
use mongodb::options::{ClientOptions, Credential, ServerAddress};
use mongodb::Client;
use serde_json::Value;

use crate::config::DatabaseConfig;
use crate::error::AppResult;
use crate::storage::DocumentStore;

/// Mongo document store. The driver connects on the first operation.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    dbname: String,
}

impl MongoStore {
    pub fn connect_lazy(cfg: &DatabaseConfig, app_name: &str) -> AppResult<Self> {
        let mut options = ClientOptions::default();
        options.hosts = vec![ServerAddress::parse(format!("{}:{}", cfg.host, cfg.port))?];
        options.credential = Some(
            Credential::builder()
                .username(cfg.user.clone())
                .password(cfg.password.clone())
                .build(),
        );
        options.app_name = Some(app_name.to_string());

        let client = Client::with_options(options)?;
        Ok(Self {
            client,
            dbname: cfg.dbname.clone(),
        })
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert(&self, collection: &str, document: &Value) -> AppResult<()> {
        let document: Document = bson::to_document(document)?;
        self.client
            .database(&self.dbname)
            .collection::<Document>(collection)
            .insert_one(document)
            .await?;
        Ok(())
    }
}
