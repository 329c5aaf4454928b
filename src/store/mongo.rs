//! MongoDB document store.
//!
//! # Collections
//! - `raw_articles`: scraper output awaiting enrichment
//! - `enriched_articles`: post dedup/fetch/sentiment/feature Article documents
//! - `story_clusters`: fuzzy-title-matched clusters
//! - `summarize`: LLM-produced article summaries
//! - `url_registry`: persistent URL-hash registry backing the bloom filter
//! - `indicators`: latest IndicatorSnapshot per ticker
//! - `universe_collection`: per-tick OHLCV upserts
//! - `portfolios` / `transactions`: portfolio state and immutable log
//!
//! # Configuration
//! Connection is configured through `MONGO_URI` / `MONGO_DB_NAME`.

use anyhow::Result;
use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use tracing::{debug, info};

pub const RAW_ARTICLES: &str = "raw_articles";
pub const ENRICHED_ARTICLES: &str = "enriched_articles";
pub const STORY_CLUSTERS: &str = "story_clusters";
pub const SUMMARIZE: &str = "summarize";
pub const URL_REGISTRY: &str = "url_registry";
pub const INDICATORS: &str = "indicators";
pub const UNIVERSE_COLLECTION: &str = "universe_collection";
pub const PORTFOLIOS: &str = "portfolios";
pub const TRANSACTIONS: &str = "transactions";

#[derive(Debug, Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn new(connection_string: &str, database_name: &str) -> Result<Self> {
        debug!("initializing MongoDB client, database: {}", database_name);

        let mut client_options = ClientOptions::parse(connection_string).await?;
        client_options.app_name = Some("marketpulse".to_string());

        let client = Client::with_options(client_options)?;
        let db = client.database(database_name);

        info!("MongoDB client initialized");
        Ok(Self { db })
    }

    pub fn collection<T>(&self, name: &str) -> Collection<T>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        self.db.collection(name)
    }

    pub async fn initialize_indexes(&self) -> Result<()> {
        info!("creating MongoDB indexes");

        self.index(
            RAW_ARTICLES,
            &[
                (doc! {"article_id": 1}, true),
                (doc! {"url": 1}, false),
                (doc! {"company": 1}, false),
                (doc! {"scraped_at": -1}, false),
            ],
        )
        .await?;

        self.index(
            ENRICHED_ARTICLES,
            &[
                (doc! {"url": 1}, true),
                (doc! {"company": 1, "published_at": -1}, false),
                (doc! {"url_hash": 1}, false),
                (doc! {"content_hash": 1}, false),
                (doc! {"cluster_id": 1}, false),
                (doc! {"factor_type": 1}, false),
                (doc! {"sentiment.label": 1}, false),
                (doc! {"publisher_name": 1}, false),
            ],
        )
        .await?;

        self.index(
            STORY_CLUSTERS,
            &[
                (doc! {"cluster_id": 1}, true),
                (doc! {"company": 1, "published_at": -1}, false),
            ],
        )
        .await?;

        self.index(SUMMARIZE, &[(doc! {"article_id": 1}, true)])
            .await?;

        self.index(
            URL_REGISTRY,
            &[(doc! {"url_hash": 1}, true), (doc! {"scraped_at": -1}, false)],
        )
        .await?;

        self.index(INDICATORS, &[(doc! {"ticker": 1}, false)])
            .await?;

        self.index(
            UNIVERSE_COLLECTION,
            &[(doc! {"ticker": 1, "date": 1}, true)],
        )
        .await?;

        self.index(PORTFOLIOS, &[(doc! {"portfolio_id": 1}, true)])
            .await?;

        self.index(
            TRANSACTIONS,
            &[(doc! {"portfolio_id": 1, "timestamp": -1}, false)],
        )
        .await?;

        info!("MongoDB indexes created");
        Ok(())
    }

    async fn index(&self, collection_name: &str, specs: &[(Document, bool)]) -> Result<()> {
        let collection = self.db.collection::<Document>(collection_name);
        for (keys, unique) in specs {
            let mut builder = IndexModel::builder().keys(keys.clone());
            if *unique {
                builder = builder.options(IndexOptions::builder().unique(true).build());
            }
            collection.create_index(builder.build(), None).await?;
        }
        debug!("created indexes for {}", collection_name);
        Ok(())
    }

    pub async fn insert_one<T>(&self, collection_name: &str, document: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        debug!("inserting document into {}", collection_name);
        self.db
            .collection(collection_name)
            .insert_one(mongodb::bson::to_document(document)?, None)
            .await?;
        Ok(())
    }

    pub async fn find_one<T>(&self, collection_name: &str, filter: Document) -> Result<Option<T>>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        debug!("finding document in {}: {:?}", collection_name, filter);
        let result = self
            .db
            .collection(collection_name)
            .find_one(filter, None)
            .await?;
        Ok(result)
    }

    pub async fn find_many<T>(&self, collection_name: &str, filter: Document) -> Result<Vec<T>>
    where
        T: for<'de> serde::Deserialize<'de> + Unpin + Send + Sync,
    {
        use futures::stream::TryStreamExt;
        debug!("finding documents in {}: {:?}", collection_name, filter);
        let cursor = self.db.collection(collection_name).find(filter, None).await?;
        Ok(cursor.try_collect().await?)
    }

    /// Partial-field upsert: `$set`s only the given fields, leaving the rest
    /// of the matched document untouched. Use this for marking/flagging an
    /// existing document; use `upsert_one` only for genuine full-document
    /// replacement.
    pub async fn update_fields(
        &self,
        collection_name: &str,
        filter: Document,
        fields: Document,
    ) -> Result<()> {
        debug!("updating fields in {}: {:?} -> {:?}", collection_name, filter, fields);
        self.db
            .collection::<Document>(collection_name)
            .update_one(
                filter,
                doc! { "$set": fields },
                mongodb::options::UpdateOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    /// Keyed upsert, matching `spec.md`'s "document store (keyed upsert via
    /// subscribe callback)" sink kind.
    pub async fn upsert_one<T>(
        &self,
        collection_name: &str,
        filter: Document,
        document: &T,
    ) -> Result<()>
    where
        T: serde::Serialize,
    {
        let replacement = mongodb::bson::to_document(document)?;
        self.db
            .collection::<Document>(collection_name)
            .replace_one(
                filter,
                replacement,
                mongodb::options::ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }
}
