//! MongoDB document store.
//!
//! Uses the driver's blocking API so calls can be made directly from worker
//! threads. The client pools connections internally and is shared by every
//! worker.

use super::{DocumentStore, RANKINGS_COLLECTION};
use crate::{Error, Result};
use bdbench_core::{DEFAULT_DATABASE, Record};
use mongodb::IndexModel;
use mongodb::bson::{Bson, Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::sync::{Client, Database};

/// Server error code for a unique index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Connection settings.
#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 27017,
            database: DEFAULT_DATABASE.to_string(),
        }
    }
}

impl MongoConfig {
    /// Connection string for this host and port.
    pub fn uri(&self) -> String {
        format!("mongodb://{}:{}", self.host, self.port)
    }
}

/// [`DocumentStore`] backed by a MongoDB database.
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect and verify the server is reachable.
    pub fn connect(config: &MongoConfig) -> Result<Self> {
        let client = Client::with_uri_str(config.uri())?;
        let db = client.database(&config.database);

        db.run_command(doc! { "ping": 1 }).run()?;

        tracing::info!(
            "MongoDB store initialized: uri={}, database={}",
            config.uri(),
            config.database
        );

        Ok(Self { db })
    }

    fn duplicate_key(collection: &str, err: &mongodb::error::Error) -> Option<Error> {
        let (inserted, message) = match err.kind.as_ref() {
            ErrorKind::InsertMany(failure) => first_duplicate(
                failure
                    .write_errors
                    .as_ref()?
                    .iter()
                    .map(|e| (e.index, e.code, e.message.as_str())),
            )?,
            ErrorKind::Write(WriteFailure::WriteError(e)) => {
                first_duplicate([(0, e.code, e.message.as_str())])?
            }
            _ => return None,
        };

        Some(Error::DuplicateKey {
            collection: collection.to_string(),
            inserted,
            message: message.to_string(),
        })
    }
}

/// The position and message of the write error that stopped an ordered
/// insert, if it was a duplicate key.
///
/// Takes `(index, code, message)` per write error. Only the lowest index
/// matters: an ordered insert stops there, so everything before it was
/// written.
fn first_duplicate<'m>(
    write_errors: impl IntoIterator<Item = (usize, i32, &'m str)>,
) -> Option<(usize, &'m str)> {
    let (index, code, message) = write_errors
        .into_iter()
        .min_by_key(|(index, _, _)| *index)?;
    (code == DUPLICATE_KEY_CODE).then_some((index, message))
}

impl DocumentStore for MongoStore {
    fn count(&self, collection: &str) -> Result<u64> {
        Ok(self
            .db
            .collection::<Document>(collection)
            .count_documents(doc! {})
            .run()?)
    }

    fn drop_collection(&self, collection: &str) -> Result<()> {
        self.db.collection::<Document>(collection).drop().run()?;
        Ok(())
    }

    fn drop_database(&self) -> Result<()> {
        self.db.drop().run()?;
        Ok(())
    }

    fn ensure_rank_index(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "_id": 1, "pageRank": 1 })
            .build();
        self.db
            .collection::<Document>(RANKINGS_COLLECTION)
            .create_index(index)
            .run()?;
        Ok(())
    }

    fn insert_many(&self, collection: &str, records: &[Record]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        match self
            .db
            .collection::<Record>(collection)
            .insert_many(records)
            .run()
        {
            Ok(result) => Ok(result.inserted_ids.len()),
            Err(e) => Err(Self::duplicate_key(collection, &e).unwrap_or(Error::Mongo(e))),
        }
    }

    fn find_page_rank(&self, url: &str) -> Result<Option<i32>> {
        let found = self
            .db
            .collection::<Document>(RANKINGS_COLLECTION)
            .find_one(doc! { "_id": url })
            .projection(doc! { "_id": 0, "pageRank": 1 })
            .run()?;

        Ok(found.and_then(|d| match d.get("pageRank") {
            Some(Bson::Int32(rank)) => Some(*rank),
            Some(Bson::Int64(rank)) => i32::try_from(*rank).ok(),
            Some(Bson::Double(rank)) => Some(*rank as i32),
            _ => None,
        }))
    }
}
