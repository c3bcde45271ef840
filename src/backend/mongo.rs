//! MongoDB metadata store

use super::error::{BackendError, BackendResult};
use super::{Document, Filter, MetadataStore};
use crate::config::MetadataConfig;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson};
use mongodb::options::{AuthMechanism, ClientOptions, Credential, Tls, TlsOptions};
use mongodb::{Client, Database};
use std::str::FromStr;
use tracing::{debug, info};

const BACKEND: &str = "mongo";

pub struct MongoMetadataStore {
    database: Database,
}

impl MongoMetadataStore {
    pub async fn connect(config: &MetadataConfig) -> BackendResult<Self> {
        let uri = config.uri();
        debug!(uri = %uri, database = %config.database, "Connecting to metadata store");

        let mut options = ClientOptions::parse(&uri)
            .await
            .map_err(|e| BackendError::InvalidConfig {
                backend: BACKEND.to_string(),
                message: e.to_string(),
            })?;
        options.connect_timeout = Some(config.connect_timeout());
        options.server_selection_timeout = Some(config.connect_timeout());

        if !config.user.is_empty() {
            let mechanism = config
                .auth_mechanism
                .as_deref()
                .map(AuthMechanism::from_str)
                .transpose()
                .map_err(|e| BackendError::InvalidConfig {
                    backend: BACKEND.to_string(),
                    message: e.to_string(),
                })?;
            let mut credential = Credential::default();
            credential.username = Some(config.user.clone());
            credential.password = Some(config.password.clone());
            credential.mechanism = mechanism;
            options.credential = Some(credential);
        }

        if let Some(ref ca) = config.ca_cert {
            let mut tls = TlsOptions::default();
            tls.ca_file_path = Some(ca.clone());
            options.tls = Some(Tls::Enabled(tls));
        }

        let client =
            Client::with_options(options).map_err(|e| BackendError::connection(BACKEND, e))?;
        let database = client.database(&config.database);

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| BackendError::connection(BACKEND, e))?;

        info!(database = %config.database, "Connected to metadata store");
        Ok(Self { database })
    }
}

fn to_bson_filter(filter: &Filter) -> bson::Document {
    match filter {
        Filter::Eq { field, value } => doc! { field.as_str(): value.as_str() },
        Filter::In { field, values } => doc! { field.as_str(): { "$in": values.clone() } },
    }
}

fn to_json(document: bson::Document) -> Document {
    Bson::Document(document).into_relaxed_extjson()
}

#[async_trait]
impl MetadataStore for MongoMetadataStore {
    async fn find_one(&self, collection: &str, filter: &Filter) -> BackendResult<Option<Document>> {
        let found = self
            .database
            .collection::<bson::Document>(collection)
            .find_one(to_bson_filter(filter))
            .await
            .map_err(|e| BackendError::query(BACKEND, e))?;
        Ok(found.map(to_json))
    }

    async fn find(&self, collection: &str, filter: &Filter) -> BackendResult<Vec<Document>> {
        let cursor = self
            .database
            .collection::<bson::Document>(collection)
            .find(to_bson_filter(filter))
            .await
            .map_err(|e| BackendError::query(BACKEND, e))?;

        let docs: Vec<bson::Document> = cursor
            .try_collect()
            .await
            .map_err(|e| BackendError::transport(BACKEND, e))?;
        Ok(docs.into_iter().map(to_json).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_filter_to_bson() {
        let filter = to_bson_filter(&Filter::eq("userId", "u1"));
        assert_eq!(filter, doc! { "userId": "u1" });
    }

    #[test]
    fn test_in_filter_to_bson() {
        let filter = to_bson_filter(&Filter::any_of(
            "folderId",
            vec!["f1".to_string(), "f2".to_string()],
        ));
        assert_eq!(filter, doc! { "folderId": { "$in": ["f1", "f2"] } });
    }

    #[test]
    fn test_document_to_json() {
        let json = to_json(doc! { "accessionId": "a1", "files": [{ "filename": "x.bam" }] });
        assert_eq!(json["files"][0]["filename"], "x.bam");
    }
}
