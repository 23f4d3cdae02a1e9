//! Qdrant vector store over the REST API.
//!
//! Points carry the chunk as payload under `page_content` and `metadata`, the
//! layout used by common document loaders, so collections stay readable by
//! other Qdrant clients.

use super::{CollectionStatus, Distance, VectorPoint, VectorStore};
use august_common::config::VectorStoreConfig;
use august_common::errors::{AppError, Result};
use august_common::{Chunk, DocumentMetadata};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const BACKEND: &str = "qdrant";

/// A [`VectorStore`] backed by a Qdrant server
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    page_content: String,
    #[serde(default)]
    metadata: DocumentMetadata,
}

#[derive(Serialize)]
struct PointStruct<'a> {
    id: String,
    vector: &'a [f32],
    payload: Payload,
}

#[derive(Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<Payload>,
}

impl QdrantStore {
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        let base_url = Url::parse(&url)
            .ok()
            .filter(|u| !u.cannot_be_a_base())
            .ok_or_else(|| AppError::Configuration {
                message: format!("Invalid Qdrant url: {}", url),
            })?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    pub fn from_config(config: &VectorStoreConfig) -> Result<Self> {
        let url = config.url.clone().ok_or_else(|| AppError::Configuration {
            message: "vector_store.url is required for the qdrant provider".to_string(),
        })?;
        Self::new(url, config.api_key.clone(), Duration::from_secs(config.timeout_secs))
    }

    /// Base url extended by path segments; each segment is percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self.client.request(method, self.endpoint(segments));
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<reqwest::Response> {
        builder.send().await.map_err(|e| AppError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("Request failed: {}", e),
        })
    }

    async fn send(&self, builder: RequestBuilder, collection: &str) -> Result<reqwest::Response> {
        let response = self.execute(builder).await?;
        Self::check(response, collection).await
    }

    async fn check(response: reqwest::Response, collection: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, collection, body))
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let parsed: QdrantResponse<T> = response.json().await.map_err(|e| AppError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("Failed to parse response: {}", e),
        })?;
        Ok(parsed.result)
    }
}

/// Server errors and throttling are transient; other client errors are not
fn status_error(status: StatusCode, collection: &str, body: String) -> AppError {
    if status == StatusCode::NOT_FOUND {
        return AppError::CollectionNotFound {
            name: collection.to_string(),
        };
    }
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return AppError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("HTTP {}: {}", status, body),
        };
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return AppError::Configuration {
            message: format!("Qdrant rejected credentials (HTTP {})", status),
        };
    }
    AppError::Validation {
        message: format!("Qdrant rejected request (HTTP {}): {}", status, body),
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        match self.send(self.request(Method::GET, &["collections", name]), name).await {
            Ok(_) => Ok(true),
            Err(AppError::CollectionNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_collection(
        &self,
        name: &str,
        vector_size: usize,
        distance: Distance,
    ) -> Result<CollectionStatus> {
        if self.collection_exists(name).await? {
            return Ok(CollectionStatus::AlreadyExists);
        }

        let body = json!({
            "vectors": { "size": vector_size, "distance": distance.as_str() }
        });
        let request = self.request(Method::PUT, &["collections", name]).json(&body);

        let response = self.execute(request).await?;
        // Lost a race with a concurrent creator
        if response.status() == StatusCode::CONFLICT {
            return Ok(CollectionStatus::AlreadyExists);
        }
        Self::check(response, name).await?;
        Ok(CollectionStatus::Created)
    }

    async fn delete_collection(&self, name: &str) -> Result<bool> {
        let response = self
            .send(self.request(Method::DELETE, &["collections", name]), name)
            .await?;
        Self::parse::<bool>(response).await
    }

    async fn upsert(&self, name: &str, points: &[VectorPoint]) -> Result<()> {
        let points: Vec<PointStruct<'_>> = points
            .iter()
            .map(|p| PointStruct {
                id: p.id.to_string(),
                vector: &p.vector,
                payload: Payload {
                    page_content: p.chunk.text.clone(),
                    metadata: p.chunk.metadata.clone(),
                },
            })
            .collect();

        let request = self
            .request(Method::PUT, &["collections", name, "points"])
            .query(&[("wait", "true")])
            .json(&json!({ "points": points }));
        self.send(request, name).await?;

        debug!(collection = name, count = points.len(), "Points upserted");
        Ok(())
    }

    async fn search(&self, name: &str, vector: &[f32], k: usize) -> Result<Vec<(Chunk, f32)>> {
        let body = json!({
            "vector": vector,
            "limit": k,
            "with_payload": true,
        });
        let request = self
            .request(Method::POST, &["collections", name, "points", "search"])
            .json(&body);

        let response = self.send(request, name).await?;
        let hits: Vec<ScoredPoint> = Self::parse(response).await?;

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                hit.payload
                    .map(|p| (Chunk::new(p.page_content, p.metadata), hit.score))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn store(server: &MockServer) -> QdrantStore {
        QdrantStore::new(server.uri(), Some("secret".into()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_collection_exists_maps_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/present"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"status": "green"}})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/collections/absent"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store(&server).await;
        assert!(store.collection_exists("present").await.unwrap());
        assert!(!store.collection_exists("absent").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_collection_sends_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/gut"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/gut"))
            .and(header("api-key", "secret"))
            .and(body_partial_json(json!({"vectors": {"size": 768, "distance": "Cosine"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(1)
            .mount(&server)
            .await;

        let status = store(&server)
            .await
            .create_collection("gut", 768, Distance::Cosine)
            .await
            .unwrap();
        assert_eq!(status, CollectionStatus::Created);
    }

    #[tokio::test]
    async fn test_create_conflict_means_already_exists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/gut"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/gut"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "status": {"error": "Collection `gut` already exists!"}
            })))
            .mount(&server)
            .await;

        let status = store(&server)
            .await
            .create_collection("gut", 768, Distance::Cosine)
            .await
            .unwrap();
        assert_eq!(status, CollectionStatus::AlreadyExists);
    }

    #[tokio::test]
    async fn test_bad_request_mentioning_409_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/gut"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/gut"))
            .respond_with(ResponseTemplate::new(400).set_body_string("vector size 409 too large"))
            .mount(&server)
            .await;

        let err = store(&server)
            .await
            .create_collection("gut", 409, Distance::Cosine)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_collection_name_is_percent_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/gut%20health%2Fv2/points/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/gut%20health%2Fv2/points"))
            .and(query_param("wait", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let store = store(&server).await;
        assert!(store.search("gut health/v2", &[0.1], 3).await.unwrap().is_empty());
        store.upsert("gut health/v2", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_search_tolerates_null_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/gut/points/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [
                    {"id": "a", "score": 0.7, "payload": {
                        "page_content": "Content: fiber",
                        "metadata": {"source": null, "url": null, "title": "Fiber", "heading": null}
                    }}
                ]
            })))
            .mount(&server)
            .await;

        let results = store(&server).await.search("gut", &[0.1], 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.metadata.source, "unknown");
        assert_eq!(results[0].0.metadata.url, "");
        assert_eq!(results[0].0.metadata.title, "Fiber");
    }

    #[tokio::test]
    async fn test_search_parses_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/gut/points/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [
                    {"id": "a", "score": 0.9, "payload": {
                        "page_content": "Content: kefir",
                        "metadata": {"source": "blog", "url": "https://x", "title": "Kefir"}
                    }},
                    {"id": "b", "score": 0.5}
                ]
            })))
            .mount(&server)
            .await;

        let results = store(&server).await.search("gut", &[0.1, 0.2], 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.text, "Content: kefir");
        assert_eq!(results[0].0.metadata.title, "Kefir");
        assert_eq!(results[0].0.metadata.extraction_status, "unknown");
        assert_eq!(results[0].1, 0.9);
    }

    #[tokio::test]
    async fn test_error_classification() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/collections/gut/points"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/collections/missing/points/search"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store(&server).await;
        let err = store.upsert("gut", &[]).await.unwrap_err();
        assert!(err.is_transient());

        let err = store.search("missing", &[0.1], 1).await.unwrap_err();
        assert!(matches!(err, AppError::CollectionNotFound { .. }));
    }

    #[test]
    fn test_from_config_requires_url() {
        let err = QdrantStore::from_config(&VectorStoreConfig::default()).err().unwrap();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[test]
    fn test_rejects_invalid_url() {
        let err = QdrantStore::new("localhost 6333", None, Duration::from_secs(1)).err().unwrap();
        assert!(matches!(err, AppError::Configuration { .. }));
    }
}
