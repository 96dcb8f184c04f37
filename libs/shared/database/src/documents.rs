use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

/// Outcome of a conditional single-document update. `matched_count == 0`
/// means the filter did not select a document; callers use that to detect a
/// lost compare-and-set race without a second round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

/// Thin client for the document-store HTTP API. Each call is a single
/// request; `update_one` with a conditional filter is the only atomicity
/// primitive the platform relies on.
pub struct DocumentClient {
    client: Client,
    base_url: String,
    api_key: String,
    data_source: String,
    database: String,
}

impl DocumentClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: config.data_api_url.clone(),
            api_key: config.data_api_key.clone(),
            data_source: config.data_source.clone(),
            database: config.database.clone(),
        }
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(key) = HeaderValue::from_str(&self.api_key) {
            headers.insert("api-key", key);
        }
        headers
    }

    async fn action<T>(&self, action: &str, collection: &str, mut body: Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/action/{}", self.base_url, action);
        debug!("Document API {} on {}", action, collection);

        if let Some(map) = body.as_object_mut() {
            map.insert("dataSource".to_string(), json!(self.data_source));
            map.insert("database".to_string(), json!(self.database));
            map.insert("collection".to_string(), json!(collection));
        }

        let response = self
            .client
            .post(&url)
            .headers(self.get_headers())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Document API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                _ => anyhow!("Document API error ({}): {}", status, error_text),
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    pub async fn insert_one(&self, collection: &str, document: Value) -> Result<String> {
        let result: Value = self
            .action("insertOne", collection, json!({ "document": document }))
            .await?;

        result["insertedId"]
            .as_str()
            .map(|id| id.to_string())
            .ok_or_else(|| anyhow!("insertOne returned no id"))
    }

    pub async fn find_one(&self, collection: &str, filter: Value) -> Result<Option<Value>> {
        let result: Value = self
            .action("findOne", collection, json!({ "filter": filter }))
            .await?;

        match &result["document"] {
            Value::Null => Ok(None),
            doc => Ok(Some(doc.clone())),
        }
    }

    /// Typed `find_one`; `Ok(None)` when no document matches.
    pub async fn find_one_as<T>(&self, collection: &str, filter: Value) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        match self.find_one(collection, filter).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn find(
        &self,
        collection: &str,
        filter: Value,
        sort: Option<Value>,
        limit: Option<i64>,
    ) -> Result<Vec<Value>> {
        let mut body = json!({ "filter": filter });
        if let Some(sort) = sort {
            body["sort"] = sort;
        }
        if let Some(limit) = limit {
            body["limit"] = json!(limit);
        }

        let result: Value = self.action("find", collection, body).await?;

        match &result["documents"] {
            Value::Array(docs) => Ok(docs.clone()),
            _ => Ok(Vec::new()),
        }
    }

    pub async fn find_as<T>(
        &self,
        collection: &str,
        filter: Value,
        sort: Option<Value>,
        limit: Option<i64>,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let docs = self.find(collection, filter, sort, limit).await?;
        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(Into::into))
            .collect()
    }

    /// Single-document conditional update. The filter and update are applied
    /// atomically by the store; callers inspect `matched_count` to learn
    /// whether the condition held.
    pub async fn update_one(
        &self,
        collection: &str,
        filter: Value,
        update: Value,
    ) -> Result<UpdateResult> {
        let result: Value = self
            .action(
                "updateOne",
                collection,
                json!({ "filter": filter, "update": update }),
            )
            .await?;

        Ok(UpdateResult {
            matched_count: result["matchedCount"].as_u64().unwrap_or(0),
            modified_count: result["modifiedCount"].as_u64().unwrap_or(0),
        })
    }

    pub async fn delete_one(&self, collection: &str, filter: Value) -> Result<u64> {
        let result: Value = self
            .action("deleteOne", collection, json!({ "filter": filter }))
            .await?;

        Ok(result["deletedCount"].as_u64().unwrap_or(0))
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
