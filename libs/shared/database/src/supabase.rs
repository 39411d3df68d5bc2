use anyhow::Result;
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

use crate::error::StoreError;
use crate::filter::{ConflictPredicate, RecordFilter};
use crate::store::{with_id, RecordStore};

/// Non-success response from the PostgREST API.
#[derive(Error, Debug)]
#[error("API error ({status}): {body}")]
pub struct ApiError {
    pub status: u16,
    pub body: String,
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let bearer = auth_token.unwrap_or(&self.anon_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bearer))?,
        );

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, query, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(None)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers).query(query);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(ApiError {
                status: status.as_u16(),
                body: error_text,
            }
            .into());
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

/// `RecordStore` over Supabase's PostgREST API. Each collection is a table
/// with an `id` primary key.
///
/// Guarded writes are serialized by a process-wide mutex. Across processes
/// the appointments table needs a partial unique index on
/// `(doctor_id, date, start_time)`
/// `WHERE status IN ('pending','confirmed') OR (status = 'rescheduled' AND replaced_by IS NULL)`,
/// so canceled and completed rows never block a rebooking. The losing insert
/// gets `409`, which surfaces as `StoreError::Conflict`. The index only
/// catches equal start times: two processes can still commit overlapping
/// appointments that start at different minutes.
///
/// Conditional writes are a single `PATCH` filtered on the expected fields,
/// so they are atomic in the database.
pub struct SupabaseStore {
    client: SupabaseClient,
    write_lock: Mutex<()>,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: SupabaseClient::new(config),
            write_lock: Mutex::new(()),
        }
    }

    fn table_path(collection: &str) -> String {
        format!("/rest/v1/{}", collection)
    }

    fn filter_params(filter: &RecordFilter) -> Vec<(String, String)> {
        let mut params = Vec::new();

        for (field, value) in &filter.equals {
            params.push((field.clone(), format!("eq.{}", scalar_to_param(value))));
        }
        for range in &filter.ranges {
            if let Some(low) = &range.gte {
                params.push((range.field.clone(), format!("gte.{}", scalar_to_param(low))));
            }
            if let Some(high) = &range.lte {
                params.push((range.field.clone(), format!("lte.{}", scalar_to_param(high))));
            }
        }

        params
    }

    fn representation_headers(prefer: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static(prefer));
        headers
    }

    async fn insert(&self, collection: &str, id: &str, record: Value) -> Result<(), StoreError> {
        let result: Result<Vec<Value>> = self
            .client
            .request_with_headers(
                Method::POST,
                &Self::table_path(collection),
                &[],
                Some(record),
                Some(Self::representation_headers("return=representation")),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match e.downcast_ref::<ApiError>() {
                Some(api) if api.status == 409 => {
                    warn!("Insert into {}/{} hit a unique constraint", collection, id);
                    Err(StoreError::conflict(collection, id))
                }
                _ => Err(StoreError::Backend(e.to_string())),
            },
        }
    }
}

fn scalar_to_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl RecordStore for SupabaseStore {
    async fn read_record(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        let query = vec![("id".to_string(), format!("eq.{}", id))];
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &Self::table_path(collection), &query, None)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    async fn query_records(
        &self,
        collection: &str,
        filter: &RecordFilter,
    ) -> Result<Vec<Value>, StoreError> {
        let mut query = Self::filter_params(filter);
        query.push(("order".to_string(), "id.asc".to_string()));

        self.client
            .request(Method::GET, &Self::table_path(collection), &query, None)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn write_record(
        &self,
        collection: &str,
        id: &str,
        record: Value,
    ) -> Result<(), StoreError> {
        let record = with_id(collection, id, record)?;
        let _: Vec<Value> = self
            .client
            .request_with_headers(
                Method::POST,
                &Self::table_path(collection),
                &[],
                Some(record),
                Some(Self::representation_headers(
                    "resolution=merge-duplicates,return=representation",
                )),
            )
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn write_record_if_unconflicted(
        &self,
        collection: &str,
        id: &str,
        record: Value,
        predicate: &ConflictPredicate,
    ) -> Result<(), StoreError> {
        let record = with_id(collection, id, record)?;
        let _guard = self.write_lock.lock().await;

        let candidates = self.query_records(collection, &predicate.filter).await?;
        if candidates.iter().any(|existing| predicate.conflicts_with(id, existing)) {
            debug!("Guarded write to {}/{} rejected", collection, id);
            return Err(StoreError::conflict(collection, id));
        }

        self.insert(collection, id, record).await
    }

    async fn write_record_if_matches(
        &self,
        collection: &str,
        id: &str,
        record: Value,
        expected: &RecordFilter,
    ) -> Result<(), StoreError> {
        let record = with_id(collection, id, record)?;
        let mut query = vec![("id".to_string(), format!("eq.{}", id))];
        query.extend(Self::filter_params(expected));

        let updated: Vec<Value> = self
            .client
            .request_with_headers(
                Method::PATCH,
                &Self::table_path(collection),
                &query,
                Some(record),
                Some(Self::representation_headers("return=representation")),
            )
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if !updated.is_empty() {
            return Ok(());
        }

        // No row matched: either it is gone or it changed.
        self.read_record(collection, id).await?;
        debug!("Conditional write to {}/{} rejected", collection, id);
        Err(StoreError::conflict(collection, id))
    }
}
