use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, InvalidHeaderValue};
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::config::SupabaseConfig;
use crate::db::{RecordStore, Table};
use crate::error::StoreError;

const REST_PATH: &str = "rest/v1";

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

/// `RecordStore` backed by a Supabase project's PostgREST endpoint.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: Client,
    base_url: Url,
}

impl SupabaseStore {
    pub fn new(config: &SupabaseConfig) -> Result<Self, StoreError> {
        let mut base_url = Url::parse(&config.url)
            .map_err(|e| StoreError::Configuration(format!("invalid SUPABASE_URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Configuration(format!(
                "invalid SUPABASE_URL: {}",
                config.url
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let base_url = base_url
            .join(&format!("{REST_PATH}/"))
            .map_err(|e| StoreError::Configuration(format!("invalid SUPABASE_URL: {e}")))?;

        let client = Client::builder()
            .default_headers(auth_headers(&config.key)?)
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn table_url(&self, table: Table) -> Result<Url, StoreError> {
        self.base_url
            .join(table.name())
            .map_err(|e| StoreError::Configuration(format!("invalid table URL: {e}")))
    }
}

fn auth_headers(key: &str) -> Result<HeaderMap, StoreError> {
    let invalid = |_: InvalidHeaderValue| {
        StoreError::Configuration("SUPABASE_KEY is not a valid header value".into())
    };

    let mut apikey = HeaderValue::from_str(key).map_err(invalid)?;
    apikey.set_sensitive(true);
    let mut bearer = HeaderValue::from_str(&format!("Bearer {key}")).map_err(invalid)?;
    bearer.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert("apikey", apikey);
    headers.insert(AUTHORIZATION, bearer);
    Ok(headers)
}

/// Turn a PostgREST answer into rows, or into `StoreError::Rejected`.
async fn read_rows(response: Response) -> Result<Vec<Value>, StoreError> {
    let status = response.status();
    if status.is_success() {
        let bytes = response.bytes().await?;
        // An accepted write may come back with no representation at all.
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        return Ok(match serde_json::from_slice::<Value>(&bytes)? {
            Value::Array(rows) => rows,
            Value::Null => Vec::new(),
            row => vec![row],
        });
    }

    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Failed to read error body for status {}: {}", status, e);
            String::new()
        }
    };
    let (code, message) = match serde_json::from_str::<PostgrestError>(&text) {
        Ok(err) => {
            let mut message = err.message.unwrap_or_else(|| text.clone());
            if let Some(details) = err.details.filter(|d| !d.is_empty()) {
                message = format!("{message}: {details}");
            }
            (err.code, message)
        }
        Err(_) if text.trim().is_empty() => (None, status.to_string()),
        Err(_) => (None, text),
    };

    Err(StoreError::Rejected {
        status: status.as_u16(),
        code,
        message,
    })
}

#[async_trait]
impl RecordStore for SupabaseStore {
    async fn insert(&self, table: Table, row: Value) -> Result<Vec<Value>, StoreError> {
        let url = self.table_url(table)?;
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;

        read_rows(response).await
    }

    async fn select_eq(
        &self,
        table: Table,
        column: &str,
        value: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair(column, &format!("eq.{value}"));
        tracing::debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        read_rows(response).await
    }
}
