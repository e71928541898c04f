//! Client for the hosted table API (PostgREST dialect) and its function runtime.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use shared::{
    domain::{NewOficio, Oficio, OficioChanges, OficioId, OficioSubmission},
    error::{BackendErrorBody, StoreError, StoreResult},
    protocol::{OficioFilters, OficioPage, OficioQuery},
    store::OficioStore,
};
use tracing::debug;
use url::Url;

pub const DEFAULT_TABLE: &str = "oficios";
pub const ADD_OFICIO_FUNCTION: &str = "add_oficio";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const SEARCH_COLUMNS: [&str; 3] = ["remetente", "destinatario", "cidade"];

#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    pub api_key: String,
    pub table: String,
    pub timeout: Duration,
}

impl RestConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            table: DEFAULT_TABLE.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Remote functions exposed next to the table API.
#[async_trait]
pub trait OficioFunctions: Send + Sync {
    /// Runs the server-side create flow. Returns the created row when the
    /// function echoes one back.
    async fn add_oficio(&self, submission: &OficioSubmission) -> StoreResult<Option<Oficio>>;
}

#[derive(Clone)]
pub struct RestStore {
    http: Client,
    base_url: Url,
    api_key: String,
    table: String,
}

#[derive(Debug, Deserialize)]
struct NumeroRow {
    numero: i64,
}

impl RestStore {
    pub fn new(config: RestConfig) -> anyhow::Result<Self> {
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url =
            Url::parse(&base).with_context(|| format!("invalid backend url '{}'", config.base_url))?;
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url,
            api_key: config.api_key,
            table: config.table,
        })
    }

    fn table_url(&self) -> StoreResult<Url> {
        self.base_url
            .join(&format!("rest/v1/{}", self.table))
            .map_err(|err| StoreError::Transport(format!("invalid table url: {err}")))
    }

    fn function_url(&self, name: &str) -> StoreResult<Url> {
        self.base_url
            .join(&format!("functions/v1/{name}"))
            .map_err(|err| StoreError::Transport(format!("invalid function url: {err}")))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn select<T: DeserializeOwned>(&self, params: &[(String, String)]) -> StoreResult<Vec<T>> {
        let response = self
            .authorized(self.http.get(self.table_url()?))
            .query(params)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response)
            .await?
            .json()
            .await
            .map_err(transport_error)
    }

    /// Invokes a remote function with a JSON payload and returns its JSON answer.
    pub async fn invoke_function<P: Serialize + ?Sized>(
        &self,
        name: &str,
        payload: &P,
    ) -> StoreResult<serde_json::Value> {
        let response = self
            .authorized(self.http.post(self.function_url(name)?))
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;
        let text = check_status(response)
            .await?
            .text()
            .await
            .map_err(transport_error)?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|err| StoreError::Decode(err.to_string()))
    }
}

#[async_trait]
impl OficioStore for RestStore {
    async fn fetch_page(&self, query: &OficioQuery) -> StoreResult<OficioPage> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(&query.filters));
        params.push((
            "order".to_string(),
            format!("{}.{}", query.sort.field.column(), query.sort.direction),
        ));
        params.push(("offset".to_string(), query.range.offset.to_string()));
        params.push(("limit".to_string(), query.range.limit.to_string()));

        let response = self
            .authorized(self.http.get(self.table_url()?))
            .header("Prefer", "count=exact")
            .query(&params)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        let total = response
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(content_range_total);
        let records: Vec<Oficio> = response.json().await.map_err(transport_error)?;

        // Without an exact count, at least the rows seen so far exist.
        let total_count = total.unwrap_or(query.range.offset + records.len() as u64);
        debug!(rows = records.len(), total_count, "fetched oficios page");
        Ok(OficioPage {
            records,
            total_count,
        })
    }

    async fn fetch_by_id(&self, id: OficioId) -> StoreResult<Option<Oficio>> {
        let params = [
            ("select".to_string(), "*".to_string()),
            ("id".to_string(), format!("eq.{}", id.0)),
            ("limit".to_string(), "1".to_string()),
        ];
        let rows: Vec<Oficio> = self.select(&params).await?;
        Ok(rows.into_iter().next())
    }

    async fn max_numero(&self) -> StoreResult<Option<i64>> {
        let params = [
            ("select".to_string(), "numero".to_string()),
            ("order".to_string(), "numero.desc.nullslast".to_string()),
            ("limit".to_string(), "1".to_string()),
        ];
        let rows: Vec<NumeroRow> = self.select(&params).await?;
        Ok(rows.into_iter().next().map(|row| row.numero))
    }

    async fn insert(&self, record: &NewOficio) -> StoreResult<Oficio> {
        let response = self
            .authorized(self.http.post(self.table_url()?))
            .header("Prefer", "return=representation")
            .json(record)
            .send()
            .await
            .map_err(transport_error)?;
        let rows: Vec<Oficio> = check_status(response)
            .await?
            .json()
            .await
            .map_err(transport_error)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no row".to_string()))
    }

    async fn update(&self, id: OficioId, changes: &OficioChanges) -> StoreResult<Oficio> {
        let response = self
            .authorized(self.http.patch(self.table_url()?))
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{}", id.0))])
            .json(changes)
            .send()
            .await
            .map_err(transport_error)?;
        let rows: Vec<Oficio> = check_status(response)
            .await?
            .json()
            .await
            .map_err(transport_error)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("oficio {id}")))
    }
}

#[async_trait]
impl OficioFunctions for RestStore {
    async fn add_oficio(&self, submission: &OficioSubmission) -> StoreResult<Option<Oficio>> {
        let answer = self.invoke_function(ADD_OFICIO_FUNCTION, submission).await?;
        Ok(created_row(answer))
    }
}

/// Function answers come back bare, wrapped in `data`, or as a one-row array.
fn created_row(answer: serde_json::Value) -> Option<Oficio> {
    let candidate = match answer {
        serde_json::Value::Array(rows) => rows.into_iter().next()?,
        serde_json::Value::Object(mut object) if object.contains_key("data") => {
            object.remove("data")?
        }
        other => other,
    };
    serde_json::from_value(candidate).ok()
}

/// Query-string filters: equality on year and usage, one `or` over the text columns.
pub fn filter_params(filters: &OficioFilters) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if let Some(year) = filters.year {
        params.push(("ano".to_string(), format!("eq.{year}")));
    }
    if let Some(is_used) = filters.is_used {
        params.push(("utilizado".to_string(), format!("eq.{is_used}")));
    }
    if let Some(term) = filters.search_term() {
        let operand = ilike_operand(term);
        let clauses: Vec<String> = SEARCH_COLUMNS
            .iter()
            .map(|column| format!("{column}.ilike.{operand}"))
            .collect();
        params.push(("or".to_string(), format!("({})", clauses.join(","))));
    }
    params
}

/// `*term*` with `%`, `_` and `\` escaped for ILIKE, double-quoted when the
/// term holds characters reserved inside logic trees.
fn ilike_operand(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('*');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('*');
    if !pattern
        .chars()
        .any(|ch| matches!(ch, ',' | '(' | ')' | '.' | ':' | '"' | '\\'))
    {
        return pattern;
    }
    let mut quoted = String::with_capacity(pattern.len() + 2);
    quoted.push('"');
    for ch in pattern.chars() {
        if matches!(ch, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Total from `Content-Range: 0-9/42` or `*/0`; `None` when the total is `*`.
pub fn content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

async fn check_status(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<BackendErrorBody>(&text)
        .unwrap_or_else(|_| BackendErrorBody::new(None, text));
    if status == StatusCode::CONFLICT || body.is_unique_violation() {
        return Err(StoreError::Conflict(body.message));
    }
    Err(StoreError::Backend {
        status: status.as_u16(),
        body,
    })
}

fn transport_error(err: reqwest::Error) -> StoreError {
    if err.is_decode() {
        StoreError::Decode(err.to_string())
    } else {
        StoreError::Transport(err.to_string())
    }
}

#[cfg(test)]
#[path = "tests/rest_tests.rs"]
mod tests;
