use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use thiserror::Error;

use crate::config::{HarvestConfig, NicheFilters};
use crate::domain::FetchRequest;
use crate::error::NichesError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("endpoint returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Other(String),
}

/// Returns the raw response body; an empty body means the category has no
/// more pages.
pub trait NichesClient: Send + Sync {
    fn download(&self, request: &FetchRequest) -> Result<Vec<u8>, TransportError>;
}

impl<C: NichesClient + ?Sized> NichesClient for &C {
    fn download(&self, request: &FetchRequest) -> Result<Vec<u8>, TransportError> {
        (**self).download(request)
    }
}

impl<C: NichesClient + ?Sized> NichesClient for std::sync::Arc<C> {
    fn download(&self, request: &FetchRequest) -> Result<Vec<u8>, TransportError> {
        (**self).download(request)
    }
}

#[derive(Clone)]
pub struct NichesHttpClient {
    client: Client,
    endpoint: String,
    filters: NicheFilters,
}

impl NichesHttpClient {
    pub fn new(config: &HarvestConfig) -> Result<Self, NichesError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("niche-harvest/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| NichesError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|err| NichesError::Http(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            filters: config.filters.clone(),
        })
    }

    pub fn query(&self, request: &FetchRequest) -> Vec<(&'static str, String)> {
        page_query(&self.filters, request)
    }
}

impl NichesClient for NichesHttpClient {
    fn download(&self, request: &FetchRequest) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&self.query(request))
            .send()
            .map_err(classify_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .ok()
                .map(|text| text.chars().take(200).collect::<String>())
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| "niche export request failed".to_string());
            return Err(TransportError::Status { status, message });
        }

        let bytes = response
            .bytes()
            .map_err(|err| TransportError::Body(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

pub fn page_query(filters: &NicheFilters, request: &FetchRequest) -> Vec<(&'static str, String)> {
    let mut query = vec![("skip", request.offset().to_string())];
    query.extend(filters.query_pairs());
    query.push(("id_cat", request.category().to_string()));
    query
}

fn classify_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else if err.is_body() || err.is_decode() {
        TransportError::Body(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
