use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::FetchError;
use crate::types::Listing;
use crate::{COLLECTION_ADDRESS, COLLECTION_URL, ENTITIES_API_URL};

/// Multipart boundary key used by the entities endpoint.
const BOUNDARY: &str = "boundary";

/// Per-request timeout for page and token requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Supplies raw listing pages. The cycle controller and fetcher only ever see
/// this seam, never the network.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn get_page(&self, page: usize, page_size: usize) -> Result<Vec<Listing>, FetchError>;
}

/// Rotates whatever credential the page fetcher needs. Invoked exactly once
/// per recovery transition.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn refresh_credentials(&self) -> Result<(), FetchError>;
}

/// One listing as returned inside the endpoint's `data` array.
#[derive(Debug, Deserialize)]
struct RawListing {
    name: String,
    price: Option<f64>,
    address: String,
    owner: RawOwner,
    is_selling: bool,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    wallet_address: String,
}

#[derive(Debug, Deserialize)]
struct EntitiesResponse {
    data: Vec<RawListing>,
}

impl RawListing {
    fn into_listing(self, page: usize) -> Result<Listing, FetchError> {
        if self.name.is_empty() {
            return Err(FetchError::Malformed {
                page,
                reason: "empty name".to_string(),
            });
        }
        Ok(Listing {
            name: self.name,
            // prices arrive as floats; the marketplace displays them ceiled
            price: self.price.map(|p| p.ceil() as u64),
            address: self.address,
            owner: self.owner.wallet_address,
            is_selling: self.is_selling,
        })
    }
}

/// Client for the disintar entities API.
///
/// Holds the csrf token behind a lock so concurrent page requests can share
/// the client while a recovery refresh rotates the token.
pub struct MarketClient {
    http: reqwest::Client,
    api_url: String,
    collection_url: String,
    csrf: RwLock<String>,
}

impl MarketClient {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_urls(ENTITIES_API_URL, COLLECTION_URL)
    }

    pub fn with_urls(api_url: &str, collection_url: &str) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.to_string(),
            collection_url: collection_url.to_string(),
            csrf: RwLock::new(String::new()),
        })
    }

    fn csrf_token(&self) -> String {
        self.csrf.read().expect("csrf lock poisoned").clone()
    }

    /// Multipart form body for one page request, in the exact shape the
    /// endpoint expects.
    fn page_body(page: usize, page_size: usize) -> String {
        let sep = format!("--{BOUNDARY}\r\n");
        let request_time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        format!(
            "{sep}Content-Disposition: form-data; name=\"entity_name\"\r\n\r\nNFT\r\n\
             {sep}Content-Disposition: form-data; name=\"order_by\"\r\n\r\n[\"price\"]\r\n\
             {sep}Content-Disposition: form-data; name=\"filter_by\"\r\n\r\n\
             [{{\"name\":\"collection__address\",\"value\":\"{COLLECTION_ADDRESS}\"}}]\r\n\
             {sep}Content-Disposition: form-data; name=\"limit\"\r\n\r\n{page_size}\r\n\
             {sep}Content-Disposition: form-data; name=\"page\"\r\n\r\n{page}\r\n\
             {sep}Content-Disposition: form-data; name=\"request_time\"\r\n\r\n{request_time}\r\n"
        )
    }
}

#[async_trait]
impl PageFetcher for MarketClient {
    async fn get_page(&self, page: usize, page_size: usize) -> Result<Vec<Listing>, FetchError> {
        let token = self.csrf_token();
        let response = self
            .http
            .post(&self.api_url)
            .header("X-Csrftoken", &token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(reqwest::header::COOKIE, format!("csrftoken={token}"))
            .header(reqwest::header::REFERER, &self.collection_url)
            .body(Self::page_body(page, page_size))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: self.api_url.clone(),
            });
        }

        let body = response.text().await?;
        let decoded: EntitiesResponse =
            serde_json::from_str(&body).map_err(|source| FetchError::Decode { page, source })?;

        debug!("page {page}: {} records", decoded.data.len());
        decoded
            .data
            .into_iter()
            .map(|raw| raw.into_listing(page))
            .collect()
    }
}

#[async_trait]
impl CredentialSource for MarketClient {
    /// Fetch the collection page and take the fresh csrf token from its
    /// `set-cookie` response header.
    async fn refresh_credentials(&self) -> Result<(), FetchError> {
        let response = self.http.get(&self.collection_url).send().await?;
        let cookie = response
            .headers()
            .get(reqwest::header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| FetchError::Credential("no set-cookie header".to_string()))?;
        let token = extract_csrf(cookie)
            .ok_or_else(|| FetchError::Credential(format!("no csrftoken in cookie: {cookie}")))?;
        *self.csrf.write().expect("csrf lock poisoned") = token;
        Ok(())
    }
}

/// Pull the csrf token value out of a `set-cookie` header.
fn extract_csrf(cookie: &str) -> Option<String> {
    let first = cookie.split(';').next()?;
    let (key, value) = first.split_once('=')?;
    if key.trim() == "csrftoken" && !value.is_empty() {
        Some(value.to_string())
    } else {
        None
    }
}
