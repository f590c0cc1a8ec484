use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::{Client, StatusCode, header};
use talos_core::error::AppError;
use talos_core::traits::Fetcher;
use talos_core::work::{RawDocument, WorkUnit};
use url::Url;

use crate::extract::product_document;

/// Browser User-Agents rotated across requests. Storefronts answer plain
/// HTTP-library agents with 403s far more often.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:90.0) Gecko/20100101 Firefox/90.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/91.0.864.59",
];

/// How an HTTP status maps onto the retry taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusClass {
    Success,
    RateLimited,
    NotFound,
    Other,
}

fn classify_status(status: StatusCode) -> StatusClass {
    if status.is_success() {
        return StatusClass::Success;
    }
    match status.as_u16() {
        // 403 is how these storefronts throttle, not a permission problem.
        403 | 429 | 503 => StatusClass::RateLimited,
        404 => StatusClass::NotFound,
        _ => StatusClass::Other,
    }
}

/// HTTP fetcher for storefront product pages using reqwest.
///
/// Builds the catalog URL for a work unit, downloads the page with a rotating
/// User-Agent, and extracts the embedded product document. Failures are
/// reported through the typed taxonomy so the retry executor can classify
/// them.
#[derive(Clone)]
pub struct HttpProductFetcher {
    client: Client,
    timeout_secs: u64,
    next_agent: Arc<AtomicUsize>,
}

impl HttpProductFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(20))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let timeout_secs = timeout.as_secs();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Http(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs,
            next_agent: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Catalog URL for a unit: `https://{domain}/catalog/product/view/id/{id}`.
    fn product_url(unit: &WorkUnit) -> Result<Url, AppError> {
        let raw = format!(
            "https://{}/catalog/product/view/id/{}",
            unit.domain, unit.product_id
        );
        Url::parse(&raw).map_err(|e| AppError::Http(format!("invalid product URL {raw}: {e}")))
    }

    fn next_user_agent(&self) -> &'static str {
        let index = self.next_agent.fetch_add(1, Ordering::Relaxed);
        USER_AGENTS[index % USER_AGENTS.len()]
    }
}

impl Fetcher for HttpProductFetcher {
    async fn fetch(&self, unit: &WorkUnit) -> Result<RawDocument, AppError> {
        let url = Self::product_url(unit)?;
        let agent = self.next_user_agent();

        tracing::debug!(unit = %unit, %url, "Fetching product page");

        let response = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, agent)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("connection failed: {e}"))
                } else {
                    AppError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        match classify_status(status) {
            StatusClass::Success => {}
            StatusClass::RateLimited => {
                return Err(AppError::RateLimited(format!(
                    "HTTP {} for {url}",
                    status.as_u16()
                )));
            }
            StatusClass::NotFound => {
                return Err(AppError::NotFound(unit.id()));
            }
            StatusClass::Other => {
                return Err(AppError::Http(format!(
                    "HTTP {} for {url}",
                    status.as_u16()
                )));
            }
        }

        let html = response
            .text()
            .await
            .map_err(|e| AppError::Http(format!("failed to read response body: {e}")))?;

        product_document(&html)
    }
}
