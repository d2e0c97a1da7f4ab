// renderer.rs
use crate::scraper::ScraperError;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";

/// Headroom on top of the navigation and wait bounds for the API round trip.
const SESSION_SLACK: Duration = Duration::from_secs(10);

/// What to load and how long to wait for it.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub url: String,
    /// CSS selector that must appear before the page counts as ready.
    pub wait_for: Option<String>,
    pub nav_timeout: Duration,
    pub wait_timeout: Duration,
}

impl RenderRequest {
    pub fn new(url: impl Into<String>, nav_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            wait_for: None,
            nav_timeout,
            wait_timeout: Duration::ZERO,
        }
    }

    pub fn wait_for(mut self, selector: &str, timeout: Duration) -> Self {
        self.wait_for = Some(selector.to_string());
        self.wait_timeout = timeout;
        self
    }
}

/// A rendered DOM snapshot.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: String,
    pub html: String,
    /// False when the wait-for selector never matched inside the wait bound.
    pub selector_matched: bool,
}

/// The headless rendering engine, as far as the scraper needs it.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage, ScraperError>;
}

/// True if `selector` matches at least one element of `html`.
pub fn selector_present(html: &str, selector: &str) -> bool {
    let Ok(selector) = Selector::parse(selector) else {
        return false;
    };
    Html::parse_document(html).select(&selector).next().is_some()
}

/// Renders pages through a Browserless `/content` endpoint.
///
/// Each render is one navigation. Waiting for a selector happens inside
/// that browser session; a wait that runs out still returns the page.
pub struct BrowserlessRenderer {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    headless: bool,
}

impl BrowserlessRenderer {
    pub fn new(base_url: &str, token: Option<&str>, headless: bool) -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            headless,
        })
    }

    fn request_body(request: &RenderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "url": request.url,
            "bestAttempt": true,
            "gotoOptions": {
                "timeout": request.nav_timeout.as_millis() as u64,
                "waitUntil": "load",
            },
        });
        if let Some(ref selector) = request.wait_for {
            body["waitForSelector"] = serde_json::json!({
                "selector": selector,
                "timeout": request.wait_timeout.as_millis() as u64,
            });
        }
        body
    }
}

/// Browserless reports an expired selector wait as a failed request.
fn is_wait_timeout(status: reqwest::StatusCode, message: &str) -> bool {
    status == reqwest::StatusCode::REQUEST_TIMEOUT
        || message.to_lowercase().contains("waiting for selector")
}

#[async_trait]
impl PageRenderer for BrowserlessRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage, ScraperError> {
        let endpoint = format!("{}/content", self.base_url);

        let mut query = vec![(
            "launch",
            serde_json::json!({ "headless": self.headless }).to_string(),
        )];
        if let Some(ref token) = self.token {
            query.push(("token", token.clone()));
        }

        let resp = self
            .client
            .post(&endpoint)
            .query(&query)
            .json(&Self::request_body(request))
            .timeout(request.nav_timeout + request.wait_timeout + SESSION_SLACK)
            .send()
            .await
            .map_err(|e| ScraperError::Navigation {
                url: request.url.clone(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            if request.wait_for.is_some() && is_wait_timeout(status, &message) {
                debug!(url = %request.url, %status, "selector wait ran out");
                return Ok(RenderedPage {
                    url: request.url.clone(),
                    html: message,
                    selector_matched: false,
                });
            }
            return Err(ScraperError::Render {
                status: status.as_u16(),
                message,
            });
        }

        let html = resp.text().await?;
        let selector_matched = request
            .wait_for
            .as_deref()
            .map_or(true, |selector| selector_present(&html, selector));
        if !selector_matched {
            debug!(url = %request.url, "selector not found within wait bound");
        }

        Ok(RenderedPage {
            url: request.url.clone(),
            html,
            selector_matched,
        })
    }
}
