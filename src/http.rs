use crate::config::FetchConfig;
use crate::error::{HarvestError, SourceError};
use crate::proxy::ProxyConfig;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, RequestBuilder, StatusCode};
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::debug;

/// Raw HTTP answer: the status is classified by the adapter, not here
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

/// The per-fetch HTTP client shared by every adapter and the geocoder
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Build a client honoring the config's timeout/user agent and the optional proxy
    pub fn new(config: &FetchConfig, proxy: Option<&ProxyConfig>) -> Result<Self, HarvestError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let mut builder = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.as_str())
            .default_headers(headers);

        if let Some(proxy) = proxy {
            debug!("Routing requests through {} proxy", proxy.scheme());
            builder = builder.proxy(proxy.to_reqwest()?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    pub async fn get<Q: Serialize + ?Sized>(&self, url: &str, query: &Q) -> Result<HttpResponse, SourceError> {
        self.send(self.client.get(url).query(query)).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<HttpResponse, SourceError> {
        self.send(self.client.post(url).json(body)).await
    }

    pub async fn put_json<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<HttpResponse, SourceError> {
        self.send(self.client.put(url).json(body)).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<HttpResponse, SourceError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("HTTP {} ({} bytes)", status, body.len());
        Ok(HttpResponse { status, body })
    }
}

/// Default failure classification shared by the adapters: maps an HTTP answer
/// to `None` when it is usable, or to the kind of failure it represents.
pub fn classify_response(response: &HttpResponse) -> Option<SourceError> {
    let status = response.status.as_u16();
    match response.status {
        StatusCode::TOO_MANY_REQUESTS => Some(SourceError::RateLimited { status }),
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => Some(SourceError::Blocked { status }),
        s if s.is_success() && looks_like_captcha(&response.body) => Some(SourceError::Blocked { status }),
        s if !s.is_success() => Some(SourceError::Http { status }),
        _ => None,
    }
}

/// Detects interstitial challenge pages served with a 200 in place of data
pub fn looks_like_captcha(body: &str) -> bool {
    let trimmed = body.trim_start();
    if !trimmed.starts_with('<') {
        return false;
    }

    let document = Html::parse_document(trimmed);
    let challenge = Selector::parse("#px-captcha, .g-recaptcha, iframe[src*='captcha'], form#challenge-form")
        .expect("static selector");
    if document.select(&challenge).next().is_some() {
        return true;
    }

    let title = Selector::parse("title").expect("static selector");
    document
        .select(&title)
        .next()
        .map(|t| t.text().collect::<String>().to_ascii_lowercase())
        .is_some_and(|t| t.contains("access to this page has been denied") || t.contains("captcha"))
}
