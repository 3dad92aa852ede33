//! HTTP client implementation

use std::time::Duration;

use reqwest::{header, Client, Response};
use tracing::debug;
use url::Url;

/// Thin wrapper over a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// POST a JSON body
    ///
    /// Credentials embedded in `url` are moved into a basic auth header so
    /// they never appear in the request line.
    pub async fn post(&self, url: &Url, body: Vec<u8>) -> Result<Response, reqwest::Error> {
        let (url, credentials) = split_credentials(url);
        debug!("POST {}", url);

        let mut request = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body);

        if let Some((username, password)) = credentials {
            request = request.basic_auth(username, password);
        }

        request.send().await
    }
}

/// Strip userinfo from a URL, returning it separately
pub fn split_credentials(url: &Url) -> (Url, Option<(String, Option<String>)>) {
    if url.username().is_empty() && url.password().is_none() {
        return (url.clone(), None);
    }

    let credentials = (
        url.username().to_string(),
        url.password().map(str::to_string),
    );

    let mut stripped = url.clone();
    // Only fails for cannot-be-a-base URLs, which carry no userinfo.
    let _ = stripped.set_username("");
    let _ = stripped.set_password(None);

    (stripped, Some(credentials))
}
