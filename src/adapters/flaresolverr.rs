//! FlareSolverr client.
//!
//! OpenMHz sits behind an anti-bot wall, so every API request goes through a
//! FlareSolverr instance (`cmd: request.get`). The solved page is a browser
//! rendering of the JSON document, so the payload has to be cut back out of
//! its `<pre>` element.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors reaching an upstream URL through the proxy
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Proxy request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected status code from proxy: {0}")]
    Status(StatusCode),

    #[error("Proxy could not solve request: {0}")]
    Solver(String),

    #[error("Failed to locate <pre> tags in response")]
    MissingPayload,

    #[error("Error parsing JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Request body for FlareSolverr's v1 endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SolveRequest<'a> {
    cmd: &'a str,
    url: &'a str,
    max_timeout: u64,
}

/// FlareSolverr response envelope
#[derive(Debug, Deserialize)]
struct SolveResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    solution: Option<Solution>,
}

#[derive(Debug, Deserialize)]
struct Solution {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    response: String,
}

/// HTTP client for a FlareSolverr instance
pub struct FlareSolverrClient {
    /// The `/v1` endpoint, e.g. `http://localhost:8191/v1`
    endpoint: String,
    /// Solve timeout passed to FlareSolverr, in milliseconds
    max_timeout_ms: u64,
    client: reqwest::Client,
}

impl FlareSolverrClient {
    pub fn new(endpoint: impl Into<String>, max_timeout_ms: u64) -> Result<Self, ProxyError> {
        // Allow the proxy its full solve budget plus some slack.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(max_timeout_ms) + Duration::from_secs(15))
            .build()?;

        Ok(Self {
            endpoint: endpoint.into(),
            max_timeout_ms,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Root URL of the proxy, used for the liveness probe
    pub fn root_url(&self) -> String {
        proxy_root(&self.endpoint)
    }

    /// Fetch `target_url` through the proxy and return the embedded JSON text
    pub async fn fetch_json_text(&self, target_url: &str) -> Result<String, ProxyError> {
        debug!(target_url, "Fetching JSON via proxy");

        let request = SolveRequest {
            cmd: "request.get",
            url: target_url,
            max_timeout: self.max_timeout_ms,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(ProxyError::Status(response.status()));
        }

        let body = response.text().await?;
        extract_payload(&body)
    }

    /// Fetch and deserialize a JSON document through the proxy
    pub async fn fetch_json<T>(&self, target_url: &str) -> Result<T, ProxyError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let text = self.fetch_json_text(target_url).await?;
        debug!(bytes = text.len(), "Fetched JSON payload");
        Ok(serde_json::from_str(&text)?)
    }

    /// True if the proxy answers its root URL with 200
    pub async fn is_running(&self) -> bool {
        match self.client.get(self.root_url()).send().await {
            Ok(resp) => resp.status() == StatusCode::OK,
            Err(e) => {
                debug!("Proxy liveness probe failed: {}", e);
                false
            }
        }
    }
}

/// Pull the API JSON out of a FlareSolverr response body
pub fn extract_payload(body: &str) -> Result<String, ProxyError> {
    let envelope: SolveResponse = serde_json::from_str(body)?;

    if envelope.status != "ok" {
        let message = if envelope.message.is_empty() {
            format!("status '{}'", envelope.status)
        } else {
            envelope.message
        };
        return Err(ProxyError::Solver(message));
    }

    let solution = envelope
        .solution
        .ok_or_else(|| ProxyError::Solver("response has no solution".to_string()))?;

    if solution.status != 0 && solution.status != 200 {
        return Err(ProxyError::Solver(format!(
            "upstream returned status {}",
            solution.status
        )));
    }

    let pre = pre_contents(&solution.response).ok_or(ProxyError::MissingPayload)?;
    Ok(decode_entities(pre))
}

/// Inner text of the first `<pre>` element
fn pre_contents(html: &str) -> Option<&str> {
    let open = html.find("<pre")?;
    let content_start = open + html[open..].find('>')? + 1;
    let len = html[content_start..].find("</pre>")?;
    Some(&html[content_start..content_start + len])
}

/// Undo the HTML escaping the browser applied to the JSON text
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest.find(';').and_then(|semi| {
            let ch = match &rest[1..semi] {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                entity => numeric_entity(entity),
            }?;
            Some((ch, semi + 1))
        });

        match decoded {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn numeric_entity(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}

/// `http://host:8191/v1` -> `http://host:8191/`
fn proxy_root(endpoint: &str) -> String {
    match reqwest::Url::parse(endpoint) {
        Ok(mut url) => {
            url.set_path("/");
            url.set_query(None);
            url.to_string()
        }
        Err(_) => endpoint.to_string(),
    }
}
