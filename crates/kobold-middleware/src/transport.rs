//! [`Transport`] – a single authenticated request/response exchange.
//!
//! The transport knows nothing about dialects.  It turns one HTTP exchange
//! into either a [`Payload`] or a [`KoboldError`]:
//!
//! | Outcome | Result |
//! |---|---|
//! | 2xx with a JSON body | `Ok(Payload::Json(..))` |
//! | 2xx with an empty body | `Ok(Payload::Empty)` |
//! | 304 Not Modified | `Ok(Payload::NotModified)` |
//! | 2xx with a malformed body | `Err(KoboldError::Parse)` |
//! | any other status | `Err(KoboldError::Api { status, body })` |
//! | connection failure / timeout | `Err(KoboldError::Transport)` |
//!
//! There are no retries here; fallback policy lives in the
//! [`BackendSelector`][crate::selector::BackendSelector].

use std::time::Duration;

use kobold_types::KoboldError;
use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::debug;

/// Upper bound applied to every exchange when the caller does not supply one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Decoded body of a successful exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    /// 2xx with nothing in the body.
    Empty,
    /// HTTP 304: the vendor has nothing new.  Not the same as [`Payload::Empty`].
    NotModified,
}

impl Payload {
    pub fn into_json(self) -> Option<Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Empty | Payload::NotModified => None,
        }
    }
}

/// Shared HTTP client with a per-exchange timeout.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Transport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Perform one exchange against `base_url` + `path`.
    ///
    /// `body` is serialized to JSON only when present, in which case
    /// `Content-Type` and `Content-Length` are set to match.
    ///
    /// # Errors
    ///
    /// See the module-level table.
    pub async fn send(
        &self,
        base_url: &str,
        method: Method,
        path: &str,
        headers: &HeaderMap,
        body: Option<&Value>,
    ) -> Result<(u16, Payload), KoboldError> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);
        let mut request = self.client.request(method.clone(), &url).headers(headers.clone());

        if let Some(body) = body {
            let bytes = serde_json::to_vec(body)
                .map_err(|e| KoboldError::Parse(format!("request body for {url}: {e}")))?;
            request = request
                .header(CONTENT_TYPE, "application/json")
                .header(CONTENT_LENGTH, bytes.len())
                .body(bytes);
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        let (status, text) = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                return Err(KoboldError::Transport(format!("{method} {url}: {e}")));
            }
            Err(_) => {
                return Err(KoboldError::Transport(format!(
                    "{method} {url}: no response within {:?}",
                    self.timeout
                )));
            }
        };

        debug!(%method, %url, status, bytes = text.len(), "vendor exchange completed");

        if status == 304 {
            return Ok((status, Payload::NotModified));
        }
        if !(200..300).contains(&status) {
            return Err(KoboldError::Api {
                status,
                body: diagnostic_body(&text),
            });
        }
        if text.trim().is_empty() {
            return Ok((status, Payload::Empty));
        }
        serde_json::from_str(&text)
            .map(|value| (status, Payload::Json(value)))
            .map_err(|e| KoboldError::Parse(format!("{method} {url}: {e}")))
    }
}

/// Keep whatever a vendor sent alongside an error status.  Non-JSON bodies
/// survive as a JSON string.
fn diagnostic_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

/// Build the static header set a dialect sends with every request.
///
/// # Errors
///
/// Returns [`KoboldError::Transport`] when the token contains characters that
/// cannot appear in an HTTP header.
pub fn auth_headers(
    scheme: &str,
    token: &str,
    accept: &'static str,
    user_agent: &'static str,
) -> Result<HeaderMap, KoboldError> {
    let authorization = HeaderValue::from_str(&format!("{scheme} {token}")).map_err(|_| {
        KoboldError::Transport("authorization token contains invalid header characters".into())
    })?;
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, authorization);
    headers.insert(ACCEPT, HeaderValue::from_static(accept));
    headers.insert(USER_AGENT, HeaderValue::from_static(user_agent));
    Ok(headers)
}
