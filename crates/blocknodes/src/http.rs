use crate::config::{lenient_string, parse_config};
use async_trait::async_trait;
use blockcore::{
    block_types, BlockContext, BlockHandler, HandlerError, HandlerMetadata, StepResult,
    VariableStore,
};
use reqwest::Method;
use serde::Deserialize;
use tokio::time::Duration;

pub const STATUS_VARIABLE: &str = "http.status";
pub const BODY_VARIABLE: &str = "http.body";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HttpRequestConfig {
    #[serde(deserialize_with = "lenient_string")]
    method: String,
    #[serde(deserialize_with = "lenient_string")]
    url: String,
    #[serde(deserialize_with = "lenient_string")]
    body: String,
    #[serde(rename = "contenttype", deserialize_with = "lenient_string")]
    content_type: String,
    headers: Vec<HeaderConfig>,
    #[serde(rename = "authtype", deserialize_with = "lenient_string")]
    auth_type: String,
    #[serde(deserialize_with = "lenient_string")]
    username: String,
    #[serde(deserialize_with = "lenient_string")]
    password: String,
    #[serde(alias = "bearertoken", deserialize_with = "lenient_string")]
    token: String,
    #[serde(rename = "apikeyheader", deserialize_with = "lenient_string")]
    api_key_header: String,
    #[serde(rename = "apikey", deserialize_with = "lenient_string")]
    api_key: String,
    #[serde(rename = "timeoutms", deserialize_with = "lenient_string")]
    timeout_ms: String,
    #[serde(rename = "responsevariable", deserialize_with = "lenient_string")]
    response_variable: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HeaderConfig {
    #[serde(alias = "key", deserialize_with = "lenient_string")]
    name: String,
    #[serde(deserialize_with = "lenient_string")]
    value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Auth {
    None,
    Basic { username: String, password: String },
    Bearer(String),
    ApiKey { header: String, key: String },
}

impl HttpRequestConfig {
    fn auth(&self, store: &VariableStore) -> Result<Auth, HandlerError> {
        let auth = match self.auth_type.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Auth::None,
            "basic" => Auth::Basic {
                username: store.expand(&self.username),
                password: store.expand(&self.password),
            },
            "bearer" | "token" => Auth::Bearer(store.expand(&self.token)),
            "apikey" => Auth::ApiKey {
                header: match self.api_key_header.trim() {
                    "" => "X-API-Key".to_string(),
                    header => header.to_string(),
                },
                key: store.expand(&self.api_key),
            },
            other => {
                return Err(HandlerError::Configuration(format!(
                    "unsupported auth type '{}'",
                    other
                )))
            }
        };
        Ok(auth)
    }
}

/// HTTP request handler
pub struct HttpRequestHandler {
    client: reqwest::Client,
    default_timeout_ms: u64,
}

impl HttpRequestHandler {
    pub fn new(default_timeout_ms: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            default_timeout_ms,
        }
    }

    /// Per-block timeout, never above the handler's limit
    fn timeout_ms(&self, config: &HttpRequestConfig, store: &VariableStore) -> u64 {
        match store.resolve_number(&config.timeout_ms) {
            Some(ms) if ms > 0.0 => (ms as u64).min(self.default_timeout_ms),
            _ => self.default_timeout_ms,
        }
    }

    fn build_request(
        &self,
        config: &HttpRequestConfig,
        store: &VariableStore,
        method: Method,
        url: &str,
    ) -> Result<reqwest::RequestBuilder, HandlerError> {
        let mut request = self.client.request(method.clone(), url);

        for header in &config.headers {
            if header.name.trim().is_empty() {
                continue;
            }
            request = request.header(header.name.trim(), store.expand(&header.value));
        }

        request = match config.auth(store)? {
            Auth::None => request,
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::ApiKey { header, key } => request.header(header, key),
        };

        if method != Method::GET && method != Method::HEAD && !config.body.is_empty() {
            let body = store.expand(&config.body);
            let content_type = match config.content_type.trim() {
                "" if looks_like_json(&body) => "application/json",
                "" => "text/plain",
                explicit => explicit,
            };
            request = request
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body);
        }

        Ok(request)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(u16, String), HandlerError> {
        let response = request
            .send()
            .await
            .map_err(|e| HandlerError::ExecutionFailed(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| HandlerError::ExecutionFailed(format!("Failed to read response: {}", e)))?;

        Ok((status, body))
    }
}

fn looks_like_json(body: &str) -> bool {
    let body = body.trim_start();
    (body.starts_with('{') || body.starts_with('[')) && serde_json::from_str::<serde_json::Value>(body).is_ok()
}

#[async_trait]
impl BlockHandler for HttpRequestHandler {
    fn block_type(&self) -> &str {
        block_types::HTTP_REQUEST
    }

    async fn execute(&self, ctx: &mut BlockContext<'_>) -> StepResult {
        let config: HttpRequestConfig = parse_config(ctx);

        let method_name = match config.method.trim() {
            "" => "GET".to_string(),
            m => m.to_ascii_uppercase(),
        };
        let url = ctx.store.expand(&config.url);
        let context = format!("HTTP {} {}", method_name, url);

        if url.trim().is_empty() {
            return StepResult::from_error(&context, &HandlerError::Configuration("missing url".to_string()));
        }
        let method = match Method::from_bytes(method_name.as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                let err = HandlerError::Configuration(format!("Unsupported method: {}", method_name));
                return StepResult::from_error(&context, &err);
            }
        };

        let request = match self.build_request(&config, ctx.store, method, &url) {
            Ok(request) => request,
            Err(e) => return StepResult::from_error(&context, &e),
        };

        let timeout_ms = self.timeout_ms(&config, ctx.store);
        ctx.events.info(context.clone());

        let outcome = tokio::select! {
            _ = ctx.cancellation.cancelled() => Err(HandlerError::Cancelled),
            sent = tokio::time::timeout(Duration::from_millis(timeout_ms), self.send(request)) => {
                sent.unwrap_or(Err(HandlerError::Timeout { millis: timeout_ms }))
            }
        };

        let (status, body) = match outcome {
            Ok(response) => response,
            Err(e) => return StepResult::from_error(&context, &e),
        };

        ctx.events.info(format!("Response status: {}", status));

        ctx.store.set(STATUS_VARIABLE, status.to_string());
        ctx.store.set(BODY_VARIABLE, body.clone());
        if !config.response_variable.trim().is_empty() {
            ctx.store.set(&config.response_variable, body);
        }

        let description = format!("{} -> {}", context, status);
        if (200..300).contains(&status) {
            StepResult::success(description)
        } else {
            StepResult::error(description)
        }
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new("Make HTTP requests", "http")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(doc: serde_json::Value) -> HttpRequestConfig {
        serde_json::from_value(doc).unwrap()
    }

    #[test]
    fn test_auth_variants() {
        let store: VariableStore = [("secret", "s3cr3t")].into_iter().collect();

        let bearer = config(json!({"authtype": "Bearer", "token": "$secret"}));
        assert_eq!(bearer.auth(&store).unwrap(), Auth::Bearer("s3cr3t".to_string()));

        let api_key = config(json!({"authtype": "ApiKey", "apikey": "k"}));
        assert_eq!(
            api_key.auth(&store).unwrap(),
            Auth::ApiKey {
                header: "X-API-Key".to_string(),
                key: "k".to_string()
            }
        );

        let unknown = config(json!({"authtype": "Kerberos"}));
        assert!(unknown.auth(&store).is_err());
    }

    #[test]
    fn test_timeout_is_capped() {
        let handler = HttpRequestHandler::new(1000);
        let store = VariableStore::new();
        assert_eq!(handler.timeout_ms(&config(json!({"timeoutms": 50})), &store), 50);
        assert_eq!(handler.timeout_ms(&config(json!({"timeoutms": "90000"})), &store), 1000);
        assert_eq!(handler.timeout_ms(&config(json!({})), &store), 1000);
    }

    #[test]
    fn test_json_body_detection() {
        assert!(looks_like_json(r#" {"a": 1}"#));
        assert!(!looks_like_json("{not json"));
        assert!(!looks_like_json("plain"));
    }
}
