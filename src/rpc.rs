use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::GtdbtkError;

/// JSON-RPC 1.1 client for one SDK service (the workspace or a callback module).
#[derive(Clone)]
pub struct JsonRpcClient {
    client: Client,
    url: String,
    service: String,
}

impl JsonRpcClient {
    pub fn new(url: &str, service: &str, token: &str) -> Result<Self, GtdbtkError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kb-gtdbtk/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GtdbtkError::InvalidParameter(err.to_string()))?,
        );
        let mut auth = HeaderValue::from_str(token.trim()).map_err(|_| {
            GtdbtkError::InvalidParameter("token contains invalid characters".to_string())
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        // Callback jobs such as assembly downloads can run for a long time.
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30 * 60))
            .build()
            .map_err(|err| GtdbtkError::RemoteHttp {
                service: service.to_string(),
                message: err.to_string(),
            })?;

        Ok(Self {
            client,
            url: url.to_string(),
            service: service.to_string(),
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Issues a call exactly once. Use for anything that writes.
    pub fn call(&self, method: &str, params: Value) -> Result<Value, GtdbtkError> {
        let full_method = format!("{}.{}", self.service, method);
        debug!(method = %full_method, "rpc call");
        let response = self
            .request(&full_method, &params)
            .send()
            .map_err(|err| self.http_error(err))?;
        self.handle_response(&full_method, response)
    }

    /// Issues a read-only call, retrying transient transport failures.
    pub fn call_idempotent(&self, method: &str, params: Value) -> Result<Value, GtdbtkError> {
        let full_method = format!("{}.{}", self.service, method);
        debug!(method = %full_method, "rpc call");
        let response = self.send_with_retries(|| self.request(&full_method, &params))?;
        self.handle_response(&full_method, response)
    }

    fn request(&self, full_method: &str, params: &Value) -> RequestBuilder {
        let body = json!({
            "version": "1.1",
            "method": full_method,
            "params": [params],
            "id": uuid::Uuid::new_v4().to_string(),
        });
        self.client.post(&self.url).json(&body)
    }

    fn handle_response(&self, full_method: &str, response: Response) -> Result<Value, GtdbtkError> {
        let status = response.status().as_u16();
        let text = response.text().map_err(|err| self.http_error(err))?;
        parse_response(&self.service, full_method, status, &text)
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, GtdbtkError>
    where
        F: FnMut() -> RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(self.http_error(err));
                }
            }
        }
    }

    fn http_error(&self, err: reqwest::Error) -> GtdbtkError {
        GtdbtkError::RemoteHttp {
            service: self.service.clone(),
            message: err.to_string(),
        }
    }
}

/// Maps one JSON-RPC 1.1 response to `result[0]` or a typed error.
///
/// An `error` member wins over the HTTP status, since SDK services answer
/// failed calls with 500 and an error body.
pub fn parse_response(
    service: &str,
    full_method: &str,
    status: u16,
    text: &str,
) -> Result<Value, GtdbtkError> {
    let body: Option<Value> = serde_json::from_str(text).ok();

    if let Some(error) = body.as_ref().and_then(|body| body.get("error")) {
        if !error.is_null() {
            let message = rpc_error_message(error);
            if status == 401 || is_auth_message(&message) {
                return Err(GtdbtkError::Authentication {
                    service: service.to_string(),
                    message,
                });
            }
            return Err(GtdbtkError::RemoteCall {
                method: full_method.to_string(),
                message,
            });
        }
    }

    if status == 401 || status == 403 {
        return Err(GtdbtkError::Authentication {
            service: service.to_string(),
            message: format!("status {status}"),
        });
    }
    if !(200..300).contains(&status) {
        return Err(GtdbtkError::RemoteStatus {
            service: service.to_string(),
            status,
            message: text.to_string(),
        });
    }

    let body = body.ok_or_else(|| GtdbtkError::RemoteCall {
        method: full_method.to_string(),
        message: "response is not valid JSON".to_string(),
    })?;
    Ok(body
        .get("result")
        .and_then(|result| result.as_array())
        .and_then(|result| result.first())
        .cloned()
        .unwrap_or(Value::Null))
}

fn rpc_error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(|value| value.as_str())
        .map(|value| value.to_string())
        .unwrap_or_else(|| error.to_string())
}

/// SDK services report rejected tokens as ordinary JSON-RPC errors.
pub(crate) fn is_auth_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("unauthorized")
        || (lower.contains("token")
            && ["invalid", "expired", "login", "authentication"]
                .iter()
                .any(|needle| lower.contains(needle)))
}

// 500 carries JSON-RPC errors and is never transient.
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
