use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::Signer;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, trace};

/// HTTP seam used by the venue REST wrappers.
///
/// Parameters always travel in the query string, which is what the futures
/// API expects for signed calls of every method. Implementations sign when
/// `authenticated` is set.
#[async_trait]
pub trait RestClient: Send + Sync {
    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<T, ExchangeError>;

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<T, ExchangeError> {
        self.request_json(Method::GET, endpoint, params, authenticated)
            .await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<T, ExchangeError> {
        self.request_json(Method::POST, endpoint, params, authenticated)
            .await
    }

    async fn delete_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<T, ExchangeError> {
        self.request_json(Method::DELETE, endpoint, params, authenticated)
            .await
    }
}

#[derive(Clone, Debug)]
pub struct RestClientConfig {
    pub base_url: String,
    /// Recorded on every request span
    pub exchange_name: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl RestClientConfig {
    pub fn new(base_url: String, exchange_name: String) -> Self {
        Self {
            base_url,
            exchange_name,
            timeout: Duration::from_secs(30),
            user_agent: concat!("binance-bridge/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout = Duration::from_secs(timeout_seconds);
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

pub struct RestClientBuilder {
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
}

impl RestClientBuilder {
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            config,
            signer: None,
        }
    }

    /// Required for any call made with `authenticated = true`
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn build(self) -> Result<ReqwestRest, ExchangeError> {
        let client = Client::builder()
            .timeout(self.config.timeout)
            .user_agent(&self.config.user_agent)
            .build()
            .map_err(|e| {
                ExchangeError::TransportError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(ReqwestRest {
            client,
            config: self.config,
            signer: self.signer,
        })
    }
}

/// `{code, msg}` body the futures API returns with a non-2xx status
#[derive(Debug, Deserialize)]
struct RejectionBody {
    code: i32,
    msg: String,
}

#[derive(Clone)]
pub struct ReqwestRest {
    client: Client,
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
}

impl std::fmt::Debug for ReqwestRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRest")
            .field("config", &self.config)
            .field("has_signer", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

impl ReqwestRest {
    pub fn config(&self) -> &RestClientConfig {
        &self.config
    }

    fn url(&self, endpoint: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}{}", self.config.base_url, endpoint)
        } else {
            format!("{}{}?{}", self.config.base_url, endpoint, query)
        }
    }

    /// Signed query string plus the headers that go with it
    fn signed_query(
        &self,
        method: &Method,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<(String, HashMap<String, String>), ExchangeError> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            ExchangeError::AuthError("Authentication required but no signer provided".to_string())
        })?;
        let timestamp = u64::try_from(chrono::Utc::now().timestamp_millis())
            .map_err(|e| ExchangeError::AuthError(format!("Clock before epoch: {}", e)))?;
        let (headers, signed) = signer.sign_request(method.as_str(), endpoint, params, timestamp)?;
        Ok((encode_query(&signed), headers))
    }
}

/// Joins pairs in the order given. Signed lists arrive sorted, so the wire
/// bytes are the signed bytes.
fn encode_query<K: AsRef<str>, V: AsRef<str>>(params: &[(K, V)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref()))
        .collect::<Vec<_>>()
        .join("&")
}

fn decode_body<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, ExchangeError> {
    if status.is_success() {
        return Ok(serde_json::from_str(body)?);
    }
    Err(match serde_json::from_str::<RejectionBody>(body) {
        Ok(rejection) => ExchangeError::ApiError {
            code: rejection.code,
            message: rejection.msg,
        },
        Err(_) => ExchangeError::ApiError {
            code: i32::from(status.as_u16()),
            message: body.to_string(),
        },
    })
}

#[async_trait]
impl RestClient for ReqwestRest {
    #[instrument(skip(self, params), fields(exchange = %self.config.exchange_name))]
    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<T, ExchangeError> {
        let (query, headers) = if authenticated {
            self.signed_query(&method, endpoint, params)?
        } else {
            (encode_query(params), HashMap::new())
        };

        let mut request = self.client.request(method, self.url(endpoint, &query));
        for (key, value) in headers {
            request = request.header(key, value);
        }

        // anything that stops the exchange from answering counts as transport
        let response = request
            .send()
            .await
            .map_err(|e| ExchangeError::TransportError(format!("Request failed: {}", e)))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ExchangeError::TransportError(format!("Failed to read response body: {}", e))
        })?;
        trace!(%status, %body, "response");

        decode_body(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_query_keeps_given_order() {
        let params = [("timestamp", "1"), ("symbol", "BTCUSDT"), ("signature", "ab")];
        assert_eq!(
            encode_query(&params),
            "timestamp=1&symbol=BTCUSDT&signature=ab"
        );
    }

    #[test]
    fn test_url() {
        let rest = RestClientBuilder::new(RestClientConfig::new(
            "https://fapi.binance.com".to_string(),
            "binance_perp".to_string(),
        ))
        .build()
        .unwrap();

        assert_eq!(
            rest.url("/fapi/v1/premiumIndex", ""),
            "https://fapi.binance.com/fapi/v1/premiumIndex"
        );
        assert_eq!(
            rest.url("/fapi/v1/premiumIndex", "symbol=BTCUSDT"),
            "https://fapi.binance.com/fapi/v1/premiumIndex?symbol=BTCUSDT"
        );
    }

    #[test]
    fn test_rejection_body_becomes_api_error() {
        let err = decode_body::<Value>(
            StatusCode::BAD_REQUEST,
            r#"{"code":-2019,"msg":"Margin is insufficient."}"#,
        )
        .unwrap_err();
        match err {
            ExchangeError::ApiError { code, message } => {
                assert_eq!(code, -2019);
                assert_eq!(message, "Margin is insufficient.");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unstructured_failure_keeps_status() {
        let err = decode_body::<Value>(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>")
            .unwrap_err();
        assert!(matches!(err, ExchangeError::ApiError { code: 502, .. }));
    }

    #[tokio::test]
    async fn test_authenticated_call_without_signer() {
        let rest = RestClientBuilder::new(RestClientConfig::new(
            "http://127.0.0.1:9".to_string(),
            "binance_perp".to_string(),
        ))
        .build()
        .unwrap();

        let err = rest
            .post_json::<Value>("/fapi/v1/order", &[("symbol", "BTCUSDT")], true)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::AuthError(_)));
    }
}
