use crate::core::errors::ExchangeError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::{BTreeMap, HashMap};

type HmacSha256 = Hmac<Sha256>;

/// Result type for signing operations: (headers, `query_params`)
pub type SignatureResult = Result<(HashMap<String, String>, Vec<(String, String)>), ExchangeError>;

/// Signer trait for REST request authentication
///
/// Implementations receive the unsigned request parameters and return the
/// headers plus the complete, ordered parameter list that must be sent.
pub trait Signer: Send + Sync {
    /// Sign a request and return headers and query parameters
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, etc.)
    /// * `endpoint` - API endpoint path
    /// * `params` - Unsigned request parameters
    /// * `timestamp` - Request timestamp in milliseconds
    fn sign_request(
        &self,
        method: &str,
        endpoint: &str,
        params: &[(&str, &str)],
        timestamp: u64,
    ) -> SignatureResult;
}

/// Joins parameters as `key=value` pairs with `&`, in key order.
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// HMAC-SHA256 over the canonical query string, lowercase hex.
///
/// Keys are ordered lexicographically by the map, so the same parameter set
/// always yields the same signature.
pub fn sign_params(params: &BTreeMap<String, String>, secret: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::AuthError(format!("Invalid secret key: {}", e)))?;
    mac.update(canonical_query(params).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
