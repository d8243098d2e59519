use crate::core::config::{CredentialProvider, Credentials};
use crate::core::errors::ExchangeError;
use crate::core::kernel::{sign_params, SignatureResult, Signer};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// REST request signer. Credentials are read from the provider on every
/// request, so rotated keys take effect without rebuilding the client.
pub struct BinancePerpSigner {
    credentials: Arc<dyn CredentialProvider>,
    recv_window: Option<u64>,
}

impl BinancePerpSigner {
    pub fn new(credentials: Arc<dyn CredentialProvider>, recv_window: Option<u64>) -> Self {
        Self {
            credentials,
            recv_window,
        }
    }
}

impl Signer for BinancePerpSigner {
    fn sign_request(
        &self,
        _method: &str,
        _endpoint: &str,
        params: &[(&str, &str)],
        timestamp: u64,
    ) -> SignatureResult {
        let credentials = self.credentials.get_credentials().ok_or_else(|| {
            ExchangeError::AuthError("API credentials are not configured".to_string())
        })?;

        let mut signed: BTreeMap<String, String> = params
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        signed.insert("timestamp".to_string(), timestamp.to_string());
        if let Some(recv_window) = self.recv_window {
            signed.insert("recvWindow".to_string(), recv_window.to_string());
        }
        let signature = sign_params(&signed, credentials.secret_key())?;

        let mut headers = HashMap::new();
        headers.insert("X-MBX-APIKEY".to_string(), credentials.api_key().to_string());

        let mut query: Vec<(String, String)> = signed.into_iter().collect();
        query.push(("signature".to_string(), signature));

        Ok((headers, query))
    }
}

/// Add `apiKey`, `timestamp` and optional `recvWindow`, then append the
/// signature over the resulting set. Used for socket trading requests.
pub fn sign_ws_params(
    mut params: BTreeMap<String, String>,
    credentials: &Credentials,
    timestamp: i64,
    recv_window: Option<u64>,
) -> Result<BTreeMap<String, String>, ExchangeError> {
    params.insert("apiKey".to_string(), credentials.api_key().to_string());
    params.insert("timestamp".to_string(), timestamp.to_string());
    if let Some(recv_window) = recv_window {
        params.insert("recvWindow".to_string(), recv_window.to_string());
    }
    let signature = sign_params(&params, credentials.secret_key())?;
    params.insert("signature".to_string(), signature);
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kernel::canonical_query;

    struct Fixed(Option<Credentials>);

    impl CredentialProvider for Fixed {
        fn get_credentials(&self) -> Option<Credentials> {
            self.0.clone()
        }
    }

    #[test]
    fn test_rest_signature_covers_sorted_params() {
        let signer = BinancePerpSigner::new(
            Arc::new(Fixed(Some(Credentials::new("key", "secret")))),
            Some(5000),
        );
        let (headers, query) = signer
            .sign_request("POST", "/fapi/v1/order", &[("symbol", "BTCUSDT"), ("side", "BUY")], 1_700_000_000_000)
            .unwrap();

        assert_eq!(headers["X-MBX-APIKEY"], "key");
        let keys: Vec<&str> = query.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["recvWindow", "side", "symbol", "timestamp", "signature"]);

        let unsigned: BTreeMap<String, String> = query[..4].iter().cloned().collect();
        let expected = sign_params(&unsigned, "secret").unwrap();
        assert_eq!(query[4].1, expected);
        assert_eq!(
            canonical_query(&unsigned),
            "recvWindow=5000&side=BUY&symbol=BTCUSDT&timestamp=1700000000000"
        );
    }

    #[test]
    fn test_missing_credentials() {
        let signer = BinancePerpSigner::new(Arc::new(Fixed(None)), None);
        let err = signer
            .sign_request("GET", "/fapi/v1/order", &[], 1)
            .unwrap_err();
        assert!(matches!(err, ExchangeError::AuthError(_)));
    }

    #[test]
    fn test_ws_params_signed_without_signature_field() {
        let creds = Credentials::new("key", "secret");
        let params = BTreeMap::from([("symbol".to_string(), "BTCUSDT".to_string())]);
        let signed = sign_ws_params(params, &creds, 42, None).unwrap();

        assert_eq!(signed["apiKey"], "key");
        assert_eq!(signed["timestamp"], "42");
        let mut unsigned = signed.clone();
        let signature = unsigned.remove("signature").unwrap();
        assert_eq!(signature, sign_params(&unsigned, "secret").unwrap());
    }
}
