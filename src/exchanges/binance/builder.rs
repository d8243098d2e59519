use crate::core::config::{CredentialProvider, ExchangeConfig};
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReqwestRest, RestClientBuilder, RestClientConfig};
use crate::exchanges::binance::rest::BinanceSpotRestClient;
use crate::exchanges::binance_perp::signer::BinancePerpSigner;
use std::sync::Arc;

const EXCHANGE_NAME: &str = "binance";

/// Spot REST host. `base_url` only overrides the futures host and is ignored
/// here.
pub fn spot_rest_url(config: &ExchangeConfig) -> &'static str {
    if config.testnet {
        "https://testnet.binance.vision"
    } else {
        "https://api.binance.com"
    }
}

/// Build a spot order client whose credentials come from the exchange config
pub fn build_spot_client(
    config: ExchangeConfig,
) -> Result<BinanceSpotRestClient<ReqwestRest>, ExchangeError> {
    let base_url = spot_rest_url(&config).to_string();
    build_spot_client_with_credentials(base_url, Arc::new(config), None)
}

/// Spot and futures share the HMAC query signing scheme, so the futures REST
/// signer is reused as is.
pub fn build_spot_client_with_credentials(
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
    recv_window: Option<u64>,
) -> Result<BinanceSpotRestClient<ReqwestRest>, ExchangeError> {
    let rest = RestClientBuilder::new(
        RestClientConfig::new(base_url, EXCHANGE_NAME.to_string()).with_timeout(30),
    )
    .with_signer(Arc::new(BinancePerpSigner::new(credentials, recv_window)))
    .build()?;
    Ok(BinanceSpotRestClient::new(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spot_hosts() {
        assert_eq!(
            spot_rest_url(&ExchangeConfig::read_only()),
            "https://api.binance.com"
        );
        assert_eq!(
            spot_rest_url(&ExchangeConfig::read_only().testnet(true)),
            "https://testnet.binance.vision"
        );
        let overridden = ExchangeConfig::read_only().base_url("http://localhost:8080".to_string());
        assert_eq!(spot_rest_url(&overridden), "https://api.binance.com");
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_sending() {
        let client = build_spot_client_with_credentials(
            "http://127.0.0.1:9".to_string(),
            Arc::new(ExchangeConfig::read_only()),
            None,
        )
        .unwrap();
        let err = client.cancel_order("BTCUSDT", 1).await.unwrap_err();
        assert!(matches!(err, ExchangeError::AuthError(_)));
    }
}
