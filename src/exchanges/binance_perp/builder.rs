use crate::core::config::{ChannelConfig, CredentialProvider, ExchangeConfig};
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReqwestRest, RestClientBuilder, RestClientConfig, TungsteniteWs};
use crate::exchanges::binance_perp::{
    connector::BinancePerpConnector, market_channel::MarketDataChannel,
    signer::BinancePerpSigner, trading_channel::TradingChannel,
};
use std::sync::Arc;

const EXCHANGE_NAME: &str = "binance_perp";

/// Resolved endpoints for one environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub rest: String,
    pub trading_ws: String,
    pub market_ws: String,
}

impl Endpoints {
    pub fn for_config(config: &ExchangeConfig) -> Self {
        if config.testnet {
            Self {
                rest: "https://testnet.binancefuture.com".to_string(),
                trading_ws: "wss://testnet.binancefuture.com/ws-fapi/v1".to_string(),
                market_ws: "wss://stream.binancefuture.com/ws".to_string(),
            }
        } else {
            Self {
                rest: config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://fapi.binance.com".to_string()),
                trading_ws: "wss://ws-fapi.binance.com/ws-fapi/v1".to_string(),
                market_ws: "wss://fstream.binance.com/ws".to_string(),
            }
        }
    }
}

/// Build a connector whose credentials come from the exchange config
///
/// Must be called inside a tokio runtime: the channel driver tasks are
/// spawned here.
pub fn build_connector(
    config: ExchangeConfig,
) -> Result<BinancePerpConnector<ReqwestRest>, ExchangeError> {
    build_connector_with(config, ChannelConfig::default())
}

pub fn build_connector_with(
    config: ExchangeConfig,
    channels: ChannelConfig,
) -> Result<BinancePerpConnector<ReqwestRest>, ExchangeError> {
    let endpoints = Endpoints::for_config(&config);
    let credentials: Arc<dyn CredentialProvider> = Arc::new(config);
    build_connector_with_credentials(&endpoints, credentials, channels)
}

/// Build a connector with an explicit credential source, e.g. one that reads
/// the environment on every call
pub fn build_connector_with_credentials(
    endpoints: &Endpoints,
    credentials: Arc<dyn CredentialProvider>,
    channels: ChannelConfig,
) -> Result<BinancePerpConnector<ReqwestRest>, ExchangeError> {
    let rest_config = RestClientConfig::new(endpoints.rest.clone(), EXCHANGE_NAME.to_string())
        .with_timeout(30);
    let signer = Arc::new(BinancePerpSigner::new(
        credentials.clone(),
        channels.recv_window,
    ));
    let rest = RestClientBuilder::new(rest_config)
        .with_signer(signer)
        .build()?;

    let trading = TradingChannel::spawn(
        Arc::new(TungsteniteWs::new(
            endpoints.trading_ws.clone(),
            EXCHANGE_NAME.to_string(),
        )),
        credentials,
        &channels,
    );
    let market = MarketDataChannel::spawn(
        Arc::new(TungsteniteWs::new(
            endpoints.market_ws.clone(),
            EXCHANGE_NAME.to_string(),
        )),
        &channels,
    );

    Ok(BinancePerpConnector::new(rest, trading, market))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::MarketDataSource;

    #[test]
    fn test_mainnet_endpoints() {
        let endpoints = Endpoints::for_config(&ExchangeConfig::read_only());
        assert_eq!(endpoints.rest, "https://fapi.binance.com");
        assert_eq!(endpoints.trading_ws, "wss://ws-fapi.binance.com/ws-fapi/v1");
        assert_eq!(endpoints.market_ws, "wss://fstream.binance.com/ws");
    }

    #[test]
    fn test_testnet_endpoints() {
        let config = ExchangeConfig::read_only().testnet(true);
        let endpoints = Endpoints::for_config(&config);
        assert_eq!(endpoints.rest, "https://testnet.binancefuture.com");
        assert_eq!(
            endpoints.trading_ws,
            "wss://testnet.binancefuture.com/ws-fapi/v1"
        );
        assert_eq!(endpoints.market_ws, "wss://stream.binancefuture.com/ws");
    }

    #[test]
    fn test_base_url_override() {
        let config =
            ExchangeConfig::read_only().base_url("http://localhost:8080".to_string());
        assert_eq!(
            Endpoints::for_config(&config).rest,
            "http://localhost:8080"
        );
    }

    #[tokio::test]
    async fn test_build_starts_disconnected() {
        let connector =
            build_connector(ExchangeConfig::new("key".to_string(), "secret".to_string())).unwrap();
        assert!(!connector.trading_status().is_connected());
        assert!(connector.list_active_subscriptions().await.is_empty());
    }
}
