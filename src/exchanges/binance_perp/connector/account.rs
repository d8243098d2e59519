use crate::core::{
    errors::ExchangeError,
    kernel::RestClient,
    traits::{AccountSettings, FundingRateSource},
    types::{FundingRate, LeverageSettings, MarginType},
};
use crate::exchanges::binance_perp::rest::BinancePerpRestClient;
use async_trait::async_trait;
use tracing::instrument;

/// Account settings and funding data, REST only
pub struct Account<R: RestClient> {
    rest: BinancePerpRestClient<R>,
}

impl<R: RestClient> Account<R> {
    pub fn new(rest: &R) -> Self
    where
        R: Clone,
    {
        Self {
            rest: BinancePerpRestClient::new(rest.clone()),
        }
    }
}

#[async_trait]
impl<R: RestClient> AccountSettings for Account<R> {
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    async fn set_leverage(
        &self,
        symbol: String,
        leverage: u32,
    ) -> Result<LeverageSettings, ExchangeError> {
        self.rest.set_leverage(&symbol, leverage).await
    }

    async fn change_position_mode(&self, dual_side: bool) -> Result<(), ExchangeError> {
        self.rest.change_position_mode(dual_side).await
    }

    async fn change_margin_type(
        &self,
        symbol: String,
        margin_type: MarginType,
    ) -> Result<(), ExchangeError> {
        self.rest.change_margin_type(&symbol, margin_type).await
    }
}

#[async_trait]
impl<R: RestClient> FundingRateSource for Account<R> {
    async fn get_funding_rate(&self, symbol: String) -> Result<FundingRate, ExchangeError> {
        self.rest.funding_rate(&symbol).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::binance_perp::connector::testing::MockRest;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_leverage() {
        let rest = MockRest::replying(json!({
            "leverage": 20,
            "maxNotionalValue": "25000000",
            "symbol": "BTCUSDT"
        }));
        let account = Account::new(&rest);

        let settings = account.set_leverage("btcusdt".to_string(), 20).await.unwrap();
        assert_eq!(settings.leverage, 20);

        let request = rest.last_request().unwrap();
        assert_eq!(request.endpoint, "/fapi/v1/leverage");
        assert!(request.authenticated);
        assert_eq!(
            request.params,
            vec![
                ("symbol".to_string(), "BTCUSDT".to_string()),
                ("leverage".to_string(), "20".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_leverage_out_of_range_is_local() {
        let rest = MockRest::replying(json!({}));
        let account = Account::new(&rest);

        let err = account.set_leverage("BTCUSDT".to_string(), 0).await.unwrap_err();
        assert!(matches!(err, ExchangeError::ValidationError(_)));
        assert_eq!(rest.calls(), 0);
    }

    #[tokio::test]
    async fn test_position_mode_rejection() {
        let rest = MockRest::failing(
            -4068,
            "Position side cannot be changed if there exists position.",
        );
        let account = Account::new(&rest);

        let err = account.change_position_mode(true).await.unwrap_err();
        assert!(matches!(err, ExchangeError::PositionModeError(_)));
        assert_eq!(
            rest.last_request().unwrap().params,
            vec![("dualSidePosition".to_string(), "true".to_string())]
        );
    }

    #[tokio::test]
    async fn test_margin_type_isolated_balance() {
        let rest = MockRest::failing(-1000, "Isolated balance insufficient.");
        let account = Account::new(&rest);

        let err = account
            .change_margin_type("BTCUSDT".to_string(), MarginType::Isolated)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::MarginError(_)));
    }

    #[tokio::test]
    async fn test_funding_rate_from_premium_index() {
        let rest = MockRest::replying(json!({
            "symbol": "BTCUSDT",
            "markPrice": "11793.63104562",
            "indexPrice": "11781.80495970",
            "estimatedSettlePrice": "11781.16138815",
            "lastFundingRate": "0.00038246",
            "interestRate": "0.00010000",
            "nextFundingTime": 1597392000000_i64,
            "time": 1597370495002_i64
        }));
        let account = Account::new(&rest);

        let rate = account.get_funding_rate("btcusdt".to_string()).await.unwrap();
        assert_eq!(rate.funding_rate, "0.00038246");
        assert_eq!(rate.next_funding_time, 1_597_392_000_000);

        let request = rest.last_request().unwrap();
        assert_eq!(request.method, reqwest::Method::GET);
        assert!(!request.authenticated);
    }
}
