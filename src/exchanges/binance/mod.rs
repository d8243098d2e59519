// Spot order entry over signed REST
pub mod builder;
pub mod rest;
pub mod types;

pub use builder::{build_spot_client, build_spot_client_with_credentials, spot_rest_url};
pub use rest::BinanceSpotRestClient;
pub use types::BinanceSpotOrderResponse;
