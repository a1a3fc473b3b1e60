pub mod client;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::BrokerError;
use crate::types::{Candle, Instrument, Interval};

pub use client::KiteClient;

/// Remote broker operations the front door depends on.
///
/// The access token is passed on every authenticated call instead of being
/// stored on the client, so the session store stays the only owner of it.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Hosted login page the user is redirected to.
    fn login_url(&self) -> String;

    /// Trade a one-time request token for an access token.
    async fn exchange(&self, request_token: &str) -> Result<String, BrokerError>;

    /// Full instrument list for one exchange.
    async fn instruments(
        &self,
        access_token: Option<&str>,
        exchange: &str,
    ) -> Result<Vec<Instrument>, BrokerError>;

    /// Candles for `[from, to]`, oldest first. Empty when the range has no data.
    async fn historical_data(
        &self,
        access_token: &str,
        instrument_token: u64,
        from: NaiveDateTime,
        to: NaiveDateTime,
        interval: Interval,
    ) -> Result<Vec<Candle>, BrokerError>;
}
