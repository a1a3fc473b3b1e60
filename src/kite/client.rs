// =============================================================================
// Kite Connect REST Client — session exchange, instruments, historical data
// =============================================================================
//
// SECURITY: The API secret is never logged or serialized. It is only used to
// build the SHA-256 checksum sent with the session exchange. Authenticated
// calls carry `Authorization: token <api_key>:<access_token>`.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::config::AppConfig;
use crate::error::BrokerError;
use crate::kite::BrokerGateway;
use crate::types::{Candle, Instrument, Interval};

/// API version header value required by every Kite endpoint.
const KITE_VERSION: &str = "3";

/// Date-time layout the historical endpoint expects for `from` / `to`.
const QUERY_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Kite Connect REST API client.
#[derive(Clone)]
pub struct KiteClient {
    api_key: String,
    api_secret: String,
    base_url: String,
    login_base: String,
    client: reqwest::Client,
}

impl KiteClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a new `KiteClient`.
    ///
    /// # Arguments
    /// * `api_key`    — Kite Connect app key (sent with every request).
    /// * `api_secret` — app secret, used exclusively for the session checksum.
    /// * `base_url`   — REST root, normally `https://api.kite.trade`.
    /// * `login_base` — hosted login page root.
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        base_url: impl Into<String>,
        login_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BrokerError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert("X-Kite-Version", HeaderValue::from_static(KITE_VERSION));

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()?;

        let base_url: String = base_url.into();
        debug!(base_url = %base_url, "KiteClient initialised");

        Ok(Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            login_base: login_base.into(),
            client,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, BrokerError> {
        Self::new(
            config.credentials.kite_api_key.clone(),
            config.credentials.kite_api_secret.clone(),
            config.kite_api_base.clone(),
            config.kite_login_base.clone(),
            Duration::from_secs(config.broker_timeout_secs),
        )
    }

    // -------------------------------------------------------------------------
    // Signing helpers
    // -------------------------------------------------------------------------

    /// Hex SHA-256 of `api_key + request_token + api_secret`.
    pub fn checksum(&self, request_token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.api_key.as_bytes());
        hasher.update(request_token.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn auth_header(&self, access_token: &str) -> String {
        format!("token {}:{}", self.api_key, access_token)
    }

    // -------------------------------------------------------------------------
    // Response handling
    // -------------------------------------------------------------------------

    /// Read a JSON envelope (`{"status": "success", "data": ...}`) and return
    /// its `data` member, or the broker's error as `Rejected`.
    async fn read_envelope(
        resp: reqwest::Response,
        what: &str,
    ) -> Result<serde_json::Value, BrokerError> {
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(Self::rejection(status.as_u16(), &text));
        }

        let mut body: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| BrokerError::Malformed(format!("{what}: {e}")))?;

        if body["status"].as_str() == Some("error") {
            return Err(Self::rejection(status.as_u16(), &text));
        }

        match body.get_mut("data") {
            Some(data) => Ok(data.take()),
            None => Err(BrokerError::Malformed(format!("{what}: missing 'data'"))),
        }
    }

    /// Build a `Rejected` error from a non-success body, which may or may not
    /// be the broker's JSON error envelope.
    fn rejection(status: u16, body: &str) -> BrokerError {
        let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
        let message = parsed["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| body.trim().to_string());
        let error_type = parsed["error_type"]
            .as_str()
            .unwrap_or("GeneralException")
            .to_string();
        BrokerError::Rejected {
            status,
            error_type,
            message,
        }
    }
}

#[async_trait]
impl BrokerGateway for KiteClient {
    fn login_url(&self) -> String {
        format!("{}?v={}&api_key={}", self.login_base, KITE_VERSION, self.api_key)
    }

    /// POST /session/token
    #[instrument(skip(self, request_token), name = "kite::exchange")]
    async fn exchange(&self, request_token: &str) -> Result<String, BrokerError> {
        let checksum = self.checksum(request_token);
        let url = format!("{}/session/token", self.base_url);

        let resp = self
            .client
            .post(&url)
            .form(&[
                ("api_key", self.api_key.as_str()),
                ("request_token", request_token),
                ("checksum", checksum.as_str()),
            ])
            .send()
            .await?;

        let data = Self::read_envelope(resp, "session/token").await?;
        let token = data["access_token"]
            .as_str()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BrokerError::Malformed("session/token: missing access_token".into()))?;

        debug!(user_id = data["user_id"].as_str().unwrap_or(""), "session token issued");
        Ok(token.to_string())
    }

    /// GET /instruments/<exchange> (CSV dump)
    #[instrument(skip(self, access_token), name = "kite::instruments")]
    async fn instruments(
        &self,
        access_token: Option<&str>,
        exchange: &str,
    ) -> Result<Vec<Instrument>, BrokerError> {
        let url = format!("{}/instruments/{}", self.base_url, exchange);

        let mut req = self.client.get(&url);
        if let Some(token) = access_token {
            req = req.header(AUTHORIZATION, self.auth_header(token));
        }
        let resp = req.send().await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(Self::rejection(status.as_u16(), &text));
        }

        let instruments = parse_instruments_csv(&text)?;
        debug!(exchange, count = instruments.len(), "instruments fetched");
        Ok(instruments)
    }

    /// GET /instruments/historical/<token>/<interval>
    #[instrument(skip(self, access_token), name = "kite::historical_data")]
    async fn historical_data(
        &self,
        access_token: &str,
        instrument_token: u64,
        from: NaiveDateTime,
        to: NaiveDateTime,
        interval: Interval,
    ) -> Result<Vec<Candle>, BrokerError> {
        let url = format!(
            "{}/instruments/historical/{}/{}",
            self.base_url, instrument_token, interval
        );
        let from = from.format(QUERY_DATETIME_FORMAT).to_string();
        let to = to.format(QUERY_DATETIME_FORMAT).to_string();

        let resp = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.auth_header(access_token))
            .query(&[("from", from.as_str()), ("to", to.as_str())])
            .send()
            .await?;

        let data = Self::read_envelope(resp, "historical").await?;
        let candles = parse_candles(&data)?;
        debug!(instrument_token, %interval, count = candles.len(), "candles fetched");
        Ok(candles)
    }
}

impl std::fmt::Debug for KiteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KiteClient")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Body parsers
// -----------------------------------------------------------------------------

/// Parse the instrument dump. Rows that fail to deserialise are skipped.
pub fn parse_instruments_csv(body: &str) -> Result<Vec<Instrument>, BrokerError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| BrokerError::Malformed(format!("instrument csv header: {e}")))?;
    if !headers.iter().any(|h| h == "tradingsymbol") {
        return Err(BrokerError::Malformed(
            "instrument csv has no 'tradingsymbol' column".into(),
        ));
    }

    let mut instruments = Vec::new();
    for (line, row) in reader.deserialize::<Instrument>().enumerate() {
        match row {
            Ok(inst) => instruments.push(inst),
            Err(e) => warn!(line = line + 2, error = %e, "skipping malformed instrument row"),
        }
    }
    Ok(instruments)
}

/// Parse `data.candles` from the historical endpoint.
///
/// Each entry is `[date, open, high, low, close, volume]`, optionally followed
/// by open interest, which is ignored.
pub fn parse_candles(data: &serde_json::Value) -> Result<Vec<Candle>, BrokerError> {
    let raw = data["candles"]
        .as_array()
        .ok_or_else(|| BrokerError::Malformed("historical: 'candles' is not an array".into()))?;

    let mut candles = Vec::with_capacity(raw.len());
    for entry in raw {
        let arr = entry
            .as_array()
            .ok_or_else(|| BrokerError::Malformed("candle entry is not an array".into()))?;
        if arr.len() < 5 {
            return Err(BrokerError::Malformed(format!(
                "candle entry has {} elements",
                arr.len()
            )));
        }

        let date_str = arr[0]
            .as_str()
            .ok_or_else(|| BrokerError::Malformed("candle date is not a string".into()))?;
        let date = DateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S%z")
            .map_err(|e| BrokerError::Malformed(format!("candle date '{date_str}': {e}")))?;

        candles.push(Candle {
            date,
            open: number(&arr[1])?,
            high: number(&arr[2])?,
            low: number(&arr[3])?,
            close: number(&arr[4])?,
            volume: arr.get(5).and_then(|v| v.as_u64()).unwrap_or(0),
        });
    }
    Ok(candles)
}

fn number(val: &serde_json::Value) -> Result<f64, BrokerError> {
    val.as_f64()
        .ok_or_else(|| BrokerError::Malformed(format!("expected number, got: {val}")))
}

// =============================================================================
// Tests
// =============================================================================
