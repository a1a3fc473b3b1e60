// In-process stand-ins for the broker and completion APIs.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use parking_lot::Mutex;

use crate::analysis::CompletionClient;
use crate::error::{BrokerError, CompletionError};
use crate::kite::BrokerGateway;
use crate::types::{Candle, Instrument, Interval};

fn rejected(status: u16, error_type: &str, message: &str) -> BrokerError {
    BrokerError::Rejected {
        status,
        error_type: error_type.to_string(),
        message: message.to_string(),
    }
}

pub struct StubBroker {
    request_token: String,
    access_token: String,
    instruments: Vec<Instrument>,
    candles: Vec<Candle>,
    offline: bool,
    instruments_offline: bool,
    pub exchange_calls: AtomicUsize,
    pub historical_calls: AtomicUsize,
    pub last_historical: Mutex<Option<(String, u64, NaiveDateTime, NaiveDateTime, Interval)>>,
}

impl StubBroker {
    /// Accepts request token `abc123` and issues `tok1`.
    pub fn new() -> Self {
        Self {
            request_token: "abc123".to_string(),
            access_token: "tok1".to_string(),
            instruments: Vec::new(),
            candles: Vec::new(),
            offline: false,
            instruments_offline: false,
            exchange_calls: AtomicUsize::new(0),
            historical_calls: AtomicUsize::new(0),
            last_historical: Mutex::new(None),
        }
    }

    pub fn with_instruments(mut self, instruments: Vec<Instrument>) -> Self {
        self.instruments = instruments;
        self
    }

    pub fn with_candles(mut self, candles: Vec<Candle>) -> Self {
        self.candles = candles;
        self
    }

    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Token exchange still works; instrument dumps fail.
    pub fn instruments_offline(mut self) -> Self {
        self.instruments_offline = true;
        self
    }

    pub fn remote_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst) + self.historical_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrokerGateway for StubBroker {
    fn login_url(&self) -> String {
        "https://broker.test/connect/login?v=3&api_key=test".to_string()
    }

    async fn exchange(&self, request_token: &str) -> Result<String, BrokerError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            return Err(rejected(502, "NetworkException", "gateway down"));
        }
        if request_token != self.request_token {
            return Err(rejected(403, "TokenException", "Token is invalid or has expired."));
        }
        Ok(self.access_token.clone())
    }

    async fn instruments(
        &self,
        access_token: Option<&str>,
        _exchange: &str,
    ) -> Result<Vec<Instrument>, BrokerError> {
        if self.offline || self.instruments_offline {
            return Err(rejected(502, "NetworkException", "gateway down"));
        }
        match access_token {
            Some(t) if t == self.access_token => Ok(self.instruments.clone()),
            _ => Err(rejected(403, "TokenException", "Incorrect `api_key` or `access_token`.")),
        }
    }

    async fn historical_data(
        &self,
        access_token: &str,
        instrument_token: u64,
        from: NaiveDateTime,
        to: NaiveDateTime,
        interval: Interval,
    ) -> Result<Vec<Candle>, BrokerError> {
        self.historical_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_historical.lock() =
            Some((access_token.to_string(), instrument_token, from, to, interval));
        if self.offline {
            return Err(rejected(502, "NetworkException", "gateway down"));
        }
        Ok(self.candles.clone())
    }
}

pub struct StubCompletion {
    reply: Option<String>,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<(String, String)>>,
}

impl StubCompletion {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }
}

#[async_trait]
impl CompletionClient for StubCompletion {
    async fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some((system.to_string(), user.to_string()));
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(CompletionError::Rejected {
                status: 429,
                message: "quota exceeded".to_string(),
            }),
        }
    }
}

/// `"2024-01-02T00:00:00+0530"`-style candle for tests.
pub fn candle(date: &str, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle {
        date: chrono::DateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S%z")
            .expect("test candle date"),
        open,
        high,
        low,
        close,
        volume: 0,
    }
}
