// =============================================================================
// Instrument Directory — in-memory instrument cache for one exchange
// =============================================================================
//
// The list is swapped wholesale: a refresh either replaces every entry or
// leaves the previous list untouched. Readers clone an `Arc` to the current
// list and never hold the lock while scanning.
// =============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::error::RefreshError;
use crate::kite::BrokerGateway;
use crate::types::Instrument;

/// Hard cap on symbol search results.
pub const MAX_SEARCH_RESULTS: usize = 10;

pub struct InstrumentDirectory {
    exchange: String,
    instruments: RwLock<Arc<Vec<Instrument>>>,
}

impl InstrumentDirectory {
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            instruments: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Fetch the exchange's instrument list and replace the cache.
    ///
    /// Safe to call repeatedly. On failure the previous list is kept.
    pub async fn refresh(
        &self,
        gateway: &dyn BrokerGateway,
        access_token: Option<&str>,
    ) -> Result<usize, RefreshError> {
        match gateway.instruments(access_token, &self.exchange).await {
            Ok(list) => {
                let count = list.len();
                self.replace(list);
                info!(exchange = %self.exchange, count, "instrument directory refreshed");
                Ok(count)
            }
            Err(e) => {
                let err = RefreshError::from(e);
                match &err {
                    RefreshError::LoginRequired(_) => {
                        info!(exchange = %self.exchange, "instrument list needs a broker login first")
                    }
                    RefreshError::Unavailable(msg) => {
                        warn!(exchange = %self.exchange, error = %msg, "instrument refresh failed")
                    }
                }
                Err(err)
            }
        }
    }

    pub fn replace(&self, instruments: Vec<Instrument>) {
        *self.instruments.write() = Arc::new(instruments);
    }

    fn snapshot(&self) -> Arc<Vec<Instrument>> {
        self.instruments.read().clone()
    }

    /// Up to [`MAX_SEARCH_RESULTS`] symbols containing `query`, ignoring case,
    /// in the order the broker listed them.
    pub fn search(&self, query: &str) -> Vec<String> {
        let needle = query.to_uppercase();
        self.snapshot()
            .iter()
            .filter(|inst| inst.tradingsymbol.to_uppercase().contains(&needle))
            .take(MAX_SEARCH_RESULTS)
            .map(|inst| inst.tradingsymbol.clone())
            .collect()
    }

    /// Instrument token for an exact trading symbol.
    pub fn lookup(&self, tradingsymbol: &str) -> Option<u64> {
        self.snapshot()
            .iter()
            .find(|inst| inst.tradingsymbol == tradingsymbol)
            .map(|inst| inst.instrument_token)
    }

    pub fn len(&self) -> usize {
        self.instruments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
