// =============================================================================
// Central Application State — Stock Analyser
// =============================================================================
//
// One `Arc<AppState>` is built in `main` and handed to every request handler
// through axum's `State` extractor. Handlers never reach for globals: the
// session, the instrument directory and both remote clients all live here.
//
// Thread safety:
//   - SessionStore and InstrumentDirectory guard their slots with
//     parking_lot locks.
//   - Remote clients are shared behind `Arc<dyn ...>` trait objects.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use crate::analysis::CompletionClient;
use crate::api::pages::Pages;
use crate::config::AppConfig;
use crate::error::RefreshError;
use crate::instruments::InstrumentDirectory;
use crate::kite::BrokerGateway;
use crate::session::SessionStore;

pub struct AppState {
    // ── Configuration ───────────────────────────────────────────────────
    pub config: AppConfig,

    // ── Session & instruments ───────────────────────────────────────────
    pub session: SessionStore,
    pub directory: InstrumentDirectory,

    // ── Remote services ─────────────────────────────────────────────────
    pub broker: Arc<dyn BrokerGateway>,
    pub completion: Arc<dyn CompletionClient>,

    // ── Rendering ───────────────────────────────────────────────────────
    pub pages: Pages,

    /// Instant the process started. Used for uptime in `/health`.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        broker: Arc<dyn BrokerGateway>,
        completion: Arc<dyn CompletionClient>,
    ) -> anyhow::Result<Self> {
        let pages = Pages::new()?;
        let directory = InstrumentDirectory::new(config.exchange.clone());

        Ok(Self {
            config,
            session: SessionStore::new(),
            directory,
            broker,
            completion,
            pages,
            start_time: Instant::now(),
        })
    }

    /// Reload the instrument directory using whatever session is current.
    pub async fn refresh_instruments(&self) -> Result<usize, RefreshError> {
        let token = self.session.token();
        self.directory
            .refresh(self.broker.as_ref(), token.as_deref())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubBroker, StubCompletion};
    use crate::types::{AuthState, Instrument};

    fn state(broker: StubBroker) -> AppState {
        AppState::new(
            AppConfig::default(),
            Arc::new(broker),
            Arc::new(StubCompletion::replying("ok")),
        )
        .unwrap()
    }

    #[test]
    fn starts_empty_and_anonymous() {
        let state = state(StubBroker::new());
        assert_eq!(state.session.auth_state(), AuthState::Anonymous);
        assert!(state.directory.is_empty());
        assert_eq!(state.directory.exchange(), "NSE");
    }

    #[tokio::test]
    async fn refresh_uses_current_session() {
        let state = state(StubBroker::new().with_instruments(vec![Instrument::new("TCS", 111)]));

        let err = state.refresh_instruments().await.unwrap_err();
        assert!(matches!(err, RefreshError::LoginRequired(_)));

        state.session.set("tok1");
        assert_eq!(state.refresh_instruments().await.unwrap(), 1);
        assert_eq!(state.directory.lookup("TCS"), Some(111));
    }
}
