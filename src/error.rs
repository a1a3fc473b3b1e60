// =============================================================================
// Error taxonomy — broker, completion, directory refresh and analysis path
// =============================================================================
//
// Each stage returns its own error enum. The analysis handler maps an
// `AnalysisError` to a user-facing sentence and renders it inline; nothing in
// the analysis path turns into a non-200 status.
// =============================================================================

use thiserror::Error;

/// Failure talking to the broker API.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Request never produced a usable HTTP response.
    #[error("broker request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Broker answered with its error envelope or a non-success status.
    #[error("broker rejected request ({status} {error_type}): {message}")]
    Rejected {
        status: u16,
        error_type: String,
        message: String,
    },

    /// Response body did not have the expected shape.
    #[error("unexpected broker response: {0}")]
    Malformed(String),
}

impl BrokerError {
    /// Whether the broker refused the call for lack of a valid session.
    pub fn is_login_required(&self) -> bool {
        match self {
            Self::Rejected {
                status, error_type, ..
            } => *status == 401 || *status == 403 || error_type == "TokenException",
            _ => false,
        }
    }
}

/// Failure talking to the completion API.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("completion API returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("completion API returned no choices")]
    EmptyResponse,
}

/// Why an instrument refresh did not replace the cache.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// Expected before the first login: the dump needs an access token.
    #[error("instrument list requires login: {0}")]
    LoginRequired(String),

    /// Broker unreachable or returned something unusable.
    #[error("instrument list unavailable: {0}")]
    Unavailable(String),
}

impl From<BrokerError> for RefreshError {
    fn from(err: BrokerError) -> Self {
        if err.is_login_required() {
            Self::LoginRequired(err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}

/// Every way the `/analyse` pipeline can stop early.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no broker session")]
    MissingSession,

    #[error("missing form field '{0}'")]
    MissingField(&'static str),

    #[error("unknown trading symbol '{0}'")]
    InvalidSymbol(String),

    #[error("unsupported timeframe '{0}'")]
    InvalidTimeframe(String),

    #[error("could not parse {field} '{value}', expected YYYY-MM-DD")]
    DateParse { field: &'static str, value: String },

    #[error("end date {end} is before start date {start}")]
    InvalidDateRange { start: String, end: String },

    #[error("no historical data in range")]
    NoHistoricalData,

    #[error("broker authentication failed: {0}")]
    RemoteAuth(#[source] BrokerError),

    #[error("historical data fetch failed: {0}")]
    RemoteData(#[source] BrokerError),

    #[error("analysis request failed: {0}")]
    RemoteCompletion(#[from] CompletionError),
}

impl AnalysisError {
    /// Sentence shown to the user in the result page.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingSession => "You must login first.".to_string(),
            Self::MissingField(field) => format!("Missing form field: {field}."),
            Self::InvalidSymbol(_) => "Invalid stock symbol.".to_string(),
            Self::InvalidTimeframe(tf) => format!("Unsupported timeframe: {tf}."),
            Self::DateParse { field, value } => {
                format!("Invalid {field} '{value}'. Use the YYYY-MM-DD format.")
            }
            Self::InvalidDateRange { .. } => "End date must not be before start date.".to_string(),
            Self::NoHistoricalData => "No historical data found.".to_string(),
            Self::RemoteAuth(e) | Self::RemoteData(e) if e.is_login_required() => {
                "Broker session expired. Please login again.".to_string()
            }
            Self::RemoteAuth(e) | Self::RemoteData(e) => e.to_string(),
            Self::RemoteCompletion(e) => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(status: u16, error_type: &str) -> BrokerError {
        BrokerError::Rejected {
            status,
            error_type: error_type.to_string(),
            message: "nope".to_string(),
        }
    }

    #[test]
    fn token_exception_counts_as_login_required() {
        assert!(rejected(400, "TokenException").is_login_required());
        assert!(rejected(403, "PermissionException").is_login_required());
        assert!(!rejected(500, "NetworkException").is_login_required());
        assert!(!BrokerError::Malformed("x".into()).is_login_required());
    }

    #[test]
    fn refresh_error_splits_login_from_outage() {
        let err: RefreshError = rejected(403, "TokenException").into();
        assert!(matches!(err, RefreshError::LoginRequired(_)));

        let err: RefreshError = rejected(502, "NetworkException").into();
        assert!(matches!(err, RefreshError::Unavailable(_)));
    }

    #[test]
    fn user_messages_for_common_failures() {
        assert_eq!(AnalysisError::MissingSession.user_message(), "You must login first.");
        assert_eq!(
            AnalysisError::InvalidSymbol("FOO".into()).user_message(),
            "Invalid stock symbol."
        );
        assert_eq!(
            AnalysisError::NoHistoricalData.user_message(),
            "No historical data found."
        );
        let msg = AnalysisError::DateParse {
            field: "start_date",
            value: "2024/01/01".into(),
        }
        .user_message();
        assert!(msg.contains("start_date"));
        assert!(msg.contains("YYYY-MM-DD"));
    }

    #[test]
    fn expired_session_has_distinct_message() {
        let err = AnalysisError::RemoteData(rejected(403, "TokenException"));
        assert_eq!(err.user_message(), "Broker session expired. Please login again.");

        let err = AnalysisError::RemoteData(rejected(500, "DataException"));
        assert!(err.user_message().contains("DataException"));
    }
}
