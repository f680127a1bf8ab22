//! Error taxonomy shared by the argument facade and the notification encoder.
//!
//! Two tiers:
//! - [`EnvelopeError`]: the envelope could not be decoded at all. Nothing is
//!   returned; the invocation cannot proceed.
//! - [`PluginError`]: a single query or host call failed. Each variant
//!   carries a stable numeric code that crosses the host boundary.
//!
//! Codes are a wire contract and must never be renumbered.

use thiserror::Error;

use crate::host::HostError;

/// Failures scoped to one facade query or notification request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("Symbol {0} not found")]
    SymbolNotFound(String),

    #[error("Source {0} not found")]
    SourceNotFound(String),

    #[error("Ticker {0} not found")]
    TickerNotFound(String),

    #[error("Call argument {0} not found")]
    CallArgumentNotFound(String),

    #[error("Failed to parse call argument {0}")]
    CallArgumentParse(String),

    #[error("Failed to schedule webhook to {0}")]
    Webhook(String),

    #[error("Failed to schedule email to {0}")]
    Email(String),
}

impl PluginError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SymbolNotFound(_) => ErrorKind::SymbolNotFound,
            Self::SourceNotFound(_) => ErrorKind::SourceNotFound,
            Self::TickerNotFound(_) => ErrorKind::TickerNotFound,
            Self::CallArgumentNotFound(_) => ErrorKind::CallArgumentNotFound,
            Self::CallArgumentParse(_) => ErrorKind::CallArgumentParse,
            Self::Webhook(_) => ErrorKind::Webhook,
            Self::Email(_) => ErrorKind::Email,
        }
    }

    /// Stable wire code (1–7).
    pub fn code(&self) -> i32 {
        self.kind().code()
    }
}

/// Fieldless mirror of [`PluginError`], one discriminant per wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorKind {
    SymbolNotFound = 1,
    SourceNotFound = 2,
    TickerNotFound = 3,
    CallArgumentNotFound = 4,
    CallArgumentParse = 5,
    Webhook = 6,
    Email = 7,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::SymbolNotFound,
        ErrorKind::SourceNotFound,
        ErrorKind::TickerNotFound,
        ErrorKind::CallArgumentNotFound,
        ErrorKind::CallArgumentParse,
        ErrorKind::Webhook,
        ErrorKind::Email,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }
}

/// The envelope could not be turned into `FunctionArgs`.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The input is not syntactically valid JSON.
    #[error("envelope is not valid JSON: {0}")]
    Syntax(#[source] serde_json::Error),

    /// Valid JSON, but not shaped like an envelope.
    #[error("malformed envelope: {0}")]
    Shape(#[source] serde_json::Error),

    #[error("could not read envelope from host: {0}")]
    Host(#[from] HostError),
}

impl EnvelopeError {
    /// Sort a `serde_json` failure into the syntax or shape tier.
    pub(crate) fn from_json(err: serde_json::Error) -> Self {
        use serde_json::error::Category;
        match err.classify() {
            Category::Syntax | Category::Eof | Category::Io => Self::Syntax(err),
            Category::Data => Self::Shape(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(PluginError::SymbolNotFound("x".into()).code(), 1);
        assert_eq!(PluginError::SourceNotFound("x".into()).code(), 2);
        assert_eq!(PluginError::TickerNotFound("x".into()).code(), 3);
        assert_eq!(PluginError::CallArgumentNotFound("x".into()).code(), 4);
        assert_eq!(PluginError::CallArgumentParse("x".into()).code(), 5);
        assert_eq!(PluginError::Webhook("x".into()).code(), 6);
        assert_eq!(PluginError::Email("x".into()).code(), 7);
    }

    #[test]
    fn kind_roundtrips_through_code() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code(0), None);
        assert_eq!(ErrorKind::from_code(8), None);
    }

    #[test]
    fn messages_name_the_key() {
        assert_eq!(
            PluginError::SymbolNotFound("BTCUSD".into()).to_string(),
            "Symbol BTCUSD not found"
        );
        assert_eq!(
            PluginError::CallArgumentParse("limit".into()).to_string(),
            "Failed to parse call argument limit"
        );
    }

    #[test]
    fn json_failures_are_tiered() {
        let syntax = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(EnvelopeError::from_json(syntax), EnvelopeError::Syntax(_)));

        let shape = serde_json::from_str::<Vec<u8>>("{}").unwrap_err();
        assert!(matches!(EnvelopeError::from_json(shape), EnvelopeError::Shape(_)));
    }
}
