use chrono::NaiveDate;
use thiserror::Error;

/// Error taxonomy shared by the loader, clock, statistics and projector.
///
/// None of these are fatal: the CLI layer picks a fallback or a placeholder
/// for every variant.
#[derive(Debug, Error)]
pub enum CycleError {
    /// Network or file read failure. Callers fall back to the next source.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// Non-positive price, inverted reference dates, zero window width, ...
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    NoMatch(#[from] NoMatch),
}

impl CycleError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::DataUnavailable(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl From<std::io::Error> for CycleError {
    fn from(e: std::io::Error) -> Self {
        Self::DataUnavailable(e.to_string())
    }
}

impl From<csv::Error> for CycleError {
    fn from(e: csv::Error) -> Self {
        Self::DataUnavailable(e.to_string())
    }
}

impl From<reqwest::Error> for CycleError {
    fn from(e: reqwest::Error) -> Self {
        Self::DataUnavailable(e.to_string())
    }
}

/// Reasons the pattern projector produced no overlay. A legitimate empty
/// result, not a failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NoMatch {
    #[error("window half-width must be at least one day")]
    ZeroHalfWidth,

    #[error("current price {0} is not positive")]
    NonPositiveCurrentPrice(f64),

    #[error("window half-width {0} days runs past the supported calendar")]
    HalfWidthOutOfRange(u32),

    #[error("no candidate anchors configured")]
    NoCandidates,

    #[error("no anchor has a full {window}-day window inside the series")]
    InsufficientHistory { window: i64 },

    #[error("price at anchor {anchor} is missing or not positive")]
    NonPositiveAnchorPrice { anchor: NaiveDate },
}

pub type CycleResult<T> = Result<T, CycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_data_unavailable() {
        let err: CycleError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, CycleError::DataUnavailable(_)));
    }

    #[test]
    fn no_match_is_wrapped_transparently() {
        let err: CycleError = NoMatch::InsufficientHistory { window: 61 }.into();
        assert_eq!(
            err.to_string(),
            "no anchor has a full 61-day window inside the series"
        );
    }
}
