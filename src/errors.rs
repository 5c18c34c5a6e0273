use thiserror::Error;

/// Fatal engine errors.
///
/// Recoverable conditions (a degenerate histogram, a LocalBid run that hits
/// its iteration cap) are handled locally and never surface here; this enum
/// covers only the faults that must abort the round.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    /// A day simulator's settlement step was invoked a second time.
    /// Settling twice would double-charge every winning bundle.
    #[error("bundles already submitted")]
    BundlesAlreadySubmitted,

    /// A bidder was asked for bids before a valuation function was bound.
    /// There is no safe default valuation, so this is raised immediately.
    #[error("no valuation function bound for bidder '{bidder}'")]
    MissingValuation { bidder: String },

    /// A two-day game received a submission for the wrong day
    #[error("expected submission for day {expected}, got day {got}")]
    DayOutOfOrder { expected: u8, got: u8 },

    /// A two-day game received a submission after both days settled
    #[error("game is already finished")]
    GameFinished,
}
