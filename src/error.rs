//! Error types.
//!
//! Ledger failures are classified once, by the ledger adapter, into a
//! [`LedgerErrorKind`]. Everything downstream (retry policy, outcome
//! reporting) branches on that tag and never inspects message text.

use rust_decimal::Decimal;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Failure class assigned by the ledger adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerErrorKind {
    /// Sequencing number already consumed, too low, or the call was
    /// displaced by another transaction with the same nonce.
    Conflict,
    /// Execution reverted, either on submission or in the receipt.
    Reverted,
    /// The node could not be reached or the connection failed mid-call.
    Transport,
    /// Anything else (decoding errors, signer errors, unknown rejections).
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct LedgerError {
    pub kind: LedgerErrorKind,
    pub message: String,
}

impl LedgerError {
    pub fn new(kind: LedgerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(LedgerErrorKind::Conflict, message)
    }

    pub fn reverted(message: impl Into<String>) -> Self {
        Self::new(LedgerErrorKind::Reverted, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(LedgerErrorKind::Transport, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(LedgerErrorKind::Other, message)
    }
}

// ---------------------------------------------------------------------------
// Transaction execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum ExecError {
    #[error("gave up after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: LedgerError },

    #[error("non-retryable ledger failure: {0}")]
    Fatal(LedgerError),
}

impl ExecError {
    /// The ledger error that ended the attempt.
    pub fn cause(&self) -> &LedgerError {
        match self {
            ExecError::RetryExhausted { last, .. } => last,
            ExecError::Fatal(err) => err,
        }
    }
}

// ---------------------------------------------------------------------------
// Swap attempts
// ---------------------------------------------------------------------------

/// Reasons a swap attempt ends as a failure visible to the schedule loop.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("quote unavailable: {0}")]
    QuoteUnavailable(String),

    #[error("approval failed: {0}")]
    ApprovalFailed(#[source] ExecError),

    #[error("approval check failed: {0}")]
    AllowanceUnreadable(#[source] LedgerError),

    #[error("swap execution failed: {0}")]
    Execution(#[source] ExecError),

    #[error("ledger read failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("amount conversion failed: {0}")]
    Units(String),

    #[error(transparent)]
    Range(#[from] RangeError),
}

// ---------------------------------------------------------------------------
// Amount ranges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RangeError {
    #[error("invalid range [{min}, {max}): need min > 0 and max > min")]
    InvalidRange { min: Decimal, max: Decimal },

    #[error("unknown pair: {0}")]
    UnknownPair(String),

    #[error("asset {asset} is not a leg of pair {pair}")]
    UnknownAsset { pair: String, asset: String },
}

// ---------------------------------------------------------------------------
// Operator control
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("invalid operator input: {0}")]
    InvalidOperatorInput(String),

    #[error("a run is already in progress for pair {0}")]
    AlreadyRunning(String),

    #[error("unknown pair: {0}")]
    UnknownPair(String),

    #[error("controller busy: {0}")]
    Busy(String),

    #[error("wallet refresh failed: {0}")]
    Refresh(#[from] LedgerError),

    #[error(transparent)]
    Range(#[from] RangeError),
}
