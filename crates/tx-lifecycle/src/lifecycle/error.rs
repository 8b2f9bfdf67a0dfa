use core::fmt::{Display, Error as FmtError, Formatter};

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

/// Classification of a failed submission, telling the caller how to react.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionErrorKind {
    /// A caller precondition does not hold, e.g. the signer holds no key for
    /// the address. Fixed by caller action, never retried automatically.
    Generic,
    /// Gas simulation failed. May succeed on retry once the cause clears.
    Estimation,
    /// An invariant required before signing does not hold.
    Validation,
    /// The chain or the indexer rejected the transaction.
    Transaction,
}

impl Display for SubmissionErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::Generic => write!(f, "generic"),
            Self::Estimation => write!(f, "estimation"),
            Self::Validation => write!(f, "validation"),
            Self::Transaction => write!(f, "transaction"),
        }
    }
}

/// The error attached to a [`TxHandle`](crate::lifecycle::TxHandle).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionError {
    pub kind: SubmissionErrorKind,
    pub message: String,
}

impl SubmissionError {
    pub fn new(kind: SubmissionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify `error` raised at `stage`. Errors with an intrinsic kind keep
    /// it, transport-level errors take the kind of the stage.
    pub(crate) fn from_error(stage: Stage, error: &Error) -> Self {
        let kind = error
            .submission_kind()
            .unwrap_or_else(|| stage.default_kind());

        Self::new(kind, error.to_string())
    }
}

impl Display for SubmissionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

impl std::error::Error for SubmissionError {}

/// Where in the pipeline an error surfaced.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Stage {
    Precondition,
    Estimation,
    Signing,
    Confirmation,
}

impl Stage {
    fn default_kind(self) -> SubmissionErrorKind {
        match self {
            Self::Precondition => SubmissionErrorKind::Validation,
            Self::Estimation => SubmissionErrorKind::Estimation,
            Self::Signing | Self::Confirmation => SubmissionErrorKind::Transaction,
        }
    }
}
