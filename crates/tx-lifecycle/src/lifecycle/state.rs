use core::fmt::{Display, Error as FmtError, Formatter};

use serde_derive::{Deserialize, Serialize};

/// Stage of a submission, from message assembly to indexer confirmation.
///
/// States only ever advance to their direct successor, or to [`Failed`].
///
/// [`Failed`]: TxLifecycleState::Failed
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxLifecycleState {
    Initial,
    Estimating,
    Signing,
    Submitted,
    ConfirmedOnChain,
    ConfirmedByIndexer,
    Finalized,
    Failed,
}

impl TxLifecycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Failed)
    }

    pub fn successor(self) -> Option<Self> {
        match self {
            Self::Initial => Some(Self::Estimating),
            Self::Estimating => Some(Self::Signing),
            Self::Signing => Some(Self::Submitted),
            Self::Submitted => Some(Self::ConfirmedOnChain),
            Self::ConfirmedOnChain => Some(Self::ConfirmedByIndexer),
            Self::ConfirmedByIndexer => Some(Self::Finalized),
            Self::Finalized | Self::Failed => None,
        }
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }

        next == Self::Failed || self.successor() == Some(next)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Estimating => "estimating",
            Self::Signing => "signing",
            Self::Submitted => "submitted",
            Self::ConfirmedOnChain => "confirmed_on_chain",
            Self::ConfirmedByIndexer => "confirmed_by_indexer",
            Self::Finalized => "finalized",
            Self::Failed => "failed",
        }
    }
}

impl Display for TxLifecycleState {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        write!(f, "{}", self.as_str())
    }
}
