use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;

use crate::chain::cosmos::types::account::Account;

pub(crate) type AccountSlot = Arc<AsyncMutex<Option<Account>>>;

/// Cached account per signer address.
///
/// Whoever signs and broadcasts for an address holds its slot from account
/// resolution until the broadcast returns, so submissions from one signer
/// are serialized and each consumes the next sequence number.
#[derive(Default)]
pub(crate) struct AccountSlots {
    slots: Mutex<HashMap<String, AccountSlot>>,
}

impl AccountSlots {
    pub(crate) fn slot(&self, address: &str) -> AccountSlot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

        slots
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone()
    }

    /// Copy of the cached account, waiting for any in-flight submission
    /// from the same signer to release it.
    pub(crate) async fn cached(&self, address: &str) -> Option<Account> {
        self.slot(address).lock().await.clone()
    }
}
