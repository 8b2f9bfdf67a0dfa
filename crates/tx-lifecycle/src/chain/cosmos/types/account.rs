use core::fmt;

use ibc_proto::cosmos::auth::v1beta1::BaseAccount;

/// On-chain account number and the sequence the signer's next transaction
/// must carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub number: AccountNumber,
    pub sequence: AccountSequence,
}

impl Account {
    pub fn new(number: u64, sequence: u64) -> Self {
        Self {
            number: AccountNumber(number),
            sequence: AccountSequence(sequence),
        }
    }

    /// Record that a transaction signed with the current sequence passed
    /// CheckTx. The node now expects the following one.
    pub fn record_accepted(&mut self) {
        self.sequence = AccountSequence(self.sequence.0 + 1);
    }
}

impl From<BaseAccount> for Account {
    fn from(account: BaseAccount) -> Self {
        Self::new(account.account_number, account.sequence)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct AccountNumber(u64);

impl AccountNumber {
    pub fn new(number: u64) -> Self {
        Self(number)
    }

    pub fn to_u64(self) -> u64 {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct AccountSequence(u64);

impl AccountSequence {
    pub fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    pub fn to_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for AccountSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_broadcast_advances_sequence_only() {
        let mut account = Account::from(BaseAccount {
            address: "cosmos1signer".to_string(),
            pub_key: None,
            account_number: 12,
            sequence: 4,
        });

        account.record_accepted();
        account.record_accepted();

        assert_eq!(account, Account::new(12, 6));
        assert_eq!(account.sequence.to_string(), "6");
    }
}
