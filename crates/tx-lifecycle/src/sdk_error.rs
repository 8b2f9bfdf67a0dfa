use flex_error::define_error;

/// The error "incorrect account sequence" is defined as the unique error code 32 in cosmos-sdk:
/// <https://github.com/cosmos/cosmos-sdk/blob/v0.47.0/types/errors/errors.go#L107-L108>
pub const INCORRECT_ACCOUNT_SEQUENCE_ERR: u32 = 32;

/// Codespace under which the SDK reports the errors mapped below.
pub const SDK_CODESPACE: &str = "sdk";

// Provides diagnostics for errors returned by the cosmos-sdk ante handlers
define_error! {
    SdkError {
        UnknownSdk
            { code: u32 }
            |e| { format!("unknown SDK error: {}", e.code) },

        OtherCodespace
            { codespace: String, code: u32 }
            |e| { format!("error {} from module codespace `{}`", e.code, e.codespace) },

        OutOfGas
            { code: u32 }
            |_| { "the transaction ran out of gas, consider raising `gas_multiplier` in the [chain] configuration".to_string() },

        InsufficientFee
            { code: u32 }
            |_| { "the fee is too low for this node, check `gas_price` and `fee_multiplier` in the [chain] configuration".to_string() },

        InsufficientFunds
            { code: u32 }
            |_| { "the signer account does not hold enough funds to pay for the messages and the fee".to_string() },

        IncorrectAccountSequence
            { code: u32 }
            |_| { "the account sequence used for signing is stale, the cached account will be refreshed on the next attempt".to_string() },

        MempoolFull
            { code: u32 }
            |_| { "the node mempool is full, retry later".to_string() },

        TxInMempoolCache
            { code: u32 }
            |_| { "the same transaction bytes were already submitted to this node".to_string() },

        TxTooLarge
            { code: u32 }
            |_| { "the transaction exceeds the maximum size accepted by the node".to_string() },

        MemoTooLarge
            { code: u32 }
            |_| { "the memo exceeds the maximum length accepted by the chain".to_string() },
    }
}

/// Converts error codes originating from `broadcast_tx_sync` responses and
/// from executed transactions into diagnostics.
/// Cf: <https://github.com/cosmos/cosmos-sdk/blob/v0.47.0/types/errors/errors.go>
pub fn sdk_error_from_tx_code(codespace: &str, code: u32) -> SdkError {
    if !codespace.is_empty() && codespace != SDK_CODESPACE {
        return SdkError::other_codespace(codespace.to_string(), code);
    }

    match code {
        5 => SdkError::insufficient_funds(code),
        11 => SdkError::out_of_gas(code),
        12 => SdkError::memo_too_large(code),
        13 => SdkError::insufficient_fee(code),
        19 => SdkError::tx_in_mempool_cache(code),
        20 => SdkError::mempool_full(code),
        21 => SdkError::tx_too_large(code),
        INCORRECT_ACCOUNT_SEQUENCE_ERR => SdkError::incorrect_account_sequence(code),
        _ => SdkError::unknown_sdk(code),
    }
}
