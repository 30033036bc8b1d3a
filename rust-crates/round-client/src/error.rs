use crate::round::{
    ActionState,
    format_eth,
};
use alloy_primitives::{
    B256,
    U256,
};
use thiserror::Error;

/// Error type for round lifecycle operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("another action is in flight ({0})")]
    Busy(ActionState),
}

/// Result type for round lifecycle operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Fatal to the attempted action; nothing was sent to the chain.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ConfigurationError {
    #[error("Missing contract address")]
    MissingContract,
    #[error("Secure random generator unavailable: {0}")]
    RandomnessUnavailable(String),
    #[error("Connect wallet to play.")]
    WalletNotConnected,
    #[error("Encryption service not ready")]
    EncryptionNotReady,
}

/// Rejected locally before any chain call.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ValidationError {
    #[error("Bet must be at least {} ETH.", format_eth(.min))]
    StakeBelowMinimum { stake: U256, min: U256 },
    #[error("Bet must be at most {} ETH.", format_eth(.max))]
    StakeAboveMaximum { stake: U256, max: U256 },
    #[error("Invalid stake amount '{0}'")]
    InvalidStake(String),
    #[error("Stake must be greater than zero")]
    NonPositiveStake,
    #[error("Malformed round id '{0}': expected 0x followed by 64 hex digits")]
    MalformedRoundId(String),
    #[error("Invalid choice '{0}': expected small or big")]
    InvalidChoice(String),
    #[error("Start a game first.")]
    NoCurrentRound,
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum SubmissionError {
    #[error("Transaction rejected: {0}")]
    Rejected(String),
    #[error("Transaction {0} reverted")]
    Reverted(B256),
    #[error("Waiting for confirmation failed: {0}")]
    ConfirmationFailed(String),
    #[error("Encrypting input failed: {0}")]
    Encryption(String),
}

/// Read-path failures are logged and never reach the action state machine.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ReadError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("failed to decode {context}: {reason}")]
    Decode {
        context: &'static str,
        reason: String,
    },
}
