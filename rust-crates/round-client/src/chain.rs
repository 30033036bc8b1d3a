use crate::{
    abi::{
        self,
        BigOrSmall,
    },
    error::{
        ReadError,
        SubmissionError,
    },
    events::EventSubscription,
    round::{
        Round,
        RoundId,
    },
};
use alloy_primitives::{
    Address,
    B256,
    Bytes,
    U256,
};
use alloy_sol_types::SolCall;

/// Read-only view of the contract.
pub trait ChainReader {
    /// Executes `calldata` against the contract without a transaction.
    fn call(&self, calldata: Bytes) -> impl Future<Output = Result<Bytes, ReadError>>;

    /// Encodes `call`, executes it and decodes the reply against the ABI.
    fn read<C: SolCall>(
        &self,
        call: C,
    ) -> impl Future<Output = Result<C::Return, ReadError>> {
        async move {
            let raw = self.call(Bytes::from(call.abi_encode())).await?;
            C::abi_decode_returns(&raw).map_err(|e| ReadError::Decode {
                context: C::SIGNATURE,
                reason: e.to_string(),
            })
        }
    }

    fn round_info(&self, id: RoundId) -> impl Future<Output = Result<Round, ReadError>> {
        async move {
            let info = self
                .read(BigOrSmall::getRoundInfoCall {
                    roundId: id.as_b256(),
                })
                .await?;
            abi::decode_round(id, info)
        }
    }

    fn min_bet(&self) -> impl Future<Output = Result<U256, ReadError>> {
        self.read(BigOrSmall::MIN_BETCall {})
    }

    fn max_bet(&self) -> impl Future<Output = Result<U256, ReadError>> {
        self.read(BigOrSmall::MAX_BETCall {})
    }
}

/// A contract write, ready to be signed and sent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransactionRequest {
    pub data: Bytes,
    pub value: U256,
}

impl TransactionRequest {
    pub fn new<C: SolCall>(call: &C) -> Self {
        Self {
            data: Bytes::from(call.abi_encode()),
            value: U256::ZERO,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransactionReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

pub trait PendingTransaction {
    fn tx_hash(&self) -> B256;

    /// Resolves once the transaction is mined. There is no timeout: a sent
    /// transaction cannot be cancelled, so the only honest answer is to wait.
    fn await_confirmation(
        self,
    ) -> impl Future<Output = Result<TransactionReceipt, SubmissionError>>;
}

/// Signs and sends contract writes on behalf of the connected wallet.
pub trait TransactionSubmitter {
    type Pending: PendingTransaction;

    /// The sending account, `None` when no wallet is connected.
    fn account(&self) -> Option<Address>;

    fn submit(
        &self,
        request: TransactionRequest,
    ) -> impl Future<Output = Result<Self::Pending, SubmissionError>>;
}

/// Source of `Revealed` notifications.
pub trait EventWatcher {
    /// Starts delivering `Revealed` events, optionally only those for `round`.
    fn watch_revealed(
        &self,
        round: Option<RoundId>,
    ) -> Result<EventSubscription, ReadError>;
}

/// Ciphertext handle plus validity proof for one plaintext input.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EncryptedInput {
    pub handle: Bytes,
    pub proof: Bytes,
}

/// External encryption service that hides the dice face from the chain.
pub trait EncryptedInputBuilder {
    fn is_ready(&self) -> bool;

    fn encrypt_u8(
        &self,
        contract: Address,
        user: Address,
        value: u8,
    ) -> impl Future<Output = Result<EncryptedInput, SubmissionError>>;
}

/// Placeholder for deployments that use the on-chain dice model.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoEncryption;

impl EncryptedInputBuilder for NoEncryption {
    fn is_ready(&self) -> bool {
        false
    }

    async fn encrypt_u8(
        &self,
        _contract: Address,
        _user: Address,
        _value: u8,
    ) -> Result<EncryptedInput, SubmissionError> {
        Err(SubmissionError::Encryption(
            "no encryption service configured".to_string(),
        ))
    }
}
