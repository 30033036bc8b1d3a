use crate::{
    abi::{
        BigOrSmall,
        EncryptedBigOrSmall,
    },
    chain::{
        ChainReader,
        EncryptedInputBuilder,
        NoEncryption,
        PendingTransaction,
        TransactionReceipt,
        TransactionRequest,
        TransactionSubmitter,
    },
    config::CommitModel,
    error::{
        ConfigurationError,
        Error,
        Result,
        ValidationError,
    },
    events::{
        EventSubscription,
        RevealedEvent,
    },
    round::{
        ActionState,
        BetBounds,
        Choice,
        Round,
        RoundId,
        format_eth,
        parse_stake,
        secret_dice,
    },
};
use alloy_primitives::Address;
use std::cell::RefCell;
use tracing::{
    debug,
    error,
    info,
    trace,
    warn,
};


#[derive(Clone, Copy, Debug)]
pub struct OrchestratorConfig {
    pub contract: Address,
    pub commit_model: CommitModel,
}

#[derive(Debug, Default)]
struct Session {
    action: ActionState,
    current: Option<RoundId>,
    snapshot: Option<Round>,
    status: String,
    bounds: BetBounds,
    last_revealed: Option<RoundId>,
}

/// Drives one player's rounds through start, bet and reveal.
///
/// All methods take `&self`: the orchestrator is meant to be shared by
/// cooperating tasks on one thread, with at most one action in flight. Session
/// state is never borrowed across an `.await`.
pub struct RoundOrchestrator<Reader, Submitter, Encryptor = NoEncryption> {
    config: OrchestratorConfig,
    reader: Reader,
    submitter: Submitter,
    encryptor: Encryptor,
    session: RefCell<Session>,
}

impl<Reader, Submitter> RoundOrchestrator<Reader, Submitter, NoEncryption> {
    pub fn new(config: OrchestratorConfig, reader: Reader, submitter: Submitter) -> Self {
        Self {
            config,
            reader,
            submitter,
            encryptor: NoEncryption,
            session: RefCell::new(Session::default()),
        }
    }
}

impl<Reader, Submitter, Encryptor> RoundOrchestrator<Reader, Submitter, Encryptor> {
    pub fn with_encryption<E: EncryptedInputBuilder>(
        self,
        encryptor: E,
    ) -> RoundOrchestrator<Reader, Submitter, E> {
        RoundOrchestrator {
            config: self.config,
            reader: self.reader,
            submitter: self.submitter,
            encryptor,
            session: self.session,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn action(&self) -> ActionState {
        self.session.borrow().action
    }

    pub fn current_round(&self) -> Option<RoundId> {
        self.session.borrow().current
    }

    pub fn snapshot(&self) -> Option<Round> {
        self.session.borrow().snapshot.clone()
    }

    pub fn status(&self) -> String {
        self.session.borrow().status.clone()
    }

    pub fn bet_bounds(&self) -> BetBounds {
        self.session.borrow().bounds
    }

    fn set_status(&self, message: impl Into<String>) {
        self.session.borrow_mut().status = message.into();
    }

    fn has_contract(&self) -> bool {
        self.config.contract != Address::ZERO
    }

    fn ensure_contract(&self) -> Result<()> {
        if self.has_contract() {
            Ok(())
        } else {
            Err(ConfigurationError::MissingContract.into())
        }
    }

    fn require_current_round(&self) -> Result<RoundId> {
        self.current_round()
            .ok_or_else(|| ValidationError::NoCurrentRound.into())
    }

    fn begin(&self, state: ActionState) -> Result<ActionGuard<'_>> {
        let mut session = self.session.borrow_mut();
        if session.action != ActionState::Idle {
            debug!(requested = %state, in_flight = %session.action, "rejecting action");
            return Err(Error::Busy(session.action));
        }
        session.action = state;
        Ok(ActionGuard {
            session: &self.session,
        })
    }

    /// Surfaces a failed action through the status message.
    fn settle<T>(&self, action: &'static str, outcome: Result<T>) -> Result<T> {
        if let Err(err) = &outcome {
            error!(action, error = %err, "round action failed");
            self.set_status(err.to_string());
        }
        outcome
    }

    /// Makes `raw` the current round. An invalid string means "no current
    /// round" and clears the selection instead of failing.
    pub async fn select_round(&self, raw: &str) -> Result<Option<RoundId>>
    where
        Reader: ChainReader,
    {
        let in_flight = self.action();
        if in_flight != ActionState::Idle {
            return Err(Error::Busy(in_flight));
        }
        let parsed = raw.parse::<RoundId>().ok();
        self.set_current(parsed);
        if let Some(id) = parsed {
            self.refresh_snapshot(id).await;
        } else {
            debug!(raw, "round id is not bytes32 hex; clearing current round");
        }
        Ok(parsed)
    }

    fn set_current(&self, id: Option<RoundId>) {
        let mut session = self.session.borrow_mut();
        if session.current != id {
            session.snapshot = None;
        }
        session.current = id;
    }

    /// Replaces the snapshot with a fresh `getRoundInfo` read. Read failures
    /// leave the previous snapshot in place.
    pub async fn refresh_snapshot(&self, id: RoundId)
    where
        Reader: ChainReader,
    {
        if !self.has_contract() {
            return;
        }
        match self.reader.round_info(id).await {
            Ok(round) => {
                let mut session = self.session.borrow_mut();
                if session.current == Some(id) {
                    session.snapshot = Some(round);
                } else {
                    trace!(round = %id, "discarding snapshot of a round that is no longer current");
                }
            }
            Err(err) => {
                warn!(round = %id, error = %err, "Failed to read round info");
            }
        }
    }

    /// Fetches whichever stake bounds are not cached yet. A failed read leaves
    /// that bound unset, which disables the corresponding check.
    pub async fn load_bet_bounds(&self) -> BetBounds
    where
        Reader: ChainReader,
    {
        if !self.has_contract() {
            return self.bet_bounds();
        }
        if self.bet_bounds().min.is_none() {
            match self.reader.min_bet().await {
                Ok(min) => self.session.borrow_mut().bounds.min = Some(min),
                Err(err) => warn!(error = %err, "Failed to read MIN_BET"),
            }
        }
        if self.bet_bounds().max.is_none() {
            match self.reader.max_bet().await {
                Ok(max) => self.session.borrow_mut().bounds.max = Some(max),
                Err(err) => warn!(error = %err, "Failed to read MAX_BET"),
            }
        }
        self.bet_bounds()
    }

    /// Applies a batch of settlement notices. Only events for the current
    /// round count; each one updates the status and triggers one snapshot
    /// refresh. Returns how many matched.
    pub async fn reconcile(&self, batch: &[RevealedEvent]) -> usize
    where
        Reader: ChainReader,
    {
        let mut matched = 0;
        for event in batch {
            let Some(current) = self.current_round() else {
                trace!(round = %event.round_id, "no current round; ignoring Revealed");
                continue;
            };
            if event.round_id != current {
                trace!(round = %event.round_id, %current, "ignoring Revealed for another round");
                continue;
            }
            info!(
                round = %current,
                dice = event.dice,
                win = event.win,
                payout = %event.payout,
                "round revealed"
            );
            {
                let mut session = self.session.borrow_mut();
                session.status = describe_reveal(event);
                session.last_revealed = Some(current);
            }
            self.refresh_snapshot(current).await;
            matched += 1;
        }
        matched
    }

    /// Reconciles batches until one settles the current round.
    pub async fn await_settlement(
        &self,
        subscription: &mut EventSubscription,
    ) -> Option<RevealedEvent>
    where
        Reader: ChainReader,
    {
        while let Some(batch) = subscription.next_batch().await {
            let current = self.current_round();
            let hit = batch
                .iter()
                .find(|event| Some(event.round_id) == current)
                .cloned();
            self.reconcile(&batch).await;
            if hit.is_some() {
                return hit;
            }
        }
        warn!("Revealed subscription ended before the round settled");
        None
    }
}

impl<Reader, Submitter, Encryptor> RoundOrchestrator<Reader, Submitter, Encryptor>
where
    Reader: ChainReader,
    Submitter: TransactionSubmitter,
    Encryptor: EncryptedInputBuilder,
{
    /// Registers a new round on chain and makes it current once confirmed.
    pub async fn start_round(&self) -> Result<RoundId> {
        let _guard = self.begin(ActionState::Starting)?;
        let outcome = self.try_start_round().await;
        self.settle("start round", outcome)
    }

    async fn try_start_round(&self) -> Result<RoundId> {
        self.ensure_contract()?;
        let account = self
            .submitter
            .account()
            .ok_or(ConfigurationError::WalletNotConnected)?;
        if self.config.commit_model == CommitModel::EncryptedDice
            && !self.encryptor.is_ready()
        {
            return Err(ConfigurationError::EncryptionNotReady.into());
        }

        let id = RoundId::generate()?;
        let request = match self.config.commit_model {
            CommitModel::OnChainDice => {
                self.set_status("Rolling dice on-chain...");
                TransactionRequest::new(&BigOrSmall::startGameCall {
                    roundId: id.as_b256(),
                })
            }
            CommitModel::EncryptedDice => {
                self.set_status("Encrypting dice...");
                let face = secret_dice()?;
                let input = self
                    .encryptor
                    .encrypt_u8(self.config.contract, account, face)
                    .await?;
                self.set_status("Committing encrypted dice on-chain...");
                TransactionRequest::new(&EncryptedBigOrSmall::startGameCall {
                    roundId: id.as_b256(),
                    encDiceExt: input.handle,
                    proof: input.proof,
                })
            }
        };

        let receipt = self.submit_and_confirm(request).await?;
        info!(round = %id, tx = %receipt.tx_hash, "round started");
        self.set_current(Some(id));
        self.set_status("Game started. Place your bet!");
        self.refresh_snapshot(id).await;
        Ok(id)
    }

    /// Bets `stake` (decimal ether) on `choice` for the current round.
    pub async fn place_bet(&self, stake: &str, choice: Choice) -> Result<()> {
        let _guard = self.begin(ActionState::Betting)?;
        let outcome = self.try_place_bet(stake, choice).await;
        self.settle("place bet", outcome)
    }

    async fn try_place_bet(&self, stake: &str, choice: Choice) -> Result<()> {
        self.ensure_contract()?;
        let id = self.require_current_round()?;
        self.submitter
            .account()
            .ok_or(ConfigurationError::WalletNotConnected)?;
        let value = parse_stake(stake)?;
        self.bet_bounds().check(value)?;

        self.set_status("Submitting bet...");
        let request = TransactionRequest::new(&BigOrSmall::placeBetCall {
            roundId: id.as_b256(),
            choice: choice.wire(),
        })
        .with_value(value);
        let receipt = self.submit_and_confirm(request).await?;
        info!(
            round = %id,
            %choice,
            stake = %format_eth(&value),
            tx = %receipt.tx_hash,
            "bet placed"
        );
        self.set_status("Bet placed. Reveal when ready.");
        self.refresh_snapshot(id).await;
        Ok(())
    }

    /// Asks the contract to settle the current round. The outcome arrives
    /// later as a `Revealed` event, see [`Self::reconcile`].
    pub async fn reveal_round(&self) -> Result<()> {
        let _guard = self.begin(ActionState::Revealing)?;
        let outcome = self.try_reveal_round().await;
        self.settle("reveal round", outcome)
    }

    async fn try_reveal_round(&self) -> Result<()> {
        self.ensure_contract()?;
        let id = self.require_current_round()?;
        self.submitter
            .account()
            .ok_or(ConfigurationError::WalletNotConnected)?;

        self.set_status("Revealing round...");
        let request = TransactionRequest::new(&BigOrSmall::revealCall {
            roundId: id.as_b256(),
        });
        let receipt = self.submit_and_confirm(request).await?;
        info!(round = %id, tx = %receipt.tx_hash, "reveal confirmed");
        // the event may have been reconciled while we waited for the receipt
        if self.session.borrow().last_revealed != Some(id) {
            self.set_status("Reveal transaction sent. Awaiting event...");
        }
        self.refresh_snapshot(id).await;
        Ok(())
    }

    async fn submit_and_confirm(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionReceipt> {
        let pending = self.submitter.submit(request).await?;
        debug!(tx = %pending.tx_hash(), "transaction submitted; waiting for confirmation");
        Ok(pending.await_confirmation().await?)
    }
}

/// Returns the session to `Idle` however the action ends, including when its
/// future is dropped mid-flight.
struct ActionGuard<'a> {
    session: &'a RefCell<Session>,
}

impl Drop for ActionGuard<'_> {
    fn drop(&mut self) {
        self.session.borrow_mut().action = ActionState::Idle;
    }
}

fn describe_reveal(event: &RevealedEvent) -> String {
    let outcome = if event.win { "win" } else { "lose" };
    let mut message = format!(
        "Round {} revealed: dice {} {}",
        event.round_id, event.dice, outcome
    );
    if !event.payout.is_zero() {
        message.push_str(&format!(" | payout {} ETH", format_eth(&event.payout)));
    }
    message
}
