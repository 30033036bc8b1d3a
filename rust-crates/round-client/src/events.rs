use crate::round::RoundId;
use alloy_primitives::{
    B256,
    U256,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
};

/// Settlement notice for one round.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RevealedEvent {
    pub round_id: RoundId,
    pub dice: u8,
    pub win: bool,
    pub payout: U256,
    pub block_number: Option<u64>,
    pub tx_hash: Option<B256>,
}

pub type EventBatch = Vec<RevealedEvent>;

/// Live feed of `Revealed` batches.
///
/// Dropping the subscription stops the task feeding it, so a torn down
/// session never keeps a poller alive.
pub struct EventSubscription {
    receiver: mpsc::UnboundedReceiver<EventBatch>,
    handle: Option<JoinHandle<()>>,
}

impl EventSubscription {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<EventBatch>,
        handle: JoinHandle<()>,
    ) -> Self {
        Self {
            receiver,
            handle: Some(handle),
        }
    }

    /// A subscription fed directly by whoever holds the sender.
    pub fn from_receiver(receiver: mpsc::UnboundedReceiver<EventBatch>) -> Self {
        Self {
            receiver,
            handle: None,
        }
    }

    /// Waits for the next batch; `None` once the feed has ended.
    pub async fn next_batch(&mut self) -> Option<EventBatch> {
        self.receiver.recv().await
    }

    /// Returns a batch that is already queued without waiting.
    pub fn try_next_batch(&mut self) -> Option<EventBatch> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        drop(self)
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.receiver.close();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use std::time::Duration;

    fn event(byte: u8) -> RevealedEvent {
        RevealedEvent {
            round_id: RoundId::from(B256::repeat_byte(byte)),
            dice: 3,
            win: false,
            payout: U256::ZERO,
            block_number: Some(7),
            tx_hash: None,
        }
    }

    #[tokio::test]
    async fn next_batch__delivers_batches_in_order() {
        // given
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscription = EventSubscription::from_receiver(rx);

        // when
        tx.send(vec![event(1), event(2)]).unwrap();
        tx.send(vec![event(3)]).unwrap();
        drop(tx);

        // then
        assert_eq!(subscription.next_batch().await, Some(vec![event(1), event(2)]));
        assert_eq!(subscription.try_next_batch(), Some(vec![event(3)]));
        assert_eq!(subscription.next_batch().await, None);
    }

    #[tokio::test]
    async fn drop__aborts_feeding_task() {
        // given
        let (tx, rx) = mpsc::unbounded_channel::<EventBatch>();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(5)).await;
                if tx.send(Vec::new()).is_err() {
                    break;
                }
            }
        });
        let probe = handle.abort_handle();
        let subscription = EventSubscription::new(rx, handle);

        // when
        subscription.unsubscribe();
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        // then
        assert!(probe.is_finished());
    }
}
