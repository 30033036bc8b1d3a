//! Typed bindings for the fixed `BigOrSmall` contract surface.
//!
//! Everything crossing the RPC boundary is decoded against these shapes, so a
//! response that does not fit the ABI is an error instead of a miscoerced value.

use crate::{
    error::ReadError,
    events::RevealedEvent,
    round::{
        Choice,
        Round,
        RoundId,
    },
};
use alloy_primitives::{
    B256,
    Bytes,
    LogData,
};
use alloy_sol_types::{
    SolEvent,
    sol,
};

sol! {
    /// Functions and events shared by both contract flavours.
    interface BigOrSmall {
        event GameStarted(bytes32 indexed roundId, address indexed player);
        event BetPlaced(bytes32 indexed roundId, address indexed player, uint8 choice, uint256 stake);
        event Revealed(bytes32 indexed roundId, uint8 dice, bool win, uint256 payout);

        function MIN_BET() external view returns (uint256);
        function MAX_BET() external view returns (uint256);
        function getRoundInfo(bytes32 roundId) external view returns (address player, uint256 stake, uint8 choice, bool settled, uint8 result);

        /// On-chain dice: the contract rolls when the round starts.
        function startGame(bytes32 roundId) external;
        function placeBet(bytes32 roundId, uint8 choice) external payable;
        function reveal(bytes32 roundId) external;
    }

    /// Encrypted dice: the caller commits an encrypted face with its proof.
    interface EncryptedBigOrSmall {
        function startGame(bytes32 roundId, bytes encDiceExt, bytes proof) external;
    }
}

/// Validates a `getRoundInfo` response and lifts it into a [`Round`].
pub fn decode_round(
    id: RoundId,
    info: BigOrSmall::getRoundInfoReturn,
) -> Result<Round, ReadError> {
    let choice = Choice::from_wire(info.choice).map_err(|value| ReadError::Decode {
        context: "getRoundInfo.choice",
        reason: format!("unknown choice value {value}"),
    })?;
    let result = match info.result {
        0 => None,
        face @ 1..=6 => Some(face),
        other => {
            return Err(ReadError::Decode {
                context: "getRoundInfo.result",
                reason: format!("dice value {other} outside 1..=6"),
            });
        }
    };
    Ok(Round {
        id,
        player: info.player,
        stake: info.stake,
        choice,
        settled: info.settled,
        result,
    })
}

/// Decodes a raw `Revealed` log. Returns `Ok(None)` for logs of other events.
pub fn decode_revealed(
    topics: Vec<B256>,
    data: Bytes,
) -> Result<Option<RevealedEvent>, ReadError> {
    if topics.first() != Some(&BigOrSmall::Revealed::SIGNATURE_HASH) {
        return Ok(None);
    }
    let log = LogData::new(topics, data).ok_or(ReadError::Decode {
        context: "Revealed",
        reason: "too many topics".to_string(),
    })?;
    let event =
        BigOrSmall::Revealed::decode_log_data(&log).map_err(|e| ReadError::Decode {
            context: "Revealed",
            reason: e.to_string(),
        })?;
    if !(1..=6).contains(&event.dice) {
        return Err(ReadError::Decode {
            context: "Revealed.dice",
            reason: format!("dice value {} outside 1..=6", event.dice),
        });
    }
    Ok(Some(RevealedEvent {
        round_id: RoundId::from(event.roundId),
        dice: event.dice,
        win: event.win,
        payout: event.payout,
        block_number: None,
        tx_hash: None,
    }))
}
