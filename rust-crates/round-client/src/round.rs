use crate::error::{
    ConfigurationError,
    ValidationError,
};
use alloy_primitives::{
    Address,
    B256,
    U256,
    utils::{
        ParseUnits,
        format_ether,
        parse_units,
    },
};
use rand::{
    TryRngCore,
    rngs::OsRng,
};
use std::{
    fmt,
    str::FromStr,
};

/// Hex digits after the `0x` prefix of a round id.
pub const ROUND_ID_HEX_LEN: usize = 64;

/// Client-generated key of a round, `bytes32` on chain.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct RoundId(B256);

impl RoundId {
    /// Draws a fresh id from the operating system's secure random source.
    pub fn generate() -> Result<Self, ConfigurationError> {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| ConfigurationError::RandomnessUnavailable(e.to_string()))?;
        Ok(Self(B256::from(bytes)))
    }

    /// True iff `raw` is exactly `0x` followed by 64 hex digits.
    pub fn is_valid(raw: &str) -> bool {
        raw.strip_prefix("0x").is_some_and(|digits| {
            digits.len() == ROUND_ID_HEX_LEN
                && digits.bytes().all(|b| b.is_ascii_hexdigit())
        })
    }

    pub fn as_b256(&self) -> B256 {
        self.0
    }
}

impl From<B256> for RoundId {
    fn from(bytes: B256) -> Self {
        Self(bytes)
    }
}

impl From<RoundId> for B256 {
    fn from(id: RoundId) -> Self {
        id.0
    }
}

impl FromStr for RoundId {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if !Self::is_valid(trimmed) {
            return Err(ValidationError::MalformedRoundId(raw.to_string()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&trimmed[2..], &mut bytes)
            .map_err(|_| ValidationError::MalformedRoundId(raw.to_string()))?;
        Ok(Self(B256::from(bytes)))
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Picks the hidden dice face for the encrypted commit model.
pub fn secret_dice() -> Result<u8, ConfigurationError> {
    loop {
        let mut byte = [0u8; 1];
        OsRng
            .try_fill_bytes(&mut byte)
            .map_err(|e| ConfigurationError::RandomnessUnavailable(e.to_string()))?;
        // 252 is the largest multiple of 6 below 256
        if byte[0] < 252 {
            return Ok(byte[0] % 6 + 1);
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Choice {
    Small,
    Big,
}

impl Choice {
    pub fn wire(self) -> u8 {
        match self {
            Choice::Small => 1,
            Choice::Big => 2,
        }
    }

    /// `Ok(None)` for the contract's "no bet yet" value.
    pub fn from_wire(value: u8) -> Result<Option<Self>, u8> {
        match value {
            0 => Ok(None),
            1 => Ok(Some(Choice::Small)),
            2 => Ok(Some(Choice::Big)),
            other => Err(other),
        }
    }

    pub fn wins_on(self, dice: u8) -> bool {
        match self {
            Choice::Small => (1..=3).contains(&dice),
            Choice::Big => (4..=6).contains(&dice),
        }
    }
}

impl FromStr for Choice {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "small" | "1" => Ok(Choice::Small),
            "big" | "2" => Ok(Choice::Big),
            _ => Err(ValidationError::InvalidChoice(raw.to_string())),
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::Small => write!(f, "Small (1-3)"),
            Choice::Big => write!(f, "Big (4-6)"),
        }
    }
}

/// Client-side copy of a round as returned by `getRoundInfo`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Round {
    pub id: RoundId,
    pub player: Address,
    pub stake: U256,
    pub choice: Option<Choice>,
    pub settled: bool,
    pub result: Option<u8>,
}

impl Round {
    pub fn is_registered(&self) -> bool {
        self.player != Address::ZERO
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Round   {}", self.id)?;
        writeln!(f, "Player  {}", self.player)?;
        writeln!(f, "Stake   {} ETH", format_eth(&self.stake))?;
        match self.choice {
            Some(choice) => writeln!(f, "Choice  {choice}")?,
            None => writeln!(f, "Choice  None")?,
        }
        if self.settled {
            write!(f, "Status  Settled")?;
            if let Some(dice) = self.result {
                write!(f, "\nResult  {dice}")?;
                if let Some(choice) = self.choice {
                    let outcome = if choice.wins_on(dice) { "win" } else { "lose" };
                    write!(f, " ({outcome})")?;
                }
            }
            Ok(())
        } else {
            write!(f, "Status  Pending")
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ActionState {
    #[default]
    Idle,
    Starting,
    Betting,
    Revealing,
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionState::Idle => "idle",
            ActionState::Starting => "starting",
            ActionState::Betting => "betting",
            ActionState::Revealing => "revealing",
        };
        write!(f, "{name}")
    }
}

/// Stake limits read from the contract. A bound that could not be loaded is
/// `None` and is not enforced.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BetBounds {
    pub min: Option<U256>,
    pub max: Option<U256>,
}

impl BetBounds {
    pub fn check(&self, stake: U256) -> Result<(), ValidationError> {
        if let Some(min) = self.min
            && stake < min
        {
            return Err(ValidationError::StakeBelowMinimum { stake, min });
        }
        if let Some(max) = self.max
            && stake > max
        {
            return Err(ValidationError::StakeAboveMaximum { stake, max });
        }
        Ok(())
    }
}

/// Parses a decimal ether amount such as `0.001` into wei.
pub fn parse_stake(raw: &str) -> Result<U256, ValidationError> {
    let value = match parse_units(raw.trim(), "ether") {
        Ok(ParseUnits::U256(value)) => value,
        Ok(ParseUnits::I256(_)) => return Err(ValidationError::NonPositiveStake),
        Err(_) => return Err(ValidationError::InvalidStake(raw.to_string())),
    };
    if value.is_zero() {
        return Err(ValidationError::NonPositiveStake);
    }
    Ok(value)
}

/// Formats wei as ether without trailing zeros (`1000000000000000` -> `0.001`).
pub fn format_eth(wei: &U256) -> String {
    let full = format_ether(*wei);
    match full.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                whole.to_string()
            } else {
                format!("{whole}.{fraction}")
            }
        }
        None => full,
    }
}
