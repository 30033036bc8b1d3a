use alloy_primitives::Address;
use deployments::DeploymentEnv;
use std::{
    fmt,
    str::FromStr,
    time::Duration,
};

pub const DEFAULT_SEPOLIA_RPC_URL: &str = "https://sepolia.drpc.org";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://localhost:8545";
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;
pub const LOCAL_CHAIN_ID: u64 = 31_337;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How a round's dice is committed when the round starts.
///
/// A deployed contract implements exactly one of these, so the model is a
/// property of the deployment, not of a single call.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CommitModel {
    /// `startGame(roundId)`: the contract rolls and keeps the dice encrypted.
    #[default]
    OnChainDice,
    /// `startGame(roundId, encDiceExt, proof)`: the client picks the face and
    /// submits it encrypted.
    EncryptedDice,
}

impl CommitModel {
    pub fn as_str(self) -> &'static str {
        match self {
            CommitModel::OnChainDice => "on-chain",
            CommitModel::EncryptedDice => "encrypted",
        }
    }
}

impl FromStr for CommitModel {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "on-chain" | "onchain" => Ok(CommitModel::OnChainDice),
            "encrypted" => Ok(CommitModel::EncryptedDice),
            other => Err(format!(
                "unknown commit model '{other}' (expected on-chain or encrypted)"
            )),
        }
    }
}

impl fmt::Display for CommitModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NetworkTarget {
    Sepolia { url: String },
    Local { url: String },
}

impl NetworkTarget {
    pub fn sepolia(url: Option<String>) -> Self {
        NetworkTarget::Sepolia {
            url: url.unwrap_or_else(|| DEFAULT_SEPOLIA_RPC_URL.to_string()),
        }
    }

    pub fn local(url: Option<String>) -> Self {
        NetworkTarget::Local {
            url: url.unwrap_or_else(|| DEFAULT_LOCAL_RPC_URL.to_string()),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            NetworkTarget::Sepolia { url } | NetworkTarget::Local { url } => url,
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            NetworkTarget::Sepolia { .. } => SEPOLIA_CHAIN_ID,
            NetworkTarget::Local { .. } => LOCAL_CHAIN_ID,
        }
    }

    pub fn deployment_env(&self) -> DeploymentEnv {
        match self {
            NetworkTarget::Sepolia { .. } => DeploymentEnv::Sepolia,
            NetworkTarget::Local { .. } => DeploymentEnv::Local,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: NetworkTarget,
    /// Overrides the contract address from the deployment record.
    pub contract: Option<Address>,
    /// Sender account; defaults to the node's first unlocked account.
    pub account: Option<Address>,
    /// Overrides the commit model from the deployment record.
    pub commit_model: Option<CommitModel>,
    pub poll_interval: Duration,
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn commit_model__parses_cli_spellings() {
        assert_eq!("on-chain".parse(), Ok(CommitModel::OnChainDice));
        assert_eq!("Encrypted".parse(), Ok(CommitModel::EncryptedDice));
        assert!("plain".parse::<CommitModel>().is_err());
        assert_eq!(CommitModel::EncryptedDice.to_string(), "encrypted");
    }

    #[test]
    fn network_target__defaults_and_overrides() {
        let sepolia = NetworkTarget::sepolia(None);
        assert_eq!(sepolia.url(), DEFAULT_SEPOLIA_RPC_URL);
        assert_eq!(sepolia.chain_id(), SEPOLIA_CHAIN_ID);
        assert_eq!(sepolia.deployment_env(), DeploymentEnv::Sepolia);

        let local = NetworkTarget::local(Some("http://127.0.0.1:9545".to_string()));
        assert_eq!(local.url(), "http://127.0.0.1:9545");
        assert_eq!(local.chain_id(), LOCAL_CHAIN_ID);
    }
}
