use std::env;
use std::fmt;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

/// Default claim bounds and cooldown used when the config account cannot be
/// read. Mirrors the on-chain deployment defaults: 0.1 SOL min, 1 SOL max,
/// 1 hour cooldown.
pub const DEFAULT_MIN_CLAIM_LAMPORTS: u64 = 100_000_000;
pub const DEFAULT_MAX_CLAIM_LAMPORTS: u64 = 1_000_000_000;
pub const DEFAULT_COOLDOWN_SECONDS: u64 = 3600;

/// Snapshot of the faucet config account plus the vault balance.
///
/// Parsed and validated at the RPC boundary so nothing untyped reaches the
/// eligibility logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractInfo {
    /// Spendable lamports held by the faucet vault PDA
    pub balance_lamports: u64,
    /// Smallest claim the program accepts
    pub min_claim_lamports: u64,
    /// Largest claim the program accepts
    pub max_claim_lamports: u64,
    /// Required wait between two successful claims from the same account
    pub cooldown_seconds: u64,
    /// Wallet allowed to run the admin instructions
    pub admin: Pubkey,
}

impl ContractInfo {
    /// Last-resort defaults when the config account cannot be fetched.
    /// Keeps the client usable instead of blocking on a read failure.
    pub fn fallback() -> Self {
        Self {
            balance_lamports: 0,
            min_claim_lamports: DEFAULT_MIN_CLAIM_LAMPORTS,
            max_claim_lamports: DEFAULT_MAX_CLAIM_LAMPORTS,
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
            admin: Pubkey::default(),
        }
    }
}

/// Per-account claim state queried from the chain.
///
/// Recomputed wholesale on every fetch, account switch, or successful claim;
/// never mutated field-by-field.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ClaimWindow {
    /// Unix seconds of the last successful claim. `None` or zero means the
    /// account has never claimed.
    pub last_claim_at: Option<i64>,
    pub cooldown_seconds: u64,
    pub whitelisted: bool,
}

impl ClaimWindow {
    /// Unix seconds at which the cooldown expires, if one is running.
    pub fn cooldown_ends_at(&self) -> Option<i64> {
        self.last_claim_at
            .filter(|&ts| ts > 0)
            .map(|ts| ts + self.cooldown_seconds as i64)
    }
}

/// Derived eligibility snapshot handed to the view layer. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityState {
    pub can_claim: bool,
    /// `Some` only while a cooldown is running; cleared the instant it ends.
    pub remaining_seconds: Option<u64>,
    pub blocker: Option<ClaimBlocker>,
}

impl EligibilityState {
    pub fn blocked(blocker: ClaimBlocker) -> Self {
        Self {
            can_claim: false,
            remaining_seconds: None,
            blocker: Some(blocker),
        }
    }
}

/// Everything that can stop a claim, checked client-side before any
/// transaction is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimBlocker {
    WalletDisconnected,
    WrongNetwork,
    CooldownActive,
    FaucetEmpty,
    AmountOutOfBounds {
        requested: u64,
        min: u64,
        max: u64,
    },
    InsufficientFaucetFunds,
    RecipientNotAllowed,
    AlreadySubmitting,
}

impl fmt::Display for ClaimBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WalletDisconnected => write!(f, "connect a wallet before claiming"),
            Self::WrongNetwork => write!(f, "wallet is connected to the wrong cluster"),
            Self::CooldownActive => {
                write!(f, "cooldown period is still active, wait before requesting again")
            }
            Self::FaucetEmpty => write!(f, "the faucet has run out of funds"),
            Self::AmountOutOfBounds { requested, min, max } => write!(
                f,
                "claim amount {} lamports is out of bounds ({} - {})",
                requested, min, max
            ),
            Self::InsufficientFaucetFunds => {
                write!(f, "the faucet does not have enough funds for this claim")
            }
            Self::RecipientNotAllowed => write!(
                f,
                "only whitelisted accounts may direct claims to another address"
            ),
            Self::AlreadySubmitting => write!(f, "a claim submission is already in flight"),
        }
    }
}

impl std::error::Error for ClaimBlocker {}

/// Outcome of a confirmed claim transaction.
#[derive(Debug, Clone)]
pub struct ClaimReceipt {
    pub signature: Signature,
    pub recipient: Pubkey,
    pub amount_lamports: u64,
}

/// Cluster and wallet settings, read from the environment (or `.env`).
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Endpoint the session currently points at
    pub rpc_url: String,
    /// Canonical endpoint of the cluster the faucet is deployed on; the
    /// switch-network action reconnects here
    pub cluster_rpc_url: String,
    /// Expected genesis hash of the faucet's cluster. Unset means "pin to
    /// whatever the first connected endpoint reports".
    pub genesis_hash: Option<String>,
    pub keypair_path: String,
}

impl NetworkConfig {
    pub fn from_env() -> Self {
        let rpc_url =
            env::var("SOLANA_RPC_URL").unwrap_or_else(|_| "http://localhost:8899".to_string());
        let cluster_rpc_url =
            env::var("FAUCET_CLUSTER_RPC_URL").unwrap_or_else(|_| rpc_url.clone());
        let genesis_hash = env::var("FAUCET_CLUSTER_GENESIS").ok();
        let keypair_path =
            env::var("SOLANA_KEYPAIR_PATH").unwrap_or_else(|_| "./wallet-keypair.json".to_string());

        Self {
            rpc_url,
            cluster_rpc_url,
            genesis_hash,
            keypair_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_ends_at_adds_period_to_last_claim() {
        let window = ClaimWindow {
            last_claim_at: Some(1000),
            cooldown_seconds: 3600,
            whitelisted: false,
        };
        assert_eq!(window.cooldown_ends_at(), Some(4600));
    }

    #[test]
    fn zero_last_claim_means_never_claimed() {
        let window = ClaimWindow {
            last_claim_at: Some(0),
            cooldown_seconds: 3600,
            whitelisted: false,
        };
        assert_eq!(window.cooldown_ends_at(), None);
        assert_eq!(ClaimWindow::default().cooldown_ends_at(), None);
    }

    #[test]
    fn fallback_info_is_empty_but_claimable_bounds() {
        let info = ContractInfo::fallback();
        assert_eq!(info.balance_lamports, 0);
        assert_eq!(info.min_claim_lamports, DEFAULT_MIN_CLAIM_LAMPORTS);
        assert_eq!(info.max_claim_lamports, DEFAULT_MAX_CLAIM_LAMPORTS);
        assert_eq!(info.cooldown_seconds, DEFAULT_COOLDOWN_SECONDS);
    }
}
