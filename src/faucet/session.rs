use anyhow::Result;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{read_keypair_file, Keypair, Signer},
};

use crate::faucet::solana_client::FaucetClient;
use crate::model::NetworkConfig;

/// Explicit wallet-session value object: the loaded keypair, the cluster
/// verdict, and an epoch counter.
///
/// The epoch is bumped on every account or network change; async completions
/// issued under an older epoch must be discarded by their callers instead of
/// being applied to retired state.
pub struct WalletSession {
    current_rpc_url: String,
    cluster_rpc_url: String,
    expected_genesis: Option<String>,
    keypair: Option<Keypair>,
    network_ok: bool,
    epoch: u64,
}

impl WalletSession {
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            current_rpc_url: config.rpc_url.clone(),
            cluster_rpc_url: config.cluster_rpc_url.clone(),
            expected_genesis: config.genesis_hash.clone(),
            keypair: None,
            network_ok: false,
            epoch: 0,
        }
    }

    /// Load the signing keypair. Counts as an account change.
    pub fn connect(&mut self, keypair_path: &str) -> Result<Pubkey> {
        let keypair = read_keypair_file(keypair_path)
            .map_err(|e| anyhow::anyhow!("Failed to read wallet keypair: {}", e))?;
        let account = keypair.pubkey();
        self.keypair = Some(keypair);
        self.epoch += 1;
        Ok(account)
    }

    /// Drop the keypair. Counts as an account change.
    pub fn disconnect(&mut self) {
        self.keypair = None;
        self.network_ok = false;
        self.epoch += 1;
    }

    pub fn account(&self) -> Option<Pubkey> {
        self.keypair.as_ref().map(|kp| kp.pubkey())
    }

    pub fn keypair(&self) -> Option<&Keypair> {
        self.keypair.as_ref()
    }

    pub fn rpc_url(&self) -> &str {
        &self.current_rpc_url
    }

    pub fn network_ok(&self) -> bool {
        self.network_ok
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Compare the connected cluster's genesis hash against the configured
    /// one. With no hash configured, the first reachable endpoint's genesis
    /// is pinned and later checks compare against it.
    pub async fn check_network(&mut self, client: &FaucetClient) -> bool {
        let verdict = match client.genesis_hash().await {
            Ok(genesis) => match &self.expected_genesis {
                Some(expected) => &genesis == expected,
                None => {
                    self.expected_genesis = Some(genesis);
                    true
                }
            },
            Err(e) => {
                eprintln!("⚠️  Network check failed: {e:#}");
                false
            }
        };
        self.apply_network_verdict(verdict);
        verdict
    }

    /// Point the session at the canonical cluster endpoint and hand back a
    /// client for it. The caller must re-run [`Self::check_network`].
    pub fn switch_cluster(&mut self) -> FaucetClient {
        if self.current_rpc_url != self.cluster_rpc_url {
            self.current_rpc_url = self.cluster_rpc_url.clone();
            self.epoch += 1;
        }
        FaucetClient::new(&self.current_rpc_url)
    }

    /// Record a cluster verdict; a flip counts as a network change.
    fn apply_network_verdict(&mut self, ok: bool) {
        if self.network_ok != ok {
            self.network_ok = ok;
            self.epoch += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> WalletSession {
        WalletSession::new(&NetworkConfig {
            rpc_url: "http://localhost:8899".to_string(),
            cluster_rpc_url: "http://localhost:8899".to_string(),
            genesis_hash: None,
            keypair_path: "./wallet-keypair.json".to_string(),
        })
    }

    #[test]
    fn network_verdict_flip_bumps_epoch_once() {
        let mut s = session();
        let start = s.epoch();

        s.apply_network_verdict(true);
        assert_eq!(s.epoch(), start + 1);
        assert!(s.network_ok());

        // Same verdict again is not a change
        s.apply_network_verdict(true);
        assert_eq!(s.epoch(), start + 1);

        s.apply_network_verdict(false);
        assert_eq!(s.epoch(), start + 2);
        assert!(!s.network_ok());
    }

    #[test]
    fn disconnect_drops_account_and_bumps_epoch() {
        let mut s = session();
        let start = s.epoch();
        s.disconnect();
        assert_eq!(s.account(), None);
        assert_eq!(s.epoch(), start + 1);
    }

    #[test]
    fn switching_to_same_endpoint_is_not_a_network_change() {
        let mut s = session();
        let start = s.epoch();
        let _client = s.switch_cluster();
        assert_eq!(s.epoch(), start);
    }
}
