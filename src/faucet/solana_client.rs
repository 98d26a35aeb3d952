use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use solana_client::{rpc_client::RpcClient, rpc_config::CommitmentConfig};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use std::str::FromStr;

use crate::model::ContractInfo;

// System program ID
const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
// Deployed faucet program ID
const PROGRAM_ID: &str = "9kKrAJsk287onKUgcqAtYF5P8WF65uyWC9yuujxAjXMj";

// PDA seeds, matching the on-chain program
const FAUCET_CONFIG_SEED: &[u8] = b"faucet_config";
const CLAIM_RECORD_SEED: &[u8] = b"claim_record";
const WHITELIST_SEED: &[u8] = b"whitelist";

// FaucetConfig account layout:
//   discriminator(8) + admin(32) + min_claim(8) + max_claim(8) + cooldown(8) + bump(1)
const CONFIG_ADMIN_OFFSET: usize = 8;
const CONFIG_MIN_OFFSET: usize = 40;
const CONFIG_MAX_OFFSET: usize = 48;
const CONFIG_COOLDOWN_OFFSET: usize = 56;
const CONFIG_MIN_LEN: usize = 64;

// ClaimRecord account layout:
//   discriminator(8) + claimer(32) + last_claim_at(8) + bump(1)
const RECORD_LAST_CLAIM_OFFSET: usize = 40;
const RECORD_MIN_LEN: usize = 48;

/// RPC gateway to the on-chain faucet program. All reads come back as typed
/// values; all writes go through [`FaucetClient::send_transaction`].
pub struct FaucetClient {
    rpc_client: RpcClient,
}

impl FaucetClient {
    pub fn new(rpc_url: &str) -> Self {
        let rpc_client =
            RpcClient::new_with_commitment(rpc_url.to_string(), CommitmentConfig::confirmed());
        Self { rpc_client }
    }

    /// Genesis hash of the connected cluster, used for the network check.
    pub async fn genesis_hash(&self) -> Result<String> {
        let hash = self
            .rpc_client
            .get_genesis_hash()
            .context("Failed to fetch cluster genesis hash")?;
        Ok(hash.to_string())
    }

    /// Derive the faucet config PDA (must match the on-chain program)
    pub fn faucet_config_pda(&self) -> Result<(Pubkey, u8)> {
        let program_id = Pubkey::from_str(PROGRAM_ID)?;
        Ok(Pubkey::find_program_address(&[FAUCET_CONFIG_SEED], &program_id))
    }

    /// Derive the per-account claim record PDA
    pub fn claim_record_pda(&self, user: &Pubkey) -> Result<(Pubkey, u8)> {
        let program_id = Pubkey::from_str(PROGRAM_ID)?;
        Ok(Pubkey::find_program_address(
            &[CLAIM_RECORD_SEED, user.as_ref()],
            &program_id,
        ))
    }

    /// Derive the whitelist entry PDA; the account existing at all is what
    /// makes `user` whitelisted.
    pub fn whitelist_pda(&self, user: &Pubkey) -> Result<(Pubkey, u8)> {
        let program_id = Pubkey::from_str(PROGRAM_ID)?;
        Ok(Pubkey::find_program_address(
            &[WHITELIST_SEED, user.as_ref()],
            &program_id,
        ))
    }

    /// Fetch the faucet config account and the vault balance.
    ///
    /// Callers are expected to fall back to [`ContractInfo::fallback`] when
    /// this fails rather than treating the error as fatal.
    pub async fn contract_info(&self) -> Result<ContractInfo> {
        let (config_pda, _bump) = self.faucet_config_pda()?;

        let account_data = self
            .rpc_client
            .get_account_data(&config_pda)
            .context("Failed to fetch faucet config account. Has it been initialized?")?;
        let (admin, min_claim_lamports, max_claim_lamports, cooldown_seconds) =
            parse_faucet_config(&account_data)?;

        let balance_lamports = self
            .rpc_client
            .get_balance(&config_pda)
            .context("Failed to fetch faucet vault balance")?;

        Ok(ContractInfo {
            balance_lamports,
            min_claim_lamports,
            max_claim_lamports,
            cooldown_seconds,
            admin,
        })
    }

    /// Unix seconds of `user`'s last successful claim. A missing claim
    /// record or a zero timestamp means the account has never claimed, and
    /// any read failure degrades the same way.
    pub async fn last_claim_time(&self, user: &Pubkey) -> Option<i64> {
        let (record_pda, _bump) = self.claim_record_pda(user).ok()?;
        let account_data = self.rpc_client.get_account_data(&record_pda).ok()?;
        let last_claim_at = parse_claim_record(&account_data).ok()?;
        if last_claim_at > 0 {
            Some(last_claim_at)
        } else {
            None
        }
    }

    /// Whitelist membership is the existence of the entry PDA. Read failures
    /// degrade to `false`.
    pub async fn is_whitelisted(&self, user: &Pubkey) -> bool {
        let Ok((entry_pda, _bump)) = self.whitelist_pda(user) else {
            return false;
        };
        self.rpc_client
            .get_account_data(&entry_pda)
            .map(|data| data.len() >= 8)
            .unwrap_or(false)
    }

    /// Submit a claim of `amount_lamports` for `recipient`, signed by
    /// `claimer`.
    pub async fn submit_claim(
        &self,
        claimer: &Keypair,
        recipient: &Pubkey,
        amount_lamports: u64,
    ) -> Result<Signature> {
        let instruction = self.claim_instruction(&claimer.pubkey(), recipient, amount_lamports)?;
        self.send_transaction(claimer, &[instruction]).await
    }

    /// Admin: create whitelist entry accounts, one instruction per address,
    /// packed into a single transaction.
    pub async fn add_to_whitelist(
        &self,
        admin: &Keypair,
        addresses: &[Pubkey],
    ) -> Result<Signature> {
        let mut instructions = Vec::with_capacity(addresses.len());
        for address in addresses {
            instructions.push(self.whitelist_entry_instruction(
                "add_to_whitelist",
                &admin.pubkey(),
                address,
                true,
            )?);
        }
        self.send_transaction(admin, &instructions).await
    }

    /// Admin: close whitelist entry accounts, rent returned to the admin.
    pub async fn remove_from_whitelist(
        &self,
        admin: &Keypair,
        addresses: &[Pubkey],
    ) -> Result<Signature> {
        let mut instructions = Vec::with_capacity(addresses.len());
        for address in addresses {
            instructions.push(self.whitelist_entry_instruction(
                "remove_from_whitelist",
                &admin.pubkey(),
                address,
                false,
            )?);
        }
        self.send_transaction(admin, &instructions).await
    }

    /// Admin: update the claim bounds.
    pub async fn set_claim_amounts(
        &self,
        admin: &Keypair,
        min_lamports: u64,
        max_lamports: u64,
    ) -> Result<Signature> {
        let mut data = anchor_discriminator("set_claim_amounts").to_vec();
        data.extend_from_slice(&min_lamports.to_le_bytes());
        data.extend_from_slice(&max_lamports.to_le_bytes());
        let instruction = self.config_update_instruction(&admin.pubkey(), data)?;
        self.send_transaction(admin, &[instruction]).await
    }

    /// Admin: update the cooldown period.
    pub async fn set_cooldown_period(&self, admin: &Keypair, seconds: u64) -> Result<Signature> {
        let mut data = anchor_discriminator("set_cooldown_period").to_vec();
        data.extend_from_slice(&seconds.to_le_bytes());
        let instruction = self.config_update_instruction(&admin.pubkey(), data)?;
        self.send_transaction(admin, &[instruction]).await
    }

    /// Admin: move lamports out of the vault back to the admin wallet.
    pub async fn withdraw(&self, admin: &Keypair, amount_lamports: u64) -> Result<Signature> {
        let (config_pda, _bump) = self.faucet_config_pda()?;
        let mut data = anchor_discriminator("withdraw").to_vec();
        data.extend_from_slice(&amount_lamports.to_le_bytes());

        let instruction = Instruction {
            program_id: Pubkey::from_str(PROGRAM_ID)?,
            accounts: vec![
                AccountMeta::new(config_pda, false),
                AccountMeta::new(admin.pubkey(), true),
            ],
            data,
        };
        self.send_transaction(admin, &[instruction]).await
    }

    fn claim_instruction(
        &self,
        claimer: &Pubkey,
        recipient: &Pubkey,
        amount_lamports: u64,
    ) -> Result<Instruction> {
        let program_id = Pubkey::from_str(PROGRAM_ID)?;
        let (config_pda, _bump) = self.faucet_config_pda()?;
        let (record_pda, _bump) = self.claim_record_pda(claimer)?;

        let mut data = anchor_discriminator("claim").to_vec();
        data.extend_from_slice(recipient.as_ref());
        data.extend_from_slice(&amount_lamports.to_le_bytes());

        Ok(Instruction {
            program_id,
            accounts: vec![
                AccountMeta::new(config_pda, false),
                AccountMeta::new(record_pda, false),
                AccountMeta::new(*recipient, false),
                AccountMeta::new(*claimer, true),
                AccountMeta::new_readonly(Pubkey::from_str(SYSTEM_PROGRAM_ID)?, false),
            ],
            data,
        })
    }

    fn whitelist_entry_instruction(
        &self,
        name: &str,
        admin: &Pubkey,
        address: &Pubkey,
        with_system_program: bool,
    ) -> Result<Instruction> {
        let program_id = Pubkey::from_str(PROGRAM_ID)?;
        let (config_pda, _bump) = self.faucet_config_pda()?;
        let (entry_pda, _bump) = self.whitelist_pda(address)?;

        let mut data = anchor_discriminator(name).to_vec();
        data.extend_from_slice(address.as_ref());

        let mut accounts = vec![
            AccountMeta::new_readonly(config_pda, false),
            AccountMeta::new(entry_pda, false),
            AccountMeta::new(*admin, true),
        ];
        if with_system_program {
            accounts.push(AccountMeta::new_readonly(
                Pubkey::from_str(SYSTEM_PROGRAM_ID)?,
                false,
            ));
        }

        Ok(Instruction {
            program_id,
            accounts,
            data,
        })
    }

    fn config_update_instruction(&self, admin: &Pubkey, data: Vec<u8>) -> Result<Instruction> {
        let program_id = Pubkey::from_str(PROGRAM_ID)?;
        let (config_pda, _bump) = self.faucet_config_pda()?;

        Ok(Instruction {
            program_id,
            accounts: vec![
                AccountMeta::new(config_pda, false),
                AccountMeta::new_readonly(*admin, true),
            ],
            data,
        })
    }

    /// Helper to reduce code duplication
    async fn send_transaction(
        &self,
        payer: &Keypair,
        instructions: &[Instruction],
    ) -> Result<Signature> {
        let recent_blockhash = self.rpc_client.get_latest_blockhash()?;
        let transaction = Transaction::new_signed_with_payer(
            instructions,
            Some(&payer.pubkey()),
            &[payer],
            recent_blockhash,
        );

        self.rpc_client
            .send_and_confirm_transaction(&transaction)
            .context("Failed to send transaction")
    }
}

/// Anchor global instruction discriminator: first 8 bytes of
/// `sha256("global:<name>")`.
fn anchor_discriminator(name: &str) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(format!("global:{name}").as_bytes());
    let digest = hasher.finalize();
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&digest[..8]);
    discriminator
}

fn parse_faucet_config(data: &[u8]) -> Result<(Pubkey, u64, u64, u64)> {
    if data.len() < CONFIG_MIN_LEN {
        return Err(anyhow::anyhow!("Invalid faucet config account data length"));
    }

    let admin = Pubkey::try_from(&data[CONFIG_ADMIN_OFFSET..CONFIG_ADMIN_OFFSET + 32])
        .map_err(|_| anyhow::anyhow!("Invalid admin pubkey in faucet config"))?;
    let min_claim = u64::from_le_bytes(data[CONFIG_MIN_OFFSET..CONFIG_MIN_OFFSET + 8].try_into()?);
    let max_claim = u64::from_le_bytes(data[CONFIG_MAX_OFFSET..CONFIG_MAX_OFFSET + 8].try_into()?);
    let cooldown =
        u64::from_le_bytes(data[CONFIG_COOLDOWN_OFFSET..CONFIG_COOLDOWN_OFFSET + 8].try_into()?);

    Ok((admin, min_claim, max_claim, cooldown))
}

fn parse_claim_record(data: &[u8]) -> Result<i64> {
    if data.len() < RECORD_MIN_LEN {
        return Err(anyhow::anyhow!("Invalid claim record account data length"));
    }
    Ok(i64::from_le_bytes(
        data[RECORD_LAST_CLAIM_OFFSET..RECORD_LAST_CLAIM_OFFSET + 8].try_into()?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminator_matches_known_anchor_value() {
        // sha256("global:initialize")[..8], the well-known Anchor constant
        assert_eq!(
            anchor_discriminator("initialize"),
            [175, 175, 109, 31, 13, 152, 155, 237]
        );
    }

    #[test]
    fn faucet_config_parses_at_fixed_offsets() {
        let admin = Keypair::new().pubkey();
        let mut data = vec![0u8; 65];
        data[CONFIG_ADMIN_OFFSET..CONFIG_ADMIN_OFFSET + 32].copy_from_slice(admin.as_ref());
        data[CONFIG_MIN_OFFSET..CONFIG_MIN_OFFSET + 8]
            .copy_from_slice(&100_000_000u64.to_le_bytes());
        data[CONFIG_MAX_OFFSET..CONFIG_MAX_OFFSET + 8]
            .copy_from_slice(&1_000_000_000u64.to_le_bytes());
        data[CONFIG_COOLDOWN_OFFSET..CONFIG_COOLDOWN_OFFSET + 8]
            .copy_from_slice(&3600u64.to_le_bytes());

        let (parsed_admin, min, max, cooldown) = parse_faucet_config(&data).unwrap();
        assert_eq!(parsed_admin, admin);
        assert_eq!(min, 100_000_000);
        assert_eq!(max, 1_000_000_000);
        assert_eq!(cooldown, 3600);
    }

    #[test]
    fn truncated_config_account_is_rejected() {
        assert!(parse_faucet_config(&[0u8; 40]).is_err());
    }

    #[test]
    fn claim_record_timestamp_parses() {
        let mut data = vec![0u8; RECORD_MIN_LEN + 1];
        data[RECORD_LAST_CLAIM_OFFSET..RECORD_LAST_CLAIM_OFFSET + 8]
            .copy_from_slice(&1_700_000_000i64.to_le_bytes());
        assert_eq!(parse_claim_record(&data).unwrap(), 1_700_000_000);
        assert!(parse_claim_record(&[0u8; 20]).is_err());
    }

    #[test]
    fn claim_instruction_encodes_recipient_and_amount() {
        let client = FaucetClient::new("http://localhost:8899");
        let claimer = Keypair::new().pubkey();
        let recipient = Keypair::new().pubkey();

        let instruction = client
            .claim_instruction(&claimer, &recipient, 250_000_000)
            .unwrap();

        assert_eq!(instruction.data.len(), 8 + 32 + 8);
        assert_eq!(&instruction.data[..8], &anchor_discriminator("claim"));
        assert_eq!(&instruction.data[8..40], recipient.as_ref());
        assert_eq!(
            u64::from_le_bytes(instruction.data[40..48].try_into().unwrap()),
            250_000_000
        );
        // claimer signs, system program present for record init
        assert!(instruction.accounts[3].is_signer);
        assert_eq!(instruction.accounts.len(), 5);
    }

    #[test]
    fn whitelist_instructions_differ_only_in_system_program() {
        let client = FaucetClient::new("http://localhost:8899");
        let admin = Keypair::new().pubkey();
        let address = Keypair::new().pubkey();

        let add = client
            .whitelist_entry_instruction("add_to_whitelist", &admin, &address, true)
            .unwrap();
        let remove = client
            .whitelist_entry_instruction("remove_from_whitelist", &admin, &address, false)
            .unwrap();

        assert_eq!(add.accounts.len(), 4);
        assert_eq!(remove.accounts.len(), 3);
        assert_eq!(&add.data[8..40], address.as_ref());
        assert_ne!(&add.data[..8], &remove.data[..8]);
    }
}
