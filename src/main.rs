use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::pubkey::Pubkey;
use std::env;
use std::str::FromStr;

mod faucet;
mod model;

use faucet::claim_flow::{self, ClaimFlow};
use faucet::eligibility::format_remaining;
use faucet::session::WalletSession;
use faucet::solana_client::FaucetClient;
use model::{ClaimBlocker, ClaimReceipt, ClaimWindow, ContractInfo, NetworkConfig};

const EXPLORER_URL: &str = "https://explorer.solana.com";

// Restored from solana-sdk's `native_token` module, where these helpers were
// removed after 3.0; implementations are the upstream originals.
fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64) as u64
}

const USAGE: &str = "Commands:
  status [--json]                     show faucet info and claim eligibility
  claim [recipient] <amount-sol>      request tokens (waits out an active cooldown)
  whitelist-add <address>...          admin: allow accounts to redirect claims
  whitelist-remove <address>...       admin: revoke whitelist entries
  set-amounts <min-sol> <max-sol>     admin: update claim bounds
  set-cooldown <seconds>              admin: update the cooldown period
  withdraw <amount-sol>               admin: move funds out of the vault";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = NetworkConfig::from_env();
    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("status");

    let mut session = WalletSession::new(&config);
    let mut client = FaucetClient::new(session.rpc_url());
    println!("✅ Connected to Solana RPC: {}", session.rpc_url());

    let account = session
        .connect(&config.keypair_path)
        .context("Wallet connection failed. Set SOLANA_KEYPAIR_PATH to a valid keypair file")?;
    println!("✅ Wallet connected: {}", account);

    // Verify the cluster before doing anything else; on a mismatch, point
    // the session at the configured cluster endpoint and check again.
    if !session.check_network(&client).await {
        println!(
            "⚠️  Wrong cluster detected, switching to {}",
            config.cluster_rpc_url
        );
        client = session.switch_cluster();
        if !session.check_network(&client).await {
            bail!("Connected cluster does not match the faucet's cluster");
        }
        println!("✅ Switched to the faucet cluster");
    }

    match command {
        "status" => cmd_status(&client, &session, args.iter().any(|a| a == "--json")).await,
        "claim" => cmd_claim(&client, &session, &args[1..]).await,
        "whitelist-add" => cmd_whitelist(&client, &session, &args[1..], true).await,
        "whitelist-remove" => cmd_whitelist(&client, &session, &args[1..], false).await,
        "set-amounts" => cmd_set_amounts(&client, &session, &args[1..]).await,
        "set-cooldown" => cmd_set_cooldown(&client, &session, &args[1..]).await,
        "withdraw" => cmd_withdraw(&client, &session, &args[1..]).await,
        other => bail!("Unknown command `{other}`.\n{USAGE}"),
    }
}

/// Populate a fresh flow for the active account: contract info (with
/// fallback defaults on read failure), last claim time, and whitelist
/// status.
async fn load_flow(client: &FaucetClient, session: &WalletSession, account: &Pubkey) -> ClaimFlow {
    let epoch = session.epoch();
    let mut flow = ClaimFlow::new(epoch);

    match client.contract_info().await {
        Ok(info) => {
            flow.apply_contract_info(epoch, info);
        }
        Err(e) => {
            eprintln!("⚠️  Could not fetch faucet info, using defaults: {e:#}");
            flow.apply_contract_info(epoch, ContractInfo::fallback());
        }
    }

    let last_claim_at = client.last_claim_time(account).await;
    let whitelisted = client.is_whitelisted(account).await;
    flow.set_window(
        epoch,
        ClaimWindow {
            last_claim_at,
            cooldown_seconds: flow.info().cooldown_seconds,
            whitelisted,
        },
    );

    flow
}

async fn cmd_status(client: &FaucetClient, session: &WalletSession, json: bool) -> Result<()> {
    let account = session.account().context("No wallet connected")?;
    let flow = load_flow(client, session, &account).await;
    let now = Utc::now().timestamp();
    let snapshot = flow.eligibility(now, true, session.network_ok());

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let info = flow.info();
    println!("\n💧 Faucet status");
    println!("   Balance:     {} SOL", lamports_to_sol(info.balance_lamports));
    println!("   Min claim:   {} SOL", lamports_to_sol(info.min_claim_lamports));
    println!("   Max claim:   {} SOL", lamports_to_sol(info.max_claim_lamports));
    println!("   Cooldown:    {} minutes", info.cooldown_seconds / 60);
    println!("   Admin:       {}", info.admin);
    println!(
        "   Whitelisted: {}",
        if flow.window().whitelisted {
            "yes"
        } else {
            "no (claims go to your own address)"
        }
    );

    if let Some(remaining) = snapshot.remaining_seconds {
        println!("\n⏳ Cooldown active: {} remaining", format_remaining(remaining));
        if let Some(available_at) = DateTime::from_timestamp(now + remaining as i64, 0) {
            println!(
                "   Next claim available at {}",
                available_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
    }

    if snapshot.can_claim {
        println!("\n✅ Ready to claim");
    } else if let Some(blocker) = snapshot.blocker {
        if blocker != ClaimBlocker::CooldownActive {
            println!("\n❌ Cannot claim right now: {blocker}");
        }
    }

    Ok(())
}

async fn cmd_claim(client: &FaucetClient, session: &WalletSession, rest: &[String]) -> Result<()> {
    let account = session.account().context("No wallet connected")?;
    let keypair = session.keypair().context("No wallet connected")?;

    let (recipient, amount_sol) = match rest {
        [amount] => (account, amount.as_str()),
        [recipient, amount, ..] => (
            Pubkey::from_str(recipient).context("Invalid recipient address")?,
            amount.as_str(),
        ),
        [] => bail!("Usage: claim [recipient] <amount-sol>"),
    };
    let amount_sol: f64 = amount_sol.parse().context("Invalid claim amount")?;
    let amount_lamports = sol_to_lamports(amount_sol);

    let mut flow = load_flow(client, session, &account).await;

    let now = Utc::now().timestamp();
    let snapshot = flow.eligibility(now, true, session.network_ok());
    if snapshot.remaining_seconds.is_some() {
        println!("⏳ Cooldown active, waiting it out before submitting...");
        claim_flow::wait_out_cooldown(&mut flow, client, session.epoch()).await?;
    }

    // Re-validated at submit time: the cooldown may have expired or the
    // balance drained while we were waiting.
    let now = Utc::now().timestamp();
    if let Err(blocker) =
        flow.begin_submit(&account, &recipient, amount_lamports, now, session.network_ok())
    {
        bail!("Claim blocked: {blocker}");
    }

    println!("📤 Submitting claim of {} SOL for {}...", amount_sol, recipient);
    match client.submit_claim(keypair, &recipient, amount_lamports).await {
        Ok(signature) => {
            flow.record_success(Utc::now().timestamp());
            let receipt = ClaimReceipt {
                signature,
                recipient,
                amount_lamports,
            };
            println!("✅ Claim confirmed!");
            println!(
                "   {} SOL sent to {}",
                lamports_to_sol(receipt.amount_lamports),
                receipt.recipient
            );
            println!("   Signature: {}", receipt.signature);
            println!("   Explorer:  {EXPLORER_URL}/tx/{}", receipt.signature);

            // The cooldown already restarted optimistically; refresh the
            // contract info once to reconcile the vault balance.
            match client.contract_info().await {
                Ok(info) => {
                    flow.apply_contract_info(session.epoch(), info);
                }
                Err(e) => eprintln!("⚠️  Balance refresh failed: {e:#}"),
            }
            println!(
                "   Faucet balance now {} SOL",
                lamports_to_sol(flow.info().balance_lamports)
            );
            if let Some(ends_at) = flow.window().cooldown_ends_at() {
                if let Some(available_at) = DateTime::from_timestamp(ends_at, 0) {
                    println!(
                        "   Next claim available at {}",
                        available_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                }
            }
            Ok(())
        }
        Err(e) => {
            flow.record_failure();
            Err(e.context("Claim submission failed"))
        }
    }
}

/// Fetch the real config (no fallback here) and require the active account
/// to be the admin before building any admin transaction.
async fn require_admin(client: &FaucetClient, session: &WalletSession) -> Result<ContractInfo> {
    let account = session.account().context("No wallet connected")?;
    let info = client
        .contract_info()
        .await
        .context("Failed to fetch faucet config")?;
    if account != info.admin {
        bail!("Unauthorized — admin only");
    }
    Ok(info)
}

async fn cmd_whitelist(
    client: &FaucetClient,
    session: &WalletSession,
    rest: &[String],
    add: bool,
) -> Result<()> {
    require_admin(client, session).await?;
    let keypair = session.keypair().context("No wallet connected")?;

    if rest.is_empty() {
        bail!("Provide at least one address");
    }
    let addresses = rest
        .iter()
        .map(|raw| Pubkey::from_str(raw).with_context(|| format!("Invalid address: {raw}")))
        .collect::<Result<Vec<_>>>()?;

    let signature = if add {
        client.add_to_whitelist(keypair, &addresses).await?
    } else {
        client.remove_from_whitelist(keypair, &addresses).await?
    };

    println!(
        "✅ {} {} address(es)",
        if add { "Whitelisted" } else { "Removed" },
        addresses.len()
    );
    println!("   Signature: {}", signature);
    Ok(())
}

async fn cmd_set_amounts(
    client: &FaucetClient,
    session: &WalletSession,
    rest: &[String],
) -> Result<()> {
    require_admin(client, session).await?;
    let keypair = session.keypair().context("No wallet connected")?;

    let [min, max] = rest else {
        bail!("Usage: set-amounts <min-sol> <max-sol>");
    };
    let min_sol: f64 = min.parse().context("Invalid minimum amount")?;
    let max_sol: f64 = max.parse().context("Invalid maximum amount")?;
    if min_sol <= 0.0 || max_sol < min_sol {
        bail!("Claim bounds must satisfy 0 < min <= max");
    }

    let signature = client
        .set_claim_amounts(keypair, sol_to_lamports(min_sol), sol_to_lamports(max_sol))
        .await?;
    println!("✅ Claim bounds set to {} - {} SOL", min_sol, max_sol);
    println!("   Signature: {}", signature);
    Ok(())
}

async fn cmd_set_cooldown(
    client: &FaucetClient,
    session: &WalletSession,
    rest: &[String],
) -> Result<()> {
    require_admin(client, session).await?;
    let keypair = session.keypair().context("No wallet connected")?;

    let [seconds] = rest else {
        bail!("Usage: set-cooldown <seconds>");
    };
    let seconds: u64 = seconds.parse().context("Invalid cooldown period")?;

    let signature = client.set_cooldown_period(keypair, seconds).await?;
    println!("✅ Cooldown period set to {} minutes", seconds / 60);
    println!("   Signature: {}", signature);
    Ok(())
}

async fn cmd_withdraw(
    client: &FaucetClient,
    session: &WalletSession,
    rest: &[String],
) -> Result<()> {
    let info = require_admin(client, session).await?;
    let keypair = session.keypair().context("No wallet connected")?;

    let [amount] = rest else {
        bail!("Usage: withdraw <amount-sol>");
    };
    let amount_sol: f64 = amount.parse().context("Invalid withdrawal amount")?;
    let amount_lamports = sol_to_lamports(amount_sol);
    if amount_lamports > info.balance_lamports {
        bail!(
            "Vault only holds {} SOL",
            lamports_to_sol(info.balance_lamports)
        );
    }

    let signature = client.withdraw(keypair, amount_lamports).await?;
    println!("✅ Withdrew {} SOL from the vault", amount_sol);
    println!("   Signature: {}", signature);
    Ok(())
}
