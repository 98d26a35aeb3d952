use std::io::Write;

use anyhow::Result;
use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use tokio::time::{interval, Duration};

use crate::faucet::eligibility::{self, CooldownTimer};
use crate::faucet::solana_client::FaucetClient;
use crate::model::{ClaimBlocker, ClaimWindow, ContractInfo, EligibilityState};

const TICK_PERIOD_SECONDS: u64 = 1;
const REFRESH_PERIOD_SECONDS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// Claim submission state machine plus the derived state it guards.
///
/// Holds the session epoch it was (re)initialized under; responses tagged
/// with an older epoch are dropped instead of applied.
pub struct ClaimFlow {
    state: ClaimState,
    window: ClaimWindow,
    info: ContractInfo,
    epoch: u64,
}

impl ClaimFlow {
    pub fn new(epoch: u64) -> Self {
        Self {
            state: ClaimState::Idle,
            window: ClaimWindow::default(),
            info: ContractInfo::fallback(),
            epoch,
        }
    }

    pub fn state(&self) -> ClaimState {
        self.state
    }

    pub fn window(&self) -> &ClaimWindow {
        &self.window
    }

    pub fn info(&self) -> &ContractInfo {
        &self.info
    }

    /// Replace the claim window wholesale. Ignored when `epoch` is stale.
    pub fn set_window(&mut self, epoch: u64, window: ClaimWindow) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.window = window;
        true
    }

    /// Replace the contract info wholesale. Ignored when `epoch` is stale.
    pub fn apply_contract_info(&mut self, epoch: u64, info: ContractInfo) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.info = info;
        true
    }

    /// Read-only eligibility snapshot for the current wall-clock second.
    pub fn eligibility(
        &self,
        now: i64,
        account_present: bool,
        correct_network: bool,
    ) -> EligibilityState {
        eligibility::evaluate(
            &self.window,
            now,
            account_present,
            correct_network,
            self.info.balance_lamports,
        )
    }

    /// Guarded `Idle -> Submitting` transition. Eligibility and amount
    /// bounds are re-validated here, at submit time, so a countdown that
    /// expired (or a balance that drained) between render and click cannot
    /// produce a doomed transaction. A second submit while one is in flight
    /// is rejected, never queued.
    pub fn begin_submit(
        &mut self,
        account: &Pubkey,
        recipient: &Pubkey,
        amount_lamports: u64,
        now: i64,
        correct_network: bool,
    ) -> Result<(), ClaimBlocker> {
        if self.state == ClaimState::Submitting {
            return Err(ClaimBlocker::AlreadySubmitting);
        }

        let snapshot = self.eligibility(now, true, correct_network);
        if let Some(blocker) = snapshot.blocker {
            return Err(blocker);
        }
        eligibility::validate_submission(
            &self.window,
            account,
            recipient,
            amount_lamports,
            &self.info,
        )?;

        self.state = ClaimState::Submitting;
        Ok(())
    }

    /// `Submitting -> Succeeded`: optimistically restart the cooldown from
    /// the submission time instead of waiting for a fresh chain read.
    pub fn record_success(&mut self, now: i64) {
        self.state = ClaimState::Succeeded;
        self.window = ClaimWindow {
            last_claim_at: Some(now),
            ..self.window
        };
    }

    /// `Submitting -> Failed`: the claim call was rejected. `last_claim_at`
    /// is left untouched so the cooldown does not restart on failure, and
    /// the next submit attempt is permitted immediately.
    pub fn record_failure(&mut self) {
        self.state = ClaimState::Failed;
    }

    /// Account switch: retire all derived state and adopt the new epoch.
    pub fn on_account_changed(&mut self, epoch: u64) {
        self.reset(epoch);
    }

    /// Cluster switch or verdict flip: same treatment as an account switch.
    pub fn on_network_changed(&mut self, epoch: u64) {
        self.reset(epoch);
    }

    fn reset(&mut self, epoch: u64) {
        self.state = ClaimState::Idle;
        self.window = ClaimWindow::default();
        self.epoch = epoch;
    }
}

/// Drive the 1-second countdown tick and the 30-second contract-info
/// refresh in one cooperative loop until the cooldown expires.
///
/// The loop owns no shared state: refreshes replace the flow's info
/// wholesale through the epoch guard, and dropping the future cancels both
/// schedules at once.
pub async fn wait_out_cooldown(
    flow: &mut ClaimFlow,
    client: &FaucetClient,
    epoch: u64,
) -> Result<()> {
    let mut timer = CooldownTimer::from_window(flow.window());
    let mut tick = interval(Duration::from_secs(TICK_PERIOD_SECONDS));
    let mut refresh = interval(Duration::from_secs(REFRESH_PERIOD_SECONDS));

    loop {
        tokio::select! {
            _ = tick.tick() => {
                match timer.tick(Utc::now().timestamp()) {
                    Some(remaining) => {
                        print!(
                            "\r   ⏳ Cooldown: {} remaining   ",
                            eligibility::format_remaining(remaining)
                        );
                        std::io::stdout().flush().ok();
                    }
                    None => {
                        println!();
                        return Ok(());
                    }
                }
            }
            _ = refresh.tick() => {
                match client.contract_info().await {
                    Ok(info) => {
                        flow.apply_contract_info(epoch, info);
                    }
                    Err(e) => eprintln!("\n   ⚠️  Contract info refresh failed: {e:#}"),
                }
            }
        }
    }
}
