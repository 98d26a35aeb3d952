use solana_sdk::pubkey::Pubkey;

use crate::model::{ClaimBlocker, ClaimWindow, ContractInfo, EligibilityState};

/// Tracks a running cooldown so the countdown can be driven by periodic
/// ticks. Pure: the caller injects `now` on every call.
#[derive(Debug, Clone, Copy)]
pub struct CooldownTimer {
    ends_at: Option<i64>,
}

impl CooldownTimer {
    pub fn from_window(window: &ClaimWindow) -> Self {
        Self {
            ends_at: window.cooldown_ends_at(),
        }
    }

    /// Remaining wait without mutating the timer.
    pub fn remaining(&self, now: i64) -> Option<u64> {
        self.ends_at
            .filter(|&ends| ends > now)
            .map(|ends| (ends - now) as u64)
    }

    /// Recompute the remaining wait against `now`. Once the cooldown reaches
    /// zero (or below) the timer clears itself and every later call returns
    /// `None`, even if the clock steps backward afterward.
    pub fn tick(&mut self, now: i64) -> Option<u64> {
        let ends = self.ends_at?;
        if ends > now {
            Some((ends - now) as u64)
        } else {
            self.ends_at = None;
            None
        }
    }
}

/// Continuous eligibility check, evaluated on every render/tick.
///
/// Check order: wallet presence, then cluster, then cooldown. An empty
/// faucet wins the displayed reason over an active cooldown, but the
/// remaining wait is still computed so the countdown keeps running.
/// Amount bounds are deliberately absent here; they are checked at submit
/// time by [`validate_submission`].
pub fn evaluate(
    window: &ClaimWindow,
    now: i64,
    account_present: bool,
    correct_network: bool,
    faucet_balance: u64,
) -> EligibilityState {
    if !account_present {
        return EligibilityState::blocked(ClaimBlocker::WalletDisconnected);
    }
    if !correct_network {
        return EligibilityState::blocked(ClaimBlocker::WrongNetwork);
    }

    let remaining_seconds = CooldownTimer::from_window(window).remaining(now);

    if faucet_balance == 0 {
        return EligibilityState {
            can_claim: false,
            remaining_seconds,
            blocker: Some(ClaimBlocker::FaucetEmpty),
        };
    }
    if remaining_seconds.is_some() {
        return EligibilityState {
            can_claim: false,
            remaining_seconds,
            blocker: Some(ClaimBlocker::CooldownActive),
        };
    }

    EligibilityState {
        can_claim: true,
        remaining_seconds: None,
        blocker: None,
    }
}

/// Submit-time validation. Rejecting here prevents the transaction from
/// being built at all.
pub fn validate_submission(
    window: &ClaimWindow,
    account: &Pubkey,
    recipient: &Pubkey,
    amount: u64,
    info: &ContractInfo,
) -> Result<(), ClaimBlocker> {
    if recipient != account && !window.whitelisted {
        return Err(ClaimBlocker::RecipientNotAllowed);
    }
    if amount < info.min_claim_lamports || amount > info.max_claim_lamports {
        return Err(ClaimBlocker::AmountOutOfBounds {
            requested: amount,
            min: info.min_claim_lamports,
            max: info.max_claim_lamports,
        });
    }
    if amount > info.balance_lamports {
        return Err(ClaimBlocker::InsufficientFaucetFunds);
    }
    Ok(())
}

/// "1h 5m 32s" style rendering of a remaining wait.
pub fn format_remaining(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{}h {}m {}s", hours, minutes, secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::{Keypair, Signer};

    fn window(last_claim_at: Option<i64>, cooldown_seconds: u64, whitelisted: bool) -> ClaimWindow {
        ClaimWindow {
            last_claim_at,
            cooldown_seconds,
            whitelisted,
        }
    }

    fn funded_info() -> ContractInfo {
        ContractInfo {
            balance_lamports: 5_000_000_000,
            ..ContractInfo::fallback()
        }
    }

    #[test]
    fn fresh_cooldown_reports_full_wait() {
        // lastClaimAt = 1000, cooldown = 3600, now = 1000
        let state = evaluate(&window(Some(1000), 3600, false), 1000, true, true, 1);
        assert!(!state.can_claim);
        assert_eq!(state.remaining_seconds, Some(3600));
        assert_eq!(state.blocker, Some(ClaimBlocker::CooldownActive));
    }

    #[test]
    fn expired_cooldown_permits_claim() {
        // Same window, now exactly at the boundary
        let state = evaluate(&window(Some(1000), 3600, false), 4600, true, true, 1);
        assert!(state.can_claim);
        assert_eq!(state.remaining_seconds, None);
        assert_eq!(state.blocker, None);
    }

    #[test]
    fn remaining_matches_formula_across_clock_values() {
        let w = window(Some(1_700_000_000), 7200, false);
        for offset in [0i64, 1, 599, 3600, 7199, 7200, 10_000] {
            let now = 1_700_000_000 + offset;
            let expected = (1_700_000_000 + 7200 - now).max(0);
            let state = evaluate(&w, now, true, true, 1);
            match state.remaining_seconds {
                Some(r) => assert_eq!(r as i64, expected),
                None => assert_eq!(expected, 0),
            }
        }
    }

    #[test]
    fn never_claimed_has_no_cooldown() {
        let state = evaluate(&window(None, 3600, false), 50, true, true, 1);
        assert!(state.can_claim);
        assert_eq!(state.remaining_seconds, None);
    }

    #[test]
    fn disconnected_wallet_blocks_before_everything() {
        let state = evaluate(&window(Some(1000), 3600, false), 1000, false, false, 0);
        assert_eq!(state.blocker, Some(ClaimBlocker::WalletDisconnected));
        assert_eq!(state.remaining_seconds, None);
    }

    #[test]
    fn wrong_network_checked_before_cooldown() {
        let state = evaluate(&window(Some(1000), 3600, false), 1000, true, false, 1);
        assert_eq!(state.blocker, Some(ClaimBlocker::WrongNetwork));
    }

    #[test]
    fn empty_faucet_blocks_even_after_cooldown() {
        let state = evaluate(&window(Some(1000), 3600, false), 9999, true, true, 0);
        assert!(!state.can_claim);
        assert_eq!(state.remaining_seconds, None);
        assert_eq!(state.blocker, Some(ClaimBlocker::FaucetEmpty));
    }

    #[test]
    fn empty_faucet_wins_reason_but_countdown_still_runs() {
        let state = evaluate(&window(Some(1000), 3600, false), 2000, true, true, 0);
        assert_eq!(state.blocker, Some(ClaimBlocker::FaucetEmpty));
        assert_eq!(state.remaining_seconds, Some(2600));
    }

    #[test]
    fn tick_is_monotonic_then_clears_once() {
        let mut timer = CooldownTimer::from_window(&window(Some(100), 60, false));
        let mut previous = u64::MAX;
        for now in 100..160 {
            let remaining = timer.tick(now).expect("still running");
            assert!(remaining <= previous);
            previous = remaining;
        }
        assert_eq!(timer.tick(160), None);
        // Idempotent: same clock value again, still clear
        assert_eq!(timer.tick(160), None);
        // No resurrection even if the clock steps backward
        assert_eq!(timer.tick(120), None);
    }

    #[test]
    fn non_whitelisted_third_party_recipient_rejected_locally() {
        let account = Keypair::new().pubkey();
        let other = Keypair::new().pubkey();
        let result = validate_submission(
            &window(None, 3600, false),
            &account,
            &other,
            200_000_000,
            &funded_info(),
        );
        assert_eq!(result, Err(ClaimBlocker::RecipientNotAllowed));
    }

    #[test]
    fn whitelisted_account_may_redirect_claim() {
        let account = Keypair::new().pubkey();
        let other = Keypair::new().pubkey();
        let result = validate_submission(
            &window(None, 3600, true),
            &account,
            &other,
            200_000_000,
            &funded_info(),
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn amount_bounds_enforced_at_submit_time() {
        let account = Keypair::new().pubkey();
        let info = funded_info();
        let too_small = validate_submission(&window(None, 0, false), &account, &account, 1, &info);
        assert!(matches!(
            too_small,
            Err(ClaimBlocker::AmountOutOfBounds { .. })
        ));

        let too_large = validate_submission(
            &window(None, 0, false),
            &account,
            &account,
            info.max_claim_lamports + 1,
            &info,
        );
        assert!(matches!(
            too_large,
            Err(ClaimBlocker::AmountOutOfBounds { .. })
        ));
    }

    #[test]
    fn claim_larger_than_vault_rejected() {
        let account = Keypair::new().pubkey();
        let info = ContractInfo {
            balance_lamports: 150_000_000,
            ..ContractInfo::fallback()
        };
        let result = validate_submission(
            &window(None, 0, false),
            &account,
            &account,
            200_000_000,
            &info,
        );
        assert_eq!(result, Err(ClaimBlocker::InsufficientFaucetFunds));
    }

    #[test]
    fn remaining_time_formatting() {
        assert_eq!(format_remaining(3600), "1h 0m 0s");
        assert_eq!(format_remaining(3932), "1h 5m 32s");
        assert_eq!(format_remaining(59), "0h 0m 59s");
    }
}
