//! Parimutuel payout arithmetic.

/// Settled payout for a winning stake: the stake back plus its proportional
/// share of the losing pool, truncated toward zero.
///
/// Returns `None` when the winning pool is empty while something is staked
/// against it, or when the result does not fit in a `u64`.
pub fn settle_payout(stake: u64, win_pool: u64, lose_pool: u64) -> Option<u64> {
    if lose_pool == 0 {
        return Some(stake);
    }
    if win_pool == 0 {
        return None;
    }
    let share = u128::from(stake) * u128::from(lose_pool) / u128::from(win_pool);
    u64::try_from(share).ok()?.checked_add(stake)
}

/// Signed change recorded on a losing vote: the whole stake.
pub fn loss_change(stake: u64) -> i64 {
    i64::try_from(stake).map_or(i64::MIN, |stake| -stake)
}

/// Signed change recorded on a winning vote: what was won on top of the stake.
pub fn win_change(stake: u64, payout: u64) -> i64 {
    i64::try_from(payout.saturating_sub(stake)).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winners_split_the_losing_pool_by_stake() {
        assert_eq!(settle_payout(60, 100, 50), Some(90));
        assert_eq!(settle_payout(40, 100, 50), Some(60));
    }

    #[test]
    fn shares_are_truncated() {
        // 10/30 * 50 = 16.66..
        assert_eq!(settle_payout(10, 30, 50), Some(26));
        assert_eq!(settle_payout(1, 3, 1), Some(1));
    }

    #[test]
    fn nothing_to_win_returns_the_stake() {
        assert_eq!(settle_payout(25, 25, 0), Some(25));
        assert_eq!(settle_payout(0, 0, 0), Some(0));
    }

    #[test]
    fn empty_winning_pool_cannot_be_paid() {
        assert_eq!(settle_payout(0, 0, 10), None);
    }

    #[test]
    fn large_pools_do_not_overflow_the_intermediate() {
        let stake = u64::MAX / 4;
        assert_eq!(settle_payout(stake, stake * 2, stake * 2), Some(stake * 2));
        assert_eq!(settle_payout(u64::MAX, u64::MAX, u64::MAX), None);
    }

    #[test]
    fn payout_grows_with_stake() {
        let (win_pool, lose_pool) = (997, 613);
        let mut last = 0;
        for stake in 0..=win_pool {
            let payout = settle_payout(stake, win_pool, lose_pool).unwrap();
            assert!(payout >= last);
            last = payout;
        }
    }

    #[test]
    fn changes_are_signed() {
        assert_eq!(loss_change(50), -50);
        assert_eq!(loss_change(0), 0);
        assert_eq!(win_change(60, 90), 30);
        assert_eq!(win_change(40, 40), 0);
    }
}
