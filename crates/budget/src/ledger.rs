use serde::{Deserialize, Serialize};

use procura_core::{DomainError, DomainResult};

use crate::exception::BudgetException;

/// Project budget position, read inside the transaction that uses it.
///
/// `committed_amount` is the sum of `total_amount` over this project's
/// orders in non-cancelled states, excluding the candidate order being
/// validated. `actual_spend` is the sum of paid invoice totals. Building the
/// snapshot from the same locked rows the transaction will write is what
/// keeps two concurrent releases from both passing against a stale figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    planned_budget: i64,
    budget_enforced: bool,
    committed_amount: i64,
    actual_spend: i64,
}

impl BudgetSnapshot {
    pub fn new(
        planned_budget: i64,
        budget_enforced: bool,
        committed_amount: i64,
        actual_spend: i64,
    ) -> Self {
        Self {
            planned_budget,
            budget_enforced,
            committed_amount,
            actual_spend,
        }
    }

    pub fn planned_budget(&self) -> i64 {
        self.planned_budget
    }

    pub fn budget_enforced(&self) -> bool {
        self.budget_enforced
    }

    pub fn committed_amount(&self) -> i64 {
        self.committed_amount
    }

    pub fn actual_spend(&self) -> i64 {
        self.actual_spend
    }

    /// Budget left for new commitments. Negative when already overrun.
    pub fn remaining(&self) -> i64 {
        // i128 keeps pathological totals from wrapping before the clamp.
        let remaining = self.planned_budget as i128 - self.committed_amount as i128;
        remaining.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    /// Validate a candidate commitment against the ceiling.
    ///
    /// Passes when the candidate fits the remaining budget, when enforcement
    /// is off for this project, or when an approved exception covers the
    /// shortfall (`approved_amount >= shortfall`). Otherwise fails with
    /// `BUDGET_EXCEEDED` carrying the remaining figure.
    pub fn validate(
        &self,
        candidate_amount: i64,
        exception: Option<&BudgetException>,
    ) -> DomainResult<()> {
        if candidate_amount <= 0 {
            return Err(DomainError::validation(
                "candidate amount must be positive",
            ));
        }

        let remaining = self.remaining();
        if candidate_amount as i128 <= remaining as i128 {
            return Ok(());
        }

        if !self.budget_enforced {
            return Ok(());
        }

        let shortfall = (candidate_amount as i128 - remaining as i128)
            .clamp(0, i64::MAX as i128) as i64;

        if exception.is_some_and(|e| e.covers(shortfall)) {
            return Ok(());
        }

        Err(DomainError::budget_exceeded(remaining))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;

    use procura_core::UserId;
    use procura_core::ProjectId;

    use crate::exception::BudgetExceptionId;

    use super::*;

    fn approved_exception(amount: i64) -> BudgetException {
        let now = Utc::now();
        let mut exception = BudgetException::request(
            BudgetExceptionId::new(),
            ProjectId::new(),
            None,
            amount,
            UserId::new(),
            now,
        )
        .unwrap();
        exception.approve(amount, UserId::new(), now).unwrap();
        exception
    }

    #[test]
    fn fits_within_remaining_budget() {
        let snapshot = BudgetSnapshot::new(1_000_000, true, 400_000, 0);
        assert!(snapshot.validate(600_000, None).is_ok());
    }

    #[test]
    fn exceeds_remaining_budget() {
        let snapshot = BudgetSnapshot::new(1_000_000, true, 400_000, 0);
        let err = snapshot.validate(600_001, None).unwrap_err();
        assert_eq!(err, DomainError::BudgetExceeded { remaining: 600_000 });
    }

    #[test]
    fn unenforced_budget_never_blocks() {
        let snapshot = BudgetSnapshot::new(100, false, 0, 0);
        assert!(snapshot.validate(5_000, None).is_ok());
    }

    #[test]
    fn approved_exception_covers_shortfall() {
        let snapshot = BudgetSnapshot::new(1_000_000, true, 900_000, 0);
        // Shortfall is 100_000: candidate 200_000 against 100_000 remaining.
        let exception = approved_exception(100_000);
        assert!(snapshot.validate(200_000, Some(&exception)).is_ok());
    }

    #[test]
    fn undersized_exception_does_not_cover() {
        let snapshot = BudgetSnapshot::new(1_000_000, true, 900_000, 0);
        let exception = approved_exception(99_999);
        let err = snapshot.validate(200_000, Some(&exception)).unwrap_err();
        assert_eq!(err, DomainError::BudgetExceeded { remaining: 100_000 });
    }

    #[test]
    fn pending_exception_does_not_cover() {
        let snapshot = BudgetSnapshot::new(1_000_000, true, 900_000, 0);
        let pending = BudgetException::request(
            BudgetExceptionId::new(),
            ProjectId::new(),
            None,
            1_000_000,
            UserId::new(),
            Utc::now(),
        )
        .unwrap();
        assert!(snapshot.validate(200_000, Some(&pending)).is_err());
    }

    #[test]
    fn overrun_project_reports_negative_remaining() {
        let snapshot = BudgetSnapshot::new(100_000, true, 150_000, 0);
        let err = snapshot.validate(1, None).unwrap_err();
        assert_eq!(err, DomainError::BudgetExceeded { remaining: -50_000 });
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: with enforcement on and no exception, validation never
        /// admits a candidate that would push committed past planned.
        #[test]
        fn never_admits_over_ceiling_without_exception(
            planned in 0i64..1_000_000_000,
            committed in 0i64..1_000_000_000,
            candidate in 1i64..1_000_000_000,
        ) {
            let snapshot = BudgetSnapshot::new(planned, true, committed, 0);
            let admitted = snapshot.validate(candidate, None).is_ok();
            let within = committed as i128 + candidate as i128 <= planned as i128;
            prop_assert_eq!(admitted, within);
        }

        /// Property: a covering approved exception always unblocks, an
        /// undersized one never does.
        #[test]
        fn exception_coverage_is_exact(
            planned in 0i64..1_000_000,
            committed in 0i64..1_000_000,
            candidate in 1i64..1_000_000,
            approved in 1i64..2_000_000,
        ) {
            let snapshot = BudgetSnapshot::new(planned, true, committed, 0);
            prop_assume!(candidate as i128 > snapshot.remaining() as i128);

            let shortfall = candidate as i128 - snapshot.remaining() as i128;
            let exception = approved_exception(approved);
            let admitted = snapshot.validate(candidate, Some(&exception)).is_ok();
            prop_assert_eq!(admitted, approved as i128 >= shortfall);
        }
    }
}
