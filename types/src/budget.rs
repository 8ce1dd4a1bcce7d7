//! Output budget invariant type.
//!
//! An [`OutputBudget`] is a depletable allowance of output units shared by
//! every producer within one operation. `remaining` can only go down through
//! [`OutputBudget::debit`] and back up through [`OutputBudget::reset`]; it can
//! never go negative because an over-debit is rejected without touching state.

use thiserror::Error;

/// Signal that a debit did not fit in the remaining allowance.
///
/// This is an expected terminal condition for producers, not a failure:
/// every caller converts it into a `truncated` flag on its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("attempted to debit {requested} units, only {remaining} left")]
pub struct BudgetExceeded {
    pub requested: usize,
    pub remaining: usize,
}

/// Mutable allowance tracker.
///
/// Units are unsigned, so a negative debit is unrepresentable by construction.
/// Pass by `&mut` into every streaming call of an operation so that a search
/// across many files enforces one global allowance rather than one per file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBudget {
    limit: usize,
    remaining: usize,
}

impl OutputBudget {
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self {
            limit,
            remaining: limit,
        }
    }

    /// Subtract `units` from the allowance.
    ///
    /// On failure the budget is left exactly as it was.
    pub fn debit(&mut self, units: usize) -> Result<(), BudgetExceeded> {
        if units > self.remaining {
            return Err(BudgetExceeded {
                requested: units,
                remaining: self.remaining,
            });
        }
        self.remaining -= units;
        Ok(())
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.remaining
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Restore the full allowance.
    pub fn reset(&mut self) {
        self.remaining = self.limit;
    }
}
