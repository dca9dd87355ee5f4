use serde::Serialize;

/// Share of usage at which a trip budget starts warning.
pub const WARNING_THRESHOLD_PCT: f64 = 80.0;

/// How much of a trip budget has been spent, in base currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetStatus {
    pub usage_pct: f64,
    pub remaining: f64,
    pub warning: bool,
    pub exceeded: bool,
}

/// Usage is 0 for a non-positive budget.
pub fn budget_status(total_budget: f64, total_expenses: f64) -> BudgetStatus {
    let usage_pct = if total_budget > 0.0 { total_expenses / total_budget * 100.0 } else { 0.0 };

    BudgetStatus {
        usage_pct,
        remaining: total_budget - total_expenses,
        warning: (WARNING_THRESHOLD_PCT..=100.0).contains(&usage_pct),
        exceeded: usage_pct > 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn under_threshold() {
        let status = budget_status(1000.0, 500.0);
        assert_eq!(status.usage_pct, 50.0);
        assert_eq!(status.remaining, 500.0);
        assert!(!status.warning);
        assert!(!status.exceeded);
    }

    #[test]
    fn warning_band_includes_both_edges() {
        assert!(budget_status(100.0, 80.0).warning);
        assert!(budget_status(100.0, 100.0).warning);
        assert!(!budget_status(100.0, 100.0).exceeded);
    }

    #[test]
    fn exceeded_budget() {
        let status = budget_status(100.0, 120.0);
        assert!(status.exceeded);
        assert!(!status.warning);
        assert_eq!(status.remaining, -20.0);
    }

    #[test]
    fn zero_budget_has_no_usage() {
        let status = budget_status(0.0, 50.0);
        assert_eq!(status.usage_pct, 0.0);
        assert!(!status.exceeded);
        assert_eq!(status.remaining, -50.0);
    }
}
