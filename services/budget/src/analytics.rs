//! Analytics summary over current-month budgets and expenses

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{Budget, Expense};

/// Per-category budget versus actual spend
#[derive(Debug, Serialize)]
pub struct BudgetProgress {
    pub category: String,
    pub budgeted: f64,
    pub spent: f64,
}

/// Monthly summary report
#[derive(Debug, Serialize)]
pub struct SummaryReport {
    pub total_budget: f64,
    pub total_expenses: f64,
    pub remaining: f64,
    /// Percentage of the budget left over, one decimal; 0 when there is no
    /// budget to divide by
    pub savings_rate: f64,
    pub category_breakdown: BTreeMap<String, f64>,
    pub budget_progress: Vec<BudgetProgress>,
}

/// Aggregate one month's budgets and expenses into a summary
pub fn summarize(budgets: &[Budget], expenses: &[Expense]) -> SummaryReport {
    let total_budget: f64 = budgets.iter().map(|b| b.amount).sum();
    let total_expenses: f64 = expenses.iter().map(|e| e.amount).sum();
    let remaining = total_budget - total_expenses;

    let savings_rate = if total_budget > 0.0 {
        let rate = remaining / total_budget * 100.0;
        (rate * 10.0).round() / 10.0
    } else {
        0.0
    };

    let mut category_breakdown: BTreeMap<String, f64> = BTreeMap::new();
    for expense in expenses {
        *category_breakdown.entry(expense.category.clone()).or_default() += expense.amount;
    }

    let budget_progress = budgets
        .iter()
        .map(|budget| BudgetProgress {
            category: budget.category.clone(),
            budgeted: budget.amount,
            spent: expenses
                .iter()
                .filter(|e| e.category == budget.category)
                .map(|e| e.amount)
                .sum(),
        })
        .collect();

    SummaryReport {
        total_budget,
        total_expenses,
        remaining,
        savings_rate,
        category_breakdown,
        budget_progress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn budget(amount: f64, category: &str) -> Budget {
        Budget {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            amount,
            category: category.to_string(),
            month: "2026-08".to_string(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn expense(amount: f64, category: &str) -> Expense {
        Expense {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            amount,
            description: "test".to_string(),
            category: category.to_string(),
            date: "2026-08-15".to_string(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn summary_totals_and_savings_rate() {
        let budgets = vec![budget(300.0, "Food"), budget(200.0, "Transport")];
        let expenses = vec![expense(100.0, "Food"), expense(50.0, "Transport")];

        let report = summarize(&budgets, &expenses);

        assert_eq!(report.total_budget, 500.0);
        assert_eq!(report.total_expenses, 150.0);
        assert_eq!(report.remaining, 350.0);
        assert_eq!(report.savings_rate, 70.0);
    }

    #[test]
    fn zero_budget_means_zero_savings_rate() {
        let report = summarize(&[], &[expense(42.0, "Food")]);

        assert_eq!(report.total_budget, 0.0);
        assert_eq!(report.savings_rate, 0.0);
        assert_eq!(report.remaining, -42.0);
    }

    #[test]
    fn category_breakdown_sums_per_category() {
        let expenses = vec![
            expense(10.0, "Food"),
            expense(15.0, "Food"),
            expense(5.0, "Other"),
        ];

        let report = summarize(&[], &expenses);

        assert_eq!(report.category_breakdown["Food"], 25.0);
        assert_eq!(report.category_breakdown["Other"], 5.0);
    }

    #[test]
    fn budget_progress_tracks_spend_per_budget_category() {
        let budgets = vec![budget(100.0, "Food")];
        let expenses = vec![expense(30.0, "Food"), expense(99.0, "Transport")];

        let report = summarize(&budgets, &expenses);

        assert_eq!(report.budget_progress.len(), 1);
        assert_eq!(report.budget_progress[0].category, "Food");
        assert_eq!(report.budget_progress[0].budgeted, 100.0);
        assert_eq!(report.budget_progress[0].spent, 30.0);
    }

    #[test]
    fn savings_rate_rounds_to_one_decimal() {
        let budgets = vec![budget(300.0, "Food")];
        let expenses = vec![expense(100.0, "Food")];

        // 200/300 = 66.666... -> 66.7
        let report = summarize(&budgets, &expenses);
        assert_eq!(report.savings_rate, 66.7);
    }
}
