//! Budget and expense models and API payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Monthly budget entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Budget {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub category: String,
    /// Month the budget applies to, "YYYY-MM"
    pub month: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Daily expense entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Expense {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub description: String,
    pub category: String,
    /// Day the expense was made, "YYYY-MM-DD"
    pub date: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Validated fields for creating or updating a budget
#[derive(Debug, Clone)]
pub struct NewBudget {
    pub amount: f64,
    pub category: String,
    pub month: String,
}

/// Validated fields for creating or updating an expense
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub amount: f64,
    pub description: String,
    pub category: String,
    pub date: String,
}

/// Raw budget payload; required fields are checked by the handler
#[derive(Deserialize)]
pub struct BudgetPayload {
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub month: Option<String>,
}

/// Raw expense payload; required fields are checked by the handler
#[derive(Deserialize)]
pub struct ExpensePayload {
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub date: Option<String>,
}

/// Login/register form fields
#[derive(Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}
