//! Application state shared across handlers

use crate::auth_client::AuthClient;
use crate::repositories::{BudgetRepository, ExpenseRepository};
use crate::session::SessionStore;
use crate::trust::TrustPolicy;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub budget_repository: BudgetRepository,
    pub expense_repository: ExpenseRepository,
    pub session_store: SessionStore,
    pub trust_policy: TrustPolicy,
    pub auth_client: AuthClient,
}
