//! Budget and expense repositories with Postgres and in-memory backends
//!
//! Every operation is scoped by `user_id`; update and delete match on both
//! the record id and the owner, so a record owned by another user is
//! indistinguishable from a missing one.

use anyhow::Result;
use chrono::Utc;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Budget, Expense, NewBudget, NewExpense};

#[derive(Clone)]
enum Backend<T> {
    Postgres(PgPool),
    Memory(Arc<RwLock<HashMap<Uuid, T>>>),
}

/// Monthly budget repository
#[derive(Clone)]
pub struct BudgetRepository {
    backend: Backend<Budget>,
}

impl BudgetRepository {
    /// Create a repository backed by PostgreSQL
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            backend: Backend::Postgres(pool),
        }
    }

    /// Create a repository backed by an in-memory map (not durable)
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(RwLock::new(HashMap::new()))),
        }
    }

    /// Create a new budget for a user
    pub async fn create(&self, user_id: Uuid, new: NewBudget) -> Result<Budget> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let row = sqlx::query(
                    r#"
                    INSERT INTO monthly_budgets (user_id, amount, category, month)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id, user_id, amount, category, month, created_at, updated_at
                    "#,
                )
                .bind(user_id)
                .bind(new.amount)
                .bind(&new.category)
                .bind(&new.month)
                .fetch_one(pool)
                .await?;

                Ok(budget_from_row(&row))
            }
            Backend::Memory(map) => {
                let budget = Budget {
                    id: Uuid::new_v4(),
                    user_id,
                    amount: new.amount,
                    category: new.category,
                    month: new.month,
                    created_at: Utc::now(),
                    updated_at: None,
                };
                map.write().await.insert(budget.id, budget.clone());
                Ok(budget)
            }
        }
    }

    /// Get all budgets for a user
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Budget>> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let rows = sqlx::query(
                    r#"
                    SELECT id, user_id, amount, category, month, created_at, updated_at
                    FROM monthly_budgets
                    WHERE user_id = $1
                    ORDER BY created_at DESC
                    "#,
                )
                .bind(user_id)
                .fetch_all(pool)
                .await?;

                Ok(rows.iter().map(budget_from_row).collect())
            }
            Backend::Memory(map) => {
                let mut budgets: Vec<Budget> = map
                    .read()
                    .await
                    .values()
                    .filter(|b| b.user_id == user_id)
                    .cloned()
                    .collect();
                budgets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                Ok(budgets)
            }
        }
    }

    /// Get a user's budgets for one month
    pub async fn list_for_month(&self, user_id: Uuid, month: &str) -> Result<Vec<Budget>> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let rows = sqlx::query(
                    r#"
                    SELECT id, user_id, amount, category, month, created_at, updated_at
                    FROM monthly_budgets
                    WHERE user_id = $1 AND month = $2
                    "#,
                )
                .bind(user_id)
                .bind(month)
                .fetch_all(pool)
                .await?;

                Ok(rows.iter().map(budget_from_row).collect())
            }
            Backend::Memory(map) => Ok(map
                .read()
                .await
                .values()
                .filter(|b| b.user_id == user_id && b.month == month)
                .cloned()
                .collect()),
        }
    }

    /// Update a budget matching both id and owner; None when no match
    pub async fn update(&self, id: Uuid, user_id: Uuid, new: NewBudget) -> Result<Option<Budget>> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let row = sqlx::query(
                    r#"
                    UPDATE monthly_budgets
                    SET amount = $3, category = $4, month = $5, updated_at = now()
                    WHERE id = $1 AND user_id = $2
                    RETURNING id, user_id, amount, category, month, created_at, updated_at
                    "#,
                )
                .bind(id)
                .bind(user_id)
                .bind(new.amount)
                .bind(&new.category)
                .bind(&new.month)
                .fetch_optional(pool)
                .await?;

                Ok(row.as_ref().map(budget_from_row))
            }
            Backend::Memory(map) => {
                let mut map = map.write().await;
                match map.get_mut(&id) {
                    Some(budget) if budget.user_id == user_id => {
                        budget.amount = new.amount;
                        budget.category = new.category;
                        budget.month = new.month;
                        budget.updated_at = Some(Utc::now());
                        Ok(Some(budget.clone()))
                    }
                    _ => Ok(None),
                }
            }
        }
    }

    /// Delete a budget matching both id and owner; false when no match
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let result = sqlx::query(
                    r#"
                    DELETE FROM monthly_budgets
                    WHERE id = $1 AND user_id = $2
                    "#,
                )
                .bind(id)
                .bind(user_id)
                .execute(pool)
                .await?;

                Ok(result.rows_affected() > 0)
            }
            Backend::Memory(map) => {
                let mut map = map.write().await;
                match map.get(&id) {
                    Some(budget) if budget.user_id == user_id => {
                        map.remove(&id);
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            }
        }
    }
}

/// Daily expense repository
#[derive(Clone)]
pub struct ExpenseRepository {
    backend: Backend<Expense>,
}

impl ExpenseRepository {
    /// Create a repository backed by PostgreSQL
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            backend: Backend::Postgres(pool),
        }
    }

    /// Create a repository backed by an in-memory map (not durable)
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(RwLock::new(HashMap::new()))),
        }
    }

    /// Create a new expense for a user
    pub async fn create(&self, user_id: Uuid, new: NewExpense) -> Result<Expense> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let row = sqlx::query(
                    r#"
                    INSERT INTO daily_expenses (user_id, amount, description, category, date)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id, user_id, amount, description, category, date, created_at, updated_at
                    "#,
                )
                .bind(user_id)
                .bind(new.amount)
                .bind(&new.description)
                .bind(&new.category)
                .bind(&new.date)
                .fetch_one(pool)
                .await?;

                Ok(expense_from_row(&row))
            }
            Backend::Memory(map) => {
                let expense = Expense {
                    id: Uuid::new_v4(),
                    user_id,
                    amount: new.amount,
                    description: new.description,
                    category: new.category,
                    date: new.date,
                    created_at: Utc::now(),
                    updated_at: None,
                };
                map.write().await.insert(expense.id, expense.clone());
                Ok(expense)
            }
        }
    }

    /// Get all expenses for a user
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Expense>> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let rows = sqlx::query(
                    r#"
                    SELECT id, user_id, amount, description, category, date, created_at, updated_at
                    FROM daily_expenses
                    WHERE user_id = $1
                    ORDER BY created_at DESC
                    "#,
                )
                .bind(user_id)
                .fetch_all(pool)
                .await?;

                Ok(rows.iter().map(expense_from_row).collect())
            }
            Backend::Memory(map) => {
                let mut expenses: Vec<Expense> = map
                    .read()
                    .await
                    .values()
                    .filter(|e| e.user_id == user_id)
                    .cloned()
                    .collect();
                expenses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                Ok(expenses)
            }
        }
    }

    /// Get a user's expenses dated within one month ("YYYY-MM" prefix)
    pub async fn list_for_month(&self, user_id: Uuid, month: &str) -> Result<Vec<Expense>> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let rows = sqlx::query(
                    r#"
                    SELECT id, user_id, amount, description, category, date, created_at, updated_at
                    FROM daily_expenses
                    WHERE user_id = $1 AND date LIKE $2 || '-%'
                    "#,
                )
                .bind(user_id)
                .bind(month)
                .fetch_all(pool)
                .await?;

                Ok(rows.iter().map(expense_from_row).collect())
            }
            Backend::Memory(map) => Ok(map
                .read()
                .await
                .values()
                .filter(|e| e.user_id == user_id && e.date.starts_with(month))
                .cloned()
                .collect()),
        }
    }

    /// Update an expense matching both id and owner; None when no match
    pub async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        new: NewExpense,
    ) -> Result<Option<Expense>> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let row = sqlx::query(
                    r#"
                    UPDATE daily_expenses
                    SET amount = $3, description = $4, category = $5, date = $6, updated_at = now()
                    WHERE id = $1 AND user_id = $2
                    RETURNING id, user_id, amount, description, category, date, created_at, updated_at
                    "#,
                )
                .bind(id)
                .bind(user_id)
                .bind(new.amount)
                .bind(&new.description)
                .bind(&new.category)
                .bind(&new.date)
                .fetch_optional(pool)
                .await?;

                Ok(row.as_ref().map(expense_from_row))
            }
            Backend::Memory(map) => {
                let mut map = map.write().await;
                match map.get_mut(&id) {
                    Some(expense) if expense.user_id == user_id => {
                        expense.amount = new.amount;
                        expense.description = new.description;
                        expense.category = new.category;
                        expense.date = new.date;
                        expense.updated_at = Some(Utc::now());
                        Ok(Some(expense.clone()))
                    }
                    _ => Ok(None),
                }
            }
        }
    }

    /// Delete an expense matching both id and owner; false when no match
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let result = sqlx::query(
                    r#"
                    DELETE FROM daily_expenses
                    WHERE id = $1 AND user_id = $2
                    "#,
                )
                .bind(id)
                .bind(user_id)
                .execute(pool)
                .await?;

                Ok(result.rows_affected() > 0)
            }
            Backend::Memory(map) => {
                let mut map = map.write().await;
                match map.get(&id) {
                    Some(expense) if expense.user_id == user_id => {
                        map.remove(&id);
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            }
        }
    }
}

fn budget_from_row(row: &sqlx::postgres::PgRow) -> Budget {
    Budget {
        id: row.get("id"),
        user_id: row.get("user_id"),
        amount: row.get("amount"),
        category: row.get("category"),
        month: row.get("month"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn expense_from_row(row: &sqlx::postgres::PgRow) -> Expense {
    Expense {
        id: row.get("id"),
        user_id: row.get("user_id"),
        amount: row.get("amount"),
        description: row.get("description"),
        category: row.get("category"),
        date: row.get("date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
