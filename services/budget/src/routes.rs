//! Budget service routes
//!
//! Pages (login/register/logout/dashboard) are form- and cookie-driven;
//! everything under /api is JSON and gated by the session trust policy.
//! The UI itself is a minimal shell: rendering is not this service's job.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post, put},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analytics;
use crate::auth_client::{AuthClientError, AuthTokens};
use crate::error::ApiError;
use crate::models::{BudgetPayload, CredentialsForm, ExpensePayload, NewBudget, NewExpense};
use crate::session::{SESSION_COOKIE, Session};
use crate::state::AppState;

/// Create the router for the budget service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(index))
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/logout", post(logout))
        .route("/dashboard", get(dashboard))
        .route("/api/monthly-budgets", post(create_budget).get(list_budgets))
        .route(
            "/api/monthly-budgets/:id",
            put(update_budget).delete(delete_budget),
        )
        .route("/api/daily-expenses", post(create_expense).get(list_expenses))
        .route(
            "/api/daily-expenses/:id",
            put(update_expense).delete(delete_expense),
        )
        .route("/api/analytics/summary", get(analytics_summary))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "budget-service",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Look up the session for the request cookie and run its token through the
/// trust policy
async fn authenticated_session(state: &AppState, jar: &CookieJar) -> Option<Session> {
    let cookie = jar.get(SESSION_COOKIE)?;
    let session_id = Uuid::parse_str(cookie.value()).ok()?;
    let session = state.session_store.get(session_id).await?;

    if state.trust_policy.evaluate(&session.token).is_accepted() {
        Some(session)
    } else {
        None
    }
}

async fn require_session(state: &AppState, jar: &CookieJar) -> Result<Session, ApiError> {
    authenticated_session(state, jar)
        .await
        .ok_or(ApiError::Unauthorized)
}

// Pages

/// Login/register page, or straight to the dashboard when already signed in
pub async fn index(State(state): State<AppState>, jar: CookieJar) -> Response {
    if authenticated_session(&state, &jar).await.is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    Html(login_page(None)).into_response()
}

/// Handle the login form
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    axum::Form(form): axum::Form<CredentialsForm>,
) -> Response {
    if form.username.trim().is_empty() || form.password.is_empty() {
        return Html(login_page(Some("Username and password are required"))).into_response();
    }

    match state.auth_client.login(&form.username, &form.password).await {
        Ok(tokens) => establish_session(&state, tokens, jar).await,
        Err(AuthClientError::InvalidCredentials) => {
            Html(login_page(Some("Invalid credentials"))).into_response()
        }
        Err(AuthClientError::Unavailable(reason)) => {
            degraded_login(&state, &form.username, jar, &reason).await
        }
        Err(e) => Html(login_page(Some(&e.to_string()))).into_response(),
    }
}

/// Handle the registration form
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    axum::Form(form): axum::Form<CredentialsForm>,
) -> Response {
    if form.username.trim().is_empty() || form.password.is_empty() {
        return Html(login_page(Some("Username and password are required"))).into_response();
    }

    match state
        .auth_client
        .register(&form.username, &form.password)
        .await
    {
        Ok(tokens) => establish_session(&state, tokens, jar).await,
        Err(AuthClientError::Unavailable(reason)) => {
            degraded_login(&state, &form.username, jar, &reason).await
        }
        Err(e) => Html(login_page(Some(&e.to_string()))).into_response(),
    }
}

/// Clear the session and its cookie
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(session_id) = Uuid::parse_str(cookie.value()) {
            state.session_store.remove(session_id).await;
        }
    }

    info!("User logged out");
    let jar = jar.remove(Cookie::from(SESSION_COOKIE));
    (jar, Redirect::to("/")).into_response()
}

/// Budget dashboard; back to the login page when unauthenticated
pub async fn dashboard(State(state): State<AppState>, jar: CookieJar) -> Response {
    match authenticated_session(&state, &jar).await {
        Some(session) => Html(dashboard_page(&session.username)).into_response(),
        None => Redirect::to("/").into_response(),
    }
}

/// Store the issued tokens in a fresh session and point the browser at the
/// dashboard
async fn establish_session(state: &AppState, tokens: AuthTokens, jar: CookieJar) -> Response {
    let session_id = state
        .session_store
        .create(
            tokens.user_id,
            &tokens.username,
            &tokens.access_token,
            &tokens.refresh_token,
        )
        .await;

    info!("Login successful for user: {}", tokens.username);

    let cookie = Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .path("/")
        .http_only(true)
        .build();

    (jar.add(cookie), Redirect::to("/dashboard")).into_response()
}

/// Degraded local-trust path for when the identity service is unreachable
///
/// Only available when a sentinel token is configured: the session is minted
/// locally with a deterministic pseudo-identity (UUIDv5 of the username), so
/// the same username keeps seeing its own records across degraded logins.
/// Without a sentinel the failure is surfaced instead of silently trusted.
async fn degraded_login(
    state: &AppState,
    username: &str,
    jar: CookieJar,
    reason: &str,
) -> Response {
    let Some(sentinel) = state.trust_policy.config().sentinel_token.clone() else {
        error!("Identity service unavailable and no sentinel configured: {}", reason);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(login_page(Some("Authentication service is unavailable"))),
        )
            .into_response();
    };

    warn!(
        "Identity service unavailable ({}), degraded login for user: {}",
        reason, username
    );

    let user_id = Uuid::new_v5(&Uuid::NAMESPACE_OID, username.as_bytes());
    let tokens = AuthTokens {
        user_id,
        username: username.to_string(),
        access_token: sentinel,
        refresh_token: String::new(),
    };

    establish_session(state, tokens, jar).await
}

// Budget API

/// Create a new monthly budget
pub async fn create_budget(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<BudgetPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let session = require_session(&state, &jar).await?;
    let new = validate_budget(payload)?;

    let budget = state
        .budget_repository
        .create(session.user_id, new)
        .await
        .map_err(|e| {
            error!("Failed to create budget: {}", e);
            ApiError::Internal
        })?;

    info!(
        "Created monthly budget for user {}: {} - ${}",
        session.user_id, budget.category, budget.amount
    );
    Ok((StatusCode::CREATED, Json(budget)))
}

/// Get the user's monthly budgets
pub async fn list_budgets(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let session = require_session(&state, &jar).await?;

    let budgets = state
        .budget_repository
        .list(session.user_id)
        .await
        .map_err(|e| {
            error!("Failed to list budgets: {}", e);
            ApiError::Internal
        })?;

    Ok(Json(budgets))
}

/// Update a monthly budget owned by the current user
pub async fn update_budget(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<BudgetPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let session = require_session(&state, &jar).await?;
    let new = validate_budget(payload)?;

    let updated = state
        .budget_repository
        .update(id, session.user_id, new)
        .await
        .map_err(|e| {
            error!("Failed to update budget: {}", e);
            ApiError::Internal
        })?
        .ok_or_else(|| ApiError::NotFound("Budget not found".to_string()))?;

    Ok(Json(updated))
}

/// Delete a monthly budget owned by the current user
pub async fn delete_budget(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = require_session(&state, &jar).await?;

    let deleted = state
        .budget_repository
        .delete(id, session.user_id)
        .await
        .map_err(|e| {
            error!("Failed to delete budget: {}", e);
            ApiError::Internal
        })?;

    if deleted {
        Ok(Json(serde_json::json!({"message": "Budget deleted successfully"})))
    } else {
        Err(ApiError::NotFound("Budget not found".to_string()))
    }
}

// Expense API

/// Create a new daily expense
pub async fn create_expense(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<ExpensePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let session = require_session(&state, &jar).await?;
    let new = validate_expense(payload)?;

    let expense = state
        .expense_repository
        .create(session.user_id, new)
        .await
        .map_err(|e| {
            error!("Failed to create expense: {}", e);
            ApiError::Internal
        })?;

    info!(
        "Created daily expense for user {}: {} - ${}",
        session.user_id, expense.description, expense.amount
    );
    Ok((StatusCode::CREATED, Json(expense)))
}

/// Get the user's daily expenses
pub async fn list_expenses(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let session = require_session(&state, &jar).await?;

    let expenses = state
        .expense_repository
        .list(session.user_id)
        .await
        .map_err(|e| {
            error!("Failed to list expenses: {}", e);
            ApiError::Internal
        })?;

    Ok(Json(expenses))
}

/// Update a daily expense owned by the current user
pub async fn update_expense(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<ExpensePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let session = require_session(&state, &jar).await?;
    let new = validate_expense(payload)?;

    let updated = state
        .expense_repository
        .update(id, session.user_id, new)
        .await
        .map_err(|e| {
            error!("Failed to update expense: {}", e);
            ApiError::Internal
        })?
        .ok_or_else(|| ApiError::NotFound("Expense not found".to_string()))?;

    Ok(Json(updated))
}

/// Delete a daily expense owned by the current user
pub async fn delete_expense(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = require_session(&state, &jar).await?;

    let deleted = state
        .expense_repository
        .delete(id, session.user_id)
        .await
        .map_err(|e| {
            error!("Failed to delete expense: {}", e);
            ApiError::Internal
        })?;

    if deleted {
        Ok(Json(serde_json::json!({"message": "Expense deleted successfully"})))
    } else {
        Err(ApiError::NotFound("Expense not found".to_string()))
    }
}

/// Current-month analytics summary
pub async fn analytics_summary(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let session = require_session(&state, &jar).await?;
    let current_month = Utc::now().format("%Y-%m").to_string();

    let budgets = state
        .budget_repository
        .list_for_month(session.user_id, &current_month)
        .await
        .map_err(|e| {
            error!("Failed to list budgets: {}", e);
            ApiError::Internal
        })?;

    let expenses = state
        .expense_repository
        .list_for_month(session.user_id, &current_month)
        .await
        .map_err(|e| {
            error!("Failed to list expenses: {}", e);
            ApiError::Internal
        })?;

    Ok(Json(analytics::summarize(&budgets, &expenses)))
}

fn validate_budget(payload: BudgetPayload) -> Result<NewBudget, ApiError> {
    let (Some(amount), Some(category)) = (payload.amount, payload.category) else {
        return Err(ApiError::Validation(
            "Amount and category are required".to_string(),
        ));
    };
    if category.trim().is_empty() {
        return Err(ApiError::Validation(
            "Amount and category are required".to_string(),
        ));
    }

    Ok(NewBudget {
        amount,
        category,
        month: payload
            .month
            .unwrap_or_else(|| Utc::now().format("%Y-%m").to_string()),
    })
}

fn validate_expense(payload: ExpensePayload) -> Result<NewExpense, ApiError> {
    let (Some(amount), Some(description)) = (payload.amount, payload.description) else {
        return Err(ApiError::Validation(
            "Amount and description are required".to_string(),
        ));
    };
    if description.trim().is_empty() {
        return Err(ApiError::Validation(
            "Amount and description are required".to_string(),
        ));
    }

    Ok(NewExpense {
        amount,
        description,
        category: payload.category.unwrap_or_else(|| "Other".to_string()),
        date: payload
            .date
            .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string()),
    })
}

// Minimal HTML shells; real rendering is out of scope for this service.

fn login_page(error: Option<&str>) -> String {
    let error_block = error
        .map(|e| format!("<p class=\"error\">{}</p>", escape(e)))
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n<html><head><title>Budget Planner</title></head><body>\
         <h1>Budget Planner</h1>{error_block}\
         <form method=\"post\" action=\"/login\">\
         <input name=\"username\" placeholder=\"Username\">\
         <input name=\"password\" type=\"password\" placeholder=\"Password\">\
         <button type=\"submit\">Login</button></form>\
         <form method=\"post\" action=\"/register\">\
         <input name=\"username\" placeholder=\"Username\">\
         <input name=\"password\" type=\"password\" placeholder=\"Password\">\
         <button type=\"submit\">Register</button></form>\
         </body></html>"
    )
}

fn dashboard_page(username: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><title>Dashboard - Budget Planner</title></head><body>\
         <h1>Welcome, {}</h1>\
         <p>Manage budgets and expenses via /api/monthly-budgets, /api/daily-expenses \
         and /api/analytics/summary.</p>\
         <form method=\"post\" action=\"/logout\"><button type=\"submit\">Logout</button></form>\
         </body></html>",
        escape(username)
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
