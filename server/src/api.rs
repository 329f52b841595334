//! # REST API
//!
//! Builds the axum router for the TALLY HTTP surface. All endpoints
//! share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                  | Auth | Description                     |
//! |--------|-----------------------|------|---------------------------------|
//! | GET    | `/health`             | no   | Liveness probe                  |
//! | POST   | `/login`              | no   | Email/password login            |
//! | POST   | `/users`              | no   | Register an account             |
//! | GET    | `/users`              | yes  | Paginated user listing          |
//! | GET    | `/users/:id`          | yes  | Account profile                 |
//! | PUT    | `/users/:id`          | yes  | Update name/email               |
//! | PATCH  | `/users/:id/password` | yes  | Change password                 |
//! | DELETE | `/users/:id`          | yes  | Delete account                  |
//! | GET    | `/transactions`       | yes  | Paginated transfer listing      |
//! | POST   | `/transactions`       | yes  | Create a transfer               |
//! | GET    | `/transactions/:id`   | yes  | Transfer detail                 |
//! | PUT    | `/transactions/:id`   | yes  | Correct a transfer              |
//! | DELETE | `/transactions/:id`   | yes  | Delete a transfer record        |
//!
//! Authentication is a bearer token from `/login`, resolved through the
//! session store by [`authenticate`] at the top of each protected
//! handler. Request validation (presence, 1–100 character strings,
//! numeric amounts) runs before any workflow is invoked; the workflows
//! still enforce their own existence and business rules.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tally_ledger::auth::{LoginThrottle, Session, SessionStore};
use tally_ledger::config::{MAX_FIELD_LENGTH, MIN_FIELD_LENGTH};
use tally_ledger::error::LedgerError;
use tally_ledger::query::{ListQuery, OwnerFilter, OwnerRole};
use tally_ledger::service::{AuthService, TransferService, UserService};
use tally_ledger::store::LedgerDb;

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The server's reported version string.
    pub version: String,
    /// User account workflows.
    pub users: UserService,
    /// Transfer workflows.
    pub transfers: TransferService,
    /// Login workflow (throttle + credentials + session issue).
    pub auth: AuthService,
    /// Session store, shared with `auth`, used by [`authenticate`].
    pub sessions: Arc<SessionStore>,
    /// Login throttle, shared with `auth`, swept by the maintenance loop.
    pub throttle: Arc<LoginThrottle>,
    /// Prometheus metric handles for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Wires the full service stack on top of an open database.
    pub fn new(db: Arc<LedgerDb>, metrics: SharedMetrics) -> Self {
        let throttle = Arc::new(LoginThrottle::default());
        let sessions = Arc::new(SessionStore::default());
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            users: UserService::new(Arc::clone(&db)),
            transfers: TransferService::new(Arc::clone(&db)),
            auth: AuthService::new(db, Arc::clone(&throttle), Arc::clone(&sessions)),
            sessions,
            throttle,
            metrics,
        }
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and
/// tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/login", post(login_handler))
        .route("/users", get(list_users_handler).post(create_user_handler))
        .route(
            "/users/:id",
            get(get_user_handler)
                .put(update_user_handler)
                .delete(delete_user_handler),
        )
        .route("/users/:id/password", patch(change_password_handler))
        .route(
            "/transactions",
            get(list_transactions_handler).post(create_transaction_handler),
        )
        .route(
            "/transactions/:id",
            get(get_transaction_handler)
                .put(update_transaction_handler)
                .delete(delete_transaction_handler),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// An HTTP-shaped error: status code, stable machine-readable code, and
/// a human-readable message. The JSON body is
/// `{"statusCode": ..., "error": ..., "message": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// 401 — missing, malformed, or expired session token.
    fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "missing or invalid session token",
        )
    }

    /// 400 — the request body failed schema validation.
    fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "statusCode": self.status.as_u16(),
            "error": self.code,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = match &err {
            // Credential and lockout failures are refusals, not bad
            // requests.
            LedgerError::InvalidCredentials | LedgerError::TooManyAttempts => {
                StatusCode::FORBIDDEN
            }
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            // Faults the caller can't do anything about.
            LedgerError::PasswordHash(_) | LedgerError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            // Every business-rule rejection.
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self {
            status,
            code: err.kind(),
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Authentication & Validation Pre-conditions
// ---------------------------------------------------------------------------

/// Resolves the request's bearer token to a live session.
///
/// Called at the top of every protected handler — the handler body only
/// runs with a resolved identity in hand.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Session, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(ApiError::unauthorized)?;

    state
        .sessions
        .resolve(token)
        .ok_or_else(ApiError::unauthorized)
}

/// Enforces the 1–100 character bound on a free-text field.
fn require_length(field: &str, value: &str) -> Result<(), ApiError> {
    let chars = value.chars().count();
    if chars < MIN_FIELD_LENGTH || chars > MAX_FIELD_LENGTH {
        return Err(ApiError::validation(format!(
            "{field} must be between {MIN_FIELD_LENGTH} and {MAX_FIELD_LENGTH} characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Request Types
// ---------------------------------------------------------------------------

/// Body for `POST /login`.
#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// Body for `POST /users`.
#[derive(Debug, Deserialize)]
struct CreateUserRequest {
    name: String,
    email: String,
    password: String,
    password_confirm: String,
    balance: u64,
}

/// Body for `PUT /users/:id`.
#[derive(Debug, Deserialize)]
struct UpdateUserRequest {
    name: String,
    email: String,
}

/// Body for `PATCH /users/:id/password`.
#[derive(Debug, Deserialize)]
struct ChangePasswordRequest {
    password_old: String,
    password_new: String,
    password_confirm: String,
}

/// Body for `POST /transactions` and `PUT /transactions/:id`.
#[derive(Debug, Deserialize)]
struct TransactionRequest {
    #[serde(rename = "userSender")]
    user_sender: String,
    #[serde(rename = "userReceiver")]
    user_receiver: String,
    nominal: u64,
    description: String,
}

impl TransactionRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require_length("userSender", &self.user_sender)?;
        require_length("userReceiver", &self.user_receiver)?;
        require_length("description", &self.description)?;
        Ok(())
    }
}

/// Query parameters for `GET /transactions` — the shared list-query
/// fields plus the ownership filter.
#[derive(Debug, Deserialize)]
struct TransactionListParams {
    page_number: Option<u64>,
    page_size: Option<u64>,
    sort: Option<String>,
    search: Option<String>,
    /// Whose transactions to list. Only effective together with `type`.
    user_id: Option<String>,
    /// `sender` or `receiver`. Only effective together with `user_id`.
    #[serde(rename = "type")]
    role: Option<String>,
}

impl TransactionListParams {
    fn list_query(&self) -> ListQuery {
        ListQuery {
            page_number: self.page_number,
            page_size: self.page_size,
            sort: self.sort.clone(),
            search: self.search.clone(),
        }
    }

    /// The ownership filter, present only when both halves are supplied
    /// and the role parses.
    fn owner_filter(&self) -> Option<OwnerFilter> {
        let user_id = self.user_id.clone()?;
        let role = OwnerRole::parse(self.role.as_deref()?)?;
        Some(OwnerFilter { user_id, role })
    }
}

// ---------------------------------------------------------------------------
// Handlers — health & login
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the server is alive.
///
/// This is the liveness probe for orchestrators. It intentionally does
/// not touch the database — a wedged store should show up in metrics
/// and request errors, not take the probe down with it.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "version": state.version,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// `POST /login` — email/password login.
///
/// Success returns the session payload (token included). Failure is
/// 403 with either `INVALID_CREDENTIALS` or, once the throttle bites,
/// `TOO_MANY_FAILED_LOGIN_ATTEMPTS`.
async fn login_handler(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Session>, ApiError> {
    state.metrics.logins_total.inc();

    match state.auth.login(&req.email, &req.password) {
        Ok(session) => Ok(Json(session)),
        Err(err) => {
            match &err {
                LedgerError::TooManyAttempts => state.metrics.login_lockouts_total.inc(),
                LedgerError::InvalidCredentials => state.metrics.login_failures_total.inc(),
                _ => {}
            }
            Err(err.into())
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers — users
// ---------------------------------------------------------------------------

/// `GET /users` — paginated, filtered, sorted user listing.
async fn list_users_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    authenticate(&state, &headers)?;
    let page = state.users.list(&query)?;
    Ok(Json(page).into_response())
}

/// `POST /users` — register an account.
///
/// Open endpoint: registration is how accounts come to exist. The
/// password is checked for confirmation match here and hashed inside
/// the workflow; it exists in plaintext only for the life of this
/// request.
async fn create_user_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Response, ApiError> {
    require_length("name", &req.name)?;
    require_length("email", &req.email)?;
    require_length("password", &req.password)?;
    if req.password != req.password_confirm {
        return Err(ApiError::validation("password confirmation does not match"));
    }

    let profile = state
        .users
        .create(&req.name, &req.email, &req.password, req.balance)?;
    Ok(Json(profile).into_response())
}

/// `GET /users/:id` — account profile.
async fn get_user_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authenticate(&state, &headers)?;
    let profile = state.users.get(&id)?;
    Ok(Json(profile).into_response())
}

/// `PUT /users/:id` — update name and email.
async fn update_user_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Response, ApiError> {
    authenticate(&state, &headers)?;
    require_length("name", &req.name)?;
    require_length("email", &req.email)?;

    let profile = state.users.update(&id, &req.name, &req.email)?;
    Ok(Json(profile).into_response())
}

/// `PATCH /users/:id/password` — change a password.
///
/// Requires the current password; a stolen session alone is not enough
/// to lock the owner out of their account.
async fn change_password_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Response, ApiError> {
    authenticate(&state, &headers)?;
    require_length("password", &req.password_new)?;
    if req.password_new != req.password_confirm {
        return Err(ApiError::validation("password confirmation does not match"));
    }

    state
        .users
        .change_password(&id, &req.password_old, &req.password_new)?;
    Ok(Json(serde_json::json!({ "id": id })).into_response())
}

/// `DELETE /users/:id` — delete an account.
async fn delete_user_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authenticate(&state, &headers)?;
    state.users.delete(&id)?;
    Ok(Json(serde_json::json!({ "id": id })).into_response())
}

// ---------------------------------------------------------------------------
// Handlers — transactions
// ---------------------------------------------------------------------------

/// `GET /transactions` — paginated transfer listing, optionally scoped
/// to one user's view via `user_id` + `type=sender|receiver`.
async fn list_transactions_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TransactionListParams>,
) -> Result<Response, ApiError> {
    authenticate(&state, &headers)?;
    let page = state
        .transfers
        .list(&params.list_query(), params.owner_filter().as_ref())?;
    Ok(Json(page).into_response())
}

/// `POST /transactions` — create a transfer and move the money.
async fn create_transaction_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TransactionRequest>,
) -> Result<Response, ApiError> {
    authenticate(&state, &headers)?;
    req.validate()?;

    match state.transfers.create(
        &req.user_sender,
        &req.user_receiver,
        req.nominal,
        &req.description,
    ) {
        Ok(tx) => {
            state.metrics.transfers_applied_total.inc();
            Ok(Json(tx).into_response())
        }
        Err(err) => {
            state.metrics.transfers_rejected_total.inc();
            Err(err.into())
        }
    }
}

/// `GET /transactions/:id` — transfer detail.
async fn get_transaction_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authenticate(&state, &headers)?;
    let tx = state.transfers.get(&id)?;
    Ok(Json(tx).into_response())
}

/// `PUT /transactions/:id` — correct a transfer, settling any amount
/// delta against both parties' balances.
async fn update_transaction_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<TransactionRequest>,
) -> Result<Response, ApiError> {
    authenticate(&state, &headers)?;
    req.validate()?;

    let tx = state.transfers.update(
        &id,
        &req.user_sender,
        &req.user_receiver,
        req.nominal,
        &req.description,
    )?;
    Ok(Json(tx).into_response())
}

/// `DELETE /transactions/:id` — delete a transfer record. Balances are
/// not reversed; see the transfer workflow docs for why that asymmetry
/// is intentional.
async fn delete_transaction_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authenticate(&state, &headers)?;
    state.transfers.delete(&id)?;
    Ok(Json(serde_json::json!({ "id": id })).into_response())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
