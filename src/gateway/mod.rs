//! HTTP surface of the HR mailbox dashboard.
//!
//! Every `/email/*` route requires a signed session cookie carrying the `hr`
//! role; anything else is redirected to the login page before the mailbox is
//! touched. Mailbox queries run on the blocking pool.
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use hrmail_mailbox::model::display_subject;
use hrmail_mailbox::{MailboxDB, MailboxStats, Message, NO_SUBJECT, ThreadSummary};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::errors::HrmailError;
use crate::session::{self, SessionClaims, SessionKey};

pub const LOGIN_PATH: &str = "/auth/login";
pub const DASHBOARD_PATH: &str = "/email/dashboard";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct GatewayState {
    mailbox: Arc<MailboxDB>,
    sessions: Arc<SessionKey>,
    cookie_name: Arc<str>,
    list_limit: usize,
}

impl GatewayState {
    pub fn new(
        mailbox: Arc<MailboxDB>,
        sessions: SessionKey,
        cookie_name: &str,
        list_limit: usize,
    ) -> Self {
        Self {
            mailbox,
            sessions: Arc::new(sessions),
            cookie_name: Arc::from(cookie_name),
            list_limit,
        }
    }

    fn session(&self, headers: &HeaderMap) -> Option<SessionClaims> {
        let token = session::cookie_value(headers, &self.cookie_name)?;
        match self.sessions.verify(token, Utc::now()) {
            Ok(claims) => Some(claims),
            Err(e) => {
                debug!("rejected session cookie: {}", e);
                None
            }
        }
    }
}

/// An authenticated caller holding the HR role.
#[derive(Debug, Clone)]
pub struct HrSession(pub SessionClaims);

impl FromRequestParts<GatewayState> for HrSession {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GatewayState,
    ) -> Result<Self, Self::Rejection> {
        match state.session(&parts.headers) {
            Some(claims) if claims.is_hr() => Ok(Self(claims)),
            Some(claims) => {
                warn!(
                    "user {} with role {} denied access to {}",
                    claims.username,
                    claims.role,
                    parts.uri.path()
                );
                Err(Redirect::to(LOGIN_PATH))
            }
            None => {
                debug!("no HR session for {}, redirecting", parts.uri.path());
                Err(Redirect::to(LOGIN_PATH))
            }
        }
    }
}

impl IntoResponse for HrmailError {
    fn into_response(self) -> Response {
        match self {
            Self::Auth(_) => Redirect::to(LOGIN_PATH).into_response(),
            Self::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "failed to load mailbox".into(),
                }),
            )
                .into_response(),
            Self::Config(_) | Self::Internal(_) => {
                error!("gateway error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "internal error".into(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct Section {
    pub name: &'static str,
    pub path: &'static str,
}

const SECTIONS: &[Section] = &[
    Section {
        name: "inbox",
        path: "/email/inbox",
    },
    Section {
        name: "sent",
        path: "/email/sent",
    },
    Section {
        name: "compose",
        path: "/email/compose",
    },
    Section {
        name: "stats",
        path: "/email/stats",
    },
];

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub username: String,
    pub sections: &'static [Section],
}

#[derive(Debug, Serialize)]
pub struct InboxResponse {
    pub username: String,
    pub threads: Vec<ThreadSummary>,
}

#[derive(Debug, Serialize)]
pub struct ThreadResponse {
    pub thread_id: String,
    pub subject: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct SentResponse {
    pub username: String,
    pub emails: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct ComposeResponse {
    pub username: String,
    pub template_types: Vec<String>,
    /// Always false until outbound delivery exists.
    pub send_enabled: bool,
}

/// Run a mailbox query on the blocking pool.
async fn with_mailbox<T, F>(state: &GatewayState, what: &'static str, f: F) -> Result<T, HrmailError>
where
    T: Send + 'static,
    F: FnOnce(&MailboxDB) -> Result<T> + Send + 'static,
{
    let mailbox = state.mailbox.clone();
    tokio::task::spawn_blocking(move || f(&mailbox))
        .await
        .map_err(|e| HrmailError::Internal(anyhow::anyhow!("mailbox task failed: {}", e)))?
        .map_err(|e| {
            error!("{}: {:#}", what, e);
            HrmailError::storage(&e)
        })
}

/// Build the HTTP router.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/api/health", get(health_handler))
        .route(LOGIN_PATH, get(login_handler))
        .route("/auth/logout", get(logout_handler))
        .route(DASHBOARD_PATH, get(dashboard_handler))
        .route("/email/inbox", get(inbox_handler))
        .route("/email/thread/{thread_id}", get(thread_handler))
        .route("/email/sent", get(sent_handler))
        .route("/email/compose", get(compose_handler))
        .route("/email/stats", get(stats_handler))
        .with_state(state)
}

/// GET /: send HR users to the dashboard, everyone else to login.
async fn root_handler(State(state): State<GatewayState>, headers: HeaderMap) -> Redirect {
    match state.session(&headers) {
        Some(claims) if claims.is_hr() => Redirect::to(DASHBOARD_PATH),
        _ => Redirect::to(LOGIN_PATH),
    }
}

/// GET /api/health: health check endpoint.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION
    }))
}

/// GET /auth/login: redirect target for callers without a session.
async fn login_handler() -> impl IntoResponse {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: "login required".into(),
        }),
    )
}

/// GET /auth/logout: drop the session cookie.
async fn logout_handler(State(state): State<GatewayState>) -> impl IntoResponse {
    (
        [(SET_COOKIE, session::clear_session_cookie(&state.cookie_name))],
        Redirect::to(LOGIN_PATH),
    )
}

async fn dashboard_handler(HrSession(user): HrSession) -> Json<DashboardResponse> {
    Json(DashboardResponse {
        username: user.username,
        sections: SECTIONS,
    })
}

async fn inbox_handler(
    State(state): State<GatewayState>,
    HrSession(user): HrSession,
) -> Result<Json<InboxResponse>, HrmailError> {
    let limit = state.list_limit;
    let threads = with_mailbox(&state, "loading inbox", move |db| {
        db.get_inbox_threads(Some(limit))
    })
    .await?;
    debug!("inbox for {}: {} threads", user.username, threads.len());
    Ok(Json(InboxResponse {
        username: user.username,
        threads,
    }))
}

/// GET /email/thread/{id}: unknown threads render an empty conversation.
async fn thread_handler(
    State(state): State<GatewayState>,
    HrSession(user): HrSession,
    Path(thread_id): Path<String>,
) -> Result<Json<ThreadResponse>, HrmailError> {
    let id = thread_id.clone();
    let messages = with_mailbox(&state, "loading thread", move |db| {
        db.get_thread_messages(&id)
    })
    .await?;
    debug!(
        "thread {} for {}: {} messages",
        thread_id,
        user.username,
        messages.len()
    );
    let subject = messages
        .first()
        .map_or_else(|| NO_SUBJECT.to_string(), |m| display_subject(&m.subject));
    Ok(Json(ThreadResponse {
        thread_id,
        subject,
        messages,
    }))
}

async fn sent_handler(
    State(state): State<GatewayState>,
    HrSession(user): HrSession,
) -> Result<Json<SentResponse>, HrmailError> {
    let limit = state.list_limit;
    let emails = with_mailbox(&state, "loading sent emails", move |db| {
        db.get_sent_emails(Some(limit))
    })
    .await?;
    Ok(Json(SentResponse {
        username: user.username,
        emails,
    }))
}

/// GET /email/compose: placeholder until AI-assisted drafting is wired in.
async fn compose_handler(
    State(state): State<GatewayState>,
    HrSession(user): HrSession,
) -> Result<Json<ComposeResponse>, HrmailError> {
    let template_types =
        with_mailbox(&state, "listing template types", MailboxDB::get_template_types).await?;
    Ok(Json(ComposeResponse {
        username: user.username,
        template_types,
        send_enabled: false,
    }))
}

async fn stats_handler(
    State(state): State<GatewayState>,
    HrSession(_user): HrSession,
) -> Result<Json<MailboxStats>, HrmailError> {
    let stats = with_mailbox(&state, "computing stats", MailboxDB::get_email_stats).await?;
    Ok(Json(stats))
}

/// Start the HTTP server. Returns a join handle and the bound address.
/// The server drains in-flight requests once `shutdown` resolves.
pub async fn start<F>(
    host: &str,
    port: u16,
    state: GatewayState,
    shutdown: F,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr)>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local = listener.local_addr()?;
    info!("HR mailbox dashboard listening on http://{}", local);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("HTTP server error: {}", e);
        }
    });

    Ok((handle, local))
}
