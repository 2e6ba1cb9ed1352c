use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Form, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{error, info, warn};

use super::view::{DashboardView, login_page};
use crate::error::Result;
use crate::pipeline::local_today;
use crate::store::Store;

/// Shared by every request. The password is resolved once at startup.
#[derive(Clone)]
pub struct DashboardState {
    database_url: Arc<str>,
    password: Arc<str>,
    timezone: Tz,
}

impl DashboardState {
    pub fn new(database_url: &str, password: &str, timezone: Tz) -> Self {
        Self {
            database_url: database_url.into(),
            password: password.into(),
            timezone,
        }
    }
}

#[derive(Deserialize)]
struct Login {
    password: String,
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(show_login).post(submit_login))
        .route("/health", get(health))
        .with_state(state)
}

#[tracing::instrument(skip(state))]
pub async fn serve(state: DashboardState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Dashboard listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn show_login() -> Html<String> {
    Html(login_page(None))
}

async fn submit_login(State(state): State<DashboardState>, Form(login): Form<Login>) -> Response {
    if !password_matches(&login.password, &state.password) {
        warn!("Dashboard login rejected");
        return (
            StatusCode::UNAUTHORIZED,
            Html(login_page(Some("Password incorrect"))),
        )
            .into_response();
    }

    let today = local_today(state.timezone, Utc::now());
    match load_rows(&state.database_url).await {
        Ok(rows) => {
            let view = DashboardView::build(rows, today);
            info!(%today, available = view.is_available(), "Dashboard rendered");
            Html(view.to_html()).into_response()
        }
        Err(e) => {
            error!(error = %e, "Dashboard data load failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Html(DashboardView::NotAvailable.to_html()),
            )
                .into_response()
        }
    }
}

/// One connection per render: open, read, close.
async fn load_rows(database_url: &str) -> Result<Vec<crate::analyzers::types::CombinedRow>> {
    let mut store = Store::connect(database_url).await?;
    let rows = store.read_combined().await?;
    store.close().await?;
    Ok(rows)
}

/// Compares every byte so timing does not reveal the matching prefix.
fn password_matches(given: &str, expected: &str) -> bool {
    let (a, b) = (given.as_bytes(), expected.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
