//! `POST /register`: create an account.
//!
//! Validation failures, duplicates, and unreadable bodies are reported as
//! `success: false` with a user-facing message; the status stays 200 so the
//! page can show the message in its banner.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use events::{RegisterRequest, RegisterResponse};
use tracing::{info, warn};

use crate::services::accounts;
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Json<RegisterResponse> {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            warn!(status = %rejection.status(), error = %rejection.body_text(), "unreadable registration request");
            return Json(RegisterResponse::rejected("Invalid registration request"));
        }
    };

    match accounts::register(&state, &req).await {
        Ok(_) => Json(RegisterResponse::ok("User registered successfully")),
        Err(e) => {
            info!(username = %req.username.trim(), error = %e, "registration rejected");
            Json(RegisterResponse::rejected(e.to_string()))
        }
    }
}

#[cfg(test)]
#[path = "register_test.rs"]
mod tests;
