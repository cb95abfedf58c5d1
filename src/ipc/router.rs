use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!("Request {} {}", req.id, req.method);

    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::auth::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::users::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::homework::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::certificates::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::logs::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::preferences::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::backup::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
