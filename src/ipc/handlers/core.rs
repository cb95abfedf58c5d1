use crate::ipc::error::{err, ok, respond, HandlerErr};
use crate::ipc::helpers::{get_optional_str, workspace};
use crate::ipc::types::{AppState, Request};
use crate::workspace::open_workspace;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "dataDir": state.workspace.as_ref().map(|w| w.dir.to_string_lossy().to_string()),
            "signedIn": state.session.is_some(),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = get_optional_str(&req.params, "path")
        .map(PathBuf::from)
        .unwrap_or_else(|| state.config.data_dir.clone());

    let cipher = match state.config.cipher() {
        Ok(c) => c,
        Err(e) => return err(&req.id, "crypto_failed", e.to_string(), None),
    };

    let ws = match open_workspace(&path, cipher) {
        Ok(ws) => ws,
        Err(e) => {
            return err(
                &req.id,
                "workspace_open_failed",
                e.to_string(),
                Some(json!({ "path": path.to_string_lossy() })),
            )
        }
    };

    // The default admin must not prevent the data directory from opening.
    if let Err(e) = ws.ensure_admin(&state.config.default_admin) {
        tracing::warn!("Unable to create default admin: {}", e);
    }

    let counts = json!({
        "dataDir": path.to_string_lossy(),
        "userCount": ws.users.all().len(),
        "homeworkCount": ws.homeworks.all().len(),
        "certificateCount": ws.certificates.all().len(),
        "loginLogCount": ws.logins.all().len(),
    });
    state.workspace = Some(ws);
    state.session = None;
    ok(&req.id, counts)
}

fn clock_now(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    workspace(state)?;
    Ok(json!({
        "now": state.clock.now(),
        "source": state.clock.source(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "clock.now" => Some(respond(&req.id, clock_now(state))),
        _ => None,
    }
}
