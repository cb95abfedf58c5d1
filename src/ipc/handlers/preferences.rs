use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{parse_params, workspace};
use crate::ipc::types::{AppState, Request};
use crate::preferences::PreferencePatch;
use serde_json::json;

// Preferences are read before anyone signs in (remembered e-mail), so these
// only need a workspace.

fn get(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let prefs = workspace(state)?.preferences.get();
    Ok(json!({ "preferences": prefs }))
}

fn update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let patch: PreferencePatch = match req.params.get("patch") {
        Some(p) => parse_params(p)?,
        None => return Err(HandlerErr::bad_params("missing patch")),
    };
    let prefs = workspace(state)?.preferences.update(patch)?;
    Ok(json!({ "preferences": prefs }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "preferences.get" => get(state, req),
        "preferences.update" => update(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
