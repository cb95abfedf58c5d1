use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_optional_str, require_role, workspace, ADMIN};
use crate::ipc::types::{AppState, Request};
use crate::login_log::LoginAction;
use serde_json::json;

fn list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_role(state, ADMIN)?;
    let user_id = get_optional_str(&req.params, "userId");
    let action = get_optional_str(&req.params, "action")
        .map(|a| a.parse::<LoginAction>())
        .transpose()
        .map_err(|e| HandlerErr::bad_params(e.to_string()))?;
    let logs = workspace(state)?.logins.filter(user_id.as_deref(), action);
    Ok(json!({ "logs": logs }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "logs.list" => Some(respond(&req.id, list(state, req))),
        _ => None,
    }
}
