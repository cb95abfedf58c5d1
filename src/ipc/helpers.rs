use chrono::NaiveDate;
use serde::de::DeserializeOwned;

use crate::ipc::error::HandlerErr;
use crate::ipc::types::AppState;
use crate::users::{Role, User};
use crate::workspace::Workspace;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_optional_bool(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<bool>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a boolean", key))),
    }
}

pub fn get_date(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    let raw = get_required_str(params, key)?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

/// Deserializes the whole params object into `T`.
pub fn parse_params<T: DeserializeOwned>(params: &serde_json::Value) -> Result<T, HandlerErr> {
    serde_json::from_value(params.clone()).map_err(|e| HandlerErr::bad_params(e.to_string()))
}

pub fn workspace(state: &AppState) -> Result<&Workspace, HandlerErr> {
    state
        .workspace
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

/// The signed-in user as currently stored, so role changes apply at once.
pub fn current_user(state: &AppState) -> Result<User, HandlerErr> {
    let ws = workspace(state)?;
    let session = state
        .session
        .as_ref()
        .ok_or_else(|| HandlerErr::new("not_signed_in", "sign in first"))?;
    ws.users
        .get(session.user_id())
        .ok_or_else(|| HandlerErr::new("not_signed_in", "the signed-in user no longer exists"))
}

pub fn require_role(state: &AppState, roles: &[Role]) -> Result<User, HandlerErr> {
    let user = current_user(state)?;
    if !roles.contains(&user.role) {
        return Err(HandlerErr::new(
            "forbidden",
            format!("not allowed for role {}", user.role),
        ));
    }
    Ok(user)
}

pub const STAFF: &[Role] = &[Role::Teacher, Role::Admin];
pub const ADMIN: &[Role] = &[Role::Admin];
pub const STUDENT: &[Role] = &[Role::Student];
pub const ANY_ROLE: &[Role] = &[Role::Student, Role::Teacher, Role::Admin];
