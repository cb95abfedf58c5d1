use crate::auth;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{current_user, get_required_str, workspace};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn login(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let email = get_required_str(&req.params, "email")?;
    let password = get_required_str(&req.params, "password")?;
    let now = state.clock.now();

    let session = {
        let ws = workspace(state)?;
        // A rejected attempt leaves the current session signed in.
        let Some(user) = auth::check_credentials(ws, &email, &password) else {
            return Ok(json!({ "authenticated": false }));
        };
        if let Some(previous) = state.session.as_ref() {
            auth::logout(ws, previous, now)?;
        }
        auth::sign_in(ws, user, now)?
    };

    let user = session.user.public_json();
    state.session = Some(session);
    Ok(json!({ "authenticated": true, "user": user }))
}

fn logout(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let now = state.clock.now();
    let signed_out = {
        let ws = workspace(state)?;
        match state.session.as_ref() {
            Some(s) => {
                auth::logout(ws, s, now)?;
                true
            }
            None => false,
        }
    };
    state.session = None;
    Ok(json!({ "signedOut": signed_out }))
}

fn current(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    if state.session.is_none() {
        return Ok(json!({ "user": null }));
    }
    match current_user(state) {
        Ok(u) => Ok(json!({ "user": u.public_json() })),
        Err(e) if e.code == "not_signed_in" => {
            state.session = None;
            Ok(json!({ "user": null }))
        }
        Err(e) => Err(e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.login" => login(state, req),
        "auth.logout" => logout(state, req),
        "auth.current" => current(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
