use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    current_user, get_optional_str, get_required_str, parse_params, require_role, workspace,
    ADMIN, ANY_ROLE, STAFF,
};
use crate::ipc::types::{AppState, Request};
use crate::users::{NewUser, Role, User, UserFilter, UserPatch};
use serde_json::json;

fn users_json(users: &[User]) -> Vec<serde_json::Value> {
    users.iter().map(User::public_json).collect()
}

fn list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let me = require_role(state, ANY_ROLE)?;
    let ws = workspace(state)?;

    let role = get_optional_str(&req.params, "role")
        .map(|r| r.parse::<Role>())
        .transpose()
        .map_err(|e| HandlerErr::bad_params(e.to_string()))?;
    let filter = UserFilter {
        role,
        class_id: get_optional_str(&req.params, "classId"),
        taught_class: get_optional_str(&req.params, "taughtClass"),
    };

    let mut users = ws.users.filter(&filter);
    // Students see their classmates and the teachers of their class only.
    if me.role == Role::Student {
        let visible: Vec<String> = match me.class_id.as_deref() {
            Some(class_id) => ws
                .users
                .students_in_class(class_id)
                .into_iter()
                .chain(ws.users.teachers_for_class(class_id))
                .map(|u| u.id)
                .collect(),
            None => Vec::new(),
        };
        users.retain(|u| u.id == me.id || visible.contains(&u.id));
    }
    Ok(json!({ "users": users_json(&users) }))
}

fn get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let me = require_role(state, ANY_ROLE)?;
    let user_id = get_required_str(&req.params, "userId")?;
    if me.role == Role::Student && me.id != user_id {
        return Err(HandlerErr::new("forbidden", "students may only view themselves"));
    }
    let ws = workspace(state)?;
    let user = ws
        .users
        .get(&user_id)
        .ok_or_else(|| HandlerErr::new("not_found", "user not found"))?;
    Ok(json!({ "user": user.public_json() }))
}

fn create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_role(state, ADMIN)?;
    let new: NewUser = parse_params(&req.params)?;
    let ws = workspace(state)?;
    let user = ws.users.add(new)?;
    Ok(json!({ "user": user.public_json() }))
}

fn update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_role(state, ADMIN)?;
    let user_id = get_required_str(&req.params, "userId")?;
    let patch: UserPatch = match req.params.get("patch") {
        Some(p) => parse_params(p)?,
        None => return Err(HandlerErr::bad_params("missing patch")),
    };
    let ws = workspace(state)?;
    let user = ws.users.update(&user_id, patch)?;
    Ok(json!({ "user": user.public_json() }))
}

fn delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let me = require_role(state, ADMIN)?;
    let user_id = get_required_str(&req.params, "userId")?;
    if me.id == user_id {
        return Err(HandlerErr::new("invalid", "you cannot delete your own account"));
    }
    let ws = workspace(state)?;
    let deleted = ws.users.delete(&user_id)?;
    Ok(json!({ "deleted": deleted }))
}

fn exists(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_role(state, STAFF)?;
    let email = get_required_str(&req.params, "email")?;
    let ws = workspace(state)?;
    Ok(json!({ "exists": ws.users.user_exists(&email) }))
}

fn verify_password(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let me = current_user(state)?;
    let user_id = get_required_str(&req.params, "userId")?;
    let password = get_required_str(&req.params, "password")?;
    if me.role != Role::Admin && me.id != user_id {
        return Err(HandlerErr::new("forbidden", "may only verify your own password"));
    }
    let ws = workspace(state)?;
    let user = ws
        .users
        .get(&user_id)
        .ok_or_else(|| HandlerErr::new("not_found", "user not found"))?;
    Ok(json!({ "valid": ws.users.verify_password(&user, &password) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "users.list" => list(state, req),
        "users.get" => get(state, req),
        "users.create" => create(state, req),
        "users.update" => update(state, req),
        "users.delete" => delete(state, req),
        "users.exists" => exists(state, req),
        "users.verifyPassword" => verify_password(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
