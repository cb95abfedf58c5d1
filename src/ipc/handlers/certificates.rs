use crate::certificates::AbsenceCertificate;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    get_date, get_optional_bool, get_optional_str, get_required_str, require_role, workspace,
    ANY_ROLE, STAFF, STUDENT,
};
use crate::ipc::types::{AppState, Request};
use crate::users::{Role, User};
use serde_json::json;

fn visible_to(cert: &AbsenceCertificate, viewer: &User) -> bool {
    viewer.role != Role::Student || cert.user_id == viewer.id
}

fn find(
    state: &AppState,
    viewer: &User,
    certificate_id: &str,
) -> Result<AbsenceCertificate, HandlerErr> {
    workspace(state)?
        .certificates
        .get(certificate_id)
        .filter(|c| visible_to(c, viewer))
        .ok_or_else(|| {
            HandlerErr::new("not_found", "certificate not found")
                .with_details(json!({ "certificateId": certificate_id }))
        })
}

fn list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let me = require_role(state, ANY_ROLE)?;
    let approved = get_optional_bool(&req.params, "approved")?;
    let ws = workspace(state)?;
    let certificates = if me.role == Role::Student {
        let mut own = ws.certificates.for_user(&me.id);
        if let Some(a) = approved {
            own.retain(|c| c.approved_status == a);
        }
        own
    } else {
        let user_id = get_optional_str(&req.params, "userId");
        ws.certificates.filter(user_id.as_deref(), approved)
    };
    Ok(json!({ "certificates": certificates }))
}

fn get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let me = require_role(state, ANY_ROLE)?;
    let certificate_id = get_required_str(&req.params, "certificateId")?;
    let cert = find(state, &me, &certificate_id)?;
    Ok(json!({ "certificate": cert }))
}

fn create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_role(state, STAFF)?;
    let user_id = get_required_str(&req.params, "userId")?;
    let start = get_date(&req.params, "startDate")?;
    let end = get_date(&req.params, "endDate")?;

    let ws = workspace(state)?;
    match ws.users.get(&user_id) {
        Some(u) if u.role == Role::Student => {}
        Some(_) => {
            return Err(HandlerErr::new(
                "invalid",
                "absence certificates are recorded for students",
            ))
        }
        None => {
            return Err(HandlerErr::new("not_found", "user not found")
                .with_details(json!({ "userId": user_id })))
        }
    }
    let cert = ws.certificates.add(&user_id, start, end)?;
    Ok(json!({ "certificate": cert }))
}

fn upload(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let me = require_role(state, STUDENT)?;
    let certificate_id = get_required_str(&req.params, "certificateId")?;
    let file_path = get_required_str(&req.params, "filePath")?;
    let certificate_type = get_required_str(&req.params, "certificateType")?;

    find(state, &me, &certificate_id)?;
    let cert = workspace(state)?
        .certificates
        .upload(&certificate_id, &file_path, &certificate_type)?;
    tracing::info!("Student {} uploaded certificate {}", me.id, certificate_id);
    Ok(json!({ "certificate": cert }))
}

fn approve(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let me = require_role(state, STAFF)?;
    let certificate_id = get_required_str(&req.params, "certificateId")?;
    let existing = find(state, &me, &certificate_id)?;
    if !existing.is_uploaded() {
        return Err(HandlerErr::new(
            "invalid",
            "certificate has no uploaded document yet",
        ));
    }
    let cert = workspace(state)?.certificates.approve(&certificate_id)?;
    tracing::info!("User {} approved certificate {}", me.id, certificate_id);
    Ok(json!({ "certificate": cert }))
}

fn delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_role(state, STAFF)?;
    let certificate_id = get_required_str(&req.params, "certificateId")?;
    let deleted = workspace(state)?.certificates.delete(&certificate_id)?;
    Ok(json!({ "deleted": deleted }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "certificates.list" => list(state, req),
        "certificates.get" => get(state, req),
        "certificates.create" => create(state, req),
        "certificates.upload" => upload(state, req),
        "certificates.approve" => approve(state, req),
        "certificates.delete" => delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
