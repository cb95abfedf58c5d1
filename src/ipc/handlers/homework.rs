use crate::homework::{Homework, HomeworkDraft};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    get_optional_str, get_required_str, parse_params, require_role, workspace, ANY_ROLE, STAFF,
    STUDENT,
};
use crate::ipc::types::{AppState, Request};
use crate::users::{Role, User};
use serde_json::json;

/// Students only see their own entry in the submissions map.
fn homework_json(hw: &Homework, viewer: &User) -> serde_json::Value {
    let mut v = json!(hw);
    if viewer.role == Role::Student {
        let mut own = serde_json::Map::new();
        if let Some(s) = hw.submissions.get(&viewer.id) {
            own.insert(viewer.id.clone(), json!(s));
        }
        v["submissions"] = serde_json::Value::Object(own);
    }
    v
}

fn find(state: &AppState, homework_id: &str) -> Result<Homework, HandlerErr> {
    workspace(state)?
        .homeworks
        .get(homework_id)
        .ok_or_else(|| {
            HandlerErr::new("not_found", "homework not found")
                .with_details(json!({ "homeworkId": homework_id }))
        })
}

fn list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let me = require_role(state, ANY_ROLE)?;
    let ws = workspace(state)?;
    let mut class_id = get_optional_str(&req.params, "classId");
    if me.role == Role::Student {
        class_id = me.class_id.clone();
        if class_id.is_none() {
            return Ok(json!({ "homeworks": [] }));
        }
    }
    let subject = get_optional_str(&req.params, "subject");
    let homeworks: Vec<_> = ws
        .homeworks
        .filter(class_id.as_deref(), subject.as_deref())
        .iter()
        .map(|hw| homework_json(hw, &me))
        .collect();
    Ok(json!({ "homeworks": homeworks }))
}

fn get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let me = require_role(state, ANY_ROLE)?;
    let homework_id = get_required_str(&req.params, "homeworkId")?;
    let hw = find(state, &homework_id)?;
    if me.role == Role::Student && me.class_id.as_deref() != Some(hw.class_id.as_str()) {
        return Err(HandlerErr::new("forbidden", "homework belongs to another class"));
    }
    Ok(json!({ "homework": homework_json(&hw, &me) }))
}

fn create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let me = require_role(state, STAFF)?;
    let draft: HomeworkDraft = parse_params(&req.params)?;
    let hw = workspace(state)?.homeworks.add(draft)?;
    Ok(json!({ "homework": homework_json(&hw, &me) }))
}

fn update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let me = require_role(state, STAFF)?;
    let homework_id = get_required_str(&req.params, "homeworkId")?;
    let draft: HomeworkDraft = parse_params(&req.params)?;
    let hw = workspace(state)?.homeworks.update(&homework_id, draft)?;
    Ok(json!({ "homework": homework_json(&hw, &me) }))
}

fn delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_role(state, STAFF)?;
    let homework_id = get_required_str(&req.params, "homeworkId")?;
    let deleted = workspace(state)?.homeworks.delete(&homework_id)?;
    Ok(json!({ "deleted": deleted }))
}

fn submit(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let me = require_role(state, STUDENT)?;
    let homework_id = get_required_str(&req.params, "homeworkId")?;
    let file_path = get_required_str(&req.params, "filePath")?;

    let hw = find(state, &homework_id)?;
    if me.class_id.as_deref() != Some(hw.class_id.as_str()) {
        return Err(HandlerErr::new("forbidden", "homework belongs to another class"));
    }

    let now = state.clock.now();
    let sub = workspace(state)?
        .homeworks
        .submit(&homework_id, &me.id, &file_path, now)?;
    tracing::info!("Student {} submitted homework {}", me.id, homework_id);
    Ok(json!({ "submission": sub }))
}

fn unsubmit(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let me = require_role(state, STUDENT)?;
    let homework_id = get_required_str(&req.params, "homeworkId")?;
    let now = state.clock.now();
    let removed = workspace(state)?
        .homeworks
        .unsubmit(&homework_id, &me.id, now)?;
    Ok(json!({ "removed": removed }))
}

fn grade(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_role(state, STAFF)?;
    let homework_id = get_required_str(&req.params, "homeworkId")?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let grade = get_required_str(&req.params, "grade")?;
    let sub = workspace(state)?
        .homeworks
        .grade(&homework_id, &student_id, &grade)?;
    Ok(json!({ "submission": sub }))
}

/// The caller's class homework with their own submission, soonest first.
fn mine(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let me = require_role(state, STUDENT)?;
    let Some(class_id) = me.class_id.clone() else {
        return Ok(json!({ "homeworks": [] }));
    };
    let now = state.clock.now();
    let homeworks: Vec<_> = workspace(state)?
        .homeworks
        .for_class(&class_id)
        .iter()
        .map(|hw| {
            json!({
                "id": hw.id,
                "description": hw.description,
                "deadline": hw.deadline,
                "subject": hw.subject,
                "classId": hw.class_id,
                "open": hw.is_open(now),
                "submission": hw.submissions.get(&me.id),
            })
        })
        .collect();
    Ok(json!({ "homeworks": homeworks }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "homework.list" => list(state, req),
        "homework.get" => get(state, req),
        "homework.create" => create(state, req),
        "homework.update" => update(state, req),
        "homework.delete" => delete(state, req),
        "homework.submit" => submit(state, req),
        "homework.unsubmit" => unsubmit(state, req),
        "homework.grade" => grade(state, req),
        "homework.mine" => mine(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
