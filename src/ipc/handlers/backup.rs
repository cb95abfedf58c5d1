use crate::backup;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_required_str, require_role, workspace, ADMIN};
use crate::ipc::types::{AppState, Request};
use crate::workspace::validate_data_file;
use serde_json::json;
use std::path::PathBuf;

fn export(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_role(state, ADMIN)?;
    let out_path = get_required_str(&req.params, "outPath")?;
    let out = PathBuf::from(out_path.trim());
    let ws = workspace(state)?;

    let summary = backup::export_data_bundle(&ws.dir, &out).map_err(|e| {
        HandlerErr::new("backup_failed", format!("{:#}", e))
            .with_details(json!({ "path": out.to_string_lossy() }))
    })?;
    tracing::info!("Exported data bundle to '{}'.", out.display());
    Ok(json!({
        "path": out.to_string_lossy(),
        "bundleFormat": summary.bundle_format,
        "entryCount": summary.entry_count,
    }))
}

fn import(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_role(state, ADMIN)?;
    let in_path = get_required_str(&req.params, "inPath")?;
    let src = PathBuf::from(in_path.trim());
    let ws = workspace(state)?;

    let summary = backup::import_data_bundle(&src, &ws.dir, validate_data_file).map_err(|e| {
        HandlerErr::new("backup_failed", format!("{:#}", e))
            .with_details(json!({ "path": src.to_string_lossy() }))
    })?;
    tracing::info!("Restored {} data files from '{}'.", summary.restored.len(), src.display());

    // The restored user list may not contain the signed-in user any more.
    state.session = None;
    Ok(json!({
        "bundleFormat": summary.bundle_format,
        "restored": summary.restored,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "backup.export" => export(state, req),
        "backup.import" => import(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
