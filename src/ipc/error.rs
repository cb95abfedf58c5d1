use serde_json::json;

use crate::error::EduError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Failure of a single handler, rendered with [`err`].
#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> HandlerErr {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> HandlerErr {
        HandlerErr::new("bad_params", message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> HandlerErr {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<EduError> for HandlerErr {
    fn from(e: EduError) -> Self {
        let details = match &e {
            EduError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            EduError::Write { path, .. } => Some(json!({ "path": path.to_string_lossy() })),
            _ => None,
        };
        if e.code() == "storage_failed" {
            tracing::error!("{}", e);
        }
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

/// Renders a handler result as a response line.
pub fn respond(id: &str, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}
