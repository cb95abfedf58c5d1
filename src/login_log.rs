use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::error::{EduError, EduResult};
use crate::store::{Collection, Record};

pub const LOGIN_LOGS_FILE: &str = "login_logs.json";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoginAction {
    Login,
    Logout,
}

impl std::str::FromStr for LoginAction {
    type Err = EduError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOGIN" => Ok(LoginAction::Login),
            "LOGOUT" => Ok(LoginAction::Logout),
            _ => Err(EduError::Invalid(format!("{:?} is not a login action", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginLog {
    pub id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub action: LoginAction,
}

impl Record for LoginLog {
    const ENTITY: &'static str = "login log";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Append-only audit trail of logins and logouts.
#[derive(Debug, Clone)]
pub struct LoginLogManager {
    logs: Collection<LoginLog>,
}

impl LoginLogManager {
    pub fn open(dir: &Path) -> EduResult<LoginLogManager> {
        Ok(LoginLogManager {
            logs: Collection::open(dir.join(LOGIN_LOGS_FILE))?,
        })
    }

    pub fn record(
        &self,
        user_id: &str,
        action: LoginAction,
        at: DateTime<Utc>,
    ) -> EduResult<LoginLog> {
        self.logs.insert(LoginLog {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            timestamp: at,
            action,
        })
    }

    pub fn all(&self) -> Vec<LoginLog> {
        self.filter(None, None)
    }

    /// Oldest first.
    pub fn filter(&self, user_id: Option<&str>, action: Option<LoginAction>) -> Vec<LoginLog> {
        let mut logs = self.logs.filter(|l| {
            user_id.map_or(true, |u| l.user_id == u) && action.map_or(true, |a| l.action == a)
        });
        logs.sort_by_key(|l| l.timestamp);
        logs
    }
}
