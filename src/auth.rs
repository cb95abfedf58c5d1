use chrono::{DateTime, Utc};

use crate::error::EduResult;
use crate::login_log::LoginAction;
use crate::users::User;
use crate::workspace::Workspace;

/// The signed-in user of this daemon instance.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub signed_in_at: DateTime<Utc>,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

/// The user owning `email` if `password` matches. Unknown e-mail and wrong
/// password are indistinguishable. Nothing is logged to the audit trail.
pub fn check_credentials(ws: &Workspace, email: &str, password: &str) -> Option<User> {
    let user = ws
        .users
        .find_by_email(email)
        .filter(|u| ws.users.verify_password(u, password));
    if user.is_none() {
        tracing::info!("Rejected login for {}", email.trim());
    }
    user
}

/// Records the login of `user` and returns the new session.
pub fn sign_in(ws: &Workspace, user: User, now: DateTime<Utc>) -> EduResult<Session> {
    ws.logins.record(&user.id, LoginAction::Login, now)?;
    tracing::info!("User {} ({}) signed in", user.id, user.role);
    Ok(Session {
        user,
        signed_in_at: now,
    })
}

/// Records the logout of `session`.
pub fn logout(ws: &Workspace, session: &Session, now: DateTime<Utc>) -> EduResult<()> {
    ws.logins.record(session.user_id(), LoginAction::Logout, now)?;
    tracing::info!(
        "User {} signed out after {} min",
        session.user_id(),
        (now - session.signed_in_at).num_minutes()
    );
    Ok(())
}
