use std::path::{Path, PathBuf};

use anyhow::bail;
use serde::de::DeserializeOwned;

use crate::certificates::{AbsenceCertificate, CertificateManager, CERTIFICATES_FILE};
use crate::config::DefaultAdmin;
use crate::crypto::PasswordCipher;
use crate::error::{EduError, EduResult};
use crate::homework::{Homework, HomeworkManager, HOMEWORKS_FILE};
use crate::login_log::{LoginLog, LoginLogManager, LOGIN_LOGS_FILE};
use crate::preferences::{PreferenceStore, Preferences, PREFERENCE_FILE};
use crate::users::{NewUser, Role, User, UserFilter, UserManager, USERS_FILE};

/// All managers over one data directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub dir: PathBuf,
    pub users: UserManager,
    pub homeworks: HomeworkManager,
    pub certificates: CertificateManager,
    pub logins: LoginLogManager,
    pub preferences: PreferenceStore,
}

/// Opens `dir`, creating it and any missing data file.
pub fn open_workspace(dir: &Path, cipher: PasswordCipher) -> EduResult<Workspace> {
    let ws = Workspace {
        dir: dir.to_path_buf(),
        users: UserManager::open(dir, cipher)?,
        homeworks: HomeworkManager::open(dir)?,
        certificates: CertificateManager::open(dir)?,
        logins: LoginLogManager::open(dir)?,
        preferences: PreferenceStore::open(dir)?,
    };
    tracing::info!("Opened data directory '{}'.", dir.display());
    Ok(ws)
}

fn parses_as<T: DeserializeOwned>(bytes: &[u8]) -> anyhow::Result<()> {
    serde_json::from_slice::<T>(bytes)?;
    Ok(())
}

/// Checks that `bytes` hold the records the data file `name` stores.
pub fn validate_data_file(name: &str, bytes: &[u8]) -> anyhow::Result<()> {
    match name {
        USERS_FILE => parses_as::<Vec<User>>(bytes),
        HOMEWORKS_FILE => parses_as::<Vec<Homework>>(bytes),
        CERTIFICATES_FILE => parses_as::<Vec<AbsenceCertificate>>(bytes),
        LOGIN_LOGS_FILE => parses_as::<Vec<LoginLog>>(bytes),
        PREFERENCE_FILE => parses_as::<Preferences>(bytes),
        _ => bail!("unexpected data file {}", name),
    }
}

impl Workspace {
    /// Creates the configured administrator when no admin exists yet.
    /// Returns whether one was created.
    pub fn ensure_admin(&self, admin: &DefaultAdmin) -> EduResult<bool> {
        let admins = self.users.filter(&UserFilter {
            role: Some(Role::Admin),
            ..Default::default()
        });
        if !admins.is_empty() {
            return Ok(false);
        }

        tracing::info!(
            "No administrator in '{}'; creating default admin {}.",
            self.dir.display(),
            admin.email
        );
        let created = self.users.add(NewUser {
            name: admin.name.clone(),
            email: admin.email.clone(),
            password: admin.password.clone(),
            role: Some(Role::Admin),
            ..Default::default()
        });
        match created {
            Ok(_) => Ok(true),
            Err(EduError::UserExists(email)) => {
                tracing::warn!(
                    "Default admin e-mail {} belongs to a non-admin user; not creating an admin.",
                    email
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
