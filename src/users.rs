use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::crypto::PasswordCipher;
use crate::error::{EduError, EduResult};
use crate::store::{Collection, Record};

pub const USERS_FILE: &str = "users.json";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "STUDENT", alias = "Student")]
    Student,
    #[serde(alias = "TEACHER", alias = "Teacher")]
    Teacher,
    #[serde(alias = "ADMIN", alias = "Admin")]
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Teacher => write!(f, "teacher"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = EduError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            _ => Err(EduError::Invalid(format!("{:?} is not a valid role", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Encrypted, see [`PasswordCipher`].
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taught_classes: Vec<String>,
}

impl Record for User {
    const ENTITY: &'static str = "user";

    fn id(&self) -> &str {
        &self.id
    }
}

impl User {
    pub fn email_matches(&self, email: &str) -> bool {
        self.email.trim().to_lowercase() == email.trim().to_lowercase()
    }

    /// The user as shown to clients; the password never leaves the daemon.
    pub fn public_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
            "age": self.age,
            "birthDate": self.birth_date,
            "role": self.role,
            "classId": self.class_id,
            "subjects": self.subjects,
            "taughtClasses": self.taught_classes,
        })
    }

    fn check_teaching_fields(&self) -> EduResult<()> {
        if self.role != Role::Teacher
            && (!self.subjects.is_empty() || !self.taught_classes.is_empty())
        {
            return Err(EduError::RoleMismatch(format!(
                "subjects and taught classes are only allowed for teachers, not {}",
                self.role
            )));
        }
        Ok(())
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn check_email(email: &str) -> EduResult<()> {
    if !email.contains('@') {
        return Err(EduError::Invalid(format!("{:?} is not a valid e-mail address", email)));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    pub role: Option<Role>,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub taught_classes: Vec<String>,
}

/// Fields a client may change. `None` leaves the stored value alone; the
/// nested options clear a value when set to `Some(None)`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default, with = "double_option")]
    pub age: Option<Option<u32>>,
    #[serde(default, with = "double_option")]
    pub birth_date: Option<Option<NaiveDate>>,
    pub role: Option<Role>,
    #[serde(default, with = "double_option")]
    pub class_id: Option<Option<String>>,
    pub subjects: Option<Vec<String>>,
    pub taught_classes: Option<Vec<String>>,
}

/// Distinguishes a missing key from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Deserialize::deserialize(de).map(Some)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub class_id: Option<String>,
    pub taught_class: Option<String>,
}

impl UserFilter {
    pub fn matches(&self, u: &User) -> bool {
        self.role.map_or(true, |r| u.role == r)
            && self
                .class_id
                .as_ref()
                .map_or(true, |c| u.class_id.as_deref() == Some(c.as_str()))
            && self
                .taught_class
                .as_ref()
                .map_or(true, |c| u.taught_classes.iter().any(|t| t == c))
    }
}

/// Next sequential id: one past the largest numeric id in use.
pub fn next_user_id(users: &[User]) -> String {
    let max = users
        .iter()
        .filter_map(|u| u.id.trim().parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    (max + 1).to_string()
}

#[derive(Debug, Clone)]
pub struct UserManager {
    users: Collection<User>,
    cipher: PasswordCipher,
}

impl UserManager {
    pub fn open(dir: &std::path::Path, cipher: PasswordCipher) -> EduResult<UserManager> {
        Ok(UserManager {
            users: Collection::open(dir.join(USERS_FILE))?,
            cipher,
        })
    }

    pub fn add(&self, new: NewUser) -> EduResult<User> {
        let name = new.name.trim().to_string();
        let email = new.email.trim().to_string();
        if name.is_empty() {
            return Err(EduError::Invalid("name must not be empty".into()));
        }
        check_email(&email)?;
        if new.password.is_empty() {
            return Err(EduError::Invalid("password must not be empty".into()));
        }

        let candidate = User {
            id: String::new(),
            name,
            email,
            password: self.cipher.encrypt(&new.password),
            age: new.age,
            birth_date: new.birth_date,
            role: new.role.unwrap_or(Role::Student),
            class_id: new
                .class_id
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            subjects: clean_list(new.subjects),
            taught_classes: clean_list(new.taught_classes),
        };
        candidate.check_teaching_fields()?;

        let user = self.users.insert_with(|existing| {
            if existing.iter().any(|u| u.email_matches(&candidate.email)) {
                return Err(EduError::UserExists(candidate.email.clone()));
            }
            let mut user = candidate;
            user.id = next_user_id(existing);
            Ok(user)
        })?;

        tracing::info!("Created {} {} ({})", user.role, user.id, user.email);
        Ok(user)
    }

    pub fn all(&self) -> Vec<User> {
        self.users.all()
    }

    pub fn get(&self, id: &str) -> Option<User> {
        self.users.get(id)
    }

    pub fn filter(&self, filter: &UserFilter) -> Vec<User> {
        self.users.filter(|u| filter.matches(u))
    }

    pub fn students_in_class(&self, class_id: &str) -> Vec<User> {
        self.filter(&UserFilter {
            role: Some(Role::Student),
            class_id: Some(class_id.to_string()),
            taught_class: None,
        })
    }

    pub fn teachers_for_class(&self, class_id: &str) -> Vec<User> {
        self.filter(&UserFilter {
            role: Some(Role::Teacher),
            class_id: None,
            taught_class: Some(class_id.to_string()),
        })
    }

    pub fn user_exists(&self, email: &str) -> bool {
        self.find_by_email(email).is_some()
    }

    pub fn find_by_email(&self, email: &str) -> Option<User> {
        self.users.all().into_iter().find(|u| u.email_matches(email))
    }

    pub fn verify_password(&self, user: &User, input: &str) -> bool {
        self.cipher.matches(&user.password, input)
    }

    pub fn update(&self, id: &str, patch: UserPatch) -> EduResult<User> {
        if let Some(email) = patch.email.as_deref() {
            check_email(email.trim())?;
            if self
                .users
                .all()
                .iter()
                .any(|u| u.id != id && u.email_matches(email))
            {
                return Err(EduError::UserExists(email.trim().to_string()));
            }
        }

        let cipher = &self.cipher;
        let updated = self.users.modify(id, |u| {
            if let Some(name) = patch.name {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(EduError::Invalid("name must not be empty".into()));
                }
                u.name = name;
            }
            if let Some(email) = patch.email {
                u.email = email.trim().to_string();
            }
            if let Some(pw) = patch.password {
                if pw.is_empty() {
                    return Err(EduError::Invalid("password must not be empty".into()));
                }
                u.password = cipher.encrypt(&pw);
            }
            if let Some(age) = patch.age {
                u.age = age;
            }
            if let Some(born) = patch.birth_date {
                u.birth_date = born;
            }
            if let Some(role) = patch.role {
                u.role = role;
            }
            if let Some(class_id) = patch.class_id {
                u.class_id = class_id.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
            }
            if let Some(subjects) = patch.subjects {
                u.subjects = clean_list(subjects);
            }
            if let Some(taught) = patch.taught_classes {
                u.taught_classes = clean_list(taught);
            }
            u.check_teaching_fields()?;
            Ok(u.clone())
        })?;

        updated.ok_or_else(|| EduError::not_found(User::ENTITY, id))
    }

    /// Deleting an unknown id is a no-op.
    pub fn delete(&self, id: &str) -> EduResult<bool> {
        let deleted = self.users.remove(id)?;
        if deleted {
            tracing::info!("Deleted user {}", id);
        }
        Ok(deleted)
    }
}
