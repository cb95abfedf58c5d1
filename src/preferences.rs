use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::EduResult;
use crate::store::JsonFile;

pub const PREFERENCE_FILE: &str = "preference.json";

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub remembered_email: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub dark_mode: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            remembered_email: None,
            language: default_language(),
            dark_mode: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencePatch {
    /// `Some(None)` forgets the remembered e-mail.
    #[serde(default, deserialize_with = "some_value")]
    pub remembered_email: Option<Option<String>>,
    pub language: Option<String>,
    pub dark_mode: Option<bool>,
}

fn some_value<'de, D>(de: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

#[derive(Debug, Clone)]
pub struct PreferenceStore {
    file: JsonFile,
}

impl PreferenceStore {
    pub fn open(dir: &Path) -> EduResult<PreferenceStore> {
        let file = JsonFile::new(dir.join(PREFERENCE_FILE));
        if !file.path().is_file() {
            file.save_value(&Preferences::default())?;
        }
        Ok(PreferenceStore { file })
    }

    pub fn get(&self) -> Preferences {
        self.file.load_value()
    }

    pub fn update(&self, patch: PreferencePatch) -> EduResult<Preferences> {
        let mut prefs = self.get();
        if let Some(email) = patch.remembered_email {
            prefs.remembered_email = email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
        }
        if let Some(lang) = patch.language {
            let lang = lang.trim();
            if !lang.is_empty() {
                prefs.language = lang.to_string();
            }
        }
        if let Some(dark) = patch.dark_mode {
            prefs.dark_mode = dark;
        }
        self.file.save_value(&prefs)?;
        Ok(prefs)
    }
}
