use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::error::{EduError, EduResult};
use crate::store::{Collection, Record};

pub const CERTIFICATES_FILE: &str = "certificates.json";

/// Stored in `filePath` and `certificateType` until the student uploads.
pub const PLACEHOLDER: &str = "-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceCertificate {
    pub id: String,
    pub user_id: String,
    pub file_path: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub certificate_type: String,
    #[serde(default)]
    pub approved_status: bool,
}

impl Record for AbsenceCertificate {
    const ENTITY: &'static str = "certificate";

    fn id(&self) -> &str {
        &self.id
    }
}

impl AbsenceCertificate {
    pub fn is_uploaded(&self) -> bool {
        self.file_path != PLACEHOLDER
    }
}

#[derive(Debug, Clone)]
pub struct CertificateManager {
    certificates: Collection<AbsenceCertificate>,
}

impl CertificateManager {
    pub fn open(dir: &Path) -> EduResult<CertificateManager> {
        Ok(CertificateManager {
            certificates: Collection::open(dir.join(CERTIFICATES_FILE))?,
        })
    }

    pub fn add(
        &self,
        user_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> EduResult<AbsenceCertificate> {
        if end_date < start_date {
            return Err(EduError::Invalid(format!(
                "absence ends ({}) before it starts ({})",
                end_date, start_date
            )));
        }
        let cert = self.certificates.insert(AbsenceCertificate {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            file_path: PLACEHOLDER.to_string(),
            start_date,
            end_date,
            certificate_type: PLACEHOLDER.to_string(),
            approved_status: false,
        })?;
        tracing::info!("Recorded absence {} for user {}", cert.id, cert.user_id);
        Ok(cert)
    }

    pub fn all(&self) -> Vec<AbsenceCertificate> {
        self.certificates.all()
    }

    pub fn get(&self, id: &str) -> Option<AbsenceCertificate> {
        self.certificates.get(id)
    }

    pub fn for_user(&self, user_id: &str) -> Vec<AbsenceCertificate> {
        self.filter(Some(user_id), None)
    }

    pub fn filter(&self, user_id: Option<&str>, approved: Option<bool>) -> Vec<AbsenceCertificate> {
        self.certificates.filter(|c| {
            user_id.map_or(true, |u| c.user_id == u)
                && approved.map_or(true, |a| c.approved_status == a)
        })
    }

    pub fn upload(
        &self,
        id: &str,
        file_path: &str,
        certificate_type: &str,
    ) -> EduResult<AbsenceCertificate> {
        let file_path = file_path.trim();
        let certificate_type = certificate_type.trim();
        if file_path.is_empty() || file_path == PLACEHOLDER {
            return Err(EduError::Invalid("filePath must name a file".into()));
        }
        if certificate_type.is_empty() || certificate_type == PLACEHOLDER {
            return Err(EduError::Invalid("certificateType must not be empty".into()));
        }
        self.certificates
            .modify(id, |c| {
                if c.approved_status {
                    return Err(EduError::Invalid(
                        "certificate is already approved".into(),
                    ));
                }
                c.file_path = file_path.to_string();
                c.certificate_type = certificate_type.to_string();
                Ok(c.clone())
            })?
            .ok_or_else(|| EduError::not_found(AbsenceCertificate::ENTITY, id))
    }

    /// One-way; approving twice is harmless.
    pub fn approve(&self, id: &str) -> EduResult<AbsenceCertificate> {
        self.certificates
            .modify(id, |c| {
                c.approved_status = true;
                Ok(c.clone())
            })?
            .ok_or_else(|| EduError::not_found(AbsenceCertificate::ENTITY, id))
    }

    pub fn delete(&self, id: &str) -> EduResult<bool> {
        self.certificates.remove(id)
    }
}
