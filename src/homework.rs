use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

use crate::error::{EduError, EduResult};
use crate::store::{Collection, Record};

pub const HOMEWORKS_FILE: &str = "homeworks.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub file_path: String,
    #[serde(default)]
    pub grade: Option<String>,
    pub submission_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Homework {
    pub id: String,
    pub description: String,
    pub deadline: NaiveDate,
    pub subject: String,
    pub class_id: String,
    /// Keyed by student id.
    #[serde(default)]
    pub submissions: BTreeMap<String, Submission>,
}

impl Record for Homework {
    const ENTITY: &'static str = "homework";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Homework {
    /// Submissions are accepted through the whole deadline day (UTC).
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        now.date_naive() <= self.deadline
    }
}

/// Everything a teacher edits; submissions are never part of a draft.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkDraft {
    pub description: String,
    pub deadline: NaiveDate,
    pub subject: String,
    pub class_id: String,
}

impl HomeworkDraft {
    fn validate(&self) -> EduResult<()> {
        if self.description.trim().is_empty() {
            return Err(EduError::Invalid("description must not be empty".into()));
        }
        if self.class_id.trim().is_empty() {
            return Err(EduError::Invalid("classId must not be empty".into()));
        }
        Ok(())
    }

    fn apply(self, hw: &mut Homework) {
        hw.description = self.description.trim().to_string();
        hw.deadline = self.deadline;
        hw.subject = self.subject.trim().to_string();
        hw.class_id = self.class_id.trim().to_string();
    }
}

#[derive(Debug, Clone)]
pub struct HomeworkManager {
    homeworks: Collection<Homework>,
}

impl HomeworkManager {
    pub fn open(dir: &Path) -> EduResult<HomeworkManager> {
        Ok(HomeworkManager {
            homeworks: Collection::open(dir.join(HOMEWORKS_FILE))?,
        })
    }

    pub fn add(&self, draft: HomeworkDraft) -> EduResult<Homework> {
        draft.validate()?;
        let mut hw = Homework {
            id: Uuid::new_v4().to_string(),
            description: String::new(),
            deadline: draft.deadline,
            subject: String::new(),
            class_id: String::new(),
            submissions: BTreeMap::new(),
        };
        draft.apply(&mut hw);
        let hw = self.homeworks.insert(hw)?;
        tracing::info!("Created homework {} for class {}", hw.id, hw.class_id);
        Ok(hw)
    }

    pub fn all(&self) -> Vec<Homework> {
        self.homeworks.all()
    }

    pub fn get(&self, id: &str) -> Option<Homework> {
        self.homeworks.get(id)
    }

    pub fn filter(&self, class_id: Option<&str>, subject: Option<&str>) -> Vec<Homework> {
        self.homeworks.filter(|hw| {
            class_id.map_or(true, |c| hw.class_id == c)
                && subject.map_or(true, |s| hw.subject.eq_ignore_ascii_case(s))
        })
    }

    pub fn for_class(&self, class_id: &str) -> Vec<Homework> {
        let mut out = self.filter(Some(class_id), None);
        out.sort_by(|a, b| a.deadline.cmp(&b.deadline));
        out
    }

    /// Replaces the editable fields. The stored submissions carry over.
    pub fn update(&self, id: &str, draft: HomeworkDraft) -> EduResult<Homework> {
        draft.validate()?;
        let mut hw = self
            .get(id)
            .ok_or_else(|| EduError::not_found(Homework::ENTITY, id))?;
        draft.apply(&mut hw);
        self.homeworks
            .replace(hw.clone())?
            .ok_or_else(|| EduError::not_found(Homework::ENTITY, id))?;
        Ok(hw)
    }

    pub fn delete(&self, id: &str) -> EduResult<bool> {
        self.homeworks.remove(id)
    }

    /// Records or replaces a student's submission. A resubmission drops the
    /// earlier grade.
    pub fn submit(
        &self,
        id: &str,
        student_id: &str,
        file_path: &str,
        now: DateTime<Utc>,
    ) -> EduResult<Submission> {
        if file_path.trim().is_empty() {
            return Err(EduError::Invalid("filePath must not be empty".into()));
        }
        self.homeworks
            .modify(id, |hw| {
                if !hw.is_open(now) {
                    return Err(EduError::DeadlinePassed(hw.deadline));
                }
                let sub = Submission {
                    file_path: file_path.trim().to_string(),
                    grade: None,
                    submission_date: now,
                };
                hw.submissions.insert(student_id.to_string(), sub.clone());
                Ok(sub)
            })?
            .ok_or_else(|| EduError::not_found(Homework::ENTITY, id))
    }

    /// Returns whether a submission was removed.
    /// Withdraws a submission. Only allowed while the homework is open, so a
    /// grade given after the deadline stays on record.
    pub fn unsubmit(&self, id: &str, student_id: &str, now: DateTime<Utc>) -> EduResult<bool> {
        self.homeworks
            .modify(id, |hw| {
                if !hw.is_open(now) {
                    return Err(EduError::DeadlinePassed(hw.deadline));
                }
                Ok(hw.submissions.remove(student_id).is_some())
            })?
            .ok_or_else(|| EduError::not_found(Homework::ENTITY, id))
    }

    pub fn grade(&self, id: &str, student_id: &str, grade: &str) -> EduResult<Submission> {
        let grade = grade.trim();
        if grade.is_empty() {
            return Err(EduError::Invalid("grade must not be empty".into()));
        }
        self.homeworks
            .modify(id, |hw| {
                let sub = hw
                    .submissions
                    .get_mut(student_id)
                    .ok_or_else(|| EduError::NoSubmission(student_id.to_string()))?;
                sub.grade = Some(grade.to_string());
                Ok(sub.clone())
            })?
            .ok_or_else(|| EduError::not_found(Homework::ENTITY, id))
    }
}
