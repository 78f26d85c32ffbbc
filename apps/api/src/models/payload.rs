use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a payload is structurally valid JSON but unusable for rendering.
#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("personalInfo.{0} is required")]
    MissingField(&'static str),

    #[error("personalInfo.email '{0}' is not a valid email address")]
    InvalidEmail(String),

    #[error("{section}[{index}].{field} is required")]
    MissingEntryField {
        section: &'static str,
        index: usize,
        field: &'static str,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalInfo {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    /// Professional headline shown under the name.
    pub title: Option<String>,
    pub summary: Option<String>,
    /// Only `data:image/...` URIs are rendered; anything else is dropped.
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExperienceEntry {
    pub position: String,
    pub company: String,
    pub location: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Suppresses `end_date`; rendered as "Present".
    pub current: bool,
    pub description: Option<String>,
    pub achievements: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EducationEntry {
    pub institution: String,
    pub degree: String,
    pub field: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Suppresses `end_date`; rendered as "Ongoing".
    pub current: bool,
    pub gpa: Option<String>,
    pub honors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkillEntry {
    pub name: String,
    pub level: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectEntry {
    pub name: String,
    pub description: Option<String>,
    pub technologies: Vec<String>,
    pub link: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CertificationEntry {
    pub name: String,
    pub issuer: Option<String>,
    pub date: Option<String>,
    pub credential_id: Option<String>,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LanguageEntry {
    pub language: String,
    pub proficiency: Option<String>,
}

/// The structured resume data a generation job renders.
///
/// Every collection keeps the caller's ordering; the compositor never sorts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentPayload {
    pub personal_info: PersonalInfo,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub skills: Vec<SkillEntry>,
    pub projects: Vec<ProjectEntry>,
    pub certifications: Vec<CertificationEntry>,
    pub languages: Vec<LanguageEntry>,
}

impl DocumentPayload {
    /// Rejects payloads that cannot produce a meaningful document.
    ///
    /// Required: `personalInfo.fullName`, `personalInfo.email` (with an `@` and a
    /// non-empty local part and domain), and the title field of every collection entry.
    pub fn validate(&self) -> Result<(), PayloadError> {
        let info = &self.personal_info;

        if info.full_name.trim().is_empty() {
            return Err(PayloadError::MissingField("fullName"));
        }
        if info.email.trim().is_empty() {
            return Err(PayloadError::MissingField("email"));
        }
        if !looks_like_email(info.email.trim()) {
            return Err(PayloadError::InvalidEmail(info.email.clone()));
        }

        require_each(&self.experience, "experience", "position", |e| &e.position)?;
        require_each(&self.experience, "experience", "company", |e| &e.company)?;
        require_each(&self.education, "education", "institution", |e| {
            &e.institution
        })?;
        require_each(&self.skills, "skills", "name", |e| &e.name)?;
        require_each(&self.projects, "projects", "name", |e| &e.name)?;
        require_each(&self.certifications, "certifications", "name", |e| &e.name)?;
        require_each(&self.languages, "languages", "language", |e| &e.language)?;

        Ok(())
    }
}

fn require_each<T>(
    entries: &[T],
    section: &'static str,
    field: &'static str,
    get: impl Fn(&T) -> &String,
) -> Result<(), PayloadError> {
    match entries.iter().position(|e| get(e).trim().is_empty()) {
        Some(index) => Err(PayloadError::MissingEntryField {
            section,
            index,
            field,
        }),
        None => Ok(()),
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ada() -> DocumentPayload {
        DocumentPayload {
            personal_info: PersonalInfo {
                full_name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_minimal_payload_is_valid() {
        assert_eq!(ada().validate(), Ok(()));
    }

    #[test]
    fn test_missing_email_is_rejected() {
        let mut payload = ada();
        payload.personal_info.email = "  ".to_string();
        assert_eq!(
            payload.validate(),
            Err(PayloadError::MissingField("email"))
        );
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let mut payload = ada();
        payload.personal_info.full_name.clear();
        assert_eq!(
            payload.validate(),
            Err(PayloadError::MissingField("fullName"))
        );
    }

    #[test]
    fn test_malformed_email_is_rejected() {
        for bad in ["ada", "@example.com", "ada@", "ada @example.com", "a@b@c"] {
            let mut payload = ada();
            payload.personal_info.email = bad.to_string();
            assert!(
                matches!(payload.validate(), Err(PayloadError::InvalidEmail(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_entry_without_title_reports_index() {
        let mut payload = ada();
        payload.experience = vec![
            ExperienceEntry {
                position: "Analyst".to_string(),
                company: "Analytical Engines Ltd".to_string(),
                ..Default::default()
            },
            ExperienceEntry {
                company: "Babbage & Co".to_string(),
                ..Default::default()
            },
        ];
        assert_eq!(
            payload.validate(),
            Err(PayloadError::MissingEntryField {
                section: "experience",
                index: 1,
                field: "position",
            })
        );
    }

    #[test]
    fn test_camel_case_deserialization_with_missing_sections() {
        let json = serde_json::json!({
            "personalInfo": {
                "fullName": "Ada Lovelace",
                "email": "ada@example.com",
                "linkedin": "linkedin.com/in/ada"
            },
            "experience": [{
                "position": "Analyst",
                "company": "Analytical Engines Ltd",
                "startDate": "1842",
                "current": true
            }]
        });
        let payload: DocumentPayload = serde_json::from_value(json).unwrap();
        assert_eq!(payload.personal_info.full_name, "Ada Lovelace");
        assert!(payload.experience[0].current);
        assert_eq!(payload.experience[0].start_date.as_deref(), Some("1842"));
        assert!(payload.projects.is_empty());
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_missing_personal_info_block_fails_validation_not_parsing() {
        let payload: DocumentPayload = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(
            payload.validate(),
            Err(PayloadError::MissingField("fullName"))
        );
    }
}
