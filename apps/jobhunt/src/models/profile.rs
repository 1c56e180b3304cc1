use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// The applicant data the automation engine fills into forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    /// Preferred salutation as written on German forms ("Herr", "Frau", ...).
    #[serde(default)]
    pub salutation: Option<String>,
    pub resume_path: PathBuf,
    #[serde(default)]
    pub cover_letter_path: Option<PathBuf>,
    #[serde(default)]
    pub cover_letter_text: Option<String>,
    #[serde(default)]
    pub salary_expectation: Option<String>,
    /// Earliest start date, already formatted for the form.
    #[serde(default)]
    pub earliest_start: Option<String>,
    /// Answer to "how did you hear about us".
    #[serde(default)]
    pub referral_source: Option<String>,
}

impl CandidateProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| AppError::Profile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| AppError::Profile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
