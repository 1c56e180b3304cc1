//! Decides what goes into every discovered field before anything is typed.
//!
//! Planning is all-or-nothing: if one required field cannot be answered from
//! the candidate profile, the whole attempt goes to manual review and the
//! page is never touched.

use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};

use super::classifier::{InputType, SemanticRole};
use super::documents::DocumentKind;
use super::fields::{FormField, SelectOption};
use crate::models::CandidateProfile;

pub const MAX_OTHER_PLACEHOLDERS: usize = 2;

/// Option texts acceptable for a required "how did you hear about us" select.
const REFERRAL_FALLBACKS: &[&str] = &[
    "linkedin", "stepstone", "jobbörse", "internet", "online", "sonstig", "andere", "other",
];

#[derive(Debug, Clone, PartialEq)]
pub enum FillValue {
    Text(String),
    /// Option value to select.
    Choice(String),
    Check,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSource {
    File(PathBuf),
    Placeholder(DocumentKind),
}

#[derive(Debug, Clone)]
pub struct FillStep {
    pub selector: String,
    pub label: String,
    pub role: SemanticRole,
    pub required: bool,
    pub value: FillValue,
}

#[derive(Debug, Clone)]
pub struct UploadStep {
    pub selector: String,
    pub label: String,
    pub role: SemanticRole,
    pub source: DocumentSource,
}

#[derive(Debug, Clone, Default)]
pub struct FillPlan {
    pub fills: Vec<FillStep>,
    pub uploads: Vec<UploadStep>,
}

/// Plans every field, or returns the manual-review reason.
pub fn plan_fill(
    fields: &[FormField],
    profile: &CandidateProfile,
    today: NaiveDate,
) -> Result<FillPlan, String> {
    let mut plan = FillPlan::default();
    let mut other_placeholders = 0;

    for field in fields {
        match field.role() {
            SemanticRole::Unknown if field.required => {
                return Err(format!(
                    "required field '{}' could not be classified",
                    field.describe()
                ));
            }
            SemanticRole::Unknown => continue,
            SemanticRole::ResumeUpload
            | SemanticRole::CoverLetterUpload
            | SemanticRole::OtherUpload => {
                let Some(source) = document_source(field, profile) else {
                    continue;
                };
                if source == DocumentSource::Placeholder(DocumentKind::Other) {
                    other_placeholders += 1;
                    if other_placeholders > MAX_OTHER_PLACEHOLDERS {
                        return Err(format!(
                            "more than {MAX_OTHER_PLACEHOLDERS} required documents without a file"
                        ));
                    }
                }
                plan.uploads.push(UploadStep {
                    selector: field.selector.clone(),
                    label: field.describe(),
                    role: field.role(),
                    source,
                });
            }
            role => match fill_value(field, profile, today) {
                Some(value) => plan.fills.push(FillStep {
                    selector: field.selector.clone(),
                    label: field.describe(),
                    role,
                    required: field.required,
                    value,
                }),
                None if field.required => {
                    return Err(format!(
                        "no value for required {role} field '{}'",
                        field.describe()
                    ));
                }
                None => {}
            },
        }
    }
    Ok(plan)
}

/// Profile file when it exists on disk; a placeholder when the upload is
/// required; nothing for optional uploads without a file.
fn document_source(field: &FormField, profile: &CandidateProfile) -> Option<DocumentSource> {
    let (file, kind) = match field.role() {
        SemanticRole::ResumeUpload => (Some(profile.resume_path.clone()), DocumentKind::Resume),
        SemanticRole::CoverLetterUpload => {
            (profile.cover_letter_path.clone(), DocumentKind::CoverLetter)
        }
        _ => (None, DocumentKind::Other),
    };
    match file.filter(|path| path.is_file()) {
        Some(path) => Some(DocumentSource::File(path)),
        None if field.required => Some(DocumentSource::Placeholder(kind)),
        None => None,
    }
}

fn fill_value(
    field: &FormField,
    profile: &CandidateProfile,
    today: NaiveDate,
) -> Option<FillValue> {
    let text = |value: &str| {
        let value = value.trim();
        (!value.is_empty()).then(|| FillValue::Text(value.to_string()))
    };
    match field.role() {
        SemanticRole::FirstName => text(&profile.first_name),
        SemanticRole::LastName => text(&profile.last_name),
        SemanticRole::FullName => text(&profile.full_name()),
        SemanticRole::Email => text(&profile.email),
        SemanticRole::Phone => text(&profile.phone),
        SemanticRole::SalaryExpectation => profile.salary_expectation.as_deref().and_then(text),
        SemanticRole::CoverLetterText | SemanticRole::FreeText => {
            profile.cover_letter_text.as_deref().and_then(text)
        }
        SemanticRole::EarliestStart => match profile.earliest_start.as_deref() {
            Some(start) => text(start),
            None => text(&default_start_date(today).format("%d.%m.%Y").to_string()),
        },
        SemanticRole::Salutation => {
            let preference = profile.salutation.as_deref()?;
            choose(&field.options, |o| {
                same_salutation(preference, &o.text) || same_salutation(preference, &o.value)
            })
        }
        SemanticRole::ReferralSource => {
            let source = profile.referral_source.as_deref();
            if field.input_type != InputType::Select {
                return source.and_then(text);
            }
            source
                .and_then(|s| {
                    let s = s.to_lowercase();
                    choose(&field.options, |o| o.text.to_lowercase().contains(&s))
                })
                .or_else(|| {
                    if !field.required {
                        return None;
                    }
                    REFERRAL_FALLBACKS.iter().find_map(|needle| {
                        choose(&field.options, |o| o.text.to_lowercase().contains(needle))
                    })
                })
        }
        SemanticRole::Consent => Some(FillValue::Check),
        _ => None,
    }
}

/// First selectable option (non-empty value) that satisfies `pred`.
fn choose(options: &[SelectOption], pred: impl Fn(&SelectOption) -> bool) -> Option<FillValue> {
    options
        .iter()
        .filter(|o| !o.value.trim().is_empty())
        .find(|o| pred(o))
        .map(|o| FillValue::Choice(o.value.clone()))
}

/// Herr ↔ Mr, Frau ↔ Ms/Mrs, otherwise case-insensitive equality.
pub fn same_salutation(a: &str, b: &str) -> bool {
    fn key(s: &str) -> String {
        let s = s.trim().trim_end_matches('.').to_lowercase();
        let canonical = match s.as_str() {
            "herr" | "mr" => "herr",
            "frau" | "ms" | "mrs" => "frau",
            other => other,
        };
        canonical.to_string()
    }
    let (a, b) = (key(a), key(b));
    !a.is_empty() && a == b
}

/// First day of the month after next.
pub fn default_start_date(today: NaiveDate) -> NaiveDate {
    let month_index = today.year() * 12 + today.month0() as i32 + 2;
    let (year, month0) = (month_index.div_euclid(12), month_index.rem_euclid(12));
    NaiveDate::from_ymd_opt(year, month0 as u32 + 1, 1).unwrap_or(today)
}
