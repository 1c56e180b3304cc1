//! Field classifier. Maps form-field metadata to the applicant data it asks for.
//!
//! The heuristic is an ordered rule table: the first rule whose predicate
//! holds decides the role. More specific rules (typed inputs, uploads) come
//! before the generic text rules so a later rule never overrides an earlier,
//! more certain one.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputType {
    Text,
    Email,
    Tel,
    File,
    Select,
    Textarea,
    Checkbox,
}

impl InputType {
    /// Input type of a form control, `None` for controls the engine never fills.
    pub fn from_element(tag: &str, type_attr: Option<&str>) -> Option<Self> {
        match tag {
            "select" => Some(InputType::Select),
            "textarea" => Some(InputType::Textarea),
            "input" => match type_attr.unwrap_or("text").to_ascii_lowercase().as_str() {
                "email" => Some(InputType::Email),
                "tel" => Some(InputType::Tel),
                "file" => Some(InputType::File),
                "checkbox" => Some(InputType::Checkbox),
                "text" | "" | "number" | "date" | "url" | "month" => Some(InputType::Text),
                _ => None,
            },
            _ => None,
        }
    }

    fn is_text_like(self) -> bool {
        matches!(self, InputType::Text | InputType::Textarea)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SemanticRole {
    FullName,
    FirstName,
    LastName,
    Email,
    Phone,
    Salutation,
    ResumeUpload,
    CoverLetterUpload,
    OtherUpload,
    CoverLetterText,
    FreeText,
    SalaryExpectation,
    EarliestStart,
    ReferralSource,
    Consent,
    Unknown,
}

impl fmt::Display for SemanticRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SemanticRole::FullName => "name",
            SemanticRole::FirstName => "first-name",
            SemanticRole::LastName => "last-name",
            SemanticRole::Email => "email",
            SemanticRole::Phone => "phone",
            SemanticRole::Salutation => "salutation",
            SemanticRole::ResumeUpload => "resume-upload",
            SemanticRole::CoverLetterUpload => "cover-letter-upload",
            SemanticRole::OtherUpload => "other-upload",
            SemanticRole::CoverLetterText => "cover-letter-text",
            SemanticRole::FreeText => "free-text",
            SemanticRole::SalaryExpectation => "salary-expectation",
            SemanticRole::EarliestStart => "earliest-start",
            SemanticRole::ReferralSource => "referral-source",
            SemanticRole::Consent => "consent",
            SemanticRole::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// What the classifier gets to see of a field.
#[derive(Debug, Clone, Default)]
pub struct FieldMeta {
    pub input_type: Option<InputType>,
    pub label: String,
    pub name: String,
    pub id: String,
    pub placeholder: String,
    pub aria_label: String,
}

impl FieldMeta {
    /// Label, name, id, placeholder and aria-label, lowercased with every
    /// non-alphanumeric run turned into one space.
    fn haystack(&self) -> String {
        let joined = [
            self.label.as_str(),
            self.name.as_str(),
            self.id.as_str(),
            self.placeholder.as_str(),
            self.aria_label.as_str(),
        ]
        .join(" ")
        .to_lowercase();
        let spaced: String = joined
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        format!(" {} ", spaced.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub role: SemanticRole,
    pub confidence: f32,
}

struct Terms<'a> {
    haystack: &'a str,
}

impl Terms<'_> {
    /// Substring match, for German compounds ("Lebenslaufdatei").
    fn has(&self, terms: &[&str]) -> bool {
        terms.iter().any(|t| self.haystack.contains(t))
    }

    /// Whole-word match, for short tokens ("cv", "tel").
    fn has_word(&self, words: &[&str]) -> bool {
        words
            .iter()
            .any(|w| self.haystack.contains(&format!(" {w} ")))
    }
}

struct Rule {
    role: SemanticRole,
    confidence: f32,
    applies: fn(Option<InputType>, &Terms<'_>) -> bool,
}

const RESUME: &[&str] = &["lebenslauf", "resume", "résumé", "curriculum"];
const COVER: &[&str] = &[
    "anschreiben", "cover letter", "coverletter", "motivationsschreiben", "cover",
];
const CONSENT: &[&str] = &[
    "datenschutz", "privacy", "consent", "einwillig", "agree", "zustimm", "akzeptier", "accept",
    "terms", "agb", "dsgvo", "gdpr",
];
const SALUTATION: &[&str] = &["anrede", "salutation"];
const REFERRAL: &[&str] = &[
    "aufmerksam", "hear about", "heard about", "referral", "source", "erfahren", "found us",
    "quelle",
];
const EMAIL: &[&str] = &["email", "e mail"];
const PHONE: &[&str] = &["telefon", "phone", "mobil", "handy", "rufnummer"];
const FIRST_NAME: &[&str] = &["first name", "firstname", "vorname", "given name", "givenname"];
const LAST_NAME: &[&str] = &[
    "last name", "lastname", "nachname", "surname", "family name", "familienname",
];
const FULL_NAME: &[&str] = &[
    "full name", "fullname", "vollständiger name", "your name", "ihr name", "dein name",
];
const NOT_A_PERSON: &[&str] = &["firma", "company", "unternehmen", "user", "datei", "file"];
const SALARY: &[&str] = &["gehalt", "salary", "compensation", "vergütung", "verdienst"];
const START: &[&str] = &[
    "eintritt", "start", "verfügbar", "earliest", "available", "availability", "beginn",
];
const MESSAGE: &[&str] = &[
    "nachricht", "message", "anmerkung", "comment", "kommentar", "motivation", "zusätzlich",
    "additional",
];

fn text_like(t: Option<InputType>) -> bool {
    t.is_some_and(InputType::is_text_like)
}

/// Evaluated top to bottom; the first match wins.
const RULES: &[Rule] = &[
    Rule {
        role: SemanticRole::ResumeUpload,
        confidence: 0.95,
        applies: |t, m| {
            t == Some(InputType::File) && (m.has(RESUME) || m.has_word(&["cv"]))
        },
    },
    Rule {
        role: SemanticRole::CoverLetterUpload,
        confidence: 0.9,
        applies: |t, m| t == Some(InputType::File) && m.has(COVER),
    },
    Rule {
        role: SemanticRole::OtherUpload,
        confidence: 0.6,
        applies: |t, _| t == Some(InputType::File),
    },
    Rule {
        role: SemanticRole::Email,
        confidence: 0.99,
        applies: |t, _| t == Some(InputType::Email),
    },
    Rule {
        role: SemanticRole::Phone,
        confidence: 0.95,
        applies: |t, _| t == Some(InputType::Tel),
    },
    Rule {
        role: SemanticRole::Consent,
        confidence: 0.8,
        applies: |t, m| t == Some(InputType::Checkbox) && m.has(CONSENT),
    },
    Rule {
        role: SemanticRole::Salutation,
        confidence: 0.85,
        applies: |t, m| {
            t == Some(InputType::Select) && (m.has(SALUTATION) || m.has_word(&["title"]))
        },
    },
    Rule {
        role: SemanticRole::ReferralSource,
        confidence: 0.75,
        applies: |t, m| (t == Some(InputType::Select) || text_like(t)) && m.has(REFERRAL),
    },
    Rule {
        role: SemanticRole::CoverLetterText,
        confidence: 0.85,
        applies: |t, m| t == Some(InputType::Textarea) && m.has(COVER),
    },
    Rule {
        role: SemanticRole::Email,
        confidence: 0.9,
        applies: |t, m| text_like(t) && m.has(EMAIL),
    },
    Rule {
        role: SemanticRole::Phone,
        confidence: 0.85,
        applies: |t, m| text_like(t) && (m.has(PHONE) || m.has_word(&["tel"])),
    },
    Rule {
        role: SemanticRole::FirstName,
        confidence: 0.9,
        applies: |t, m| text_like(t) && m.has(FIRST_NAME),
    },
    Rule {
        role: SemanticRole::LastName,
        confidence: 0.9,
        applies: |t, m| text_like(t) && m.has(LAST_NAME),
    },
    Rule {
        role: SemanticRole::FullName,
        confidence: 0.7,
        applies: |t, m| {
            t == Some(InputType::Text)
                && (m.has(FULL_NAME) || m.has_word(&["name"]))
                && !m.has(NOT_A_PERSON)
        },
    },
    Rule {
        role: SemanticRole::SalaryExpectation,
        confidence: 0.85,
        applies: |t, m| text_like(t) && m.has(SALARY),
    },
    Rule {
        role: SemanticRole::EarliestStart,
        confidence: 0.8,
        applies: |t, m| t == Some(InputType::Text) && m.has(START),
    },
    Rule {
        role: SemanticRole::FreeText,
        confidence: 0.6,
        applies: |t, m| t == Some(InputType::Textarea) && m.has(MESSAGE),
    },
];

pub fn classify(meta: &FieldMeta) -> Classification {
    let haystack = meta.haystack();
    let terms = Terms {
        haystack: &haystack,
    };
    RULES
        .iter()
        .find(|rule| (rule.applies)(meta.input_type, &terms))
        .map(|rule| Classification {
            role: rule.role,
            confidence: rule.confidence,
        })
        .unwrap_or(Classification {
            role: SemanticRole::Unknown,
            confidence: 0.0,
        })
}
