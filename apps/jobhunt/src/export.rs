//! Flat JSON artifacts of a run: the combined posting list and the
//! application attempts. Both are 4-space indented arrays with UTF-8 kept
//! verbatim.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::models::{ApplicationAttempt, JobPosting};

pub const RESULTS_DIR: &str = "scrape_results";
pub const ATTEMPTS_DIR: &str = "applications";

fn timestamp(at: DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    out.push(b'\n');
    Ok(out)
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    let body = to_pretty_json(value).map_err(|e| AppError::Export(e.to_string()))?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::Export(format!("{}: {e}", parent.display())))?;
    }
    tokio::fs::write(path, body)
        .await
        .map_err(|e| AppError::Export(format!("{}: {e}", path.display())))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::Export(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&raw).map_err(|e| AppError::Export(format!("{}: {e}", path.display())))
}

/// Writes `<output>/scrape_results/combined_jobs_<YYYYMMDD_HHMMSS>.json`.
pub async fn write_postings(
    output_dir: &Path,
    postings: &[JobPosting],
    at: DateTime<Local>,
) -> Result<PathBuf, AppError> {
    let path = output_dir
        .join(RESULTS_DIR)
        .join(format!("combined_jobs_{}.json", timestamp(at)));
    write_json(&path, postings).await?;
    info!(path = %path.display(), count = postings.len(), "Exported postings");
    Ok(path)
}

/// Reads a posting list written by `write_postings`.
pub async fn load_postings(path: &Path) -> Result<Vec<JobPosting>, AppError> {
    let postings: Vec<JobPosting> = read_json(path).await?;
    info!(path = %path.display(), count = postings.len(), "Loaded postings");
    Ok(postings)
}

/// Writes `<output>/applications/application_attempts_<YYYYMMDD_HHMMSS>.json`.
pub async fn write_attempts(
    output_dir: &Path,
    attempts: &[ApplicationAttempt],
    at: DateTime<Local>,
) -> Result<PathBuf, AppError> {
    let path = output_dir
        .join(ATTEMPTS_DIR)
        .join(format!("application_attempts_{}.json", timestamp(at)));
    write_json(&path, attempts).await?;
    info!(path = %path.display(), count = attempts.len(), "Recorded application attempts");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::{AttemptStatus, Source};

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, 9, 5, 7).unwrap()
    }

    fn posting(url: &str, description: Option<&str>) -> JobPosting {
        JobPosting {
            title: "Werkstudent Data Analyst (m/w/d)".into(),
            company: "Müller & Söhne GmbH".into(),
            location: "Köln".into(),
            url: url.into(),
            source: Source::StepStone,
            description: description.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_export_layout_and_keys() {
        let dir = tempfile::tempdir().unwrap();
        let postings = vec![
            posting("https://www.stepstone.de/a", Some("Aufgaben")),
            posting("https://www.stepstone.de/b", None),
        ];
        let path = write_postings(dir.path(), &postings, at()).await.unwrap();
        assert_eq!(
            path,
            dir.path().join("scrape_results/combined_jobs_20260314_090507.json")
        );

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n    {\n        \"title\""));
        assert!(raw.contains("Müller & Söhne GmbH"));
        assert!(raw.contains("\"description\": null"));

        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        for object in value.as_array().unwrap() {
            let mut keys: Vec<&str> = object.as_object().unwrap().keys().map(String::as_str).collect();
            keys.sort_unstable();
            assert_eq!(
                keys,
                vec!["company", "description", "location", "source", "title", "url"]
            );
        }
        assert_eq!(value[0]["source"], "StepStone");
    }

    #[tokio::test]
    async fn test_export_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let postings = vec![posting("https://www.stepstone.de/a", None)];
        let path = write_postings(dir.path(), &postings, at()).await.unwrap();
        assert_eq!(load_postings(&path).await.unwrap(), postings);
    }

    #[tokio::test]
    async fn test_missing_jobs_file_is_an_error() {
        let err = load_postings(Path::new("/nope/combined_jobs.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Export(_)));
    }

    #[tokio::test]
    async fn test_attempts_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut attempt = ApplicationAttempt::new("https://www.stepstone.de/a");
        attempt.finish(AttemptStatus::Failed, Some("unconfirmed".into()));
        let path = write_attempts(dir.path(), &[attempt], at()).await.unwrap();
        assert!(path.ends_with("applications/application_attempts_20260314_090507.json"));

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[0]["status"], "failed");
        assert_eq!(value[0]["failure_reason"], "unconfirmed");
        assert!(value[0].get("generated_documents").is_none());
    }

    #[tokio::test]
    async fn test_attempts_list_generated_documents() {
        let dir = tempfile::tempdir().unwrap();
        let mut attempt = ApplicationAttempt::new("https://www.stepstone.de/b");
        attempt.generated_documents = vec!["output/generated_documents/anschreiben_acme.pdf".into()];
        attempt.finish(AttemptStatus::Submitted, None);
        let path = write_attempts(dir.path(), &[attempt], at()).await.unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            value[0]["generated_documents"][0],
            "output/generated_documents/anschreiben_acme.pdf"
        );
    }
}
