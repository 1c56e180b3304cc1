use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::cli::Cli;

/// Run configuration: environment (and `.env`) first, command-line flags on top.
/// Credentials are optional; a missing key disables its collaborator.
#[derive(Debug, Clone)]
pub struct Config {
    pub headless: bool,
    pub locations: Vec<String>,
    pub max_results_per_combination: usize,
    pub num_titles: usize,
    pub resume_path: PathBuf,
    pub profile_path: PathBuf,
    pub output_dir: PathBuf,
    /// Parent of the persistent browser profiles; `None` means a fresh
    /// profile for every session.
    pub profile_dir_base: Option<PathBuf>,
    pub min_resolve_confidence: f64,
    pub rust_log: String,
    pub anthropic_api_key: Option<String>,
    pub google_search_api_key: Option<String>,
    pub google_cse_id: Option<String>,
    pub jobs_file: Option<PathBuf>,
    pub apply: bool,
    pub dry_run: bool,
    pub max_applications: usize,
    pub job_index: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Config {
            headless: var("JOBHUNT_HEADLESS")
                .map(|v| parse_bool("JOBHUNT_HEADLESS", &v))
                .transpose()?
                .unwrap_or(false),
            locations: split_list(
                &var("JOBHUNT_LOCATIONS").unwrap_or_else(|| "Köln,Düsseldorf,Bonn".to_string()),
            ),
            max_results_per_combination: parse_or("JOBHUNT_MAX_RESULTS_PER_COMBINATION", var, 5)?,
            num_titles: parse_or("JOBHUNT_NUM_TITLES", var, 3)?,
            resume_path: var("JOBHUNT_RESUME_PATH")
                .unwrap_or_else(|| "data/base_resume.pdf".to_string())
                .into(),
            profile_path: var("JOBHUNT_PROFILE_PATH")
                .unwrap_or_else(|| "data/profile.json".to_string())
                .into(),
            output_dir: var("JOBHUNT_OUTPUT_DIR")
                .unwrap_or_else(|| "output".to_string())
                .into(),
            profile_dir_base: var("JOBHUNT_PROFILE_DIR_BASE").map(PathBuf::from),
            min_resolve_confidence: parse_or("JOBHUNT_MIN_RESOLVE_CONFIDENCE", var, 0.6)?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            google_search_api_key: var("GOOGLE_SEARCH_API_KEY"),
            google_cse_id: var("GOOGLE_CSE_ID"),
            jobs_file: None,
            apply: false,
            dry_run: false,
            max_applications: 1,
            job_index: 0,
        })
    }

    /// Applies command-line overrides and checks the result.
    pub fn with_cli(mut self, cli: Cli) -> Result<Self> {
        self.headless |= cli.headless;
        if let Some(locations) = cli.locations {
            self.locations = locations
                .iter()
                .map(String::as_str)
                .flat_map(split_list)
                .collect();
        }
        if let Some(n) = cli.max_results_per_combination {
            self.max_results_per_combination = n;
        }
        if let Some(n) = cli.num_titles_to_suggest {
            self.num_titles = n;
        }
        if let Some(path) = cli.resume {
            self.resume_path = path;
        }
        if let Some(path) = cli.profile {
            self.profile_path = path;
        }
        if let Some(dir) = cli.output_dir {
            self.output_dir = dir;
        }
        if let Some(dir) = cli.profile_dir_base {
            self.profile_dir_base = Some(dir);
        }
        self.jobs_file = cli.jobs_file;
        self.apply = cli.apply || cli.dry_run;
        self.dry_run = cli.dry_run;
        self.max_applications = cli.max_applications;
        self.job_index = cli.job_index;
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.locations.is_empty() {
            bail!("at least one location is required");
        }
        if self.max_results_per_combination == 0 {
            bail!("max results per combination must be at least 1");
        }
        if self.num_titles == 0 {
            bail!("number of titles to suggest must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.min_resolve_confidence) {
            bail!(
                "JOBHUNT_MIN_RESOLVE_CONFIDENCE must be between 0 and 1, got {}",
                self.min_resolve_confidence
            );
        }
        Ok(())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{key} must be a boolean, got '{other}'"),
    }
}

fn parse_or<T>(key: &str, var: impl Fn(&str) -> Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = config(&[]).unwrap();
        assert!(!config.headless);
        assert_eq!(config.locations, vec!["Köln", "Düsseldorf", "Bonn"]);
        assert_eq!(config.max_results_per_combination, 5);
        assert_eq!(config.num_titles, 3);
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert!(config.anthropic_api_key.is_none());
        assert!(config.profile_dir_base.is_none());
        assert!((config.min_resolve_confidence - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_environment_values() {
        let config = config(&[
            ("JOBHUNT_HEADLESS", "yes"),
            ("JOBHUNT_LOCATIONS", " Berlin , Hamburg,"),
            ("JOBHUNT_NUM_TITLES", "4"),
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("GOOGLE_CSE_ID", "  "),
            ("JOBHUNT_PROFILE_DIR_BASE", "/var/lib/jobhunt/profiles"),
        ])
        .unwrap();
        assert_eq!(
            config.profile_dir_base,
            Some(PathBuf::from("/var/lib/jobhunt/profiles"))
        );
        assert!(config.headless);
        assert_eq!(config.locations, vec!["Berlin", "Hamburg"]);
        assert_eq!(config.num_titles, 4);
        assert_eq!(config.anthropic_api_key.as_deref(), Some("sk-test"));
        assert!(config.google_cse_id.is_none());
    }

    #[test]
    fn test_invalid_values_are_reported_by_name() {
        let err = config(&[("JOBHUNT_MAX_RESULTS_PER_COMBINATION", "lots")]).unwrap_err();
        assert!(format!("{err:#}").contains("JOBHUNT_MAX_RESULTS_PER_COMBINATION"));
        assert!(config(&[("JOBHUNT_HEADLESS", "maybe")]).is_err());
    }

    #[test]
    fn test_cli_overrides_environment() {
        let cli = Cli {
            locations: Some(vec!["Aachen".into()]),
            max_results_per_combination: Some(2),
            dry_run: true,
            job_index: 4,
            profile_dir_base: Some("profiles".into()),
            ..Cli::default()
        };
        let config = config(&[("JOBHUNT_LOCATIONS", "Köln")])
            .unwrap()
            .with_cli(cli)
            .unwrap();
        assert_eq!(config.locations, vec!["Aachen"]);
        assert_eq!(config.max_results_per_combination, 2);
        assert!(config.apply && config.dry_run);
        assert_eq!(config.job_index, 4);
        assert_eq!(config.profile_dir_base, Some(PathBuf::from("profiles")));
    }

    #[test]
    fn test_out_of_range_confidence_is_rejected() {
        let result = config(&[("JOBHUNT_MIN_RESOLVE_CONFIDENCE", "1.5")])
            .unwrap()
            .with_cli(Cli::default());
        assert!(result.is_err());
    }
}
