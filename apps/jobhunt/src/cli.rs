use std::path::PathBuf;

use clap::Parser;

/// Command-line flags. Each one overrides the matching `JOBHUNT_*`
/// environment variable.
#[derive(Parser, Debug, Default)]
#[command(
    name = "jobhunt",
    about = "Find Werkstudent postings on LinkedIn and StepStone and optionally apply to them",
    version
)]
pub struct Cli {
    /// Run the browser without a visible window
    #[arg(long)]
    pub headless: bool,

    /// Locations to search in, e.g. --locations Köln Bonn
    #[arg(long, num_args = 1..)]
    pub locations: Option<Vec<String>>,

    /// Maximum postings per source for each role × location combination
    #[arg(long)]
    pub max_results_per_combination: Option<usize>,

    /// Number of roles to request from the role suggestion
    #[arg(long)]
    pub num_titles_to_suggest: Option<usize>,

    /// CV used for role suggestion (PDF or plain text)
    #[arg(long)]
    pub resume: Option<PathBuf>,

    /// Candidate profile JSON used to fill application forms
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// Directory for exports, attempt records and generated documents
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Keep browser profiles (logins, cookies) under this directory between runs
    #[arg(long)]
    pub profile_dir_base: Option<PathBuf>,

    /// Skip discovery and load postings from a previous export
    #[arg(long)]
    pub jobs_file: Option<PathBuf>,

    /// Run the application phase after discovery
    #[arg(long)]
    pub apply: bool,

    /// Stop every application right before submitting
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum number of application attempts
    #[arg(long, default_value_t = 1)]
    pub max_applications: usize,

    /// Index of the first posting to apply to
    #[arg(long, default_value_t = 0)]
    pub job_index: usize,
}
