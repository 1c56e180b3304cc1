pub mod attempt;
pub mod posting;
pub mod profile;

pub use attempt::{ApplicationAttempt, AttemptStatus};
pub use posting::{normalize_url, JobPosting, SearchQuery, Source};
pub use profile::CandidateProfile;
