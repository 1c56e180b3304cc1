//! Application Automation Engine.
//!
//! One attempt walks a fixed state machine over a single browser session:
//!
//! ```text
//! OPEN_PAGE → DISMISS_INTERSTITIALS → LOCATE_APPLY_ENTRY → FORM_LOADED
//!   → CLASSIFY_FIELDS → FILL_FIELDS → ATTACH_DOCUMENTS → SUBMIT → CONFIRM
//! ```
//!
//! Every state can end the attempt as `failed`; LOCATE_APPLY_ENTRY and
//! FILL_FIELDS can also end it as `skipped-manual-review`. The session is
//! closed on every exit, and released by its guard when the attempt is
//! cancelled mid-flight.

pub mod classifier;
pub mod confirm;
pub mod documents;
pub mod fields;
pub mod plan;
pub mod prompts;
pub mod selectors;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use scraper::Html;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::browser::{dom, with_retry, BrowserError, BrowserLauncher, RetryPolicy, Session};
use crate::career::Resolution;
use crate::models::{ApplicationAttempt, AttemptStatus, CandidateProfile, JobPosting};
use confirm::{Observation, Signal};
use documents::{PlaceholderContext, PlaceholderGenerator};
use plan::{DocumentSource, FillStep, FillValue, UploadStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineState {
    OpenPage,
    DismissInterstitials,
    LocateApplyEntry,
    FormLoaded,
    ClassifyFields,
    FillFields,
    AttachDocuments,
    Submit,
    Confirm,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Upper bound for the application form to appear.
    pub dom_wait: Duration,
    /// Upper bound for a success signal after SUBMIT.
    pub confirm_wait: Duration,
    pub poll: Duration,
    /// Pause after clicks and navigations for scripts to settle.
    pub settle: Duration,
    pub retry: RetryPolicy,
    /// Stop every attempt right before clicking submit.
    pub dry_run: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            dom_wait: Duration::from_secs(30),
            confirm_wait: Duration::from_secs(15),
            poll: Duration::from_millis(500),
            settle: Duration::from_millis(1500),
            retry: RetryPolicy::default(),
            dry_run: false,
        }
    }
}

impl EngineSettings {
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            dom_wait: Duration::ZERO,
            confirm_wait: Duration::ZERO,
            poll: Duration::ZERO,
            settle: Duration::ZERO,
            retry: RetryPolicy {
                attempts: 2,
                backoff: Duration::ZERO,
            },
            dry_run: false,
        }
    }
}

/// Final attempt record plus the states the engine went through.
#[derive(Debug, Clone)]
pub struct AttemptReport {
    pub attempt: ApplicationAttempt,
    pub trace: Vec<EngineState>,
}

/// Why an attempt left the happy path.
#[derive(Debug)]
enum Exit {
    Failed(String),
    ManualReview(String),
}

impl From<BrowserError> for Exit {
    fn from(e: BrowserError) -> Self {
        Exit::Failed(e.to_string())
    }
}

#[derive(Default)]
struct Progress {
    trace: Vec<EngineState>,
    generated: Vec<PathBuf>,
}

impl Progress {
    fn enter(&mut self, state: EngineState, url: &str) {
        debug!(?state, %url, "Engine state");
        self.trace.push(state);
    }
}

pub struct ApplicationEngine {
    launcher: Arc<dyn BrowserLauncher>,
    documents: Arc<dyn PlaceholderGenerator>,
    profile: CandidateProfile,
    settings: EngineSettings,
}

impl ApplicationEngine {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        documents: Arc<dyn PlaceholderGenerator>,
        profile: CandidateProfile,
        settings: EngineSettings,
    ) -> Self {
        Self {
            launcher,
            documents,
            profile,
            settings,
        }
    }

    /// Runs one attempt for `posting`. Never fails: every outcome, including
    /// cancellation, is recorded on the returned attempt.
    pub async fn apply(
        &self,
        posting: &JobPosting,
        resolution: &Resolution,
        cancel: &CancellationToken,
    ) -> AttemptReport {
        let mut attempt = ApplicationAttempt::new(posting.url.clone());
        let mut progress = Progress::default();

        let target = match resolution {
            Resolution::Resolved(app) => app.url.clone(),
            Resolution::Unresolved { reason } => {
                info!(url = %posting.url, %reason, "No confident career page, leaving for manual review");
                attempt.finish(
                    AttemptStatus::SkippedManualReview,
                    Some(format!("career page unresolved: {reason}")),
                );
                return AttemptReport {
                    attempt,
                    trace: progress.trace,
                };
            }
        };
        attempt.resolved_application_url = Some(target.clone());
        info!(posting = %posting.url, application = %target, "Starting application attempt");

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(Exit::Failed("cancelled".into())),
            outcome = self.run(posting, &target, &mut progress) => outcome,
        };

        match outcome {
            Ok(signal) => {
                info!(url = %target, ?signal, "Application submitted");
                attempt.finish(AttemptStatus::Submitted, None);
            }
            Err(Exit::ManualReview(reason)) => {
                info!(url = %target, %reason, "Application left for manual review");
                attempt.finish(AttemptStatus::SkippedManualReview, Some(reason));
            }
            Err(Exit::Failed(reason)) => {
                warn!(url = %target, %reason, "Application failed");
                attempt.finish(AttemptStatus::Failed, Some(reason));
            }
        }

        attempt.generated_documents = progress.generated;
        AttemptReport {
            attempt,
            trace: progress.trace,
        }
    }

    async fn run(
        &self,
        posting: &JobPosting,
        url: &str,
        progress: &mut Progress,
    ) -> Result<Signal, Exit> {
        progress.enter(EngineState::OpenPage, url);
        let session = self
            .launcher
            .open()
            .await
            .map_err(|e| Exit::Failed(format!("browser unavailable: {e}")))?;
        let outcome = self.drive(&session, posting, url, progress).await;
        session.close().await;
        outcome
    }

    async fn drive(
        &self,
        session: &Session,
        posting: &JobPosting,
        url: &str,
        progress: &mut Progress,
    ) -> Result<Signal, Exit> {
        with_retry("open application page", self.settings.retry, || session.goto(url))
            .await
            .map_err(|e| Exit::Failed(format!("could not open application page: {e}")))?;
        self.settle().await;

        progress.enter(EngineState::DismissInterstitials, url);
        self.dismiss_interstitials(session).await;

        progress.enter(EngineState::LocateApplyEntry, url);
        self.locate_apply_entry(session, posting).await?;

        progress.enter(EngineState::FormLoaded, url);
        let html = self.wait_for_form(session).await?;

        progress.enter(EngineState::ClassifyFields, url);
        let form = fields::discover(&html);
        for field in &form {
            debug!(
                field = %field.describe(),
                role = %field.role(),
                confidence = field.confidence(),
                required = field.required,
                "Classified form field"
            );
        }

        progress.enter(EngineState::FillFields, url);
        let today = chrono::Local::now().date_naive();
        let plan = plan::plan_fill(&form, &self.profile, today).map_err(Exit::ManualReview)?;
        self.fill_fields(session, &plan.fills).await?;

        progress.enter(EngineState::AttachDocuments, url);
        self.attach_documents(session, posting, &plan.uploads, progress)
            .await?;

        progress.enter(EngineState::Submit, url);
        if self.settings.dry_run {
            return Err(Exit::ManualReview("dry run".into()));
        }
        let form_url = session.current_url().await?;
        self.submit(session).await?;

        progress.enter(EngineState::Confirm, url);
        self.confirm(session, &form_url).await
    }

    async fn settle(&self) {
        if !self.settings.settle.is_zero() {
            tokio::time::sleep(self.settings.settle).await;
        }
    }

    /// Best effort: a missing banner or a failed click is not an error.
    async fn dismiss_interstitials(&self, session: &Session) {
        let html = match session.content().await {
            Ok(html) => html,
            Err(e) => {
                debug!("Could not read page for consent banners: {e}");
                return;
            }
        };
        let Some(target) = consent_target(&html) else {
            debug!("No consent banner found");
            return;
        };
        match session.click(&target).await {
            Ok(true) => {
                info!(selector = %target, "Dismissed consent banner");
                self.settle().await;
            }
            Ok(false) => debug!(selector = %target, "Consent banner vanished before click"),
            Err(e) => warn!(selector = %target, "Consent banner click failed: {e}"),
        }
    }

    async fn locate_apply_entry(&self, session: &Session, posting: &JobPosting) -> Result<(), Exit> {
        let html = session.content().await?;
        if fields::has_application_form(&html) {
            info!("Application form already on the page");
            return Ok(());
        }
        if let Some(target) = apply_control(&html) {
            return self.click_through(session, &target, "apply control").await;
        }

        let Some(link) = job_link(&html, &posting.title) else {
            return Err(Exit::ManualReview("no apply control found".into()));
        };
        info!(selector = %link, title = %posting.title, "No apply control, following job link");
        self.click_through(session, &link, "job link").await?;
        self.dismiss_interstitials(session).await;

        let html = session.content().await?;
        if fields::has_application_form(&html) {
            return Ok(());
        }
        match apply_control(&html) {
            Some(target) => self.click_through(session, &target, "apply control").await,
            None => Err(Exit::ManualReview(
                "no apply control found on the job page".into(),
            )),
        }
    }

    async fn click_through(&self, session: &Session, target: &str, what: &str) -> Result<(), Exit> {
        if !session.click(target).await? {
            return Err(Exit::Failed(format!("{what} {target} disappeared before click")));
        }
        info!(selector = %target, "Clicked {what}");
        self.settle().await;
        Ok(())
    }

    async fn wait_for_form(&self, session: &Session) -> Result<String, Exit> {
        let deadline = Instant::now() + self.settings.dom_wait;
        loop {
            let html = session.content().await?;
            if fields::has_application_form(&html) {
                return Ok(html);
            }
            if Instant::now() >= deadline {
                return Err(Exit::Failed(format!(
                    "application form did not appear within {:?}",
                    self.settings.dom_wait
                )));
            }
            tokio::time::sleep(self.settings.poll).await;
        }
    }

    async fn fill_fields(&self, session: &Session, fills: &[FillStep]) -> Result<(), Exit> {
        for step in fills {
            let result = match &step.value {
                FillValue::Text(value) => session.fill(&step.selector, value).await,
                FillValue::Choice(value) => session.select_option(&step.selector, value).await,
                FillValue::Check => session.set_checked(&step.selector, true).await,
            };
            match result {
                Ok(()) => debug!(field = %step.label, role = %step.role, "Filled"),
                Err(e) if step.required => {
                    return Err(Exit::Failed(format!("could not fill '{}': {e}", step.label)));
                }
                Err(e) => warn!(field = %step.label, "Skipping optional field: {e}"),
            }
        }
        info!("Filled {} fields", fills.len());
        Ok(())
    }

    async fn attach_documents(
        &self,
        session: &Session,
        posting: &JobPosting,
        uploads: &[UploadStep],
        progress: &mut Progress,
    ) -> Result<(), Exit> {
        for upload in uploads {
            let path = match &upload.source {
                DocumentSource::File(path) => path.clone(),
                DocumentSource::Placeholder(kind) => {
                    let context = PlaceholderContext {
                        company: posting.company.clone(),
                        job_title: posting.title.clone(),
                        field_label: upload.label.clone(),
                    };
                    let path = self.documents.generate(*kind, &context).await.map_err(|e| {
                        Exit::Failed(format!(
                            "placeholder {} for '{}' could not be generated: {e}",
                            kind.as_str(),
                            upload.label
                        ))
                    })?;
                    progress.generated.push(path.clone());
                    path
                }
            };
            session
                .set_input_files(&upload.selector, std::slice::from_ref(&path))
                .await
                .map_err(|e| Exit::Failed(format!("upload to '{}' failed: {e}", upload.label)))?;
            info!(field = %upload.label, file = %path.display(), "Attached document");
        }
        Ok(())
    }

    async fn submit(&self, session: &Session) -> Result<(), Exit> {
        let html = session.content().await?;
        let target = submit_control(&html)
            .ok_or_else(|| Exit::Failed("no submit control found".into()))?;
        if !session.click(&target).await? {
            return Err(Exit::Failed("submit control disappeared before click".into()));
        }
        info!(selector = %target, "Submitted application form");
        Ok(())
    }

    /// Polls for a success signal until `confirm_wait` runs out. No signal
    /// means `unconfirmed`, never success.
    async fn confirm(&self, session: &Session, form_url: &str) -> Result<Signal, Exit> {
        let deadline = Instant::now() + self.settings.confirm_wait;
        loop {
            let left_form_url = session
                .current_url()
                .await
                .map(|current| current != form_url)
                .unwrap_or(false);
            match session.content().await {
                Ok(html) => match confirm::observe(&html, left_form_url) {
                    Observation::Confirmed(signal) => return Ok(signal),
                    Observation::Rejected => debug!("Page reports invalid fields or an error"),
                    Observation::Pending => {}
                },
                Err(e) => debug!("Could not read page while confirming: {e}"),
            }
            if Instant::now() >= deadline {
                return Err(Exit::Failed("unconfirmed".into()));
            }
            tokio::time::sleep(self.settings.poll).await;
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Page heuristics (pure, over snapshots)
// ────────────────────────────────────────────────────────────────────────────

fn first_visible(doc: &Html, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|css| {
        dom::select_all(doc, css)
            .into_iter()
            .find(|el| !dom::is_hidden(*el))
            .map(|el| dom::element_selector(doc, el))
    })
}

fn consent_target(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    first_visible(&doc, selectors::COOKIE_ACCEPT)
        .or_else(|| dom::find_by_text(&doc, "button, [role='button']", selectors::COOKIE_TEXT))
}

fn apply_control(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    dom::find_by_text(&doc, selectors::CLICKABLE, selectors::APPLY_TEXT)
        .or_else(|| first_visible(&doc, selectors::APPLY_ATTR))
}

fn submit_control(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let in_form: Vec<String> = selectors::SUBMIT_ATTR
        .iter()
        .map(|css| format!("form {css}"))
        .collect();
    let in_form: Vec<&str> = in_form.iter().map(String::as_str).collect();
    first_visible(&doc, &in_form)
        .or_else(|| dom::find_by_text(&doc, "button, [role='button']", selectors::SUBMIT_TEXT))
        .or_else(|| first_visible(&doc, selectors::SUBMIT_ATTR))
}

/// Link whose text holds every word of the posting title; the tightest
/// match (shortest text) wins.
fn job_link(html: &str, title: &str) -> Option<String> {
    let keywords: Vec<String> = title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1)
        .map(str::to_string)
        .collect();
    if keywords.is_empty() {
        return None;
    }
    let doc = Html::parse_document(html);
    dom::select_all(&doc, selectors::JOB_LINKS)
        .into_iter()
        .filter(|a| !dom::is_hidden(*a))
        .map(|a| (a, dom::text_of(a).to_lowercase()))
        .filter(|(_, text)| keywords.iter().all(|k| text.contains(k.as_str())))
        .min_by_key(|(_, text)| text.chars().count())
        .map(|(a, _)| dom::element_selector(&doc, a))
}
