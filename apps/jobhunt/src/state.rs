use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::apply::documents::{LlmPlaceholderGenerator, PlaceholderGenerator};
use crate::apply::{ApplicationEngine, EngineSettings};
use crate::browser::{BrowserLauncher, ChromeLauncher};
use crate::career::{CandidateRanker, CareerPageResolver, GoogleSearch, LlmRanker, WebSearch};
use crate::config::Config;
use crate::discovery::{DiscoveryOrchestrator, FilterRule};
use crate::errors::AppError;
use crate::llm_client::{self, LlmClient};
use crate::models::CandidateProfile;
use crate::personalizer::{LlmTitleSuggester, TitleSuggester};
use crate::scrapers::{LinkedInScraper, ScrapeSettings, SourceScraper, StepStoneScraper};

/// Upper bound for a single browser operation.
const BROWSER_OP_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound for launching a browser or loading a page.
const BROWSER_NAV_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything a run needs, wired once from the configuration. Each pluggable
/// collaborator sits behind a trait object so tests can swap it.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub filter: FilterRule,
    pub browser: Arc<dyn BrowserLauncher>,
    pub scrapers: Vec<Arc<dyn SourceScraper>>,
    pub titles: Arc<dyn TitleSuggester>,
    pub search: Arc<dyn WebSearch>,
    pub ranker: Arc<dyn CandidateRanker>,
    pub documents: Arc<dyn PlaceholderGenerator>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, AppError> {
        let llm = match &config.anthropic_api_key {
            Some(key) => {
                let client = LlmClient::new(key.clone())
                    .map_err(|e| AppError::Config(format!("LLM client: {e}")))?;
                info!("LLM client initialized (model: {})", llm_client::MODEL);
                Some(client)
            }
            None => {
                warn!("ANTHROPIC_API_KEY not set: default roles, no career-page ranking, no placeholder documents");
                None
            }
        };

        let search = GoogleSearch::new(
            config.google_search_api_key.clone(),
            config.google_cse_id.clone(),
        )
        .map_err(|e| AppError::Config(format!("search client: {e}")))?;
        if !search.is_configured() {
            warn!("GOOGLE_SEARCH_API_KEY or GOOGLE_CSE_ID not set: career pages stay unresolved");
        }

        let filter = FilterRule::default();
        let browser = chrome(&config, "apply");
        let scrapers: Vec<Arc<dyn SourceScraper>> = vec![
            Arc::new(LinkedInScraper::new(
                chrome(&config, "linkedin"),
                ScrapeSettings::default(),
            )),
            Arc::new(StepStoneScraper::new(
                chrome(&config, "stepstone"),
                ScrapeSettings::default(),
            )),
        ];
        if let Some(base) = &config.profile_dir_base {
            info!(base = %base.display(), "Using persistent browser profiles");
        }
        info!(
            headless = config.headless,
            sources = scrapers.len(),
            "Browser automation ready"
        );

        Ok(Self {
            titles: Arc::new(LlmTitleSuggester::new(llm.clone(), filter.clone())),
            ranker: Arc::new(LlmRanker::new(llm.clone())),
            documents: Arc::new(LlmPlaceholderGenerator::new(llm, &config.output_dir)),
            search: Arc::new(search),
            filter,
            browser,
            scrapers,
            config,
        })
    }

    pub fn orchestrator(&self) -> DiscoveryOrchestrator {
        DiscoveryOrchestrator::new(self.scrapers.clone(), self.filter.clone())
    }

    pub fn resolver(&self) -> CareerPageResolver {
        CareerPageResolver::new(self.search.clone(), self.ranker.clone())
            .with_min_confidence(self.config.min_resolve_confidence)
    }

    pub fn engine(&self, profile: CandidateProfile) -> ApplicationEngine {
        let settings = EngineSettings {
            dry_run: self.config.dry_run,
            ..EngineSettings::default()
        };
        ApplicationEngine::new(
            self.browser.clone(),
            self.documents.clone(),
            profile,
            settings,
        )
    }
}

/// One launcher per site, each with its own profile directory under the
/// configured base.
fn chrome(config: &Config, site: &str) -> Arc<dyn BrowserLauncher> {
    Arc::new(
        ChromeLauncher::new(config.headless, BROWSER_OP_TIMEOUT, BROWSER_NAV_TIMEOUT)
            .with_profile_dir(config.profile_dir_base.as_ref().map(|base| base.join(site))),
    )
}
