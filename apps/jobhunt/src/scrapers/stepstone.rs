//! StepStone.de search. Results are paginated with an explicit `page` parameter.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use super::{
    card_text, open_listing, settle, CardCollector, DetailRecipe, ListingSnapshot, PageGuard,
    RawCard, ScrapeSettings, ScraperError, SearchOutcome, SourceScraper,
};
use crate::browser::{dom, with_retry, BrowserLauncher, Session};
use crate::models::{SearchQuery, Source};

const SEARCH_BASE: &str = "https://www.stepstone.de/jobs";
const SITE_ROOT: &str = "https://www.stepstone.de";
/// A page with fewer cards than this is the last one.
const FULL_PAGE: usize = 10;

const CARD: &str = r#"article[data-at="job-item"]"#;
const TITLE_LINK: &str = r#"a[data-testid="job-item-title"]"#;
const COMPANY: &str = r#"span[data-at="job-item-company-name"]"#;
const LOCATION: &str = r#"span[data-at="job-item-location"]"#;

const NEXT_PAGE: &[&str] = &[
    "a[data-testid='pagination-next']",
    "[data-at='pagination-next']",
    "a[aria-label='Nächste Seite']",
    "a[aria-label='Next']",
    "a[rel='next']",
];

const COOKIE_ACCEPT: &[&str] = &[
    "button#ccmgt_explicit_accept",
    "button[data-testid='uc-accept-all-button']",
];
const COOKIE_TEXT: &[&str] = &["Akzeptieren", "Accept"];

const MODAL_CLOSE: &[&str] = &[
    "button[aria-label='close']",
    "button[aria-label='Close']",
    "button[aria-label='Schließen']",
    "button.modal-close",
    "div[role='dialog'] button.close",
    "button[data-dismiss='modal']",
];

const DESCRIPTION: &[&str] = &[
    "div[data-at='job-ad-content']",
    "div#job-ad-content",
    "article[data-at='job-description']",
    ".job-description",
    "main[data-genesis-element='BASE']",
    "div[data-at='content-container']",
];
const RICH_TEXT: &str =
    "div[data-genesis-element='CARD_CONTENT'] span[data-genesis-element='TEXT']";

const RECIPE: DetailRecipe = DetailRecipe {
    expand: &[],
    extract: extract_description,
};

pub struct StepStoneScraper {
    launcher: Arc<dyn BrowserLauncher>,
    settings: ScrapeSettings,
}

impl StepStoneScraper {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, settings: ScrapeSettings) -> Self {
        Self { launcher, settings }
    }

    /// Keywords become a path slug; page 1 carries no page parameter.
    pub fn search_url(query: &SearchQuery, page: usize) -> String {
        let slug = query.keywords.split_whitespace().collect::<Vec<_>>().join("-");
        let mut url = if slug.is_empty() {
            SEARCH_BASE.to_string()
        } else {
            format!("{SEARCH_BASE}/{slug}")
        };

        let mut params = form_urlencoded::Serializer::new(String::new());
        if !query.location.trim().is_empty() {
            params.append_pair("location", query.location.trim());
        }
        if page > 1 {
            params.append_pair("page", &page.to_string());
        }
        let params = params.finish();
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params);
        }
        url
    }

    async fn collect_cards(
        &self,
        session: &Session,
        query: &SearchQuery,
        max_results: usize,
    ) -> CardCollector {
        let mut collector = CardCollector::new(Source::StepStone, max_results);
        let mut guard = PageGuard::new(self.settings.page_cap);
        let mut page = 1;

        loop {
            dismiss_overlays(session).await;
            let html = match session.content().await {
                Ok(html) => html,
                Err(e) => {
                    warn!("StepStone: could not read page {page}: {e}");
                    break;
                }
            };
            let snapshot = parse_listing(&html);
            if !guard.admit(&snapshot.hash) {
                break;
            }
            if snapshot.cards.is_empty() {
                info!("StepStone: no job cards on page {page}, assuming end of results");
                break;
            }

            let found = snapshot.cards.len();
            let added = collector.absorb(snapshot.cards);
            info!(
                "StepStone: page {page} had {found} cards, {added} new ({}/{max_results})",
                collector.postings.len()
            );
            if collector.is_full() {
                break;
            }
            if added == 0 || found < FULL_PAGE {
                info!("StepStone: short or repeated page, assuming end of results");
                break;
            }
            if !snapshot.has_next {
                info!("StepStone: no next-page control on page {page}");
                break;
            }
            if guard.exhausted() {
                info!("StepStone: page cap reached after page {page}");
                break;
            }

            page += 1;
            let next = Self::search_url(query, page);
            if let Err(e) = with_retry("StepStone result page", self.settings.retry, || {
                session.goto(&next)
            })
            .await
            {
                warn!("StepStone: skipping remaining pages after {next}: {e}");
                break;
            }
            settle(&self.settings).await;
        }
        collector
    }
}

#[async_trait]
impl SourceScraper for StepStoneScraper {
    fn source(&self) -> Source {
        Source::StepStone
    }

    async fn search(
        &self,
        query: &SearchQuery,
        max_results: usize,
    ) -> Result<SearchOutcome, ScraperError> {
        let url = Self::search_url(query, 1);
        info!(source = "StepStone", %url, "Searching");

        let session =
            open_listing(&self.launcher, Source::StepStone, &url, &self.settings).await?;
        let collector = self.collect_cards(&session, query, max_results).await;
        info!(
            "StepStone: collected {} postings for '{}' in '{}'",
            collector.postings.len(),
            query.keywords,
            query.location
        );

        Ok(SearchOutcome::browsed(collector, session, RECIPE, self.settings.clone()))
    }
}

/// Best effort: accept cookies and close popups if any are showing.
async fn dismiss_overlays(session: &Session) {
    let targets = match session.content().await {
        Ok(html) => overlay_targets(&html),
        Err(_) => return,
    };
    for selector in targets {
        match session.click(&selector).await {
            Ok(true) => debug!("StepStone: dismissed overlay via {selector}"),
            Ok(false) => {}
            Err(e) => debug!("StepStone: overlay control {selector} failed: {e}"),
        }
    }
}

fn overlay_targets(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let cookie = COOKIE_ACCEPT
        .iter()
        .find(|css| dom::exists(&doc, css))
        .map(|css| css.to_string())
        .or_else(|| dom::find_by_text(&doc, "button", COOKIE_TEXT));

    cookie
        .into_iter()
        .chain(
            MODAL_CLOSE
                .iter()
                .filter(|css| dom::exists(&doc, css))
                .map(|css| css.to_string()),
        )
        .collect()
}

fn parse_listing(html: &str) -> ListingSnapshot {
    let doc = Html::parse_document(html);
    let cards = dom::select_all(&doc, CARD)
        .into_iter()
        .map(|card| {
            let link = dom::select_within(card, TITLE_LINK);
            RawCard {
                title: link.map(dom::text_of).filter(|t| !t.is_empty()),
                company: card_text(card, COMPANY),
                location: card_text(card, LOCATION),
                url: link
                    .and_then(|a| a.value().attr("href"))
                    .map(absolute_url),
            }
        })
        .collect();
    let has_next = NEXT_PAGE.iter().any(|css| {
        dom::select_first(&doc, css)
            .is_some_and(|el| el.value().attr("aria-disabled") != Some("true"))
    });
    ListingSnapshot {
        cards,
        hash: dom::content_hash(&doc),
        has_next,
    }
}

fn absolute_url(href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{SITE_ROOT}{href}")
    } else {
        format!("{SITE_ROOT}/{href}")
    }
}

/// First description container that holds real text, preferring the
/// rich-text sections when the ad uses them.
fn extract_description(doc: &Html) -> Option<String> {
    let container = DESCRIPTION
        .iter()
        .filter_map(|css| dom::select_first(doc, css))
        .find(|el| {
            let inner = el.inner_html();
            inner.contains("<p") || inner.contains("<li")
        })?;

    let sections: Vec<String> = dom::selector(RICH_TEXT)
        .map(|sel| {
            container
                .select(&sel)
                .map(dom::element_to_text)
                .filter(|text| !text.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let text = if sections.is_empty() {
        dom::element_to_text(container)
    } else {
        sections.join("\n")
    };
    Some(text).filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::browser::fake::{ClickEffect, FakeLauncher, FakeSite};

    fn card(id: usize) -> String {
        format!(
            r#"<article data-at="job-item">
                <a data-testid="job-item-title" href="/stellenangebote--werkstudent-{id}.html">Werkstudent Data Analyst (m/w/d) {id}</a>
                <span data-at="job-item-company-name">Firma {id}</span>
                <span data-at="job-item-location">Köln</span>
            </article>"#
        )
    }

    fn page(ids: std::ops::Range<usize>, next: bool) -> String {
        let cards: String = ids.map(card).collect();
        let nav = if next {
            r#"<a data-testid="pagination-next" href="?page=2">Weiter</a>"#
        } else {
            ""
        };
        format!("<html><body><main>{cards}</main>{nav}</body></html>")
    }

    fn query() -> SearchQuery {
        SearchQuery::new("Werkstudent Data Analyst", "Köln")
    }

    #[test]
    fn test_search_url_paging() {
        assert_eq!(
            StepStoneScraper::search_url(&query(), 1),
            "https://www.stepstone.de/jobs/Werkstudent-Data-Analyst?location=K%C3%B6ln"
        );
        assert_eq!(
            StepStoneScraper::search_url(&query(), 3),
            "https://www.stepstone.de/jobs/Werkstudent-Data-Analyst?location=K%C3%B6ln&page=3"
        );
    }

    #[test]
    fn test_relative_urls_become_absolute() {
        let snapshot = parse_listing(&page(0..1, false));
        assert_eq!(
            snapshot.cards[0].url.as_deref(),
            Some("https://www.stepstone.de/stellenangebote--werkstudent-0.html")
        );
        assert!(!snapshot.has_next);
    }

    #[test]
    fn test_overlay_targets_cookie_then_modals() {
        let html = r#"<button data-testid="uc-accept-all-button">OK</button>
                      <div role="dialog"><button class="close">x</button></div>"#;
        assert_eq!(
            overlay_targets(html),
            vec![
                "button[data-testid='uc-accept-all-button']".to_string(),
                "div[role='dialog'] button.close".to_string()
            ]
        );
        let text_only = r#"<button id="consent">Alle Akzeptieren</button>"#;
        assert_eq!(overlay_targets(text_only), vec!["#consent".to_string()]);
    }

    #[test]
    fn test_description_prefers_rich_text_sections() {
        let html = r#"<div data-at="job-ad-content">
            <p>Intro</p>
            <div data-genesis-element="CARD_CONTENT"><span data-genesis-element="TEXT"><p>Aufgaben</p><ul><li>SQL</li></ul></span></div>
            <div data-genesis-element="CARD_CONTENT"><span data-genesis-element="TEXT"><p>Profil</p></span></div>
            <script>track()</script>
        </div>"#;
        let doc = Html::parse_document(html);
        assert_eq!(
            extract_description(&doc).as_deref(),
            Some("Aufgaben\nSQL\nProfil")
        );
    }

    #[test]
    fn test_description_skips_containers_without_text_blocks() {
        let html = r#"<div data-at="job-ad-content"><script>x()</script></div>
                      <div class="job-description"><ul><li>Excel</li></ul><footer>Impressum</footer></div>"#;
        let doc = Html::parse_document(html);
        assert_eq!(extract_description(&doc).as_deref(), Some("Excel"));
    }

    #[tokio::test]
    async fn test_terminates_after_empty_second_page() {
        let first = StepStoneScraper::search_url(&query(), 1);
        let second = StepStoneScraper::search_url(&query(), 2);
        let site = FakeSite::new()
            .page(&first, &page(0..10, true))
            .page(&second, "<html><body><main>Keine Treffer</main></body></html>");
        let launcher = FakeLauncher::new(site);
        let scraper =
            StepStoneScraper::new(Arc::new(launcher.clone()), ScrapeSettings::immediate());

        let outcome = scraper.search(&query(), 50).await.unwrap();
        let listing_gotos: Vec<String> = launcher
            .log()
            .gotos()
            .into_iter()
            .filter(|url| url.starts_with(SEARCH_BASE))
            .collect();
        assert_eq!(listing_gotos, vec![first, second]);

        let postings: Vec<_> = outcome.into_postings().collect().await;
        assert_eq!(postings.len(), 10);
        assert_eq!(postings[3].company, "Firma 3");
        assert_eq!(launcher.log().released, 1);
    }

    #[tokio::test]
    async fn test_never_pages_past_the_cap() {
        let query = query();
        let mut site = FakeSite::new();
        for n in 1..=5 {
            let ids = (n - 1) * 10..n * 10;
            site = site.page(&StepStoneScraper::search_url(&query, n), &page(ids, true));
        }
        let launcher = FakeLauncher::new(site);
        let settings = ScrapeSettings {
            page_cap: 3,
            ..ScrapeSettings::immediate()
        };
        let scraper = StepStoneScraper::new(Arc::new(launcher.clone()), settings);

        let outcome = scraper.search(&query, 100).await.unwrap();
        drop(outcome);
        let listing_pages = launcher
            .log()
            .gotos()
            .iter()
            .filter(|url| url.starts_with(SEARCH_BASE))
            .count();
        assert_eq!(listing_pages, 3, "cap 3 but loaded {listing_pages} listing pages");
        assert_eq!(launcher.log().released, 1);
    }

    #[tokio::test]
    async fn test_cookie_banner_is_clicked() {
        let first = StepStoneScraper::search_url(&query(), 1);
        let banner = format!(
            r#"<html><body><button id="ccmgt_explicit_accept">Alle akzeptieren</button>{}</body></html>"#,
            card(0)
        );
        let site = FakeSite::new().page(&first, &banner).on_click(
            &first,
            "button#ccmgt_explicit_accept",
            ClickEffect::Replace(page(0..1, false)),
        );
        let launcher = FakeLauncher::new(site);
        let scraper =
            StepStoneScraper::new(Arc::new(launcher.clone()), ScrapeSettings::immediate());

        let outcome = scraper.search(&query(), 5).await.unwrap();
        let postings: Vec<_> = outcome.into_postings().collect().await;
        assert_eq!(postings.len(), 1);
        assert!(launcher
            .log()
            .actions
            .iter()
            .any(|a| matches!(a, crate::browser::fake::Action::Click(s) if s == "button#ccmgt_explicit_accept")));
    }
}
