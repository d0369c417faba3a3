//! Trend extraction from the trending surface

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use trendwatch_browser::{BrowserError, BrowserResult, ElementRef, Page};
use trendwatch_config::SiteSettings;

use crate::parse_score;
use crate::session::capture;

/// One item as read from the page
#[derive(Debug, Clone, PartialEq)]
pub struct RawTrend {
    /// Trimmed title
    pub title: String,
    /// Popularity text, empty when the item shows none
    pub raw_score_text: String,
}

impl RawTrend {
    pub fn hot_score(&self) -> f64 {
        parse_score(&self.raw_score_text)
    }
}

/// An item that was left out of the batch
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedItem {
    /// Position among the trend containers
    pub index: usize,
    pub reason: String,
}

/// Everything one extraction pass produced
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub trends: Vec<RawTrend>,
    pub skipped: Vec<SkippedItem>,
}

/// Why the trending surface could not be read at all
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Could not open trending page: {0}")]
    Navigation(#[source] BrowserError),

    #[error("Trend timeline never appeared: {0}")]
    TimelineMissing(#[source] BrowserError),

    #[error("Timeline contains no trend items: {0}")]
    NoItems(#[source] BrowserError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),
}

/// Extraction error plus the diagnostic screenshot taken for it
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ExtractionFailure {
    #[source]
    pub error: ExtractionError,
    pub screenshot: Option<PathBuf>,
}

/// DOM access needed by the extractor.
///
/// Selector knowledge lives behind this trait so the fold over items can be
/// tested without a browser.
#[async_trait]
pub trait TrendDom: Send + Sync {
    type Item: Send + Sync;

    /// Navigate as needed and return the trend containers in page order
    async fn find_trend_containers(&self) -> Result<Vec<Self::Item>, ExtractionError>;

    async fn read_title(&self, item: &Self::Item) -> BrowserResult<Option<String>>;

    /// Popularity text of an item, never the `title` node itself
    async fn read_popularity_text(&self, item: &Self::Item, title: &str) -> BrowserResult<Option<String>>;
}

/// Fold the containers into a batch, skipping unreadable items
pub async fn extract<D: TrendDom>(dom: &D) -> Result<Extraction, ExtractionError> {
    let items = dom.find_trend_containers().await?;
    let mut extraction = Extraction::default();

    for (index, item) in items.iter().enumerate() {
        let title = match dom.read_title(item).await {
            Ok(Some(title)) if !title.trim().is_empty() => title.trim().to_string(),
            Ok(_) => {
                debug!(index, "Trend item has no title, skipping");
                extraction.skipped.push(SkippedItem {
                    index,
                    reason: "empty title".into(),
                });
                continue;
            }
            Err(e) => {
                warn!(index, error = %e, "Could not read trend title, skipping");
                extraction.skipped.push(SkippedItem {
                    index,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let raw_score_text = match dom.read_popularity_text(item, &title).await {
            Ok(text) => text.map(|t| t.trim().to_string()).unwrap_or_default(),
            Err(e) => {
                debug!(index, title = %title, error = %e, "No popularity text");
                String::new()
            }
        };

        extraction.trends.push(RawTrend { title, raw_score_text });
    }

    info!(
        extracted = extraction.trends.len(),
        skipped = extraction.skipped.len(),
        "Trend extraction finished"
    );
    Ok(extraction)
}

/// Pick the popularity fragment of an item.
///
/// Candidates are fragments mentioning one of the unit keywords (compared
/// case-insensitively) whose text is not the item title. The first candidate
/// that leads with a count wins; otherwise the first candidate.
pub fn first_popularity_fragment<'a>(
    fragments: impl IntoIterator<Item = &'a str>,
    title: &str,
    keywords: &[String],
) -> Option<&'a str> {
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    let title = title.trim();
    let candidates: Vec<&str> = fragments
        .into_iter()
        .filter(|fragment| fragment.trim() != title)
        .filter(|fragment| {
            let lower = fragment.to_lowercase();
            keywords.iter().any(|k| lower.contains(k.as_str()))
        })
        .collect();

    candidates
        .iter()
        .copied()
        .find(|fragment| parse_score(fragment) > 0.0)
        .or_else(|| candidates.first().copied())
}

/// [`TrendDom`] over a live page using the configured selectors
pub struct PageTrendDom<'a> {
    page: &'a dyn Page,
    site: &'a SiteSettings,
}

impl<'a> PageTrendDom<'a> {
    pub fn new(page: &'a dyn Page, site: &'a SiteSettings) -> Self {
        Self { page, site }
    }
}

#[async_trait]
impl TrendDom for PageTrendDom<'_> {
    type Item = ElementRef;

    async fn find_trend_containers(&self) -> Result<Vec<ElementRef>, ExtractionError> {
        let selectors = &self.site.selectors;
        let timeouts = &self.site.timeouts;

        self.page
            .goto(&self.site.trends_url, timeouts.navigation)
            .await
            .map_err(ExtractionError::Navigation)?;

        let timeline = self
            .page
            .wait_for_selector(&selectors.timeline, timeouts.element)
            .await
            .map_err(ExtractionError::TimelineMissing)?;

        self.page
            .wait_for_child(&timeline, &selectors.trend_item, timeouts.element)
            .await
            .map_err(ExtractionError::NoItems)?;

        Ok(self.page.query_within(&timeline, &selectors.trend_item).await?)
    }

    async fn read_title(&self, item: &ElementRef) -> BrowserResult<Option<String>> {
        match self
            .page
            .query_within(item, &self.site.selectors.trend_title)
            .await?
            .first()
        {
            Some(title) => self.page.text_content(title).await,
            None => Ok(None),
        }
    }

    async fn read_popularity_text(&self, item: &ElementRef, title: &str) -> BrowserResult<Option<String>> {
        let mut texts = Vec::new();
        for fragment in self
            .page
            .query_within(item, &self.site.selectors.trend_fragment)
            .await?
        {
            if let Some(text) = self.page.text_content(&fragment).await? {
                texts.push(text);
            }
        }

        Ok(
            first_popularity_fragment(texts.iter().map(String::as_str), title, &self.site.popularity_keywords)
                .map(str::to_string),
        )
    }
}

/// Read the trending surface of an authenticated page. On failure a
/// screenshot is saved to `screenshot_dir`.
pub async fn extract_trends(
    page: &dyn Page,
    site: &SiteSettings,
    screenshot_dir: &Path,
) -> Result<Extraction, ExtractionFailure> {
    let dom = PageTrendDom::new(page, site);
    match extract(&dom).await {
        Ok(extraction) => Ok(extraction),
        Err(error) => {
            warn!(site = %site.id, error = %error, "Trend extraction failed");
            let label = format!("extraction_failure_{}", site.id);
            let screenshot = capture(page, screenshot_dir, &label).await;
            Err(ExtractionFailure { error, screenshot })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fast_site;
    use trendwatch_browser::{Browser, MockBrowser, MockElement, MockRoute};

    /// In-memory DOM: each item is (title, fragments), `Err` simulates a detached node
    struct FakeDom {
        items: Vec<Result<(Option<&'static str>, Vec<&'static str>), &'static str>>,
        keywords: Vec<String>,
    }

    #[async_trait]
    impl TrendDom for FakeDom {
        type Item = usize;

        async fn find_trend_containers(&self) -> Result<Vec<usize>, ExtractionError> {
            Ok((0..self.items.len()).collect())
        }

        async fn read_title(&self, item: &usize) -> BrowserResult<Option<String>> {
            match &self.items[*item] {
                Ok((title, _)) => Ok(title.map(str::to_string)),
                Err(e) => Err(BrowserError::NoSuchElement(e.to_string())),
            }
        }

        async fn read_popularity_text(&self, item: &usize, title: &str) -> BrowserResult<Option<String>> {
            match &self.items[*item] {
                Ok((_, fragments)) => Ok(
                    first_popularity_fragment(fragments.iter().copied(), title, &self.keywords).map(str::to_string),
                ),
                Err(e) => Err(BrowserError::NoSuchElement(e.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_bad_items_are_skipped() {
        let dom = FakeDom {
            items: vec![
                Ok((Some("  #RustLang "), vec!["Technology · Trending", "#RustLang", "12.5K posts"])),
                Ok((Some("   "), vec!["3K posts"])),
                Err("stale element"),
                Ok((None, vec![])),
                Ok((Some("Quiet topic"), vec!["Trending in Tech"])),
            ],
            keywords: vec!["posts".into()],
        };

        let extraction = extract(&dom).await.unwrap();
        assert_eq!(
            extraction.trends,
            vec![
                RawTrend {
                    title: "#RustLang".into(),
                    raw_score_text: "12.5K posts".into(),
                },
                RawTrend {
                    title: "Quiet topic".into(),
                    raw_score_text: String::new(),
                },
            ]
        );
        assert_eq!(extraction.trends[0].hot_score(), 12500.0);
        assert_eq!(extraction.trends[1].hot_score(), 0.0);
        let skipped: Vec<_> = extraction.skipped.iter().map(|s| s.index).collect();
        assert_eq!(skipped, vec![1, 2, 3]);
    }

    #[test]
    fn test_keyword_match_ignores_case() {
        let keywords = vec!["posts".to_string(), "tweets".to_string()];
        assert_eq!(
            first_popularity_fragment(["Sports", "1,234 Tweets", "5K posts"], "Sports", &keywords),
            Some("1,234 Tweets")
        );
        assert_eq!(first_popularity_fragment(["Sports"], "Sports", &keywords), None);
    }

    #[test]
    fn test_title_is_never_popularity_text() {
        let keywords = vec!["posts".to_string()];
        assert_eq!(
            first_popularity_fragment(["Trending in Tech", "Blog posts", "12K posts"], "Blog posts", &keywords),
            Some("12K posts")
        );
        assert_eq!(
            first_popularity_fragment(["#posts", "Trending"], " #posts ", &keywords),
            None
        );
        // Keyword in a category label ahead of the count
        assert_eq!(
            first_popularity_fragment(["Most posts today", "Ferris", "800 posts"], "Ferris", &keywords),
            Some("800 posts")
        );
        assert_eq!(
            first_popularity_fragment(["Few posts yet"], "Ferris", &keywords),
            Some("Few posts yet")
        );
    }

    #[tokio::test]
    async fn test_keyword_in_title_keeps_score() {
        let dom = FakeDom {
            items: vec![Ok((Some("Blog posts"), vec!["Trending in Tech", "Blog posts", "12K posts"]))],
            keywords: vec!["posts".into()],
        };

        let extraction = extract(&dom).await.unwrap();
        assert_eq!(extraction.trends[0].raw_score_text, "12K posts");
        assert_eq!(extraction.trends[0].hot_score(), 12000.0);
    }

    fn trending_browser(items: Vec<MockElement>) -> MockBrowser {
        let site = fast_site();
        let mut timeline = MockElement::new(&site.selectors.timeline);
        for item in items {
            timeline = timeline.child(item);
        }
        MockBrowser::new().with_route(&site.trends_url, MockRoute::new().element(timeline))
    }

    fn trend_item(title: &str, posts: &str) -> MockElement {
        let s = fast_site().selectors;
        MockElement::new(&s.trend_item)
            .child(MockElement::new(&s.trend_fragment).text("Trending in Tech"))
            .child(MockElement::new(&s.trend_title).text(title))
            .child(MockElement::new(&s.trend_fragment).text(posts))
    }

    #[tokio::test]
    async fn test_reads_live_page() {
        let site = fast_site();
        let browser = trending_browser(vec![
            trend_item("Rust 2024", "45K posts"),
            trend_item("Ferris", "1,234 posts"),
        ]);
        let ctx = browser.new_context(None).await.unwrap();
        let page = ctx.new_page().await.unwrap();

        let extraction = extract_trends(page.as_ref(), &site, Path::new("/tmp")).await.unwrap();
        let scores: Vec<_> = extraction.trends.iter().map(|t| (t.title.as_str(), t.hot_score())).collect();
        assert_eq!(scores, vec![("Rust 2024", 45000.0), ("Ferris", 1234.0)]);
    }

    #[tokio::test]
    async fn test_live_title_fragment_is_skipped() {
        let site = fast_site();
        let s = &site.selectors;
        // The fragment selector also matches the title node on the real page
        let item = MockElement::new(&s.trend_item)
            .child(MockElement::new(&s.trend_title).text("Blog posts"))
            .child(MockElement::new(&s.trend_fragment).text("Blog posts"))
            .child(MockElement::new(&s.trend_fragment).text("3,400 posts"));
        let browser = trending_browser(vec![item]);
        let ctx = browser.new_context(None).await.unwrap();
        let page = ctx.new_page().await.unwrap();

        let extraction = extract_trends(page.as_ref(), &site, Path::new("/tmp")).await.unwrap();
        assert_eq!(extraction.trends[0].title, "Blog posts");
        assert_eq!(extraction.trends[0].hot_score(), 3400.0);
    }

    #[tokio::test]
    async fn test_missing_timeline_takes_screenshot() {
        let site = fast_site();
        let browser = MockBrowser::new();
        let ctx = browser.new_context(None).await.unwrap();
        let page = ctx.new_page().await.unwrap();

        let failure = extract_trends(page.as_ref(), &site, Path::new("/tmp/shots"))
            .await
            .unwrap_err();
        assert!(matches!(failure.error, ExtractionError::TimelineMissing(_)));
        assert!(failure.screenshot.is_some());
        assert_eq!(browser.screenshots().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_timeline_fails() {
        let site = fast_site();
        let browser = trending_browser(vec![]);
        let ctx = browser.new_context(None).await.unwrap();
        let page = ctx.new_page().await.unwrap();

        let failure = extract_trends(page.as_ref(), &site, Path::new("/tmp")).await.unwrap_err();
        assert!(matches!(failure.error, ExtractionError::NoItems(_)));
    }
}
