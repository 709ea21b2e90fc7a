//! Travel guide scraping with a curated fallback.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use sidequest_shared::{GuidePage, Result, SidequestError, SourceExperience};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::curated::GUIDE_FALLBACK;
use crate::reddit::categorize;
use crate::{ExperienceSource, truncate_chars};

const SOURCE_NAME: &str = "travel_guide";
const TITLE_SELECTOR: &str = "h2, h3, .title, .name";
const DESCRIPTION_SELECTOR: &str = "p, .description, .excerpt";
const LINK_SELECTOR: &str = "a[href]";
const MIN_NAME_CHARS: usize = 6;
const MAX_NAME_CHARS: usize = 100;
const MAX_ITEMS_PER_PAGE: usize = 10;
const MAX_DESCRIPTION_CHARS: usize = 300;

/// Scrapes configured guide pages. When fewer than `min_items` listings are
/// scraped, the built-in guide listings are appended so the source always
/// yields something.
pub struct TravelGuideSource {
    client: Client,
    pages: Vec<GuidePage>,
    min_items: usize,
}

impl TravelGuideSource {
    pub fn new(client: Client, pages: Vec<GuidePage>, min_items: usize) -> Self {
        Self {
            client,
            pages,
            min_items,
        }
    }

    async fn fetch_page(&self, page: &GuidePage) -> Result<String> {
        let response = self
            .client
            .get(&page.url)
            .send()
            .await
            .map_err(|e| SidequestError::Network(format!("{}: {e}", page.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SidequestError::Network(format!("{}: HTTP {status}", page.url)));
        }

        response
            .text()
            .await
            .map_err(|e| SidequestError::Network(format!("{}: body read failed: {e}", page.url)))
    }
}

#[async_trait]
impl ExperienceSource for TravelGuideSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    #[instrument(skip_all, fields(city = %city, pages = self.pages.len()))]
    async fn fetch(&self, city: &str) -> Result<Vec<SourceExperience>> {
        let mut items = Vec::new();

        for page in &self.pages {
            let body = match self.fetch_page(page).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(guide = %page.name, error = %e, "guide fetch failed");
                    continue;
                }
            };
            match parse_guide_page(&body, page, city) {
                Ok(found) => {
                    debug!(guide = %page.name, count = found.len(), "guide scraped");
                    items.extend(found);
                }
                Err(e) => warn!(guide = %page.name, error = %e, "guide parse failed"),
            }
        }

        if items.len() < self.min_items {
            info!(
                scraped = items.len(),
                min = self.min_items,
                "topping up with curated guide listings"
            );
            items.extend(GUIDE_FALLBACK.iter().map(|l| l.to_experience(SOURCE_NAME)));
        }

        Ok(items)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| SidequestError::parse(format!("invalid selector '{css}': {e:?}")))
}

/// Extract listings from one guide page using the page's item selector.
pub fn parse_guide_page(html: &str, page: &GuidePage, city: &str) -> Result<Vec<SourceExperience>> {
    let item_sel = selector(&page.selector)?;
    let title_sel = selector(TITLE_SELECTOR)?;
    let desc_sel = selector(DESCRIPTION_SELECTOR)?;
    let link_sel = selector(LINK_SELECTOR)?;
    let base = Url::parse(&page.url).ok();
    let guide_source = page.name.to_lowercase().replace(' ', "_");

    let doc = Html::parse_document(html);
    let mut items = Vec::new();

    for element in doc.select(&item_sel) {
        if items.len() == MAX_ITEMS_PER_PAGE {
            break;
        }
        let Some(name) = first_text(&element, &title_sel) else {
            continue;
        };
        if name.chars().count() < MIN_NAME_CHARS {
            continue;
        }
        let description = first_text(&element, &desc_sel).unwrap_or_default();
        let category = categorize(&format!("{name} {description}"));

        let mut exp = SourceExperience::new(
            truncate_chars(&name, MAX_NAME_CHARS),
            guide_source.as_str(),
            category,
            city,
        );
        exp.description = truncate_chars(&description, MAX_DESCRIPTION_CHARS);
        exp.source_url = element
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| match &base {
                Some(base) => base.join(href).ok(),
                None => Url::parse(href).ok(),
            })
            .map(String::from);
        items.push(exp);
    }

    Ok(items)
}

fn first_text(element: &ElementRef<'_>, sel: &Selector) -> Option<String> {
    element
        .select(sel)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
}
