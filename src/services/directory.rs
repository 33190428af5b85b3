//! Startup directory client.
//!
//! Fetches listing pages, detail pages and the category set from the
//! directory site, and extracts records with CSS selectors. Extraction
//! never fails a crawl; missing fields default to empty/zero.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::harvest::ListingSource;
use crate::models::{merge_categories, Category, CategoryMap, CrawlerConfig, DetailFields, Startup};
use crate::utils::{parse_digits, resolve_url};

/// Client for the startup directory site.
pub struct DirectoryClient {
    client: reqwest::Client,
    config: CrawlerConfig,
}

impl DirectoryClient {
    /// Create a new directory client over the shared HTTP client.
    pub fn new(client: reqwest::Client, config: CrawlerConfig) -> Self {
        Self { client, config }
    }

    /// Fetch one listing page and extract its startup cards.
    pub async fn fetch_listing_page(
        &self,
        page: usize,
        category: Option<&str>,
    ) -> Result<Vec<Startup>> {
        let collection = self.config.collection_url();
        let url = match category {
            Some(slug) => format!("{collection}/{slug}?page={page}"),
            None => format!("{collection}?page={page}"),
        };
        let html = self.fetch_html(&url).await?;
        Ok(extract_listing(&html, &self.config.base_url))
    }

    /// Fetch a startup detail page and extract enrichment fields.
    pub async fn fetch_detail(&self, detail_url: &str) -> Result<DetailFields> {
        let html = self.fetch_html(detail_url).await?;
        Ok(extract_detail(&html))
    }

    /// Discover the available categories.
    ///
    /// Combines the sidebar collection listing (authoritative counts)
    /// with tag links scraped from the first few listing pages. Any
    /// fetch failure is swallowed; partial results are valid.
    pub async fn fetch_categories(&self) -> CategoryMap {
        let sidebar = match self.sidebar_categories().await {
            Ok(categories) => categories,
            Err(error) => {
                debug!("sidebar category fetch failed: {}", error);
                CategoryMap::new()
            }
        };
        let tags = self.tag_categories().await;
        merge_categories(sidebar, tags)
    }

    async fn sidebar_categories(&self) -> Result<CategoryMap> {
        let url = format!(
            "{}/{}",
            self.config.collection_url(),
            self.config.sidebar_probe_slug
        );
        let html = self.fetch_html(&url).await?;
        extract_sidebar(&html)
    }

    async fn tag_categories(&self) -> CategoryMap {
        let mut categories = CategoryMap::new();
        let collection = self.config.collection_url();

        for page in 0..self.config.category_scan_pages {
            let url = format!("{collection}?page={page}");
            let html = match self.fetch_html(&url).await {
                Ok(html) => html,
                Err(error) => {
                    debug!("category tag scan stopped at page {}: {}", page, error);
                    break;
                }
            };

            for (slug, name) in extract_tag_links(&html) {
                categories
                    .entry(slug)
                    .or_insert(Category { name, count: None });
            }

            if self.config.category_scan_delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(
                    self.config.category_scan_delay_ms,
                ))
                .await;
            }
        }

        categories
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl ListingSource for DirectoryClient {
    async fn listing_page(&self, page: usize, category: Option<&str>) -> Result<Vec<Startup>> {
        self.fetch_listing_page(page, category).await
    }

    async fn detail(&self, detail_url: &str) -> Result<DetailFields> {
        self.fetch_detail(detail_url).await
    }

    async fn categories(&self) -> CategoryMap {
        self.fetch_categories().await
    }
}

/// Extract all startup cards from a listing page.
fn extract_listing(html: &str, base_url: &str) -> Vec<Startup> {
    let document = Html::parse_document(html);
    let card_selector = match parse_selector(".lpt-card") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    document
        .select(&card_selector)
        .map(|card| extract_card(&card, base_url))
        .collect()
}

/// Extract one startup from a listing card element.
fn extract_card(card: &ElementRef, base_url: &str) -> Startup {
    let mut startup = Startup::default();

    if let Some(title) = select_first(card, "h3") {
        startup.name = element_text(&title);
    }

    if let Some(hitbox) = select_first(card, "a.startup-entry-hitbox") {
        if let Some(href) = hitbox.value().attr("href") {
            let href = href.trim();
            if !href.is_empty() {
                startup.detail_url = resolve_url(base_url, href);
            }
        }
    }

    if let Some(summary) = select_first(card, ".s-u-summary") {
        startup.description = element_text(&summary);
    }

    // Visible tag plus the dropdown with the remaining tags
    let mut tags: Vec<String> = Vec::new();
    for selector in [".lpt-dropdown-category a", ".lpt-dropdown-all-categories a"] {
        if let Ok(tag_selector) = parse_selector(selector) {
            for tag in card.select(&tag_selector) {
                let text = element_text(&tag);
                if !text.is_empty() {
                    tags.push(text);
                }
            }
        }
    }
    startup.categories = tags.join(", ");

    if let Some(votes) = select_first(card, ".alternate-votes-display") {
        startup.votes = parse_digits(&element_text(&votes)).unwrap_or(0);
    }

    // External site links on the card carry utm tracking
    if let Some(site) = select_first(card, "a[href*='utm_source']") {
        startup.website = site.value().attr("href").unwrap_or("").to_string();
    }

    startup
}

/// Extract enrichment fields from a detail page.
fn extract_detail(html: &str) -> DetailFields {
    let document = Html::parse_document(html);
    let mut details = DetailFields::default();

    // The founder block wraps name and title in one link
    if let Ok(selector) = parse_selector(".founder a") {
        if let Some(founder) = document.select(&selector).next() {
            if let Some(name) = founder
                .text()
                .map(str::trim)
                .find(|fragment| !fragment.is_empty())
            {
                details.founder = name.to_string();
            }
        }
    }

    // Social links, excluding share buttons outside .startup-social
    if let Ok(selector) = parse_selector(".startup-social a[href]") {
        for link in document.select(&selector) {
            let href = link.value().attr("href").unwrap_or("");
            if (href.contains("twitter.com") || href.contains("x.com"))
                && details.twitter.is_empty()
            {
                details.twitter = href.to_string();
            } else if href.contains("linkedin.com") && details.linkedin.is_empty() {
                details.linkedin = href.to_string();
            }
        }
    }

    if let Ok(selector) = parse_selector(".th-location") {
        if let Some(location) = document.select(&selector).next() {
            details.location = element_text(&location);
        }
    }

    if let Ok(selector) = parse_selector("a[href*='utm_source=LesPepitesTech']") {
        if let Some(site) = document.select(&selector).next() {
            details.website = site.value().attr("href").unwrap_or("").to_string();
        }
    }

    details
}

/// Extract the sidebar collection listing with its counts.
fn extract_sidebar(html: &str) -> Result<CategoryMap> {
    let document = Html::parse_document(html);
    let wrapper_selector = parse_selector(".view-collections-side .view-content__wrapper")?;
    let name_selector = parse_selector(".views-field-name a")?;
    let count_selector = parse_selector(".views-field-title .field-content")?;

    let mut categories = CategoryMap::new();
    let Some(wrapper) = document.select(&wrapper_selector).next() else {
        return Ok(categories);
    };

    for child in wrapper.children().filter_map(ElementRef::wrap) {
        if child.value().name() != "div" {
            continue;
        }
        let Some(name_el) = child.select(&name_selector).next() else {
            continue;
        };
        let name = element_text(&name_el);
        let href = name_el.value().attr("href").unwrap_or("");
        let Some(slug) = slug_from_href(href) else {
            continue;
        };

        let count = child
            .select(&count_selector)
            .next()
            .and_then(|el| parse_digits(&element_text(&el)));

        categories.insert(slug, Category { name, count });
    }

    Ok(categories)
}

/// Extract `(slug, name)` pairs from the tag dropdowns of a listing
/// page.
fn extract_tag_links(html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let Ok(selector) = parse_selector(".lpt-dropdown-category a, .lpt-dropdown-all-categories a")
    else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|link| {
            let name = element_text(&link);
            let href = link.value().attr("href").unwrap_or("");
            if name.is_empty() {
                return None;
            }
            slug_from_href(href).map(|slug| (slug, name))
        })
        .collect()
}

fn slug_from_href(href: &str) -> Option<String> {
    let (_, slug) = href.split_once("/startup-collection/")?;
    if slug.is_empty() {
        return None;
    }
    Some(slug.to_string())
}

fn select_first<'a>(card: &ElementRef<'a>, selector: &str) -> Option<ElementRef<'a>> {
    let selector = parse_selector(selector).ok()?;
    card.select(&selector).next()
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
