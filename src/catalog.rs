use crate::error::{PipelineError, PipelineResult};
use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;
use tracing::info;

/// One downloadable proteome from the ParaSite FTP index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub url: String,
    /// BioProject id, the directory just above the file.
    pub group: String,
    /// Species name, two directories above the file.
    pub label: String,
}

impl CatalogEntry {
    pub fn from_url(url: &str) -> Self {
        let segments: Vec<&str> = url.trim_end_matches('/').rsplit('/').collect();
        let group = segments.get(1).copied().unwrap_or_default().to_string();
        let label = segments
            .get(2)
            .map(|raw| species_label(raw))
            .unwrap_or_default();
        Self {
            url: url.to_string(),
            group,
            label,
        }
    }
}

fn species_label(raw: &str) -> String {
    let spaced = raw.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn anchor_href() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("anchor pattern is valid")
    })
}

/// Every `<a href>` target ending in `suffix`, in document order.
pub fn extract_links(html: &str, suffix: &str) -> Vec<String> {
    anchor_href()
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().trim())
        .filter(|href| href.ends_with(suffix))
        .map(str::to_string)
        .collect()
}

pub async fn fetch_catalog(client: &Client, url: &str, suffix: &str) -> PipelineResult<Vec<CatalogEntry>> {
    info!("🌐 Fetching catalog page: {}", url);
    let fail = |reason: String| PipelineError::CatalogFetch {
        url: url.to_string(),
        reason,
    };

    let response = client.get(url).send().await.map_err(|e| fail(e.to_string()))?;
    if !response.status().is_success() {
        return Err(fail(format!("status code {}", response.status())));
    }
    let html = response.text().await.map_err(|e| fail(e.to_string()))?;

    let entries: Vec<CatalogEntry> = extract_links(&html, suffix)
        .iter()
        .map(|link| CatalogEntry::from_url(link))
        .collect();
    info!("✅ Found {} '{}' entries in catalog", entries.len(), suffix);
    Ok(entries)
}
