//! Fixtures shared by the integration tests: an in-memory fetcher serving HTML by URL
//! and a scripted fallback extractor.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use directory_crawler::domain::ports::{FallbackAnswer, FallbackExtractor};
use directory_crawler::domain::schema::FieldType;
use directory_crawler::error::FallbackError;
use directory_crawler::infrastructure::url_normalizer;
use directory_crawler::{FetchError, Page, PageFetcher, RenderHint};
use url::Url;

/// Serves fixed markup per normalized URL; anything else is a 404
#[derive(Default)]
pub struct FixtureFetcher {
    pages: HashMap<String, String>,
    rendered: HashMap<String, String>,
    calls: Mutex<Vec<(String, RenderHint)>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page body; it gets wrapped in `<html><body>`
    #[must_use]
    pub fn page(mut self, url: &str, body: impl AsRef<str>) -> Self {
        self.pages.insert(key(url), wrap(body.as_ref()));
        self
    }

    /// Markup served only to rendered fetches
    #[must_use]
    pub fn rendered_page(mut self, url: &str, body: impl AsRef<str>) -> Self {
        self.rendered.insert(key(url), wrap(body.as_ref()));
        self
    }

    pub fn calls(&self) -> Vec<(String, RenderHint)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetched(&self, url: &str) -> usize {
        let url = key(url);
        self.calls().iter().filter(|(called, _)| *called == url).count()
    }
}

fn key(url: &str) -> String {
    url_normalizer::normalize_str(url).unwrap()
}

fn wrap(body: &str) -> String {
    format!("<html><head><title>Directory</title></head><body>{body}</body></html>")
}

#[async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch(&self, url: &Url, hint: RenderHint) -> Result<Page, FetchError> {
        let normalized = url_normalizer::normalize(url).to_string();
        self.calls.lock().unwrap().push((normalized.clone(), hint));

        let markup = if hint.is_rendered() {
            self.rendered.get(&normalized).or_else(|| self.pages.get(&normalized))
        } else {
            self.pages.get(&normalized)
        };
        match markup {
            Some(markup) => Ok(Page::from_url(url.clone(), markup.clone(), hint.is_rendered())),
            None => Err(FetchError::Http {
                status: 404,
                url: normalized,
            }),
        }
    }
}

/// Answers every call with the scripted value for the field and counts calls
#[derive(Default)]
pub struct ScriptedFallback {
    answers: HashMap<String, String>,
    calls: AtomicU32,
}

impl ScriptedFallback {
    #[must_use]
    pub fn answer(mut self, field: &str, value: &str) -> Self {
        self.answers.insert(field.to_string(), value.to_string());
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FallbackExtractor for ScriptedFallback {
    async fn extract_field(
        &self,
        _page_text: &str,
        field_name: &str,
        _field_type: FieldType,
    ) -> Result<FallbackAnswer, FallbackError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FallbackAnswer {
            value: self.answers.get(field_name).cloned(),
            confidence: 0.9,
        })
    }
}

/// One listing page of `count` people, `/people/{page}-{i}`, plus a numbered pager
pub fn numbered_listing(page: u32, count: u32, pages: u32) -> String {
    let items: String = (1..=count)
        .map(|i| format!(r#"<li class="person"><a href="/people/{page}-{i}">Person {page}-{i}</a></li>"#))
        .collect();
    let pager: String = (1..=pages).map(|n| format!(r#"<a href="/p/{n}">{n}</a> "#)).collect();
    format!(r#"<h1>People</h1><ul class="directory">{items}</ul><div class="pager">{pager}</div>"#)
}

pub fn profile(name: &str, email: &str) -> String {
    format!(r#"<h1>{name}</h1><div class="contact"><p>Email: {email}</p></div>"#)
}
