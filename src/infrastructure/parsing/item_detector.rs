//! Candidate item detection on listing pages
//!
//! With a `list_item_selector` hint, items are enumerated by that selector. Without one,
//! repeated sibling structures are scored: elements are grouped by signature
//! (tag + class set + depth), only members holding a same-site detail link count, and the
//! largest group with at least `min_group_size` members wins. Ties go to the group whose
//! signature appears first in the markup. Groups inside navigation/header/footer regions
//! are only used when nothing else qualifies.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::config::ParsingConfig;
use super::dom;
use crate::domain::hints::SiteHints;
use crate::domain::page::Page;
use crate::infrastructure::url_normalizer;

static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));

/// One directory entry found on a listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateItem {
    /// Normalized absolute detail-page URL
    pub detail_url: Url,
    pub anchor_text: String,
    /// Structural locator of the item element
    pub dom_path: String,
}

/// Finds directory entries and their detail links
#[derive(Debug, Clone, Default)]
pub struct ItemDetector {
    config: ParsingConfig,
}

struct Group<'a> {
    first_seen: usize,
    members: Vec<(ElementRef<'a>, ElementRef<'a>, Url)>,
    boilerplate: bool,
}

impl ItemDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_config(config: ParsingConfig) -> Self {
        Self { config }
    }

    /// Candidate items in markup order, detail URLs unique within the page
    pub fn detect(&self, page: &Page, hints: Option<&SiteHints>) -> Vec<CandidateItem> {
        let document = page.document();
        self.detect_in(&document, page.url(), hints)
    }

    pub fn detect_in(&self, document: &Html, base: &Url, hints: Option<&SiteHints>) -> Vec<CandidateItem> {
        if let Some(list_selector) = hints.and_then(|h| h.list_item_selector.as_ref()) {
            let detail_selector = hints.and_then(|h| h.detail_link_selector.as_ref());
            let items = Self::detect_hinted(document, base, list_selector, detail_selector);
            debug!("Hinted list selector yielded {} items on {}", items.len(), base);
            return items;
        }

        let items = self.detect_heuristic(document, base);
        debug!("Heuristic detection yielded {} items on {}", items.len(), base);
        items
    }

    fn detect_hinted(
        document: &Html,
        base: &Url,
        list_selector: &Selector,
        detail_selector: Option<&Selector>,
    ) -> Vec<CandidateItem> {
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for element in document.select(list_selector) {
            let anchors: Vec<ElementRef<'_>> = match detail_selector {
                Some(selector) => element.select(selector).collect(),
                None if element.value().name() == "a" => vec![element],
                None => element.select(&LINK).collect(),
            };

            let found = anchors.into_iter().find_map(|anchor| {
                let href = anchor.value().attr("href")?;
                let url = url_normalizer::resolve_href(base, href)?;
                Some((anchor, url_normalizer::normalize(&url)))
            });

            // Entries without a link are not directory items
            let Some((anchor, detail_url)) = found else {
                continue;
            };
            if seen.insert(detail_url.to_string()) {
                items.push(CandidateItem {
                    detail_url,
                    anchor_text: dom::visible_element_text(anchor),
                    dom_path: dom::dom_path(element),
                });
            }
        }
        items
    }

    fn detect_heuristic(&self, document: &Html, base: &Url) -> Vec<CandidateItem> {
        let page_url = url_normalizer::normalize(base);
        let mut groups: HashMap<(String, usize, bool), Group<'_>> = HashMap::new();

        let elements = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| !matches!(el.value().name(), "html" | "head" | "body") && !dom::is_skipped_tag(el.value().name()));

        for (index, element) in elements.enumerate() {
            let boilerplate = self.in_boilerplate(element);
            let key = (dom::tag_with_classes(element), dom::depth(element), boilerplate);
            let group = groups.entry(key).or_insert_with(|| Group {
                first_seen: index,
                members: Vec::new(),
                boilerplate,
            });

            if let Some((anchor, url)) = self.first_detail_link(element, base, &page_url) {
                group.members.push((element, anchor, url));
            }
        }

        let min = self.config.min_group_size.max(1);
        let pick = |boilerplate: bool| {
            groups
                .values()
                .filter(|group| group.boilerplate == boilerplate && group.members.len() >= min)
                .max_by(|a, b| {
                    a.members
                        .len()
                        .cmp(&b.members.len())
                        .then_with(|| b.first_seen.cmp(&a.first_seen))
                })
        };

        let Some(best) = pick(false).or_else(|| pick(true)) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        best.members
            .iter()
            .filter(|(_, _, url)| seen.insert(url.to_string()))
            .map(|(element, anchor, url)| CandidateItem {
                detail_url: url.clone(),
                anchor_text: dom::visible_element_text(*anchor),
                dom_path: dom::dom_path(*element),
            })
            .collect()
    }

    /// First same-site http(s) link in (or being) `element`, skipping pagination controls
    fn first_detail_link<'a>(
        &self,
        element: ElementRef<'a>,
        base: &Url,
        page_url: &Url,
    ) -> Option<(ElementRef<'a>, Url)> {
        let own = (element.value().name() == "a").then_some(element);
        own.into_iter()
            .chain(element.select(&LINK))
            .find_map(|anchor| {
                let href = anchor.value().attr("href")?;
                let url = url_normalizer::normalize(&url_normalizer::resolve_href(base, href)?);
                if url == *page_url || !url_normalizer::same_site(&url, base) {
                    return None;
                }
                if self.is_pagination_text(&dom::visible_element_text(anchor)) {
                    return None;
                }
                Some((anchor, url))
            })
    }

    fn is_pagination_text(&self, text: &str) -> bool {
        let lowered = text.trim().to_lowercase();
        (!lowered.is_empty() && lowered.chars().all(|c| c.is_ascii_digit()))
            || self.config.pagination.next_texts.iter().any(|cue| *cue == lowered)
            || lowered == "previous"
            || lowered == "prev"
    }

    fn in_boilerplate(&self, element: ElementRef<'_>) -> bool {
        let regions: Vec<&str> = self.config.boilerplate_regions.iter().map(String::as_str).collect();
        regions.contains(&element.value().name()) || dom::has_ancestor_tag(element, &regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(items: usize, with_nav: bool) -> String {
        let mut html = String::from("<html><body>");
        if with_nav {
            html.push_str(
                r#"<nav><ul><li class="nav"><a href="/">Home</a></li><li class="nav"><a href="/about">About</a></li>
                <li class="nav"><a href="/contact">Contact</a></li><li class="nav"><a href="/news">News</a></li>
                <li class="nav"><a href="/jobs">Jobs</a></li><li class="nav"><a href="/faq">FAQ</a></li></ul></nav>"#,
            );
        }
        html.push_str(r#"<div class="directory"><ul>"#);
        for i in 0..items {
            html.push_str(&format!(
                r#"<li class="person"><a href="/people/{i}?sessionid=z">Person {i}</a><a href="mailto:p{i}@example.org">mail</a></li>"#
            ));
        }
        html.push_str(r#"</ul></div><ul class="pagination"><li><a href="/p/1">1</a></li><li><a href="/p/2">2</a></li>"#);
        html.push_str(r#"<li><a href="/p/3">3</a></li><li><a href="/p/2">Next</a></li></ul></body></html>"#);
        html
    }

    fn page(markup: String) -> Page {
        Page::new("https://example.org/p/1", markup, false).unwrap()
    }

    #[test]
    fn test_heuristic_picks_repeated_items_over_nav() {
        let items = ItemDetector::new().detect(&page(listing(4, true)), None);
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].detail_url.as_str(), "https://example.org/people/0");
        assert_eq!(items[0].anchor_text, "Person 0");
        assert_eq!(items[3].dom_path, "body/div.directory/ul/li.person[4]");
    }

    #[test]
    fn test_nav_group_is_last_resort() {
        let items = ItemDetector::new().detect(&page(listing(0, true)), None);
        assert_eq!(items.len(), 6);
        assert!(items.iter().all(|item| item.dom_path.starts_with("body/nav")));
    }

    #[test]
    fn test_below_min_group_size_yields_nothing() {
        let items = ItemDetector::new().detect(&page(listing(2, false)), None);
        assert!(items.is_empty());
    }

    #[test]
    fn test_cross_site_links_do_not_count() {
        let markup = r#"<html><body><ul>
            <li class="ad"><a href="https://ads.test/1">a</a></li>
            <li class="ad"><a href="https://ads.test/2">b</a></li>
            <li class="ad"><a href="https://ads.test/3">c</a></li></ul></body></html>"#;
        assert!(ItemDetector::new().detect(&page(markup.to_string()), None).is_empty());
    }

    #[test]
    fn test_hinted_selector_dedups_and_skips_linkless_items() {
        let markup = r#"<html><body>
            <div class="row"><span>No link</span></div>
            <div class="row"><a href="/people/jane">Jane</a></div>
            <div class="row"><a href="/people/jane#bio">Jane again</a></div>
            <div class="row"><a class="more" href="/people/bob/contact">Contact</a><a href="/people/bob">Bob</a></div>
            </body></html>"#;
        let hints = crate::domain::hints::SiteHintsConfig {
            list_item_selector: Some("div.row".into()),
            ..Default::default()
        }
        .compile()
        .unwrap();

        let items = ItemDetector::new().detect(&page(markup.to_string()), Some(&hints));
        let urls: Vec<_> = items.iter().map(|i| i.detail_url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://example.org/people/jane", "https://example.org/people/bob/contact"]
        );

        let with_detail = crate::domain::hints::SiteHintsConfig {
            list_item_selector: Some("div.row".into()),
            detail_link_selector: Some("a:not(.more)".into()),
            ..Default::default()
        }
        .compile()
        .unwrap();
        let items = ItemDetector::new().detect(&page(markup.to_string()), Some(&with_detail));
        assert_eq!(items.last().unwrap().detail_url.as_str(), "https://example.org/people/bob");
    }
}
