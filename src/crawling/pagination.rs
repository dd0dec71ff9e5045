//! Pagination resolver
//!
//! Decides which listing page comes next. On an unlocked state the detectors run in
//! priority order (site hints, next link, numbered pages, cursor parameter, scroll
//! loading); the first one that yields a candidate locks its strategy into the state.
//! Locked states only run their own strategy. Every emitted URL is normalized and
//! checked against the visited set before it is handed out.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::hints::SiteHints;
use crate::domain::page::{Page, RenderHint};
use crate::domain::pagination::{ExhaustionReason, PaginationState, Position, ResolverEvent, ResolverPhase};
use crate::infrastructure::parsing::config::PaginationCues;
use crate::infrastructure::parsing::dom;
use crate::infrastructure::url_normalizer;

static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));
static NEXT_CANDIDATES: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href], link[rel][href]").expect("static selector"));
static CONTROLS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("button, a, [role='button']").expect("static selector"));

/// Wrappers skipped when grouping numbered links by container
const INLINE_WRAPPERS: &[&str] = &["li", "span", "em", "strong", "b"];

/// Outcome of one resolver step
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Normalized listing URLs to visit next, in order
    pub next_urls: Vec<Url>,
    pub state: PaginationState,
    /// Re-fetch the current page with this hint before continuing
    pub refetch: Option<RenderHint>,
}

impl Resolution {
    fn finished(state: PaginationState) -> Self {
        Self {
            next_urls: Vec::new(),
            state,
            refetch: None,
        }
    }

    pub const fn is_exhausted(&self) -> bool {
        self.state.is_exhausted()
    }
}

enum Step {
    Follow {
        url: Url,
        phase: ResolverPhase,
        position: Position,
    },
    Refetch(RenderHint),
}

/// Pagination resolver; holds only immutable settings, all traversal state lives in
/// [`PaginationState`]
#[derive(Debug, Clone)]
pub struct PaginationResolver {
    max_pages: Option<u32>,
    scroll_available: bool,
    cues: PaginationCues,
    scroll_selectors: Vec<Selector>,
}

impl PaginationResolver {
    pub fn new(max_pages: Option<u32>, scroll_available: bool) -> Self {
        Self::with_cues(max_pages, scroll_available, PaginationCues::default())
    }

    pub fn with_cues(max_pages: Option<u32>, scroll_available: bool, cues: PaginationCues) -> Self {
        let scroll_selectors = dom::compile_selector_list(&cues.scroll_selectors);
        Self {
            max_pages,
            scroll_available,
            cues,
            scroll_selectors,
        }
    }

    /// Process one fetched listing page and decide where to go next
    pub fn resolve(&self, page: &Page, hints: Option<&SiteHints>, mut state: PaginationState) -> Resolution {
        if state.is_exhausted() {
            return Resolution::finished(state);
        }

        let current = page.url().clone();
        let current_key = current.to_string();
        let previous = state.last_url.replace(current_key.clone());

        // The scroll-rendered copy of a page already holds everything that page loads
        if state.phase == ResolverPhase::InfiniteScroll && previous.as_deref() == Some(current_key.as_str()) {
            debug!("Scroll-rendered page {} processed, no further pages", current);
            state.exhaust(ExhaustionReason::NoCandidate);
            return Resolution::finished(state);
        }

        state.mark_visited(&current_key);
        state.pages_visited += 1;

        if !state.seen_digests.insert(page.content_digest()) {
            warn!("🔁 Listing page {} repeats an earlier page, stopping traversal", current);
            state.exhaust(ExhaustionReason::RepeatedContent);
            return Resolution::finished(state);
        }

        if self.max_pages.is_some_and(|max| state.pages_visited >= max) {
            info!("Reached max pages ({}), stopping traversal", state.pages_visited);
            state.exhaust(ExhaustionReason::MaxPages);
            return Resolution::finished(state);
        }

        let previous_url = previous.and_then(|raw| Url::parse(&raw).ok());
        let step = {
            let document = page.document();
            if state.phase.is_locked() {
                self.follow_locked(&document, &current, previous_url.as_ref(), hints, &state)
            } else {
                self.detect(&document, &current, previous_url.as_ref(), hints, &state)
            }
        };

        match step {
            None => {
                debug!("No next page candidate on {} ({})", current, state.strategy());
                state.exhaust(ExhaustionReason::NoCandidate);
                Resolution::finished(state)
            }
            Some(Step::Refetch(hint)) => {
                if !state.phase.is_locked() {
                    state.apply(ResolverEvent::Detected(ResolverPhase::InfiniteScroll));
                    info!("🔒 Pagination strategy locked to {} on {}", state.strategy(), current);
                }
                Resolution {
                    next_urls: Vec::new(),
                    state,
                    refetch: Some(hint),
                }
            }
            Some(Step::Follow { url, phase, position }) => {
                let url = url_normalizer::normalize(&url);
                let key = url.to_string();
                if state.has_visited(&key) {
                    warn!("🔁 Pagination loop detected: {} -> {}", current, key);
                    state.exhaust(ExhaustionReason::LoopDetected);
                    return Resolution::finished(state);
                }

                if state.phase.is_locked() {
                    state.apply(ResolverEvent::Advanced);
                } else {
                    state.apply(ResolverEvent::Detected(phase));
                    info!("🔒 Pagination strategy locked to {} on {}", state.strategy(), current);
                }
                state.mark_visited(&key);
                state.position = position;
                debug!("Next listing page: {}", key);

                Resolution {
                    next_urls: vec![url],
                    state,
                    refetch: None,
                }
            }
        }
    }

    fn detect(
        &self,
        document: &Html,
        current: &Url,
        previous: Option<&Url>,
        hints: Option<&SiteHints>,
        state: &PaginationState,
    ) -> Option<Step> {
        let next_position = Position::Page(state.position.page_number() + 1);

        if let Some(url) = hinted_next_link(document, current, hints) {
            return Some(Step::Follow {
                url,
                phase: ResolverPhase::NextLink,
                position: next_position,
            });
        }

        if let Some(param) = hints.and_then(|h| h.pagination_param.as_deref()) {
            let value = url_normalizer::query_param(current, param);
            if value.as_deref().is_none_or(|v| v.parse::<u32>().is_ok()) {
                return synthesize_page(current, param);
            }
            if let Some(step) = self.cursor_step(document, current, previous, Some(param), state) {
                return Some(step);
            }
        }

        if let Some(url) = self.heuristic_next_link(document, current) {
            return Some(Step::Follow {
                url,
                phase: ResolverPhase::NextLink,
                position: next_position,
            });
        }

        numbered_step(document, current, state.position.page_number())
            .or_else(|| self.cursor_step(document, current, previous, None, state))
            .or_else(|| self.scroll_step(document, current, state))
    }

    fn follow_locked(
        &self,
        document: &Html,
        current: &Url,
        previous: Option<&Url>,
        hints: Option<&SiteHints>,
        state: &PaginationState,
    ) -> Option<Step> {
        match &state.phase {
            ResolverPhase::NextLink => hinted_next_link(document, current, hints)
                .or_else(|| self.heuristic_next_link(document, current))
                .map(|url| Step::Follow {
                    url,
                    phase: ResolverPhase::NextLink,
                    position: Position::Page(state.position.page_number() + 1),
                }),
            ResolverPhase::NumberedPages { param: Some(param) } => synthesize_page(current, param),
            ResolverPhase::NumberedPages { param: None } => {
                numbered_step(document, current, state.position.page_number())
            }
            ResolverPhase::CursorBased { param } => {
                self.cursor_step(document, current, previous, param.as_deref(), state)
            }
            ResolverPhase::InfiniteScroll => self.scroll_step(document, current, state),
            ResolverPhase::Unknown | ResolverPhase::Exhausted { .. } => None,
        }
    }

    /// Link whose `rel`, `aria-label` or visible text says "next"
    fn heuristic_next_link(&self, document: &Html, current: &Url) -> Option<Url> {
        document.select(&NEXT_CANDIDATES).find_map(|element| {
            let value = element.value();
            let rel_next = value
                .attr("rel")
                .is_some_and(|rel| rel.split_whitespace().any(|token| token.eq_ignore_ascii_case("next")));
            let is_anchor = value.name() == "a";
            let matches = rel_next
                || (is_anchor
                    && (value
                        .attr("aria-label")
                        .is_some_and(|label| label.to_lowercase().contains("next"))
                        || self.is_next_text(&dom::visible_element_text(element))));
            if !matches {
                return None;
            }
            listing_link(element, current)
        })
    }

    fn is_next_text(&self, text: &str) -> bool {
        let lowered = text.trim().to_lowercase();
        !lowered.is_empty() && self.cues.next_texts.iter().any(|cue| *cue == lowered)
    }

    /// Link changing a cursor-like query parameter of the current resource.
    ///
    /// Prefers unvisited links; a visited one is returned only when nothing else
    /// matches, so the loop guard can end traversal.
    fn cursor_step(
        &self,
        document: &Html,
        current: &Url,
        previous: Option<&Url>,
        only: Option<&str>,
        state: &PaginationState,
    ) -> Option<Step> {
        let params: Vec<String> = match only {
            Some(param) => vec![param.to_string()],
            None => {
                let mut params = previous
                    .map(|prev| url_normalizer::changed_query_params(prev, current))
                    .unwrap_or_default();
                for param in &self.cues.cursor_params {
                    if !params.contains(param) {
                        params.push(param.clone());
                    }
                }
                params
            }
        };

        let mut revisit = None;
        for anchor in document.select(&LINK) {
            let Some(url) = listing_link(anchor, current) else {
                continue;
            };
            if !url_normalizer::same_resource(&url, current) {
                continue;
            }
            let changed = params.iter().find_map(|param| {
                let value = url_normalizer::query_param(&url, param)?;
                let before = url_normalizer::query_param(current, param);
                (before.as_deref() != Some(value.as_str())).then(|| (param.clone(), value))
            });
            let Some((param, value)) = changed else {
                continue;
            };

            let visited = state.has_visited(url.as_str());
            let step = Step::Follow {
                url,
                phase: ResolverPhase::CursorBased { param: Some(param) },
                position: Position::Cursor(value),
            };
            if !visited {
                return Some(step);
            }
            if revisit.is_none() {
                revisit = Some(step);
            }
        }
        revisit
    }

    /// Continuation endpoint, or a scroll-rendered re-fetch when only cues are present
    fn scroll_step(&self, document: &Html, current: &Url, state: &PaginationState) -> Option<Step> {
        if !self.scroll_available {
            return None;
        }

        let next_position = Position::Page(state.position.page_number() + 1);
        let mut cue_found = false;

        let cued = self
            .scroll_selectors
            .iter()
            .flat_map(|selector| document.select(selector))
            .chain(document.select(&CONTROLS).filter(|control| {
                let text = dom::visible_element_text(*control).to_lowercase();
                self.cues.load_more_texts.iter().any(|cue| *cue == text)
            }));

        for element in cued {
            cue_found = true;
            if let Some(url) = self.scroll_endpoint(element, current) {
                return Some(Step::Follow {
                    url,
                    phase: ResolverPhase::InfiniteScroll,
                    position: next_position,
                });
            }
        }

        cue_found.then_some(Step::Refetch(RenderHint::Scroll))
    }

    fn scroll_endpoint(&self, element: ElementRef<'_>, current: &Url) -> Option<Url> {
        self.cues.scroll_url_attributes.iter().find_map(|attribute| {
            let raw = element.value().attr(attribute)?;
            let url = url_normalizer::normalize(&url_normalizer::resolve_href(current, raw)?);
            (url != *current && url_normalizer::same_site(&url, current)).then_some(url)
        })
    }
}

/// Same-site http(s) target of a link element, other than the current page
fn listing_link(element: ElementRef<'_>, current: &Url) -> Option<Url> {
    let href = element.value().attr("href")?;
    let url = url_normalizer::normalize(&url_normalizer::resolve_href(current, href)?);
    (url != *current && url_normalizer::same_site(&url, current)).then_some(url)
}

fn hinted_next_link(document: &Html, current: &Url, hints: Option<&SiteHints>) -> Option<Url> {
    let selector = hints?.next_link_selector.as_ref()?;
    document.select(selector).find_map(|element| {
        if element.value().attr("href").is_some() {
            listing_link(element, current)
        } else {
            element.select(&LINK).find_map(|anchor| listing_link(anchor, current))
        }
    })
}

/// Next page from a hinted numeric query parameter; an absent value means page 1
fn synthesize_page(current: &Url, param: &str) -> Option<Step> {
    let page = match url_normalizer::query_param(current, param) {
        None => 1,
        Some(value) => value.parse::<u32>().ok()?,
    };
    let next = page.checked_add(1)?;
    Some(Step::Follow {
        url: url_normalizer::with_query_param(current, param, &next.to_string()),
        phase: ResolverPhase::NumberedPages {
            param: Some(param.to_string()),
        },
        position: Position::Page(next),
    })
}

/// Sibling links with purely numeric text, strictly increasing in markup order.
///
/// Picks the link numbered `current + 1`, else the smallest number above `current`.
fn numbered_step(document: &Html, current: &Url, current_page: u32) -> Option<Step> {
    let mut order = Vec::new();
    let mut groups = HashMap::new();

    for anchor in document.select(&LINK) {
        let text = dom::visible_element_text(anchor);
        if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let Ok(number) = text.parse::<u32>() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(url) = url_normalizer::resolve_href(current, href).map(|u| url_normalizer::normalize(&u)) else {
            continue;
        };
        if !url_normalizer::same_site(&url, current) {
            continue;
        }

        let Some(container) = dom::parent_element(anchor).map(|parent| {
            if INLINE_WRAPPERS.contains(&parent.value().name()) {
                dom::parent_element(parent).unwrap_or(parent)
            } else {
                parent
            }
        }) else {
            continue;
        };

        let slot = *groups.entry(container.id()).or_insert_with(|| {
            order.push(Vec::new());
            order.len() - 1
        });
        order[slot].push((number, url));
    }

    order
        .into_iter()
        .filter(|members| members.len() >= 2 && members.windows(2).all(|pair| pair[0].0 < pair[1].0))
        .find_map(|members| {
            let candidates = members
                .into_iter()
                .filter(|(number, url)| *number > current_page && url != current);
            let (number, url) = candidates.min_by_key(|(number, _)| *number)?;
            Some(Step::Follow {
                url,
                phase: ResolverPhase::NumberedPages { param: None },
                position: Position::Page(number),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hints::SiteHintsConfig;
    use crate::domain::pagination::PaginationStrategy;
    use rstest::rstest;

    fn page(url: &str, body: &str) -> Page {
        Page::new(url, format!("<html><body>{body}</body></html>"), false).unwrap()
    }

    fn numbered_page(n: u32) -> Page {
        let pager: String = (1..=5).map(|i| format!("<a href=\"/p/{i}\">{i}</a> ")).collect();
        page(
            &format!("https://example.org/p/{n}"),
            &format!("<h2>Page {n}</h2><div class=\"pager\">{pager}</div>"),
        )
    }

    /// Feed pages in order, resolving each with the state from the previous step
    fn walk(resolver: &PaginationResolver, pages: &[Page]) -> (Vec<String>, PaginationState) {
        let mut state = PaginationState::new();
        let mut emitted = Vec::new();
        for page in pages {
            let resolution = resolver.resolve(page, None, state);
            emitted.extend(resolution.next_urls.iter().map(ToString::to_string));
            state = resolution.state;
            if state.is_exhausted() {
                break;
            }
        }
        (emitted, state)
    }

    #[test]
    fn test_numbered_pages_run_to_exhaustion() {
        let resolver = PaginationResolver::new(None, false);
        let pages: Vec<Page> = (1..=5).map(numbered_page).collect();
        let (emitted, state) = walk(&resolver, &pages);

        assert_eq!(
            emitted,
            vec![
                "https://example.org/p/2",
                "https://example.org/p/3",
                "https://example.org/p/4",
                "https://example.org/p/5"
            ]
        );
        assert_eq!(state.strategy(), PaginationStrategy::NumberedPages);
        assert_eq!(state.exhaustion(), Some(ExhaustionReason::NoCandidate));
        assert_eq!(state.pages_visited, 5);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let resolver = PaginationResolver::new(None, false);
        let pages: Vec<Page> = (1..=5).map(numbered_page).collect();
        let first = walk(&resolver, &pages);
        let second = walk(&resolver, &pages);
        assert_eq!(first.0, second.0);
        assert_eq!(first.1.phase, second.1.phase);
    }

    #[test]
    fn test_next_link_cycle_is_caught_in_one_step() {
        let resolver = PaginationResolver::new(None, false);
        let first = page("https://example.org/people", r#"<a rel="next" href="/people?page=2">Next</a>"#);
        let second = page("https://example.org/people?page=2", r#"<a rel="next" href="/people">Next</a>"#);

        let resolution = resolver.resolve(&first, None, PaginationState::new());
        assert_eq!(resolution.next_urls[0].as_str(), "https://example.org/people?page=2");
        assert_eq!(resolution.state.strategy(), PaginationStrategy::NextLink);

        let resolution = resolver.resolve(&second, None, resolution.state);
        assert!(resolution.next_urls.is_empty());
        assert_eq!(resolution.state.exhaustion(), Some(ExhaustionReason::LoopDetected));
    }

    #[test]
    fn test_strategy_stays_locked() {
        let resolver = PaginationResolver::new(None, false);
        let first = page(
            "https://example.org/p/1",
            r#"<div class="pager"><a href="/p/1">1</a><a href="/p/2">2</a><a href="/p/3">3</a></div>"#,
        );
        let second = page(
            "https://example.org/p/2",
            r#"<a rel="next" href="/elsewhere?after=zz">Next</a>
               <div class="pager"><a href="/p/1">1</a><a href="/p/2">2</a><a href="/p/3">3</a></div>"#,
        );

        let resolution = resolver.resolve(&first, None, PaginationState::new());
        assert_eq!(resolution.state.strategy(), PaginationStrategy::NumberedPages);
        let resolution = resolver.resolve(&second, None, resolution.state);
        assert_eq!(resolution.next_urls[0].as_str(), "https://example.org/p/3");
        assert_eq!(resolution.state.strategy(), PaginationStrategy::NumberedPages);
        assert_eq!(resolution.state.position, Position::Page(3));
    }

    #[test]
    fn test_max_pages_stops_traversal() {
        let resolver = PaginationResolver::new(Some(2), false);
        let pages: Vec<Page> = (1..=5).map(numbered_page).collect();
        let (emitted, state) = walk(&resolver, &pages);
        assert_eq!(emitted, vec!["https://example.org/p/2"]);
        assert_eq!(state.exhaustion(), Some(ExhaustionReason::MaxPages));
    }

    #[test]
    fn test_repeated_markup_ends_as_loop() {
        let resolver = PaginationResolver::new(None, false);
        let body = r#"<a href="?page=2">Next</a>"#;
        let first = page("https://example.org/list", body);
        let same = page("https://example.org/list?page=2", body);

        let resolution = resolver.resolve(&first, None, PaginationState::new());
        let resolution = resolver.resolve(&same, None, resolution.state);
        let reason = resolution.state.exhaustion().unwrap();
        assert_eq!(reason, ExhaustionReason::RepeatedContent);
        assert!(reason.is_loop());
    }

    #[test]
    fn test_hinted_param_synthesizes_pages() {
        let hints = SiteHintsConfig {
            pagination_param: Some("pg".into()),
            ..SiteHintsConfig::default()
        }
        .compile()
        .unwrap();
        let resolver = PaginationResolver::new(None, false);

        let first = page("https://example.org/staff", "<p>one</p>");
        let resolution = resolver.resolve(&first, Some(&hints), PaginationState::new());
        assert_eq!(resolution.next_urls[0].as_str(), "https://example.org/staff?pg=2");
        assert_eq!(
            resolution.state.phase,
            ResolverPhase::NumberedPages { param: Some("pg".into()) }
        );

        let second = page("https://example.org/staff?pg=2", "<p>two</p>");
        let resolution = resolver.resolve(&second, Some(&hints), resolution.state);
        assert_eq!(resolution.next_urls[0].as_str(), "https://example.org/staff?pg=3");
    }

    #[test]
    fn test_hinted_next_selector_wins_over_heuristics() {
        let hints = SiteHintsConfig {
            next_link_selector: Some("a.forward".into()),
            ..SiteHintsConfig::default()
        }
        .compile()
        .unwrap();
        let resolver = PaginationResolver::new(None, false);
        let listing = page(
            "https://example.org/list",
            r#"<a rel="next" href="/list?page=9">Next</a><a class="forward" href="/list?page=2">→</a>"#,
        );
        let resolution = resolver.resolve(&listing, Some(&hints), PaginationState::new());
        assert_eq!(resolution.next_urls[0].as_str(), "https://example.org/list?page=2");
    }

    #[test]
    fn test_cursor_parameter_is_detected() {
        let resolver = PaginationResolver::new(None, false);
        let listing = page(
            "https://example.org/members",
            r#"<a href="/about">About</a><a href="/members?after=c2">Continue</a>"#,
        );
        let resolution = resolver.resolve(&listing, None, PaginationState::new());
        assert_eq!(resolution.next_urls[0].as_str(), "https://example.org/members?after=c2");
        assert_eq!(
            resolution.state.phase,
            ResolverPhase::CursorBased { param: Some("after".into()) }
        );
        assert_eq!(resolution.state.position, Position::Cursor("c2".into()));
    }

    #[test]
    fn test_cursor_detected_from_changed_parameter() {
        let resolver = PaginationResolver::new(None, false);
        let mut state = PaginationState {
            last_url: Some("https://example.org/members?k=a".into()),
            ..PaginationState::new()
        };
        state.mark_visited("https://example.org/members?k=a");
        let listing = page(
            "https://example.org/members?k=b",
            r#"<a href="/members?k=a">Back</a><a href="/members?k=c">Continue</a>"#,
        );
        let resolution = resolver.resolve(&listing, None, state);
        assert_eq!(resolution.next_urls[0].as_str(), "https://example.org/members?k=c");
        assert_eq!(resolution.state.phase, ResolverPhase::CursorBased { param: Some("k".into()) });
    }

    #[test]
    fn test_scroll_cues_need_scroll_support() {
        let body = r#"<ul><li>a</li></ul><button class="btn">Load more</button>"#;
        let listing = page("https://example.org/feed", body);

        let without = PaginationResolver::new(None, false).resolve(&listing, None, PaginationState::new());
        assert_eq!(without.state.exhaustion(), Some(ExhaustionReason::NoCandidate));

        let resolver = PaginationResolver::new(None, true);
        let resolution = resolver.resolve(&listing, None, PaginationState::new());
        assert_eq!(resolution.refetch, Some(RenderHint::Scroll));
        assert_eq!(resolution.state.strategy(), PaginationStrategy::InfiniteScroll);

        let rendered = Page::new(
            "https://example.org/feed",
            "<html><body><ul><li>a</li><li>b</li></ul></body></html>",
            true,
        )
        .unwrap();
        let resolution = resolver.resolve(&rendered, None, resolution.state);
        assert!(resolution.is_exhausted());
        assert!(resolution.refetch.is_none());
    }

    #[test]
    fn test_scroll_endpoint_is_followed() {
        let resolver = PaginationResolver::new(None, true);
        let listing = page(
            "https://example.org/feed",
            r#"<div class="load-more" data-next-url="/feed/chunk?n=2"></div>"#,
        );
        let resolution = resolver.resolve(&listing, None, PaginationState::new());
        assert_eq!(resolution.next_urls[0].as_str(), "https://example.org/feed/chunk?n=2");
        assert_eq!(resolution.state.phase, ResolverPhase::InfiniteScroll);
    }

    #[rstest]
    #[case("Next")]
    #[case("next ›")]
    #[case("»")]
    #[case("Older posts")]
    #[case("  NEXT PAGE ")]
    fn test_next_texts(#[case] text: &str) {
        let resolver = PaginationResolver::new(None, false);
        let listing = page(
            "https://example.org/news",
            &format!(r#"<a href="/news?p=2">{text}</a>"#),
        );
        let resolution = resolver.resolve(&listing, None, PaginationState::new());
        assert_eq!(resolution.state.strategy(), PaginationStrategy::NextLink);
        assert_eq!(resolution.next_urls.len(), 1);
    }

    #[test]
    fn test_exhausted_state_emits_nothing() {
        let resolver = PaginationResolver::new(None, false);
        let mut state = PaginationState::new();
        state.exhaust(ExhaustionReason::Cancelled);
        let resolution = resolver.resolve(&numbered_page(1), None, state);
        assert!(resolution.next_urls.is_empty());
        assert_eq!(resolution.state.pages_visited, 0);
    }
}
