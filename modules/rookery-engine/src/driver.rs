//! Cursor-driven pagination across a heterogeneous timeline.
//!
//! One page at a time: fetch (with retries) → classify → extract →
//! normalize → accumulate, then decide whether to continue. All state lives
//! in the driver instance; abandoning it between pages is safe because
//! state is fully captured at page boundaries.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use rookery_common::{
    CursorKind, CursorToken, Entity, MirrorOutcome, PageResult, TerminationReason,
};

use crate::classify::{classify, error_envelope_message, Classified};
use crate::diagnostics::DiagnosticSink;
use crate::extract::{extract_with, EntityKind};
use crate::normalize::{normalize_match, Normalized};
use crate::retry::{FetchOutcome, RetryPolicy};
use crate::traits::{PageRequest, PageTransport, TimelineKind};

/// Engine tuning knobs, consumed as opaque values from configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Pages to fetch; 0 means derive from the query's known total metric
    /// (rounded up, plus one safety page) or, failing that, run until the
    /// cursor stops.
    pub target_page_count: u32,
    pub page_size: u32,
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Courtesy delay between pages, independent of per-attempt backoff.
    pub inter_page_delay: Duration,
    /// Consecutive pages yielding zero new entities before giving up.
    pub empty_page_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_page_count: 0,
            page_size: 20,
            max_retries: 2,
            base_delay: Duration::from_millis(2000),
            inter_page_delay: Duration::from_millis(1000),
            empty_page_limit: 2,
        }
    }
}

/// What to mirror.
#[derive(Debug, Clone)]
pub struct PageQuery {
    pub entity_id: String,
    pub timeline: TimelineKind,
    pub include_promoted: bool,
    /// The target account's own count for this timeline, when the caller
    /// already knows it. Drives automatic page-count derivation.
    pub known_total: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Idle,
    FetchingPage,
    Accumulating,
    Done,
    Aborted,
}

pub struct PaginationDriver<'a> {
    transport: &'a dyn PageTransport,
    sink: &'a dyn DiagnosticSink,
    config: EngineConfig,
}

impl<'a> PaginationDriver<'a> {
    pub fn new(
        transport: &'a dyn PageTransport,
        sink: &'a dyn DiagnosticSink,
        config: EngineConfig,
    ) -> Self {
        Self {
            transport,
            sink,
            config,
        }
    }

    /// Run the full fetch loop for one timeline. Never discards progress:
    /// a fatal or anti-automation outcome on a later page returns everything
    /// accumulated before it, with the termination reason as a first-class
    /// signal.
    pub async fn run(&self, query: &PageQuery) -> MirrorOutcome {
        let target_pages = self.resolve_target_pages(query);
        info!(
            entity_id = query.entity_id.as_str(),
            timeline = ?query.timeline,
            target_pages = ?target_pages,
            page_size = self.config.page_size,
            "Starting pagination run"
        );

        let retry = RetryPolicy::new(self.config.max_retries, self.config.base_delay);

        let mut state = DriverState::Idle;
        let mut seen: HashSet<String> = HashSet::new();
        let mut accounts = Vec::new();
        let mut posts = Vec::new();
        let mut cursor: Option<String> = None;
        let mut last_token: Option<CursorToken> = None;
        let mut pages_fetched = 0u32;
        let mut consecutive_empty = 0u32;
        let mut error: Option<String> = None;

        let termination = loop {
            if let Some(target) = target_pages {
                if pages_fetched >= target {
                    break TerminationReason::ExhaustedPages;
                }
            }

            transition(&mut state, DriverState::FetchingPage);
            let request = PageRequest {
                entity_id: query.entity_id.clone(),
                timeline: query.timeline,
                cursor: cursor.clone(),
                page_size: self.config.page_size,
                include_promoted: query.include_promoted,
            };

            let outcome = retry.execute(|| self.attempt_once(&request)).await;

            let raw = match outcome {
                FetchOutcome::Success(raw) => raw,
                FetchOutcome::Transient(reason) => {
                    error = Some(format!("retries exhausted: {reason}"));
                    transition(&mut state, DriverState::Aborted);
                    break TerminationReason::FatalError;
                }
                FetchOutcome::Fatal(reason) => {
                    error = Some(reason);
                    transition(&mut state, DriverState::Aborted);
                    break TerminationReason::FatalError;
                }
                FetchOutcome::AntiAutomation => {
                    error = Some("anti-automation challenge page received".to_string());
                    transition(&mut state, DriverState::Aborted);
                    break TerminationReason::AntiAutomationDetected;
                }
            };

            pages_fetched += 1;
            self.sink.page_snapshot(pages_fetched, &raw);
            transition(&mut state, DriverState::Accumulating);

            let page = self.build_page(&raw, query);
            if page.nothing_recognized {
                warn!(
                    page = pages_fetched,
                    "Page parsed as JSON but no recognizer matched anything"
                );
                self.sink.note(&format!(
                    "page {pages_fetched}: parsed but nothing recognized (schema drift?)"
                ));
            }

            let mut new_entities = 0usize;
            for entity in page.entities {
                if !seen.insert(entity.dedup_key()) {
                    continue;
                }
                new_entities += 1;
                match entity {
                    Entity::Account(a) => accounts.push(a),
                    Entity::Post(p) => posts.push(p),
                }
            }
            debug!(
                page = pages_fetched,
                raw_entries = page.raw_page_size,
                new_entities,
                "Page accumulated"
            );

            // Capture the resume point before any termination check so a
            // budget-limited run still reports where to continue from.
            let repeated = matches!(
                &page.next_cursor,
                Some(token) if Some(token.value.as_str()) == cursor.as_deref()
            );
            if let Some(token) = &page.next_cursor {
                if !repeated {
                    cursor = Some(token.value.clone());
                    last_token = Some(token.clone());
                }
            }

            if let Some(target) = target_pages {
                if pages_fetched >= target {
                    break TerminationReason::ExhaustedPages;
                }
            }

            if page.next_cursor.is_none() {
                break TerminationReason::NoCursor;
            }
            if repeated {
                debug!(page = pages_fetched, "Cursor repeated, end of stream");
                break TerminationReason::NoCursor;
            }

            if new_entities == 0 {
                consecutive_empty += 1;
                if consecutive_empty >= self.config.empty_page_limit {
                    break TerminationReason::EmptyPageLimit;
                }
            } else {
                consecutive_empty = 0;
            }

            tokio::time::sleep(self.config.inter_page_delay).await;
        };

        if state != DriverState::Aborted {
            transition(&mut state, DriverState::Done);
        }

        let total_entities = accounts.len() + posts.len();
        info!(
            pages_fetched,
            total_entities,
            termination = ?termination,
            "Pagination run finished"
        );

        MirrorOutcome {
            accounts,
            posts,
            cursor: last_token,
            termination,
            pages_fetched,
            total_entities,
            error,
        }
    }

    /// One attempt: transport fetch plus classification. The retry policy
    /// decides what happens next based on the outcome variant.
    async fn attempt_once(&self, request: &PageRequest) -> FetchOutcome {
        let response = match self.transport.fetch_page(request).await {
            Ok(r) => r,
            Err(e) if e.is_transient() => return FetchOutcome::Transient(e.to_string()),
            Err(e) => return FetchOutcome::Fatal(e.to_string()),
        };

        match classify(response.status, &response.headers, &response.body) {
            Ok(Classified::JsonOk(raw)) => FetchOutcome::Success(raw),
            Ok(Classified::JsonError(body)) => {
                FetchOutcome::Fatal(error_envelope_message(&body))
            }
            Ok(Classified::AntiAutomation) => FetchOutcome::AntiAutomation,
            Ok(Classified::Transient(reason)) => FetchOutcome::Transient(reason),
            Err(e) => FetchOutcome::Fatal(e.to_string()),
        }
    }

    /// Extract and normalize one decoded page. The raw tree is owned by
    /// this call and dropped on return, bounding memory to one page.
    fn build_page(&self, raw: &Value, query: &PageQuery) -> PageResult {
        let account_matches = extract_with(raw, EntityKind::Account, query.include_promoted);
        let post_matches = extract_with(raw, EntityKind::Post, query.include_promoted);
        let cursor_matches = extract_with(raw, EntityKind::Cursor, query.include_promoted);

        let raw_page_size = account_matches.len() + post_matches.len();
        let nothing_recognized =
            account_matches.is_empty() && post_matches.is_empty() && cursor_matches.is_empty();

        let mut entities = Vec::with_capacity(raw_page_size);
        for raw_match in account_matches.iter().chain(post_matches.iter()) {
            match normalize_match(raw_match) {
                Some(Normalized::Account(a)) => entities.push(Entity::Account(a)),
                Some(Normalized::Post(p)) => entities.push(Entity::Post(p)),
                Some(Normalized::Cursor(_)) => {}
                // No usable identity after every mapper: drop, don't
                // substitute placeholders.
                None => debug!(
                    path = raw_match.path.as_str(),
                    shape = ?raw_match.shape,
                    "Dropping recognized record with no usable identity"
                ),
            }
        }

        // Only Bottom cursors drive forward pagination.
        let next_cursor = cursor_matches
            .iter()
            .filter_map(normalize_match)
            .find_map(|n| match n {
                Normalized::Cursor(c) if c.kind == CursorKind::Bottom => Some(c),
                _ => None,
            });

        PageResult {
            entities,
            next_cursor,
            raw_page_size,
            nothing_recognized,
        }
    }

    /// Resolve the page budget: explicit count, else derived from a known
    /// total metric (rounded up, plus one safety page), else unbounded and
    /// cursor-driven.
    fn resolve_target_pages(&self, query: &PageQuery) -> Option<u32> {
        if self.config.target_page_count > 0 {
            return Some(self.config.target_page_count);
        }
        query.known_total.map(|total| {
            let page_size = u64::from(self.config.page_size.max(1));
            (total.div_ceil(page_size) + 1) as u32
        })
    }
}

fn transition(state: &mut DriverState, next: DriverState) {
    if *state != next {
        debug!(from = ?state, to = ?next, "Driver state transition");
        *state = next;
    }
}
