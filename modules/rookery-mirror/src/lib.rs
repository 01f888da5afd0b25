//! Orchestration: wires configuration, the GraphQL transport, and the
//! pagination engine into whole-timeline mirror runs.

pub mod transport;

pub use transport::GraphqlTransport;

use serde::Serialize;
use std::time::Duration;
use tracing::info;

use rookery_common::{Config, MirrorOutcome};
use rookery_engine::{
    DiagnosticSink, EngineConfig, PageQuery, PaginationDriver, TimelineKind,
};

/// Aggregate export for one mirror run: everything persistence/UI
/// collaborators consume.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorReport {
    pub user_id: String,
    pub following: Option<MirrorOutcome>,
    pub mutual_followers: Option<MirrorOutcome>,
}

impl MirrorReport {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            following: None,
            mutual_followers: None,
        }
    }

    /// True when any timeline aborted before collecting anything — a state
    /// the caller must surface distinctly from an empty following list.
    pub fn has_empty_failure(&self) -> bool {
        [&self.following, &self.mutual_followers]
            .into_iter()
            .flatten()
            .any(MirrorOutcome::is_empty_failure)
    }
}

pub struct Mirror {
    transport: GraphqlTransport,
    engine: EngineConfig,
}

impl Mirror {
    pub fn new(config: &Config) -> Self {
        Self {
            transport: GraphqlTransport::new(config),
            engine: engine_config(config),
        }
    }

    /// Mirror one timeline end-to-end. Page budget 0 means cursor-driven:
    /// run until the platform stops handing out fresh cursors.
    pub async fn mirror_timeline(
        &self,
        user_id: &str,
        timeline: TimelineKind,
        pages: u32,
        include_promoted: bool,
        sink: &dyn DiagnosticSink,
    ) -> MirrorOutcome {
        info!(user_id, ?timeline, pages, "Mirroring timeline");

        let mut engine = self.engine.clone();
        if pages > 0 {
            engine.target_page_count = pages;
        }

        let driver = PaginationDriver::new(&self.transport, sink, engine);
        let outcome = driver
            .run(&PageQuery {
                entity_id: user_id.to_string(),
                timeline,
                include_promoted,
                known_total: None,
            })
            .await;

        info!(
            user_id,
            ?timeline,
            accounts = outcome.accounts.len(),
            posts = outcome.posts.len(),
            pages = outcome.pages_fetched,
            termination = ?outcome.termination,
            "Timeline mirrored"
        );
        outcome
    }
}

fn engine_config(config: &Config) -> EngineConfig {
    EngineConfig {
        target_page_count: 0,
        page_size: config.page_size,
        max_retries: config.max_retries,
        base_delay: Duration::from_millis(config.base_delay_ms),
        inter_page_delay: Duration::from_millis(config.inter_page_delay_ms),
        empty_page_limit: config.empty_page_limit,
    }
}
