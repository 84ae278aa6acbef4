#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! Aggregation tools over the Sefaria corpus
//!
//! Every tool follows the same contract: validate arguments, consult
//! the shared response cache under a key derived from all inputs,
//! execute against the upstream client, store with a tool-specific
//! TTL, and return a structured JSON payload for the MCP transport to
//! wrap.

mod calendar;
mod context;
mod error;
mod fetch;
mod find_refs;
mod registry;
mod related;
mod search;
mod sugya;
mod topics;

pub use context::ToolContext;
pub use error::ToolError;
pub use registry::{Tool, ToolDescriptor, ToolRegistry};

use std::sync::Arc;

/// Build the corpus-side tool registry
pub fn corpus_registry(ctx: Arc<ToolContext>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(search::SearchTool::new(Arc::clone(&ctx))));
    registry.register(Arc::new(fetch::FetchTool::new(Arc::clone(&ctx))));
    registry.register(Arc::new(related::GetCommentariesTool::new(Arc::clone(&ctx))));
    registry.register(Arc::new(related::CompareVersionsTool::new(Arc::clone(&ctx))));
    registry.register(Arc::new(related::InsightLayersTool::new(Arc::clone(&ctx))));
    registry.register(Arc::new(find_refs::FindRefsTool::new(Arc::clone(&ctx))));
    registry.register(Arc::new(sugya::SugyaExplorerTool::new(Arc::clone(&ctx))));
    registry.register(Arc::new(topics::TopicsSearchTool::new(Arc::clone(&ctx))));
    registry.register(Arc::new(topics::TopicSheetCuratorTool::new(Arc::clone(&ctx))));
    registry.register(Arc::new(calendar::GetDailyLearningsTool::new(Arc::clone(&ctx))));
    registry.register(Arc::new(calendar::ParshaPackTool::new(Arc::clone(&ctx))));
    registry.register(Arc::new(calendar::CalendarInsightsTool::new(ctx)));
    registry
}
