//! Cross-project promotion engine (spec §4.H).
//!
//! A project-scoped memory graduates to global scope once its FSRS state
//! shows it survived review in more than one project. Promotion writes the
//! markdown frontmatter (via the caller's `MemoryStore`) then the FSRS
//! sidecar is left untouched — `fsrs_state` doesn't carry scope. The
//! transition is reported on an in-process broadcast channel so a running
//! CLI/daemon can react without polling.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use memory_core::config::FsrsConfig;
use memory_core::error::MemoryResult;
use memory_core::traits::MemoryStore;
use memory_core::types::{FsrsState, Scope};

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub memory_id: String,
    pub project_id: String,
    pub promoted_at: DateTime<Utc>,
}

/// Broadcasts promotion events to any subscribed listener. Bounded so a
/// slow or absent subscriber can never back-pressure the promotion sweep;
/// lagging receivers simply miss older events (spec §4.H: "never reverses
/// automatically" -- losing a notification never un-promotes a memory,
/// since the markdown/sidecar write already happened).
pub struct PromotionNotifier {
    sender: broadcast::Sender<NotificationEvent>,
}

impl PromotionNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.sender.subscribe()
    }

    fn notify(&self, event: NotificationEvent) {
        // No subscriber is not an error -- promotion already persisted.
        let _ = self.sender.send(event);
    }
}

impl Default for PromotionNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Returns `true` if `state` clears every promotion gate (spec §4.H):
/// stability >= 3.0, review_count >= 3, and the memory was validated in
/// at least 2 distinct projects.
pub fn is_eligible(state: &FsrsState, config: &FsrsConfig) -> bool {
    state.stability >= config.promotion_min_stability
        && state.review_count >= config.promotion_min_review_count
        && state.validated_projects.len() >= config.promotion_min_validated_projects
}

/// Attempts to promote a single memory. Idempotent: a memory already at
/// global scope is a no-op and returns `Ok(None)`, so repeated sweeps never
/// re-promote or reverse a prior promotion.
pub fn try_promote(
    store: &dyn MemoryStore,
    notifier: Option<&PromotionNotifier>,
    memory_id: &str,
    state: &FsrsState,
    config: &FsrsConfig,
    now: DateTime<Utc>,
) -> MemoryResult<Option<NotificationEvent>> {
    let Some(mut memory) = store.get(memory_id)? else { return Ok(None) };

    if memory.scope == Scope::Global {
        return Ok(None);
    }
    if !is_eligible(state, config) {
        return Ok(None);
    }

    memory.scope = Scope::Global;
    memory.promoted_at = Some(now);
    if !memory.tags.iter().any(|t| t == "promoted") {
        memory.tags.push("promoted".to_string());
    }
    store.update(&memory)?;

    let event = NotificationEvent { memory_id: memory_id.to_string(), project_id: memory.project_id.clone(), promoted_at: now };
    if let Some(notifier) = notifier {
        notifier.notify(event.clone());
    }
    Ok(Some(event))
}
