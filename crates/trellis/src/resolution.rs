//! Tracking of in-flight resolutions.
//!
//! A consumer that re-resolves whenever the focus changes can have several
//! resolutions in flight at once. Each [`ResolutionSlot`] hands out a
//! [`Generation`] per request and only applies the result of the latest one,
//! so a slow response for an old focus never overwrites a newer result.

use crate::domain::IssueRef;
use crate::hierarchy::{Breadcrumb, HierarchyResolver, TreeNode};
use crate::storage::IssueStore;
use futures::join;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Loading state of one resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Resolution<T> {
    Idle,
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> Resolution<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Resolution::Loading)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Resolution::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Request counter value identifying one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared, generation-guarded resolution state. Clones share state.
#[derive(Debug, Clone)]
pub struct ResolutionSlot<T> {
    state: Arc<Mutex<Resolution<T>>>,
    latest: Arc<AtomicU64>,
}

impl<T> Default for ResolutionSlot<T> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(Resolution::Idle)),
            latest: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<T: Clone> ResolutionSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new resolution, superseding any in flight.
    pub fn begin(&self) -> Generation {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        *state = Resolution::Loading;
        Generation(generation)
    }

    /// Apply the outcome of `generation`.
    ///
    /// Returns `false`, leaving the state untouched, when a newer generation
    /// has begun since.
    pub fn complete<E: fmt::Display>(&self, generation: Generation, result: Result<T, E>) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let latest = self.latest.load(Ordering::SeqCst);
        if generation.0 != latest {
            debug!(%generation, latest, "dropping stale resolution");
            return false;
        }

        *state = match result {
            Ok(value) => Resolution::Ready(value),
            Err(e) => Resolution::Failed(e.to_string()),
        };
        true
    }

    pub fn snapshot(&self) -> Resolution<T> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn latest(&self) -> Generation {
        Generation(self.latest.load(Ordering::SeqCst))
    }
}

/// Breadcrumbs and tree for the current focus, kept consistent across
/// overlapping focus changes.
#[derive(Clone)]
pub struct HierarchyView<S: IssueStore> {
    resolver: HierarchyResolver<S>,
    breadcrumbs: ResolutionSlot<Vec<Breadcrumb>>,
    tree: ResolutionSlot<Vec<TreeNode>>,
}

impl<S: IssueStore> HierarchyView<S> {
    pub fn new(resolver: HierarchyResolver<S>) -> Self {
        Self {
            resolver,
            breadcrumbs: ResolutionSlot::new(),
            tree: ResolutionSlot::new(),
        }
    }

    pub fn breadcrumbs(&self) -> Resolution<Vec<Breadcrumb>> {
        self.breadcrumbs.snapshot()
    }

    pub fn tree(&self) -> Resolution<Vec<TreeNode>> {
        self.tree.snapshot()
    }

    /// Resolve breadcrumbs and tree for `focus`.
    ///
    /// The focus issue is fetched once and shared by both resolutions.
    /// Returns the breadcrumb generation; results of superseded calls are
    /// discarded.
    pub async fn focus(&self, focus: &IssueRef) -> Generation {
        let crumbs_generation = self.breadcrumbs.begin();
        let tree_generation = self.tree.begin();

        match self.resolver.fetch_focus(focus).await {
            Ok(issue) => {
                let (crumbs, tree) = join!(
                    self.resolver.breadcrumbs_for(&issue),
                    self.resolver.resolve_hierarchy_tree(&issue)
                );
                self.breadcrumbs
                    .complete::<String>(crumbs_generation, Ok(crumbs));
                self.tree.complete::<String>(tree_generation, Ok(tree));
            }
            Err(e) => {
                self.breadcrumbs.complete(crumbs_generation, Err(&e));
                self.tree.complete(tree_generation, Err(&e));
            }
        }

        crumbs_generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::demo_dataset;
    use crate::domain::{Issue, IssueFilter, Project};
    use crate::storage::{InMemoryStorage, StoreError};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    #[test]
    fn test_slot_starts_idle() {
        let slot: ResolutionSlot<u32> = ResolutionSlot::new();
        assert_eq!(slot.snapshot(), Resolution::Idle);
    }

    #[test]
    fn test_stale_completion_is_dropped() {
        let slot = ResolutionSlot::new();
        let first = slot.begin();
        let second = slot.begin();
        assert!(first < second);

        assert!(!slot.complete::<String>(first, Ok("old")));
        assert!(slot.snapshot().is_loading());

        assert!(slot.complete::<String>(second, Ok("new")));
        assert_eq!(slot.snapshot(), Resolution::Ready("new"));

        assert!(!slot.complete::<String>(first, Ok("late")));
        assert_eq!(slot.snapshot().ready(), Some(&"new"));
    }

    #[test]
    fn test_failure_is_recorded_as_message() {
        let slot: ResolutionSlot<u32> = ResolutionSlot::new();
        let generation = slot.begin();
        assert!(slot.complete(generation, Err("store offline")));
        assert_eq!(slot.snapshot(), Resolution::Failed("store offline".to_string()));
        assert_eq!(slot.latest(), generation);
    }

    #[test]
    fn test_clones_share_state() {
        let slot = ResolutionSlot::new();
        let other = slot.clone();
        let generation = other.begin();
        assert!(slot.complete::<String>(generation, Ok(7)));
        assert_eq!(other.snapshot(), Resolution::Ready(7));
    }

    /// Holds lookups of one key until released.
    #[derive(Clone)]
    struct GatedStore {
        inner: InMemoryStorage,
        gated_key: &'static str,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl IssueStore for GatedStore {
        async fn get_issue_by_id(&self, id: &str) -> Result<Issue, StoreError> {
            self.inner.get_issue_by_id(id).await
        }

        async fn get_issue_by_key(&self, key: &str) -> Result<Issue, StoreError> {
            if key == self.gated_key {
                self.gate.notified().await;
            }
            self.inner.get_issue_by_key(key).await
        }

        async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>, StoreError> {
            self.inner.list_issues(filter).await
        }

        async fn get_project(&self, id: &str) -> Result<Project, StoreError> {
            self.inner.get_project(id).await
        }
    }

    #[tokio::test]
    async fn test_focus_resolves_both_slots() {
        let store = InMemoryStorage::from_dataset(demo_dataset());
        let view = HierarchyView::new(HierarchyResolver::new(store));

        view.focus(&IssueRef::key("POW-5")).await;

        let crumbs = view.breadcrumbs();
        let labels: Vec<_> = crumbs
            .ready()
            .unwrap()
            .iter()
            .map(|b| b.label.as_str())
            .collect();
        assert_eq!(labels, ["Demo Project", "POW-1", "POW-5"]);
        let levels: Vec<_> = view
            .tree()
            .ready()
            .unwrap()
            .iter()
            .map(|node| (node.issue.key.clone(), node.level))
            .collect();
        assert_eq!(
            levels,
            [
                ("POW-1".to_string(), 0),
                ("POW-5".to_string(), 1),
                ("POW-6".to_string(), 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_focus_fails_both_slots() {
        let store = InMemoryStorage::from_dataset(demo_dataset());
        let view = HierarchyView::new(HierarchyResolver::new(store));

        view.focus(&IssueRef::key("POW-404")).await;

        let message = "Focus issue not found: key:POW-404".to_string();
        assert_eq!(view.breadcrumbs(), Resolution::Failed(message.clone()));
        assert_eq!(view.tree(), Resolution::Failed(message));
    }

    #[tokio::test]
    async fn test_slow_stale_focus_never_overwrites_newer_one() {
        let gate = Arc::new(Notify::new());
        let store = GatedStore {
            inner: InMemoryStorage::from_dataset(demo_dataset()),
            gated_key: "POW-5",
            gate: gate.clone(),
        };
        let view = HierarchyView::new(HierarchyResolver::new(store));

        let slow_focus = IssueRef::key("POW-5");
        let slow = view.focus(&slow_focus);
        let fast = async {
            let generation = view.focus(&IssueRef::key("POW-9")).await;
            gate.notify_one();
            generation
        };
        let (stale, latest) = join!(slow, fast);

        assert!(stale < latest);
        let crumbs = view.breadcrumbs();
        assert_eq!(crumbs.ready().unwrap().last().unwrap().label, "POW-9");
        let tree = view.tree();
        assert!(tree
            .ready()
            .unwrap()
            .iter()
            .any(|node| node.issue.key == "POW-9" && node.level == 2));
    }
}
