//! Property-based tests for hierarchy resolution invariants
//!
//! Random stores are built around a single epic and a single story, with a
//! random mix of id-linked, key-linked and unrelated issues.

use super::*;
use crate::domain::Project;
use crate::storage::InMemoryStorage;
use proptest::prelude::*;

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

#[derive(Debug, Clone, Copy)]
enum Link {
    EpicId,
    EpicKey,
    Unrelated,
}

fn link_strategy() -> impl Strategy<Value = Link> {
    prop_oneof![Just(Link::EpicId), Just(Link::EpicKey), Just(Link::Unrelated)]
}

fn work_type_strategy() -> impl Strategy<Value = IssueType> {
    prop_oneof![
        Just(IssueType::Story),
        Just(IssueType::Task),
        Just(IssueType::Bug),
    ]
}

// Epic POW-1 plus one work item per generated link, keyed POW-2 onwards.
fn epic_store(links: &[(Link, IssueType)]) -> (InMemoryStorage, Vec<String>) {
    let storage = InMemoryStorage::new();
    storage.save_project(Project::new("proj-1", "POW", "Demo Project"));
    storage.save_issue(
        Issue::new("POW-1", IssueType::Epic, "Epic")
            .with_id("epic-1")
            .with_project("proj-1"),
    );

    let mut linked = Vec::new();
    for (n, (link, issue_type)) in links.iter().enumerate() {
        let key = format!("POW-{}", n + 2);
        let issue = Issue::new(key.clone(), issue_type.clone(), "Work").with_id(format!("w{}", n));
        let issue = match link {
            Link::EpicId => issue.with_epic(IssueRef::id("epic-1")),
            Link::EpicKey => issue.with_epic(IssueRef::key("POW-1")),
            Link::Unrelated => issue,
        };
        if !matches!(link, Link::Unrelated) {
            linked.push(key);
        }
        storage.save_issue(issue);
    }
    (storage, linked)
}

// Property 1: an epic tree holds the epic at level 0 followed by exactly the
// issues linked to it (by id or key) at level 1, in key order
proptest! {
    #[test]
    fn prop_epic_tree_lists_exactly_linked_issues(
        links in prop::collection::vec((link_strategy(), work_type_strategy()), 0..12)
    ) {
        let (storage, linked) = epic_store(&links);
        let resolver = HierarchyResolver::new(storage);

        let nodes = block_on(resolver.resolve_tree(&IssueRef::key("POW-1"))).unwrap();

        prop_assert_eq!(nodes[0].issue.key.as_str(), "POW-1");
        prop_assert_eq!(nodes[0].level, 0);
        let children: Vec<_> = nodes[1..].iter().map(|n| n.issue.key.clone()).collect();
        prop_assert_eq!(children, linked);
        prop_assert!(nodes[1..].iter().all(|n| n.level == 1));
    }
}

// Property 2: a subtask tree always starts at the parent, puts the focus
// first at level 2 and lists every sibling exactly once
proptest! {
    #[test]
    fn prop_subtask_tree_contains_all_siblings_once(
        sibling_count in 1usize..10,
        focus_index in 0usize..10,
        with_epic in any::<bool>()
    ) {
        let focus_index = focus_index % sibling_count;
        let storage = InMemoryStorage::new();
        storage.save_issue(Issue::new("POW-1", IssueType::Epic, "Epic").with_id("epic-1"));
        let story = Issue::new("POW-2", IssueType::Story, "Story").with_id("story");
        let story = if with_epic { story.with_epic(IssueRef::id("epic-1")) } else { story };
        storage.save_issue(story);
        for n in 0..sibling_count {
            storage.save_issue(
                Issue::new(format!("POW-{}", n + 3), IssueType::Subtask, "Sub")
                    .with_id(format!("sub-{}", n))
                    .with_parent("story"),
            );
        }

        let focus = IssueRef::id(format!("sub-{}", focus_index));
        let nodes = block_on(HierarchyResolver::new(storage).resolve_tree(&focus)).unwrap();

        let offset = usize::from(with_epic);
        prop_assert_eq!(nodes.len(), sibling_count + 1 + offset);
        if with_epic {
            prop_assert_eq!((nodes[0].issue.key.as_str(), nodes[0].level), ("POW-1", 0));
        }
        prop_assert_eq!((nodes[offset].issue.key.as_str(), nodes[offset].level), ("POW-2", 1));
        prop_assert_eq!(&nodes[offset + 1].issue.id, &format!("sub-{}", focus_index));

        let mut ids: Vec<_> = nodes[offset + 1..].iter().map(|n| n.issue.id.clone()).collect();
        prop_assert!(nodes[offset + 1..].iter().all(|n| n.level == 2));
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), sibling_count);
    }
}

// Property 3: breadcrumbs always end with the focus key as the only
// terminal segment, whatever ancestors are reachable
proptest! {
    #[test]
    fn prop_breadcrumbs_end_at_focus(
        links in prop::collection::vec((link_strategy(), work_type_strategy()), 1..8),
        pick in 0usize..8
    ) {
        let (storage, _) = epic_store(&links);
        let focus_key = format!("POW-{}", pick % links.len() + 2);
        let trail = block_on(
            HierarchyResolver::new(storage).resolve_breadcrumbs(&IssueRef::key(focus_key.clone()))
        ).unwrap();

        prop_assert!(trail.len() <= 4);
        prop_assert_eq!(trail.last().map(|b| b.label.as_str()), Some(focus_key.as_str()));
        prop_assert_eq!(trail.iter().filter(|b| b.is_terminal()).count(), 1);
        let linked = !matches!(links[pick % links.len()].0, Link::Unrelated);
        prop_assert_eq!(trail.iter().any(|b| b.label == "POW-1"), linked);
    }
}

// Property 4: resolving the same focus twice gives the same tree
proptest! {
    #[test]
    fn prop_tree_is_idempotent(
        links in prop::collection::vec((link_strategy(), work_type_strategy()), 1..8),
        pick in 0usize..9
    ) {
        let (storage, _) = epic_store(&links);
        let resolver = HierarchyResolver::new(storage);
        let focus = IssueRef::key(format!("POW-{}", pick % (links.len() + 1) + 1));

        let first = block_on(resolver.resolve_tree(&focus)).unwrap();
        let second = block_on(resolver.resolve_tree(&focus)).unwrap();
        prop_assert_eq!(first, second);
    }
}
