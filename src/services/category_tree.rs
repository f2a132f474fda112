//! Builds the collapsible category tree shown on the categories page.
//!
//! The flat list loaded from storage stays the source of truth. Every request
//! derives the tree from it again, together with the search term and the set
//! of expanded category ids supplied by the page.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::domain::category::{Category, CategoryTreeNode};

/// Identifiers of the categories whose children are currently shown.
pub type ExpandedSet = BTreeSet<i32>;

/// Keep the categories matching `search_term` together with all of their
/// ancestors and descendants.
///
/// Matching is a case-insensitive substring test on the name and the
/// description. An empty term returns the input unchanged; any other term,
/// whitespace included, is matched as given. The relative order of the input
/// is preserved.
pub fn filter_by_search(categories: &[Category], search_term: &str) -> Vec<Category> {
    let term = search_term.to_lowercase();
    if term.is_empty() {
        return categories.to_vec();
    }

    let matches: Vec<i32> = categories
        .iter()
        .filter(|category| matches_term(category, &term))
        .map(|category| category.id)
        .collect();

    if matches.is_empty() {
        return Vec::new();
    }

    let mut by_id: HashMap<i32, &Category> = HashMap::with_capacity(categories.len());
    let mut children_by_parent: HashMap<i32, Vec<i32>> = HashMap::new();
    for category in categories {
        by_id.entry(category.id).or_insert(category);
        if let Some(parent_id) = category.parent_id {
            children_by_parent
                .entry(parent_id)
                .or_default()
                .push(category.id);
        }
    }

    let mut included: HashSet<i32> = HashSet::new();

    for &id in &matches {
        included.insert(id);
        for ancestor in ancestors(id, &by_id) {
            if !included.insert(ancestor) {
                break;
            }
        }
    }

    let mut descended: HashSet<i32> = HashSet::new();
    let mut stack = matches;
    while let Some(id) = stack.pop() {
        if !descended.insert(id) {
            continue;
        }
        included.insert(id);
        if let Some(children) = children_by_parent.get(&id) {
            stack.extend(children.iter().copied());
        }
    }

    categories
        .iter()
        .filter(|category| included.contains(&category.id))
        .cloned()
        .collect()
}

/// Nest the flat list into a tree.
///
/// Children keep the order of the flat list. A category whose parent is
/// missing from the list, or which names itself as parent, becomes a root. In
/// a parent cycle that no root leads to, the first member in list order is
/// promoted to a root. Every id appears exactly once; duplicates after the
/// first occurrence are ignored.
pub fn build_tree(categories: &[Category], expanded: &ExpandedSet) -> Vec<CategoryTreeNode> {
    let mut seen = HashSet::with_capacity(categories.len());
    let unique: Vec<&Category> = categories
        .iter()
        .filter(|category| seen.insert(category.id))
        .collect();

    let parents: HashMap<i32, Option<i32>> = unique
        .iter()
        .map(|category| {
            let parent_id = category
                .parent_id
                .filter(|parent_id| *parent_id != category.id && seen.contains(parent_id));
            (category.id, parent_id)
        })
        .collect();
    let effective_parent = |category: &Category| parents.get(&category.id).copied().flatten();

    let mut grouped: HashMap<Option<i32>, Vec<&Category>> = HashMap::new();
    for &category in &unique {
        grouped
            .entry(effective_parent(category))
            .or_default()
            .push(category);
    }

    let mut reachable = HashSet::with_capacity(unique.len());
    mark_reachable(None, &grouped, &mut reachable);

    let position: HashMap<i32, usize> = unique
        .iter()
        .enumerate()
        .map(|(index, category)| (category.id, index))
        .collect();

    let mut promoted = HashSet::new();
    for category in &unique {
        if reachable.contains(&category.id) {
            continue;
        }
        let root = first_cycle_member(category.id, &parents, &position).unwrap_or(category.id);
        log::warn!("category {root} is part of a parent cycle, showing it as a root");
        promoted.insert(root);
        reachable.insert(root);
        mark_reachable(Some(root), &grouped, &mut reachable);
    }

    let branch = Branch {
        grouped: &grouped,
        promoted: &promoted,
        expanded,
    };

    unique
        .iter()
        .copied()
        .filter(|&category| {
            effective_parent(category).is_none() || promoted.contains(&category.id)
        })
        .map(|category| branch.node(category, 0))
        .collect()
}

/// Depth-first list of the nodes that are currently visible.
///
/// Children of a node are listed only when the node is expanded, so a
/// collapsed node hides its whole subtree whatever the expansion state below.
pub fn flatten_visible(tree: &[CategoryTreeNode]) -> Vec<&CategoryTreeNode> {
    let mut visible = Vec::new();
    push_visible(tree, &mut visible);
    visible
}

/// Return a copy of `expanded` with `category_id` toggled.
pub fn toggle_expansion(expanded: &ExpandedSet, category_id: i32) -> ExpandedSet {
    let mut toggled = expanded.clone();
    if !toggled.remove(&category_id) {
        toggled.insert(category_id);
    }
    toggled
}

/// Ids of every node in the tree that has children.
pub fn expand_all(tree: &[CategoryTreeNode]) -> ExpandedSet {
    let mut expanded = ExpandedSet::new();
    let mut stack: Vec<&CategoryTreeNode> = tree.iter().collect();
    while let Some(node) = stack.pop() {
        if node.has_children() {
            expanded.insert(node.id());
            stack.extend(node.children.iter());
        }
    }
    expanded
}

/// Whether moving `category_id` under `new_parent_id` would make the category
/// its own ancestor.
pub fn would_create_cycle(
    categories: &[Category],
    category_id: i32,
    new_parent_id: Option<i32>,
) -> bool {
    let Some(new_parent_id) = new_parent_id else {
        return false;
    };
    if new_parent_id == category_id {
        return true;
    }

    let by_id: HashMap<i32, &Category> = categories
        .iter()
        .rev()
        .map(|category| (category.id, category))
        .collect();

    std::iter::once(new_parent_id)
        .chain(ancestors(new_parent_id, &by_id))
        .any(|id| id == category_id)
}

fn matches_term(category: &Category, term: &str) -> bool {
    category.name.to_lowercase().contains(term)
        || category
            .description
            .as_deref()
            .is_some_and(|description| description.to_lowercase().contains(term))
}

/// Parent chain of `id`, nearest first. Stops at a root, at a parent missing
/// from `by_id`, or when the chain loops.
fn ancestors(id: i32, by_id: &HashMap<i32, &Category>) -> Vec<i32> {
    let mut chain = Vec::new();
    let mut visited = HashSet::from([id]);
    let mut current = by_id.get(&id).and_then(|category| category.parent_id);

    while let Some(parent_id) = current {
        if !visited.insert(parent_id) {
            break;
        }
        let Some(parent) = by_id.get(&parent_id) else {
            break;
        };
        chain.push(parent_id);
        current = parent.parent_id;
    }

    chain
}

/// Follow the parent chain from `start` until it loops and return the loop
/// member listed first. `None` when the chain reaches a root.
fn first_cycle_member(
    start: i32,
    parents: &HashMap<i32, Option<i32>>,
    position: &HashMap<i32, usize>,
) -> Option<i32> {
    let mut path = Vec::new();
    let mut index_in_path: HashMap<i32, usize> = HashMap::new();
    let mut current = Some(start);

    while let Some(id) = current {
        if let Some(&at) = index_in_path.get(&id) {
            return path[at..]
                .iter()
                .copied()
                .min_by_key(|member| position.get(member).copied().unwrap_or(usize::MAX));
        }
        index_in_path.insert(id, path.len());
        path.push(id);
        current = parents.get(&id).copied().flatten();
    }

    None
}

fn mark_reachable(
    start: Option<i32>,
    grouped: &HashMap<Option<i32>, Vec<&Category>>,
    reachable: &mut HashSet<i32>,
) {
    let mut stack = vec![start];
    while let Some(parent) = stack.pop() {
        if let Some(children) = grouped.get(&parent) {
            for child in children {
                if reachable.insert(child.id) {
                    stack.push(Some(child.id));
                }
            }
        }
    }
}

struct Branch<'a> {
    grouped: &'a HashMap<Option<i32>, Vec<&'a Category>>,
    promoted: &'a HashSet<i32>,
    expanded: &'a ExpandedSet,
}

impl Branch<'_> {
    fn node(&self, category: &Category, level: usize) -> CategoryTreeNode {
        let children = match self.grouped.get(&Some(category.id)) {
            Some(children) => children
                .iter()
                .filter(|child| !self.promoted.contains(&child.id))
                .map(|child| self.node(child, level + 1))
                .collect(),
            None => Vec::new(),
        };

        CategoryTreeNode::new(category.clone(), level)
            .with_children(children)
            .expanded(self.expanded.contains(&category.id))
    }
}

fn push_visible<'a>(nodes: &'a [CategoryTreeNode], visible: &mut Vec<&'a CategoryTreeNode>) {
    for node in nodes {
        visible.push(node);
        if node.is_expanded && node.has_children() {
            push_visible(&node.children, visible);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    use crate::domain::category::CategoryStatus;

    fn category(id: i32, name: &str, parent_id: Option<i32>) -> Category {
        Category {
            id,
            hub_id: 1,
            parent_id,
            name: name.to_string(),
            description: None,
            status: CategoryStatus::Active,
            products_count: 0,
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
        }
    }

    fn sample() -> Vec<Category> {
        vec![
            category(1, "Ropa", None),
            category(2, "Camisetas", Some(1)),
            category(3, "Zapatos", None),
        ]
    }

    fn ids(nodes: &[&CategoryTreeNode]) -> Vec<i32> {
        nodes.iter().map(|node| node.id()).collect()
    }

    fn all_ids(tree: &[CategoryTreeNode]) -> Vec<i32> {
        let everything = expand_all(tree);
        let mut rebuilt = Vec::new();
        fn walk(nodes: &[CategoryTreeNode], out: &mut Vec<i32>) {
            for node in nodes {
                out.push(node.id());
                walk(&node.children, out);
            }
        }
        walk(tree, &mut rebuilt);
        assert!(everything.iter().all(|id| rebuilt.contains(id)));
        rebuilt
    }

    #[test]
    fn collapsed_tree_shows_only_roots() {
        let tree = build_tree(&sample(), &ExpandedSet::new());

        let visible = flatten_visible(&tree);

        assert_eq!(ids(&visible), vec![1, 3]);
        assert!(visible.iter().all(|node| node.level == 0));
        assert!(!visible[0].is_expanded);
    }

    #[test]
    fn expanded_root_shows_its_children() {
        let tree = build_tree(&sample(), &ExpandedSet::from([1]));

        let visible = flatten_visible(&tree);

        assert_eq!(ids(&visible), vec![1, 2, 3]);
        assert!(visible[0].is_expanded);
        assert_eq!(visible[1].level, 1);
        assert_eq!(visible[1].category.name, "Camisetas");
        assert_eq!(visible[2].level, 0);
    }

    #[test]
    fn search_keeps_ancestors_of_matches() {
        let filtered = filter_by_search(&sample(), "camis");

        let names: Vec<&str> = filtered.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Ropa", "Camisetas"]);
    }

    #[test]
    fn dangling_parent_becomes_root() {
        let mut categories = sample();
        categories.push(category(5, "Huérfano", Some(99)));

        let tree = build_tree(&categories, &ExpandedSet::new());

        let orphan = tree
            .iter()
            .find(|node| node.id() == 5)
            .expect("orphan should be a root");
        assert_eq!(orphan.level, 0);
        assert_eq!(ids(&flatten_visible(&tree)), vec![1, 3, 5]);
    }

    #[test]
    fn toggle_adds_and_removes() {
        let expanded = ExpandedSet::from([1, 2]);

        let collapsed = toggle_expansion(&expanded, 2);
        assert_eq!(collapsed, ExpandedSet::from([1]));

        let reopened = toggle_expansion(&collapsed, 2);
        assert_eq!(reopened, ExpandedSet::from([1, 2]));
    }

    #[test]
    fn toggle_twice_is_identity() {
        let expanded = ExpandedSet::from([4, 8, 15]);

        for id in [4, 16, 23] {
            assert_eq!(toggle_expansion(&toggle_expansion(&expanded, id), id), expanded);
        }
    }

    #[test]
    fn every_category_appears_exactly_once() {
        let categories = vec![
            category(10, "A", None),
            category(11, "A1", Some(10)),
            category(12, "A1a", Some(11)),
            category(13, "B", None),
            category(14, "B1", Some(13)),
            category(15, "Lost", Some(404)),
        ];

        let tree = build_tree(&categories, &ExpandedSet::new());

        let mut found = all_ids(&tree);
        found.sort();
        assert_eq!(found, vec![10, 11, 12, 13, 14, 15]);
    }

    #[test]
    fn children_sit_under_their_parent_in_input_order() {
        let categories = vec![
            category(1, "Root", None),
            category(4, "Zeta", Some(1)),
            category(2, "Alpha", Some(1)),
            category(3, "Mid", Some(1)),
        ];

        let tree = build_tree(&categories, &ExpandedSet::new());

        assert_eq!(tree.len(), 1);
        let child_ids: Vec<i32> = tree[0].children.iter().map(|c| c.id()).collect();
        assert_eq!(child_ids, vec![4, 2, 3]);
        assert!(tree[0].children.iter().all(|child| child.level == 1));
    }

    #[test]
    fn child_listed_before_parent_is_still_nested() {
        let categories = vec![category(2, "Child", Some(1)), category(1, "Parent", None)];

        let tree = build_tree(&categories, &ExpandedSet::new());

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id(), 1);
        assert_eq!(tree[0].children[0].id(), 2);
    }

    #[test]
    fn collapsed_parent_hides_expanded_descendants() {
        let categories = vec![
            category(1, "Root", None),
            category(2, "Child", Some(1)),
            category(3, "Grandchild", Some(2)),
        ];

        let tree = build_tree(&categories, &ExpandedSet::from([2]));

        assert_eq!(ids(&flatten_visible(&tree)), vec![1]);
        assert!(tree[0].children[0].is_expanded);

        let tree = build_tree(&categories, &ExpandedSet::from([1, 2]));
        let visible = flatten_visible(&tree);
        assert_eq!(ids(&visible), vec![1, 2, 3]);
        assert_eq!(visible[2].level, 2);
    }

    #[test]
    fn expanding_a_leaf_changes_nothing() {
        let tree = build_tree(&sample(), &ExpandedSet::from([3]));

        assert_eq!(ids(&flatten_visible(&tree)), vec![1, 3]);
    }

    #[test]
    fn search_includes_descendants_and_excludes_unrelated() {
        let categories = vec![
            category(1, "Inmuebles", None),
            category(2, "Casas", Some(1)),
            category(3, "Casas de playa", Some(2)),
            category(4, "Chalets", Some(3)),
            category(5, "Oficinas", Some(1)),
            category(6, "Excursiones", None),
        ];

        let filtered = filter_by_search(&categories, "playa");

        let found: Vec<i32> = filtered.iter().map(|c| c.id).collect();
        assert_eq!(found, vec![1, 2, 3, 4]);
    }

    #[test]
    fn search_matches_description_case_insensitively() {
        let mut categories = sample();
        categories[2].description = Some("Calzado de CUERO".to_string());

        let filtered = filter_by_search(&categories, "cuero");

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, 3);
    }

    #[test]
    fn search_handles_non_ascii_case() {
        let categories = vec![category(5, "Huérfano", None)];

        assert_eq!(filter_by_search(&categories, "HUÉR").len(), 1);
    }

    #[test]
    fn empty_search_returns_everything() {
        assert_eq!(filter_by_search(&sample(), ""), sample());
    }

    #[test]
    fn search_term_whitespace_is_significant() {
        let categories = vec![
            category(1, "Casas", None),
            category(2, "Casas de playa", None),
        ];

        let found: Vec<i32> = filter_by_search(&categories, "casas ")
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(found, vec![2]);

        assert!(filter_by_search(&[category(1, "Ropa", None)], " ").is_empty());
    }

    #[test]
    fn search_without_matches_is_empty() {
        assert!(filter_by_search(&sample(), "bicicletas").is_empty());
    }

    #[test]
    fn filtered_set_builds_a_connected_tree() {
        let categories = vec![
            category(1, "Tours", None),
            category(2, "Montaña", Some(1)),
            category(3, "Senderismo nocturno", Some(2)),
            category(4, "Playa", Some(1)),
        ];

        let filtered = filter_by_search(&categories, "nocturno");
        let tree = build_tree(&filtered, &ExpandedSet::new());

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id(), 1);
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].children[0].id(), 3);
    }

    #[test]
    fn search_terminates_on_parent_cycle() {
        let categories = vec![
            category(1, "Alpha", Some(2)),
            category(2, "Beta", Some(1)),
            category(3, "Gamma", Some(1)),
        ];

        let filtered = filter_by_search(&categories, "gamma");

        let found: Vec<i32> = filtered.iter().map(|c| c.id).collect();
        assert_eq!(found, vec![1, 2, 3]);
    }

    #[test]
    fn cycle_members_are_promoted_once() {
        let categories = vec![
            category(1, "Root", None),
            category(2, "Alpha", Some(3)),
            category(3, "Beta", Some(2)),
            category(4, "Under beta", Some(3)),
        ];

        let tree = build_tree(&categories, &ExpandedSet::new());

        let roots: Vec<i32> = tree.iter().map(|node| node.id()).collect();
        assert_eq!(roots, vec![1, 2]);
        let mut found = all_ids(&tree);
        found.sort();
        assert_eq!(found, vec![1, 2, 3, 4]);
    }

    #[test]
    fn cycle_descendant_listed_first_stays_under_its_parent() {
        let categories = vec![
            category(4, "Under beta", Some(3)),
            category(2, "Alpha", Some(3)),
            category(3, "Beta", Some(2)),
        ];

        let tree = build_tree(&categories, &ExpandedSet::new());

        let roots: Vec<i32> = tree.iter().map(|node| node.id()).collect();
        assert_eq!(roots, vec![2]);
        let beta = &tree[0].children;
        assert_eq!(beta.len(), 1);
        assert_eq!(beta[0].id(), 3);
        let under_beta: Vec<i32> = beta[0].children.iter().map(|c| c.id()).collect();
        assert_eq!(under_beta, vec![4]);
        assert_eq!(beta[0].children[0].level, 2);
    }

    #[test]
    fn self_parent_is_a_root() {
        let categories = vec![category(1, "Loop", Some(1))];

        let tree = build_tree(&categories, &ExpandedSet::from([1]));

        assert_eq!(tree.len(), 1);
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn duplicate_ids_keep_first_record() {
        let categories = vec![category(1, "First", None), category(1, "Second", None)];

        let tree = build_tree(&categories, &ExpandedSet::new());

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].category.name, "First");
    }

    #[test]
    fn build_is_deterministic() {
        let expanded = ExpandedSet::from([1]);

        assert_eq!(
            build_tree(&sample(), &expanded),
            build_tree(&sample(), &expanded)
        );
    }

    #[test]
    fn expand_all_collects_parents_only() {
        let categories = vec![
            category(1, "Root", None),
            category(2, "Child", Some(1)),
            category(3, "Grandchild", Some(2)),
            category(4, "Leaf", None),
        ];
        let tree = build_tree(&categories, &ExpandedSet::new());

        assert_eq!(expand_all(&tree), ExpandedSet::from([1, 2]));
    }

    #[test]
    fn cycle_detection_on_reparent() {
        let categories = vec![
            category(1, "Root", None),
            category(2, "Child", Some(1)),
            category(3, "Grandchild", Some(2)),
            category(4, "Other", None),
        ];

        assert!(would_create_cycle(&categories, 1, Some(3)));
        assert!(would_create_cycle(&categories, 2, Some(2)));
        assert!(!would_create_cycle(&categories, 3, Some(4)));
        assert!(!would_create_cycle(&categories, 2, None));
        assert!(!would_create_cycle(&categories, 4, Some(3)));
    }
}
