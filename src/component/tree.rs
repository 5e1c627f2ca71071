//! Tree operations: insert, remove, walk, find by id.

use std::collections::VecDeque;

use slotmap::{SecondaryMap, SlotMap};

use super::node::{ComponentData, ComponentId};

/// Empty slice constant for returning when a component has no children.
const EMPTY_CHILDREN: &[ComponentId] = &[];

/// The live component tree, backed by a slotmap arena.
///
/// Parent/child relationships are stored in secondary maps so that removal
/// is O(subtree size) and lookup is O(1). Parents own their children:
/// removing a component removes its whole subtree.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: SlotMap<ComponentId, ComponentData>,
    children: SecondaryMap<ComponentId, Vec<ComponentId>>,
    parent: SecondaryMap<ComponentId, ComponentId>,
    root: Option<ComponentId>,
}

impl Tree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            children: SecondaryMap::new(),
            parent: SecondaryMap::new(),
            root: None,
        }
    }

    /// Insert a parentless component. The first one becomes the root.
    pub fn insert(&mut self, data: ComponentData) -> ComponentId {
        let id = self.nodes.insert(data);
        self.children.insert(id, Vec::new());
        if self.root.is_none() {
            self.root = Some(id);
        }
        id
    }

    /// Insert a component as the last child of `parent`.
    ///
    /// Returns `None` if `parent` does not exist.
    pub fn insert_child(&mut self, parent: ComponentId, data: ComponentData) -> Option<ComponentId> {
        if !self.nodes.contains_key(parent) {
            return None;
        }
        let id = self.nodes.insert(data);
        self.children.insert(id, Vec::new());
        self.parent.insert(id, parent);
        self.children.get_mut(parent)?.push(id);
        Some(id)
    }

    /// Remove a component and all its descendants.
    ///
    /// Returns every removed component with its data, the subtree root first.
    pub fn remove(&mut self, id: ComponentId) -> Vec<(ComponentId, ComponentData)> {
        if !self.nodes.contains_key(id) {
            return Vec::new();
        }

        if let Some(parent_id) = self.parent.remove(id) {
            if let Some(siblings) = self.children.get_mut(parent_id) {
                siblings.retain(|&child| child != id);
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }

        let mut to_remove = VecDeque::from([id]);
        let mut removed = Vec::new();
        while let Some(current) = to_remove.pop_front() {
            if let Some(kids) = self.children.remove(current) {
                to_remove.extend(kids);
            }
            self.parent.remove(current);
            if let Some(data) = self.nodes.remove(current) {
                removed.push((current, data));
            }
        }
        removed
    }

    /// Get the parent of a component, if it has one.
    pub fn parent(&self, id: ComponentId) -> Option<ComponentId> {
        self.parent.get(id).copied()
    }

    /// Get the children of a component. Empty if it has none or does not exist.
    pub fn children(&self, id: ComponentId) -> &[ComponentId] {
        self.children
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY_CHILDREN)
    }

    pub fn get(&self, id: ComponentId) -> Option<&ComponentData> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: ComponentId) -> Option<&mut ComponentData> {
        self.nodes.get_mut(id)
    }

    /// The current root component, if set.
    pub fn root(&self) -> Option<ComponentId> {
        self.root
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Pre-order depth-first traversal starting from `start`.
    pub fn walk_depth_first(&self, start: ComponentId) -> Vec<ComponentId> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            result.push(current);
            // Reversed so the first child is visited first.
            for &child in self.children(current).iter().rev() {
                stack.push(child);
            }
        }
        result
    }

    /// Breadth-first traversal starting from `start`.
    fn walk_breadth_first(&self, start: ComponentId) -> Vec<ComponentId> {
        let mut result = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            result.push(current);
            queue.extend(self.children(current).iter().copied());
        }
        result
    }

    /// The nearest descendant of `start` (excluding `start`) with the given id.
    pub fn find_descendant(&self, start: ComponentId, id: &str) -> Option<ComponentId> {
        self.walk_breadth_first(start)
            .into_iter()
            .skip(1)
            .find(|&c| self.nodes.get(c).and_then(|n| n.id.as_deref()) == Some(id))
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a small test tree:
    /// ```text
    ///       root
    ///      /    \
    ///    a        b
    ///   / \
    ///  c   d
    /// ```
    fn build_tree() -> (Tree, ComponentId, ComponentId, ComponentId, ComponentId, ComponentId) {
        let mut tree = Tree::new();
        let root = tree.insert(ComponentData::new("Window").with_id("root"));
        let a = tree.insert_child(root, ComponentData::new("Panel").with_id("a")).unwrap();
        let b = tree.insert_child(root, ComponentData::new("Panel").with_id("b")).unwrap();
        let c = tree.insert_child(a, ComponentData::new("Button").with_id("c")).unwrap();
        let d = tree.insert_child(a, ComponentData::new("Label").with_id("d")).unwrap();
        (tree, root, a, b, c, d)
    }

    #[test]
    fn insert_sets_root() {
        let mut tree = Tree::new();
        let first = tree.insert(ComponentData::new("Root"));
        let _second = tree.insert(ComponentData::new("Other"));
        assert_eq!(tree.root(), Some(first));
    }

    #[test]
    fn parent_and_children() {
        let (tree, root, a, b, c, d) = build_tree();
        assert_eq!(tree.parent(c), Some(a));
        assert_eq!(tree.parent(root), None);
        assert_eq!(tree.children(root), &[a, b]);
        assert_eq!(tree.children(a), &[c, d]);
    }

    #[test]
    fn insert_child_of_missing_parent() {
        let (mut tree, _root, a, ..) = build_tree();
        tree.remove(a);
        assert!(tree.insert_child(a, ComponentData::new("X")).is_none());
    }

    #[test]
    fn remove_subtree_returns_all_data() {
        let (mut tree, root, a, b, c, d) = build_tree();
        let removed: Vec<ComponentId> = tree.remove(a).into_iter().map(|(id, _)| id).collect();
        assert_eq!(removed, vec![a, c, d]);
        assert!(!tree.contains(c));
        assert_eq!(tree.children(root), &[b]);
        assert!(!tree.contains(d));
        assert!(tree.remove(a).is_empty());
    }

    #[test]
    fn remove_root_clears_it() {
        let (mut tree, root, ..) = build_tree();
        tree.remove(root);
        assert!(!tree.contains(root));
        assert_eq!(tree.root(), None);
    }

    #[test]
    fn walks() {
        let (tree, root, a, b, c, d) = build_tree();
        assert_eq!(tree.walk_depth_first(root), vec![root, a, c, d, b]);
        assert_eq!(tree.walk_breadth_first(root), vec![root, a, b, c, d]);
        assert_eq!(tree.walk_depth_first(a), vec![a, c, d]);
    }

    #[test]
    fn find_descendant_skips_start() {
        let (tree, root, a, _b, c, _d) = build_tree();
        assert_eq!(tree.find_descendant(root, "c"), Some(c));
        assert_eq!(tree.find_descendant(root, "a"), Some(a));
        assert_eq!(tree.find_descendant(a, "a"), None);
        assert_eq!(tree.find_descendant(c, "root"), None);
    }
}
