//! The UCT tree's arena (C5, spec §3.3 / §9's redesign of the source's
//! object graph): nodes are left-child/right-sibling and addressed by
//! integer handles rather than `Rc<RefCell<...>>`, generalizing
//! `tree_search_v2/tree_node_pool.rs`'s `TreeNodePool` pattern. Pruning
//! is a free-list push; there is no `detach_from_tree` method that
//! walks live references, only handle bookkeeping.

use crate::game::{Move, Score, NULL_MOVE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle(pub(super) usize);

#[derive(Debug, Clone)]
pub struct UctNode {
    pub parent: Option<NodeHandle>,
    pub child: Option<NodeHandle>,
    pub sibling: Option<NodeHandle>,
    pub hash: u64,
    pub mv: Move,
    pub cursor: i64,
    pub reset_cursor: i64,
    pub expanded: bool,
    pub terminal: bool,
    pub count: u64,
    /// Mean value in the mover's frame at this node.
    pub score: f64,
}

impl UctNode {
    pub fn new(parent: Option<NodeHandle>, hash: u64, mv: Move, cursor: i64) -> Self {
        UctNode {
            parent,
            child: None,
            sibling: None,
            hash,
            mv,
            cursor,
            reset_cursor: cursor,
            expanded: false,
            terminal: false,
            count: 0,
            score: 0.0,
        }
    }

    pub fn root(hash: u64, cursor: i64) -> Self {
        UctNode::new(None, hash, NULL_MOVE, cursor)
    }

    pub fn init_score(&mut self, v: f64) {
        self.score = v;
        self.count = 1;
    }

    pub fn update_score(&mut self, v: f64) {
        self.count += 1;
        self.score += (v - self.score) / self.count as f64;
    }

    pub fn settle_score(&mut self, v: f64) {
        self.terminal = true;
        self.score = v;
        self.count += 1;
    }

    /// UCB1 selection priority given the parent's visit count and the
    /// exploration bias scale `b = exploration_bias * max_score`.
    pub fn priority(&self, parent_count: u64, b: f64) -> f64 {
        if self.count == 0 {
            return f64::INFINITY;
        }
        (parent_count.max(1) as f64).ln().max(0.0).sqrt() / (self.count as f64).sqrt() * b
            + self.score
    }

    /// Display/best-child score (spec §4.3): `score + maxScore / sqrt(count)`.
    pub fn display_score(&self, max_score: Score) -> f64 {
        self.score + max_score as f64 / (self.count.max(1) as f64).sqrt()
    }
}

/// Fixed-capacity arena of `UctNode`s, addressed by `NodeHandle`.
pub struct NodePool {
    nodes: Vec<Option<UctNode>>,
    free: Vec<usize>,
    capacity: usize,
    allocated: usize,
}

impl NodePool {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity);
        nodes.resize_with(capacity, || None);
        NodePool {
            nodes,
            free: (0..capacity).rev().collect(),
            capacity,
            allocated: 0,
        }
    }

    pub fn alloc(&mut self, node: UctNode) -> Option<NodeHandle> {
        let index = self.free.pop()?;
        self.nodes[index] = Some(node);
        self.allocated += 1;
        Some(NodeHandle(index))
    }

    pub fn get(&self, handle: NodeHandle) -> &UctNode {
        self.nodes[handle.0]
            .as_ref()
            .expect("dangling NodeHandle")
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> &mut UctNode {
        self.nodes[handle.0]
            .as_mut()
            .expect("dangling NodeHandle")
    }

    /// Returns `handle` and everything reachable from it to the free
    /// list. Does not unlink `handle` from its parent/sibling chain;
    /// callers must do that first.
    pub fn free_subtree(&mut self, handle: NodeHandle) {
        let mut stack = vec![handle];
        while let Some(h) = stack.pop() {
            let (child, sibling) = {
                let node = self.nodes[h.0].take().expect("dangling NodeHandle");
                (node.child, node.sibling)
            };
            self.free.push(h.0);
            self.allocated -= 1;
            if let Some(c) = child {
                stack.push(c);
            }
            if let Some(s) = sibling {
                stack.push(s);
            }
        }
    }

    /// Appends `child` as the first child of `parent`, linking it into
    /// the existing sibling chain.
    pub fn push_child(&mut self, parent: NodeHandle, child: NodeHandle) {
        let old_first = self.get(parent).child;
        self.get_mut(child).sibling = old_first;
        self.get_mut(parent).child = Some(child);
    }

    /// Children of `node`, left to right.
    pub fn children(&self, node: NodeHandle) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        let mut cur = self.get(node).child;
        while let Some(h) = cur {
            out.push(h);
            cur = self.get(h).sibling;
        }
        out
    }

    pub fn clear(&mut self) {
        for slot in self.nodes.iter_mut() {
            *slot = None;
        }
        self.free = (0..self.capacity).rev().collect();
        self.allocated = 0;
    }

    pub fn len(&self) -> usize {
        self.allocated
    }

    pub fn is_empty(&self) -> bool {
        self.allocated == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.allocated == self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_mean_matches_manual_average() {
        let mut n = UctNode::root(0, 0);
        n.init_score(2.0);
        n.update_score(4.0);
        n.update_score(6.0);
        assert!((n.score - 4.0).abs() < 1e-9);
        assert_eq!(n.count, 3);
    }

    #[test]
    fn prove_via_settle_when_all_children_mirror() {
        let mut pool = NodePool::with_capacity(4);
        let root = pool.alloc(UctNode::root(1, 0)).unwrap();
        let a = pool.alloc(UctNode::new(Some(root), 2, 0, 0)).unwrap();
        let b = pool.alloc(UctNode::new(Some(root), 3, 1, 0)).unwrap();
        pool.push_child(root, a);
        pool.push_child(root, b);
        pool.get_mut(a).settle_score(-5.0);
        pool.get_mut(b).settle_score(-5.0);

        let children = pool.children(root);
        let all_mirror = children
            .iter()
            .all(|&c| pool.get(c).terminal && pool.get(c).score == -5.0);
        assert!(all_mirror);
        pool.get_mut(root).settle_score(5.0);
        assert!(pool.get(root).terminal);
        assert_eq!(pool.get(root).score, 5.0);
    }

    #[test]
    fn free_subtree_reclaims_all_descendants() {
        let mut pool = NodePool::with_capacity(4);
        let root = pool.alloc(UctNode::root(1, 0)).unwrap();
        let a = pool.alloc(UctNode::new(Some(root), 2, 0, 0)).unwrap();
        pool.push_child(root, a);
        assert_eq!(pool.len(), 2);
        pool.free_subtree(a);
        assert_eq!(pool.len(), 1);
        assert!(!pool.is_full());
    }
}
