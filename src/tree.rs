//! The dissection tree: labelled nodes carrying byte-range provenance.
//!
//! Engines only append. [`DissectionTree`] is an arena so node handles are
//! plain indices and the whole tree is dropped in one go on `clear`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a node in a [`DissectionTree`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A span of bytes in the source, used for highlighting and provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub length: u64,
}

impl ByteRange {
    pub fn new(start: u64, length: u64) -> Self {
        Self { start, length }
    }

    /// Exclusive end offset, `None` if it overflows.
    pub fn end(&self) -> Option<u64> {
        self.start.checked_add(self.length)
    }

    pub fn fits_within(&self, source_len: u64) -> bool {
        self.end().is_some_and(|end| end <= source_len)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}+{:#x}", self.start, self.length)
    }
}

/// Append-only sink that engines write their output into.
pub trait TreeSink {
    fn add_root(&mut self, label: &str) -> NodeId;
    fn append_child(&mut self, parent: NodeId, label: &str, ranges: Vec<ByteRange>) -> NodeId;
    fn set_ranges(&mut self, node: NodeId, ranges: Vec<ByteRange>);
    fn clear(&mut self);

    fn append_label(&mut self, parent: NodeId, label: &str) -> NodeId {
        self.append_child(parent, label, Vec::new())
    }

    fn append_range(&mut self, parent: NodeId, label: &str, start: u64, length: u64) -> NodeId {
        self.append_child(parent, label, vec![ByteRange::new(start, length)])
    }
}

/// A sink that keeps nothing. Used for parses whose output is only needed
/// as values, such as resolving an indirect `Length`.
#[derive(Debug, Default)]
pub struct DiscardSink;

impl TreeSink for DiscardSink {
    fn add_root(&mut self, _label: &str) -> NodeId {
        NodeId(0)
    }

    fn append_child(&mut self, _parent: NodeId, _label: &str, _ranges: Vec<ByteRange>) -> NodeId {
        NodeId(0)
    }

    fn set_ranges(&mut self, _node: NodeId, _ranges: Vec<ByteRange>) {}

    fn clear(&mut self) {}
}

/// Sink adapter that notes every range reaching past the end of the source.
///
/// Ranges are still forwarded unchanged; engines turn the recorded overruns
/// into diagnostics once they finish.
pub struct BoundedSink<'a> {
    inner: &'a mut dyn TreeSink,
    source_len: u64,
    overruns: Vec<(String, ByteRange)>,
}

impl<'a> BoundedSink<'a> {
    pub fn new(inner: &'a mut dyn TreeSink, source_len: u64) -> Self {
        Self {
            inner,
            source_len,
            overruns: Vec::new(),
        }
    }

    fn note(&mut self, label: &str, ranges: &[ByteRange]) {
        for r in ranges {
            if !r.fits_within(self.source_len) {
                self.overruns.push((label.to_string(), *r));
            }
        }
    }

    /// Labels and ranges that did not fit, in the order they were attached.
    pub fn into_overruns(self) -> Vec<(String, ByteRange)> {
        self.overruns
    }
}

impl TreeSink for BoundedSink<'_> {
    fn add_root(&mut self, label: &str) -> NodeId {
        self.inner.add_root(label)
    }

    fn append_child(&mut self, parent: NodeId, label: &str, ranges: Vec<ByteRange>) -> NodeId {
        self.note(label, &ranges);
        self.inner.append_child(parent, label, ranges)
    }

    fn set_ranges(&mut self, node: NodeId, ranges: Vec<ByteRange>) {
        self.note("(updated node)", &ranges);
        self.inner.set_ranges(node, ranges)
    }

    fn clear(&mut self) {
        self.overruns.clear();
        self.inner.clear()
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    label: String,
    ranges: Vec<ByteRange>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed dissection tree.
#[derive(Debug, Clone, Default)]
pub struct DissectionTree {
    nodes: Vec<NodeData>,
    roots: Vec<NodeId>,
}

impl DissectionTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn root(&self) -> Option<NodeId> {
        self.roots.first().copied()
    }

    pub fn label(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).map(|n| n.label.as_str())
    }

    pub fn ranges(&self, node: NodeId) -> &[ByteRange] {
        self.nodes.get(node.0).map_or(&[], |n| n.ranges.as_slice())
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes.get(node.0).map_or(&[], |n| n.children.as_slice())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    pub fn child_labels(&self, node: NodeId) -> Vec<&str> {
        self.children(node)
            .iter()
            .filter_map(|&c| self.label(c))
            .collect()
    }

    pub fn find_child(&self, parent: NodeId, label: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| self.label(c) == Some(label))
    }

    pub fn find_child_prefix(&self, parent: NodeId, prefix: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| self.label(c).is_some_and(|l| l.starts_with(prefix)))
    }

    /// Follow exact labels from the first root; the first element names the root.
    pub fn find_path(&self, path: &[&str]) -> Option<NodeId> {
        let (first, rest) = path.split_first()?;
        let mut node = self
            .roots
            .iter()
            .copied()
            .find(|&r| self.label(r) == Some(*first))?;
        for label in rest {
            node = self.find_child(node, label)?;
        }
        Some(node)
    }

    /// All nodes below `node` in pre-order, excluding `node` itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    /// Nested, serializable copy of the tree.
    pub fn snapshot(&self) -> Vec<TreeSnapshot> {
        self.roots.iter().map(|&r| self.snapshot_node(r)).collect()
    }

    fn snapshot_node(&self, root: NodeId) -> TreeSnapshot {
        // Children always have larger ids than their parent, so building
        // bottom-up over the subtree is enough to avoid native recursion.
        let mut order = vec![root];
        order.extend(self.descendants(root));
        let mut built: std::collections::HashMap<NodeId, TreeSnapshot> =
            std::collections::HashMap::with_capacity(order.len());
        for &id in order.iter().rev() {
            let data = &self.nodes[id.0];
            let children = data
                .children
                .iter()
                .filter_map(|c| built.remove(c))
                .collect();
            built.insert(
                id,
                TreeSnapshot {
                    label: data.label.clone(),
                    ranges: data.ranges.clone(),
                    children,
                },
            );
        }
        built.remove(&root).unwrap_or_default()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

impl TreeSink for DissectionTree {
    fn add_root(&mut self, label: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            label: label.to_string(),
            ranges: Vec::new(),
            parent: None,
            children: Vec::new(),
        });
        self.roots.push(id);
        id
    }

    fn append_child(&mut self, parent: NodeId, label: &str, ranges: Vec<ByteRange>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = self.nodes.get(parent.0).map(|_| parent);
        self.nodes.push(NodeData {
            label: label.to_string(),
            ranges,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(p) => self.nodes[p.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    fn set_ranges(&mut self, node: NodeId, ranges: Vec<ByteRange>) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.ranges = ranges;
        }
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }
}

/// Owned, nested form of a subtree for serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub label: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ranges: Vec<ByteRange>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<TreeSnapshot>,
}
