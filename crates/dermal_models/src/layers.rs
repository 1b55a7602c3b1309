//! Layer tree and explainable-layer location.
//!
//! The model graph is described as an arena of [`LayerNode`]s addressed by
//! index, so lookups never depend on live layer object identity. Nested
//! sub-modules appear as [`LayerKind::Block`] nodes with children.

use serde::{Deserialize, Serialize};

/// Index of a node within a [`LayerTree`] arena.
pub type NodeId = usize;

/// Layer family, coarse enough to drive explainability decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerKind {
    /// Plain 2-D convolution.
    Conv,
    /// Depthwise convolution (groups == channels).
    DepthwiseConv,
    /// Depthwise-separable convolution.
    SeparableConv,
    /// Batch normalization.
    BatchNorm,
    /// Pooling layer.
    Pool,
    /// Fully-connected layer.
    Dense,
    /// A nested sub-module containing other layers.
    Block,
}

impl LayerKind {
    /// Whether this layer produces class-discriminative spatial feature maps
    /// suitable for gradient-based explanation.
    #[must_use]
    pub const fn is_convolutional(&self) -> bool {
        matches!(self, Self::Conv | Self::DepthwiseConv | Self::SeparableConv)
    }
}

/// One layer in the model graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerNode {
    /// Full dotted path of the layer, e.g. `block3.dwconv`.
    pub name: String,
    /// Layer family.
    pub kind: LayerKind,
    /// Child node indices (non-empty only for [`LayerKind::Block`]).
    pub children: Vec<NodeId>,
}

/// Reference to a target layer by name.
///
/// Resolved to a node only at use time, never cached across model reloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRef(String);

impl LayerRef {
    /// Create a reference from a layer path.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The referenced layer path.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LayerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Arena-backed description of a (possibly nested) model graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerTree {
    nodes: Vec<LayerNode>,
    roots: Vec<NodeId>,
}

impl LayerTree {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level leaf layer. Returns its node id.
    pub fn push_root(&mut self, name: impl Into<String>, kind: LayerKind) -> NodeId {
        let id = self.push_node(name, kind);
        self.roots.push(id);
        id
    }

    /// Add a top-level block with the given children. Returns its node id.
    pub fn push_root_block(&mut self, name: impl Into<String>, children: Vec<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(LayerNode {
            name: name.into(),
            kind: LayerKind::Block,
            children,
        });
        self.roots.push(id);
        id
    }

    /// Add a detached leaf node (to be attached as a block child).
    pub fn push_node(&mut self, name: impl Into<String>, kind: LayerKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(LayerNode {
            name: name.into(),
            kind,
            children: Vec::new(),
        });
        id
    }

    /// Get a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&LayerNode> {
        self.nodes.get(id)
    }

    /// Number of nodes in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level node ids in forward-execution order.
    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Depth-first name lookup through nested blocks.
    ///
    /// Returns `None` if the name is absent; callers on the explanation path
    /// treat that as fatal for the explanation only.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<NodeId> {
        fn walk(tree: &LayerTree, ids: &[NodeId], name: &str) -> Option<NodeId> {
            for &id in ids {
                let node = &tree.nodes[id];
                if node.name == name {
                    return Some(id);
                }
                if let Some(found) = walk(tree, &node.children, name) {
                    return Some(found);
                }
            }
            None
        }
        walk(self, &self.roots, name)
    }

    /// All node names in depth-first execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        fn walk<'a>(tree: &'a LayerTree, ids: &[NodeId], out: &mut Vec<&'a str>) {
            for &id in ids {
                let node = &tree.nodes[id];
                out.push(node.name.as_str());
                walk(tree, &node.children, out);
            }
        }
        let mut out = Vec::with_capacity(self.nodes.len());
        walk(self, &self.roots, &mut out);
        out
    }
}

/// Late-stage block identifiers used by the name-based fallback when no
/// convolutional layer is found by kind.
const LATE_STAGE_HINTS: [&str; 3] = ["top_conv", "block7", "block6"];

/// Find the most output-proximal convolutional layer in the tree.
///
/// Traverses in reverse execution order and short-circuits on the first
/// convolutional-family node, which is equivalent to recording the last one
/// seen in a full forward traversal. Falls back to a name heuristic matching
/// known late-stage block identifiers. `None` means explanation is
/// unavailable; classification proceeds without it.
#[must_use]
pub fn find_explainable_layer(tree: &LayerTree) -> Option<LayerRef> {
    fn walk_rev(tree: &LayerTree, ids: &[NodeId]) -> Option<NodeId> {
        for &id in ids.iter().rev() {
            let node = tree.node(id)?;
            if node.kind.is_convolutional() {
                return Some(id);
            }
            if let Some(found) = walk_rev(tree, &node.children) {
                return Some(found);
            }
        }
        None
    }

    if let Some(id) = walk_rev(tree, tree.roots()) {
        return tree.node(id).map(|n| LayerRef::new(n.name.clone()));
    }

    // Name heuristic for architectures whose conv kinds were erased.
    for &id in tree.roots() {
        let node = tree.node(id)?;
        if LATE_STAGE_HINTS.iter().any(|h| node.name.contains(h)) {
            return Some(LayerRef::new(node.name.clone()));
        }
    }

    None
}
