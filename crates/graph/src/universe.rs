//! Universe - hash-consed node storage
//!
//! Nodes live in an append-only arena addressed by [`NodeId`]. The interner maps
//! each structural signature (operator + child ids) to the single node carrying
//! it, so id equality is structural equality. Children must be registered before
//! their parent, which keeps every child id smaller than its parent's and rules
//! out cycles.

use crate::errors::{GraphError, Result};
use crate::operator::Operator;
use crate::value::ValueType;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Lightweight handle to a node in the universe
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub type Children = SmallVec<[NodeId; 2]>;

/// Immutable node record
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub op: Operator,
    pub children: Children,
    pub ty: ValueType,
    /// Number of nested operator applications; inputs are at depth 0
    pub depth: u32,
}

impl Node {
    pub fn is_input(&self) -> bool {
        self.op.is_input()
    }
}

/// Type and depth of a registered node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeHeader {
    pub ty: ValueType,
    pub depth: u32,
}

/// Anything that can hand out canonical nodes.
///
/// Implemented by [`Universe`] for exclusive use and by `&SharedUniverse` for
/// concurrent search branches.
pub trait NodeFactory {
    fn header(&self, id: NodeId) -> Option<NodeHeader>;
    fn canonicalize(&mut self, op: Operator, children: &[NodeId]) -> Result<NodeId>;
}

#[derive(Clone, Debug, Default)]
pub struct Universe {
    nodes: Vec<Node>,
    interner: FxHashMap<(Operator, Children), NodeId>,
}

impl Universe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id).ok_or(GraphError::UnknownNode(id))
    }

    /// Returns the unique node for `op` applied to `children`, creating it on
    /// first request.
    pub fn canonicalize(&mut self, op: Operator, children: &[NodeId]) -> Result<NodeId> {
        let signature = op.signature();
        if children.len() != signature.args.len() {
            return Err(GraphError::StructuralViolation(format!(
                "{} expects {} arguments, got {}",
                op.name(),
                signature.args.len(),
                children.len()
            )));
        }

        let mut depth = 0;
        for (position, (&child, &expected)) in children.iter().zip(signature.args).enumerate() {
            let node = self.node(child)?;
            if node.ty != expected {
                return Err(GraphError::StructuralViolation(format!(
                    "{} argument {} must be {}, got {} from {}",
                    op.name(),
                    position,
                    expected,
                    node.ty,
                    child
                )));
            }
            depth = depth.max(node.depth + 1);
        }

        if let Operator::Stump { threshold } = op {
            if threshold.is_nan() {
                return Err(GraphError::StructuralViolation(
                    "stump threshold must not be NaN".to_string(),
                ));
            }
        }

        let key = (op, Children::from_slice(children));
        if let Some(&id) = self.interner.get(&key) {
            return Ok(id);
        }

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            op,
            children: key.1.clone(),
            ty: signature.result,
            depth,
        });
        self.interner.insert(key, id);
        Ok(id)
    }

    /// Input reference node for column `index`.
    pub fn input(&mut self, index: u32, ty: ValueType) -> NodeId {
        let key = (Operator::Input { index, ty }, Children::new());
        if let Some(&id) = self.interner.get(&key) {
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            op: key.0,
            children: Children::new(),
            ty,
            depth: 0,
        });
        self.interner.insert(key, id);
        id
    }

    /// Boolean stump `child <= threshold`.
    pub fn stump(&mut self, child: NodeId, threshold: f64) -> Result<NodeId> {
        self.canonicalize(Operator::Stump { threshold }, &[child])
    }

    /// Structural equality, decided by id thanks to interning.
    pub fn structural_eq(&self, a: NodeId, b: NodeId) -> bool {
        a == b
    }

    /// All nodes `id` depends on (itself included), children before parents.
    pub fn dependencies(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut order = Vec::new();
        let mut seen = rustc_hash::FxHashSet::default();
        let mut stack = vec![(id, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                order.push(current);
                continue;
            }
            if !seen.insert(current) {
                continue;
            }
            stack.push((current, true));
            for &child in self.node(current)?.children.iter().rev() {
                if !seen.contains(&child) {
                    stack.push((child, false));
                }
            }
        }
        Ok(order)
    }

    /// Human-readable expression, input `i` rendered as `names[i]` when given.
    pub fn describe(&self, id: NodeId, names: &[String]) -> String {
        let Some(node) = self.get(id) else {
            return format!("<unknown {}>", id);
        };
        match node.op {
            Operator::Input { index, .. } => names
                .get(index as usize)
                .cloned()
                .unwrap_or_else(|| format!("x{}", index)),
            Operator::Stump { threshold } => {
                format!("{} <= {}", self.describe(node.children[0], names), threshold)
            }
            op => {
                let args: Vec<String> = node
                    .children
                    .iter()
                    .map(|&child| self.describe(child, names))
                    .collect();
                format!("{}({})", op.name(), args.join(", "))
            }
        }
    }
}

impl NodeFactory for Universe {
    fn header(&self, id: NodeId) -> Option<NodeHeader> {
        self.get(id).map(|node| NodeHeader {
            ty: node.ty,
            depth: node.depth,
        })
    }

    fn canonicalize(&mut self, op: Operator, children: &[NodeId]) -> Result<NodeId> {
        Universe::canonicalize(self, op, children)
    }
}

/// Universe behind a single lock, for concurrent canonicalization.
#[derive(Default)]
pub struct SharedUniverse {
    inner: Mutex<Universe>,
}

impl SharedUniverse {
    pub fn new(universe: Universe) -> Self {
        Self {
            inner: Mutex::new(universe),
        }
    }

    pub fn into_inner(self) -> Universe {
        self.inner.into_inner()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl NodeFactory for &SharedUniverse {
    fn header(&self, id: NodeId) -> Option<NodeHeader> {
        self.inner.lock().header(id)
    }

    fn canonicalize(&mut self, op: Operator, children: &[NodeId]) -> Result<NodeId> {
        self.inner.lock().canonicalize(op, children)
    }
}
