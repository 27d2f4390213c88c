//! Symbolic expression trees.
//!
//! An [`Expr`] is a cheaply clonable handle to an immutable expression node. Every node is
//! minted with a [`NodeId`] that is unique for the lifetime of the process and is never derived
//! from the node's contents: two `ecx` variables built separately are different identities,
//! while two clones of the same handle are the same identity. Sharing a handle between two
//! parents is how a tree turns into a DAG with shared sub-expressions.
//!
//! Structural equality ([`PartialEq`], [`Hash`]) ignores identities and display labels, so
//! canonicalized trees from different runs can be compared directly.
//!
//! # Construction
//!
//! ```rust
//! use symcanon::Expr;
//!
//! let arg0 = Expr::variable("arg0", 4);
//! let ecx = Expr::variable("ecx", 4);
//! let ebx = Expr::variable("ebx", 4);
//!
//! let tree = (arg0 + ecx) * (ebx.clone() + ebx);
//! assert_eq!(tree.to_string(), "((arg0 + ecx) * (ebx + ebx))");
//! ```

mod ops;
mod walk;

pub use ops::{width_mask, OperatorKind};
pub use walk::{try_visit, try_walk, visit, walk};

use std::{
    collections::HashSet,
    fmt,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crate::Result;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Width used for memory nodes whose size is not a constant.
const DEFAULT_MEMORY_WIDTH: u8 = 8;

/// Stable identity of an expression node.
///
/// Identities are allocated from a process-wide counter, so nodes minted later always carry a
/// larger identity than nodes minted earlier on the same thread.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identity value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The variant payload of an expression node.
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// An integer constant of `width` bytes.
    Constant {
        /// The constant value.
        value: u64,
        /// Width in bytes.
        width: u8,
    },

    /// A named variable, such as a register (`ecx`) or a symbolic argument (`arg0`).
    Variable {
        /// Variable name.
        name: String,
        /// Width in bytes.
        width: u8,
        /// Optional human-readable label shown instead of the name when printing.
        ///
        /// The label is display metadata only and never takes part in equality or solving.
        label: Option<String>,
    },

    /// A memory dereference of `size` bytes at `address`.
    Memory {
        /// Address expression.
        address: Expr,
        /// Size expression, usually a constant.
        size: Expr,
    },

    /// An operator applied to an ordered list of operands.
    Operator {
        /// The operation.
        kind: OperatorKind,
        /// Operands in their original order.
        operands: Vec<Expr>,
    },
}

#[derive(Debug)]
struct ExprNode {
    id: NodeId,
    width: u8,
    kind: ExprKind,
}

impl Drop for ExprNode {
    // Operand lists are detached and released from an explicit stack, so dropping a long
    // operator chain does not recurse once per level.
    fn drop(&mut self) {
        let ExprKind::Operator { operands, .. } = &mut self.kind else {
            return;
        };
        let mut pending = std::mem::take(operands);

        while let Some(expr) = pending.pop() {
            if let Ok(mut node) = Arc::try_unwrap(expr.0) {
                if let ExprKind::Operator { operands, .. } = &mut node.kind {
                    pending.append(operands);
                }
            }
        }
    }
}

/// Handle to an immutable symbolic expression node.
///
/// Cloning the handle keeps the node identity. See the [module documentation](self).
#[derive(Clone)]
pub struct Expr(Arc<ExprNode>);

impl Expr {
    fn from_kind(kind: ExprKind) -> Self {
        let width = match &kind {
            ExprKind::Constant { width, .. } | ExprKind::Variable { width, .. } => *width,
            ExprKind::Memory { size, .. } => match size.as_constant() {
                Some(bytes) if bytes > 0 => u8::try_from(bytes.min(8)).unwrap_or(8),
                _ => DEFAULT_MEMORY_WIDTH,
            },
            ExprKind::Operator { operands, .. } => {
                operands.iter().map(Expr::width).max().unwrap_or(0)
            }
        };

        Self(Arc::new(ExprNode {
            id: NodeId::next(),
            width,
            kind,
        }))
    }

    /// Creates a constant node.
    #[must_use]
    pub fn constant(value: u64, width: u8) -> Self {
        Self::from_kind(ExprKind::Constant { value, width })
    }

    /// Creates a variable node.
    #[must_use]
    pub fn variable(name: impl Into<String>, width: u8) -> Self {
        Self::from_kind(ExprKind::Variable {
            name: name.into(),
            width,
            label: None,
        })
    }

    /// Creates a memory dereference node.
    #[must_use]
    pub fn memory(address: Expr, size: Expr) -> Self {
        Self::from_kind(ExprKind::Memory { address, size })
    }

    /// Creates an operator node with the given operands.
    ///
    /// The operand count is not checked here; [`Expr::validate`] rejects nodes whose operand
    /// count does not match [`OperatorKind::arity`].
    #[must_use]
    pub fn operator(kind: OperatorKind, operands: Vec<Expr>) -> Self {
        Self::from_kind(ExprKind::Operator { kind, operands })
    }

    /// Creates a binary operator node.
    #[must_use]
    pub fn binary(kind: OperatorKind, left: Expr, right: Expr) -> Self {
        Self::operator(kind, vec![left, right])
    }

    /// Creates a unary operator node.
    #[must_use]
    pub fn unary(kind: OperatorKind, operand: Expr) -> Self {
        Self::operator(kind, vec![operand])
    }

    /// The stable identity of this node.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.0.id
    }

    /// The variant payload of this node.
    #[must_use]
    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    /// Returns `true` if both handles refer to the same node (same identity).
    #[must_use]
    pub fn same_node(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Width of the value this node produces, in bytes.
    ///
    /// Operators take the widest operand; memory nodes use their size when it is a constant.
    /// The width is fixed when the node is built, so this never walks the subtree.
    #[must_use]
    pub fn width(&self) -> u8 {
        self.0.width
    }

    /// Direct children in traversal order: memory address then size, or operands in order.
    #[must_use]
    pub fn children(&self) -> Vec<&Expr> {
        match self.kind() {
            ExprKind::Constant { .. } | ExprKind::Variable { .. } => Vec::new(),
            ExprKind::Memory { address, size } => vec![address, size],
            ExprKind::Operator { operands, .. } => operands.iter().collect(),
        }
    }

    /// Returns `true` for constant nodes.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        matches!(self.kind(), ExprKind::Constant { .. })
    }

    /// Returns `true` for variable nodes.
    #[must_use]
    pub fn is_variable(&self) -> bool {
        matches!(self.kind(), ExprKind::Variable { .. })
    }

    /// Returns the value of a constant node.
    #[must_use]
    pub fn as_constant(&self) -> Option<u64> {
        match self.kind() {
            ExprKind::Constant { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Returns the name of a variable node.
    #[must_use]
    pub fn as_variable_name(&self) -> Option<&str> {
        match self.kind() {
            ExprKind::Variable { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns the display label of a variable node, if one is attached.
    #[must_use]
    pub fn display_label(&self) -> Option<&str> {
        match self.kind() {
            ExprKind::Variable { label, .. } => label.as_deref(),
            _ => None,
        }
    }

    /// Returns a new variable node carrying `label` as display metadata.
    ///
    /// Non-variable nodes are returned unchanged.
    #[must_use]
    pub fn with_label(&self, label: impl Into<String>) -> Expr {
        match self.kind() {
            ExprKind::Variable { name, width, .. } => Self::from_kind(ExprKind::Variable {
                name: name.clone(),
                width: *width,
                label: Some(label.into()),
            }),
            _ => self.clone(),
        }
    }

    /// Rebuilds this node around new children, minting a fresh identity.
    ///
    /// `children` must be in [`Expr::children`] order. Leaves are returned unchanged.
    pub(crate) fn with_children(&self, mut children: Vec<Expr>) -> Expr {
        match self.kind() {
            ExprKind::Constant { .. } | ExprKind::Variable { .. } => self.clone(),
            ExprKind::Memory { .. } => {
                let size = children.pop();
                let address = children.pop();
                match (address, size) {
                    (Some(address), Some(size)) => Self::memory(address, size),
                    _ => self.clone(),
                }
            }
            ExprKind::Operator { kind, .. } => Self::operator(*kind, children),
        }
    }

    /// Checks every reachable node against the expression node contract.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedTree`] for an operator whose operand count does not
    /// match its arity, or for a constant or variable with a zero or oversized width.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut pending = vec![self];

        while let Some(node) = pending.pop() {
            if !seen.insert(node.id()) {
                continue;
            }

            match node.kind() {
                ExprKind::Constant { width, .. } | ExprKind::Variable { width, .. } => {
                    if *width == 0 || *width > 8 {
                        return Err(malformed_error!(
                            "node {} ({}) has invalid width {}",
                            node.id(),
                            node,
                            width
                        ));
                    }
                }
                ExprKind::Operator { kind, operands } => {
                    if operands.len() != kind.arity() {
                        return Err(malformed_error!(
                            "operator {} ({:?}) expects {} operands, got {}",
                            node.id(),
                            kind,
                            kind.arity(),
                            operands.len()
                        ));
                    }
                }
                ExprKind::Memory { .. } => {}
            }

            pending.extend(node.children());
        }

        Ok(())
    }

    /// Rewrites this tree with [`walk`].
    #[must_use]
    pub fn walk_tree<F>(&self, visitor: F) -> Expr
    where
        F: FnMut(&[Expr], &Expr) -> Option<Expr>,
    {
        walk(self, visitor)
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        if self.same_node(other) {
            return true;
        }

        match (self.kind(), other.kind()) {
            (
                ExprKind::Constant { value, width },
                ExprKind::Constant {
                    value: other_value,
                    width: other_width,
                },
            ) => value == other_value && width == other_width,
            (
                ExprKind::Variable { name, width, .. },
                ExprKind::Variable {
                    name: other_name,
                    width: other_width,
                    ..
                },
            ) => name == other_name && width == other_width,
            (
                ExprKind::Memory { address, size },
                ExprKind::Memory {
                    address: other_address,
                    size: other_size,
                },
            ) => address == other_address && size == other_size,
            (
                ExprKind::Operator { kind, operands },
                ExprKind::Operator {
                    kind: other_kind,
                    operands: other_operands,
                },
            ) => kind == other_kind && operands == other_operands,
            _ => false,
        }
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self.kind()).hash(state);
        match self.kind() {
            ExprKind::Constant { value, width } => {
                value.hash(state);
                width.hash(state);
            }
            ExprKind::Variable { name, width, .. } => {
                name.hash(state);
                width.hash(state);
            }
            ExprKind::Memory { address, size } => {
                address.hash(state);
                size.hash(state);
            }
            ExprKind::Operator { kind, operands } => {
                kind.hash(state);
                operands.hash(state);
            }
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{{}}}", self.id(), self)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Constant { value, .. } => write!(f, "{value:#x}"),
            ExprKind::Variable { name, label, .. } => match label {
                Some(label) => f.write_str(label),
                None => f.write_str(name),
            },
            ExprKind::Memory { address, size } => write!(f, "mem[{address}:{size}]"),
            ExprKind::Operator { kind, operands } => match operands.as_slice() {
                [operand] => write!(f, "{kind}{operand}"),
                [left, right] => write!(f, "({left} {kind} {right})"),
                _ => {
                    write!(f, "{kind:?}(")?;
                    for (i, operand) in operands.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{operand}")?;
                    }
                    f.write_str(")")
                }
            },
        }
    }
}

macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident, $kind:ident) => {
        impl std::ops::$trait for Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary(OperatorKind::$kind, self, rhs)
            }
        }

        impl std::ops::$trait<&Expr> for &Expr {
            type Output = Expr;

            fn $method(self, rhs: &Expr) -> Expr {
                Expr::binary(OperatorKind::$kind, self.clone(), rhs.clone())
            }
        }
    };
}

impl_binary_operator!(Add, add, Add);
impl_binary_operator!(Sub, sub, Sub);
impl_binary_operator!(Mul, mul, Mul);
impl_binary_operator!(Div, div, Div);
impl_binary_operator!(Rem, rem, Mod);
impl_binary_operator!(BitAnd, bitand, And);
impl_binary_operator!(BitOr, bitor, Or);
impl_binary_operator!(BitXor, bitxor, Xor);
impl_binary_operator!(Shl, shl, Shl);
impl_binary_operator!(Shr, shr, Shr);

impl std::ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::unary(OperatorKind::Neg, self)
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::unary(OperatorKind::Not, self)
    }
}
