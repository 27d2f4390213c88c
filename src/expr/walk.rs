//! Tree walking and rewriting.
//!
//! All passes of the canonicalization pipeline are built on the walkers in this module. The
//! traversal is pre-order: a node is handed to the visitor before its children, and children
//! are visited in [`Expr::children`] order. Alongside each node the visitor receives the path
//! of ancestors from the root down to the node's parent.
//!
//! Shared sub-expressions are visited once per path that reaches them. Fingerprinting depends
//! on this, so the walkers do not deduplicate by identity. The walkers keep their own stack;
//! arbitrarily deep trees can be walked on any thread.
//!
//! # Rewriting
//!
//! A visitor that returns `Some(replacement)` substitutes the replacement for the visited
//! node. The walker does not descend into the replaced node or into the replacement. A
//! visitor that returns `None` keeps the node and the walk continues into its children.
//! Nodes whose children are all unchanged are returned as the very same node (same
//! identity); nodes with a rewritten child are rebuilt with a fresh identity.
//!
//! ```rust
//! use symcanon::{expr::walk, Expr};
//!
//! let tree = Expr::variable("ecx", 4) + Expr::constant(1, 4);
//! let renamed = walk(&tree, |_path, node| match node.as_variable_name() {
//!     Some("ecx") => Some(Expr::variable("reg", 4)),
//!     _ => None,
//! });
//! assert_eq!(renamed.to_string(), "(reg + 0x1)");
//! ```

use std::convert::Infallible;

use super::Expr;

/// Rewrites `root` with a fallible visitor, stopping at the first error.
///
/// # Arguments
///
/// * `root` - The tree to walk.
/// * `visitor` - Called with the ancestor path and each node; returns an optional replacement.
///
/// # Errors
///
/// Propagates the first error returned by `visitor`.
pub fn try_walk<F, E>(root: &Expr, mut visitor: F) -> Result<Expr, E>
where
    F: FnMut(&[Expr], &Expr) -> Result<Option<Expr>, E>,
{
    let mut path = Vec::new();
    walk_node(root, &mut path, &mut visitor)
}

/// Rewrites `root` with an infallible visitor.
pub fn walk<F>(root: &Expr, mut visitor: F) -> Expr
where
    F: FnMut(&[Expr], &Expr) -> Option<Expr>,
{
    match try_walk(root, |path, node| Ok::<_, Infallible>(visitor(path, node))) {
        Ok(expr) => expr,
        Err(never) => match never {},
    }
}

/// Visits every node of `root` without rewriting, stopping at the first error.
///
/// # Errors
///
/// Propagates the first error returned by `visitor`.
pub fn try_visit<F, E>(root: &Expr, mut visitor: F) -> Result<(), E>
where
    F: FnMut(&[Expr], &Expr) -> Result<(), E>,
{
    try_walk(root, |path, node| visitor(path, node).map(|()| None)).map(|_| ())
}

/// Visits every node of `root` without rewriting.
pub fn visit<F>(root: &Expr, mut visitor: F)
where
    F: FnMut(&[Expr], &Expr),
{
    let _ = walk(root, |path, node| {
        visitor(path, node);
        None
    });
}

/// A node whose children are being walked, with the results collected so far.
struct Frame {
    node: Expr,
    children: Vec<Expr>,
    walked: Vec<Expr>,
    changed: bool,
}

impl Frame {
    fn new(node: &Expr) -> Self {
        let children: Vec<Expr> = node.children().into_iter().cloned().collect();
        Self {
            node: node.clone(),
            walked: Vec::with_capacity(children.len()),
            children,
            changed: false,
        }
    }

    fn next_child(&self) -> Option<&Expr> {
        self.children.get(self.walked.len())
    }

    fn push(&mut self, walked: Expr) {
        if let Some(original) = self.next_child() {
            self.changed |= !walked.same_node(original);
        }
        self.walked.push(walked);
    }

    fn finish(self) -> Expr {
        if self.changed {
            self.node.with_children(self.walked)
        } else {
            self.node
        }
    }
}

// Iterative so that tree depth is bounded by memory, not by the thread stack. `path` mirrors
// the nodes of `frames`.
fn walk_node<F, E>(root: &Expr, path: &mut Vec<Expr>, visitor: &mut F) -> Result<Expr, E>
where
    F: FnMut(&[Expr], &Expr) -> Result<Option<Expr>, E>,
{
    if let Some(replacement) = visitor(path, root)? {
        return Ok(replacement);
    }
    if root.children().is_empty() {
        return Ok(root.clone());
    }

    path.push(root.clone());
    let mut frames = vec![Frame::new(root)];

    while let Some(frame) = frames.last_mut() {
        let Some(child) = frame.next_child().cloned() else {
            path.pop();
            let finished = frames.pop().map(Frame::finish);
            match (finished, frames.last_mut()) {
                (Some(done), Some(parent)) => parent.push(done),
                (Some(done), None) => return Ok(done),
                (None, _) => break,
            }
            continue;
        };

        let walked = match visitor(path, &child)? {
            Some(replacement) => replacement,
            None if child.children().is_empty() => child,
            None => {
                path.push(child.clone());
                frames.push(Frame::new(&child));
                continue;
            }
        };
        frame.push(walked);
    }

    Ok(root.clone())
}
