//! Concrete evaluation of symbolic expressions.
//!
//! Canonicalization never looks at register names when ranking placeholders; it looks at the
//! concrete values every ancestor of a placeholder solves to. The [`Solver`] trait is the seam
//! for plugging in an evaluator. [`SymbolicSolver`] is the reference implementation.
//!
//! # Reference semantics
//!
//! | Node       | Value                                                                    |
//! |------------|--------------------------------------------------------------------------|
//! | `Constant` | the value, masked to its width                                           |
//! | `Variable` | the binding from [`EvalContext`], else a SHA-1 derived value of the name |
//! | `Memory`   | the cell from [`EvalContext`], else a SHA-1 derived value of the access  |
//! | `Operator` | [`OperatorKind::apply`](crate::OperatorKind::apply) over solved operands |
//!
//! Unbound values are derived from a SHA-1 digest and are stable across runs, processes and
//! platforms.

use std::collections::HashMap;

use sha1::{Digest, Sha1};

use crate::{
    expr::{width_mask, Expr, ExprKind, NodeId},
    Result,
};

/// Evaluates expression nodes to concrete integers.
///
/// Implementations must be deterministic for a given context and safe to call repeatedly on
/// the same node.
pub trait Solver {
    /// Solves `expr` under the optional execution context.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Evaluation`] if no concrete value can be produced.
    fn solve(&self, expr: &Expr, ctx: Option<&EvalContext>) -> Result<u64>;

    /// Solves a single node from the already solved values of its direct children, given in
    /// [`Expr::children`] order.
    ///
    /// Batch evaluation walks trees bottom-up and calls this once per distinct node. The
    /// default ignores `children` and solves the whole subtree with [`Solver::solve`];
    /// implementations that can combine child values directly should override it, which
    /// makes evaluating a batch linear in its node count.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Evaluation`] if no concrete value can be produced.
    fn solve_node(&self, expr: &Expr, children: &[u64], ctx: Option<&EvalContext>) -> Result<u64> {
        let _ = children;
        self.solve(expr, ctx)
    }
}

impl<S: Solver + ?Sized> Solver for &S {
    fn solve(&self, expr: &Expr, ctx: Option<&EvalContext>) -> Result<u64> {
        (**self).solve(expr, ctx)
    }

    fn solve_node(&self, expr: &Expr, children: &[u64], ctx: Option<&EvalContext>) -> Result<u64> {
        (**self).solve_node(expr, children, ctx)
    }
}

/// Execution context: concrete bindings for variables and memory cells.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    variables: HashMap<String, u64>,
    memory: HashMap<u64, u64>,
}

impl EvalContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a variable name to a value.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: u64) -> Self {
        self.set_variable(name, value);
        self
    }

    /// Binds the memory cell at `address` to a value.
    #[must_use]
    pub fn with_memory(mut self, address: u64, value: u64) -> Self {
        self.set_memory(address, value);
        self
    }

    /// Binds a variable name to a value.
    pub fn set_variable(&mut self, name: impl Into<String>, value: u64) {
        self.variables.insert(name.into(), value);
    }

    /// Binds the memory cell at `address` to a value.
    pub fn set_memory(&mut self, address: u64, value: u64) {
        self.memory.insert(address, value);
    }

    /// Returns the binding for a variable, if any.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<u64> {
        self.variables.get(name).copied()
    }

    /// Returns the binding for a memory cell, if any.
    #[must_use]
    pub fn memory(&self, address: u64) -> Option<u64> {
        self.memory.get(&address).copied()
    }
}

/// Configuration for [`SymbolicSolver`].
#[derive(Debug, Clone, Default)]
pub struct SolverConfig {
    /// Fail with [`crate::Error::Evaluation`] on variables missing from the context, instead of
    /// deriving a value from the name (default: `false`).
    pub strict_variables: bool,
}

/// Reference solver over [`Expr`] trees.
///
/// # Examples
///
/// ```rust
/// use symcanon::{EvalContext, Expr, Solver, SymbolicSolver};
///
/// let solver = SymbolicSolver::new();
/// let ctx = EvalContext::new().with_variable("ecx", 40);
///
/// let expr = Expr::variable("ecx", 4) + Expr::constant(2, 4);
/// assert_eq!(solver.solve(&expr, Some(&ctx))?, 42);
/// # Ok::<(), symcanon::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SymbolicSolver {
    config: SolverConfig,
}

impl SymbolicSolver {
    /// Creates a solver with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a solver with the given configuration.
    #[must_use]
    pub fn with_config(config: SolverConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn solve_variable(&self, name: &str, width: u8, ctx: Option<&EvalContext>) -> Result<u64> {
        if let Some(value) = ctx.and_then(|ctx| ctx.variable(name)) {
            return Ok(value & width_mask(width));
        }
        if self.config.strict_variables {
            return Err(evaluation_error!("no binding for variable '{}'", name));
        }
        Ok(digest_value(name.as_bytes()) & width_mask(width))
    }
}

impl Solver for SymbolicSolver {
    fn solve(&self, expr: &Expr, ctx: Option<&EvalContext>) -> Result<u64> {
        solve_bottom_up(self, expr, ctx, &mut HashMap::new())
    }

    fn solve_node(&self, expr: &Expr, children: &[u64], ctx: Option<&EvalContext>) -> Result<u64> {
        match expr.kind() {
            ExprKind::Constant { value, width } => Ok(value & width_mask(*width)),
            ExprKind::Variable { name, width, .. } => self.solve_variable(name, *width, ctx),
            ExprKind::Memory { .. } => {
                let [address, size] = children else {
                    return Err(malformed_error!(
                        "memory node {} needs 2 solved children, got {}",
                        expr.id(),
                        children.len()
                    ));
                };
                let mask = width_mask(expr.width());
                if let Some(value) = ctx.and_then(|ctx| ctx.memory(*address)) {
                    return Ok(value & mask);
                }
                let key = format!("mem:{address:x}:{size:x}");
                Ok(digest_value(key.as_bytes()) & mask)
            }
            ExprKind::Operator { kind, .. } => kind.apply(children, expr.width()),
        }
    }
}

/// Solves `root` children-first with an explicit stack, recording every node in `values`.
///
/// Nodes already present in `values` are not solved again, and each remaining node costs one
/// [`Solver::solve_node`] call.
fn solve_bottom_up<S>(
    solver: &S,
    root: &Expr,
    ctx: Option<&EvalContext>,
    values: &mut HashMap<NodeId, u64>,
) -> Result<u64>
where
    S: Solver + ?Sized,
{
    let mut pending = vec![(root.clone(), false)];

    while let Some((node, expanded)) = pending.pop() {
        if values.contains_key(&node.id()) {
            continue;
        }

        let children = node.children();
        if !expanded && !children.is_empty() {
            let unsolved: Vec<Expr> = children
                .iter()
                .rev()
                .filter(|child| !values.contains_key(&child.id()))
                .map(|child| (*child).clone())
                .collect();
            pending.push((node.clone(), true));
            pending.extend(unsolved.into_iter().map(|child| (child, false)));
            continue;
        }

        let operands = children
            .iter()
            .map(|child| {
                values.get(&child.id()).copied().ok_or_else(|| {
                    evaluation_error!("operand {} of {} is unsolved", child.id(), node.id())
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let value = solver.solve_node(&node, &operands, ctx)?;
        values.insert(node.id(), value);
    }

    values
        .get(&root.id())
        .copied()
        .ok_or_else(|| evaluation_error!("node {} is unsolved", root.id()))
}

/// Memoizes solved values per node identity for the duration of one run.
///
/// Solving a tree records every node beneath it, so later lookups of any ancestor or
/// descendant are memo hits. The memo is only valid for a single context, so it borrows the
/// context it was created with and is dropped together with the run.
pub(crate) struct SolveCache<'a, S: ?Sized> {
    solver: &'a S,
    ctx: Option<&'a EvalContext>,
    values: HashMap<NodeId, u64>,
}

impl<'a, S: Solver + ?Sized> SolveCache<'a, S> {
    pub(crate) fn new(solver: &'a S, ctx: Option<&'a EvalContext>) -> Self {
        Self {
            solver,
            ctx,
            values: HashMap::new(),
        }
    }

    pub(crate) fn solve(&mut self, expr: &Expr) -> Result<u64> {
        if let Some(value) = self.values.get(&expr.id()) {
            return Ok(*value);
        }
        solve_bottom_up(self.solver, expr, self.ctx, &mut self.values)
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }
}

fn digest_value(bytes: &[u8]) -> u64 {
    let digest = Sha1::digest(bytes);
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(word)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::Error;

    #[test]
    fn test_solve_constant_masks() {
        let solver = SymbolicSolver::new();
        let value = solver.solve(&Expr::constant(0x1_2345_6789, 4), None).unwrap();
        assert_eq!(value, 0x2345_6789);
    }

    #[test]
    fn test_unbound_variable_is_stable() {
        let solver = SymbolicSolver::new();
        let a = solver.solve(&Expr::variable("arg0", 4), None).unwrap();
        let b = solver.solve(&Expr::variable("arg0", 4), None).unwrap();
        let c = solver.solve(&Expr::variable("arg1", 4), None).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a <= 0xffff_ffff);
    }

    #[test]
    fn test_bound_variable() {
        let solver = SymbolicSolver::new();
        let ctx = EvalContext::new().with_variable("eax", 7);
        let expr = Expr::variable("eax", 4) * Expr::constant(6, 4);
        assert_eq!(solver.solve(&expr, Some(&ctx)).unwrap(), 42);
    }

    #[test]
    fn test_strict_variables() {
        let solver = SymbolicSolver::with_config(SolverConfig {
            strict_variables: true,
        });
        let expr = Expr::variable("eax", 4) + Expr::constant(1, 4);

        assert!(matches!(
            solver.solve(&expr, None),
            Err(Error::Evaluation { .. })
        ));

        let ctx = EvalContext::new().with_variable("eax", 1);
        assert_eq!(solver.solve(&expr, Some(&ctx)).unwrap(), 2);
    }

    #[test]
    fn test_memory_reads() {
        let solver = SymbolicSolver::new();
        let mem = Expr::memory(Expr::constant(0x1000, 4), Expr::constant(4, 4));
        let other = Expr::memory(Expr::constant(0x1004, 4), Expr::constant(4, 4));

        let unbound = solver.solve(&mem, None).unwrap();
        assert_eq!(unbound, solver.solve(&mem.clone(), None).unwrap());
        assert_ne!(unbound, solver.solve(&other, None).unwrap());

        let ctx = EvalContext::new().with_memory(0x1000, 0xdead_beef_cafe);
        assert_eq!(solver.solve(&mem, Some(&ctx)).unwrap(), 0xbeef_cafe);
    }

    #[test]
    fn test_commutative_values_match() {
        let solver = SymbolicSolver::new();
        let x = Expr::variable("x", 4);
        let y = Expr::variable("y", 4);

        assert_eq!(
            solver.solve(&(&x + &y), None).unwrap(),
            solver.solve(&(&y + &x), None).unwrap()
        );
        assert_ne!(
            solver.solve(&(&x - &y), None).unwrap(),
            solver.solve(&(&y - &x), None).unwrap()
        );
    }

    #[test]
    fn test_division_by_zero_fails() {
        let solver = SymbolicSolver::new();
        let expr = Expr::variable("x", 4) / Expr::constant(0, 4);
        assert!(matches!(
            solver.solve(&expr, None),
            Err(Error::Evaluation { .. })
        ));
    }

    #[test]
    fn test_solve_cache_memoizes_by_identity() {
        let solver = SymbolicSolver::new();
        let shared = Expr::variable("x", 4) + Expr::constant(1, 4);
        let mut cache = SolveCache::new(&solver, None);

        let first = cache.solve(&shared).unwrap();
        let second = cache.solve(&shared.clone()).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 3);

        let lookalike = Expr::variable("x", 4) + Expr::constant(1, 4);
        assert_eq!(cache.solve(&lookalike).unwrap(), first);
        assert_eq!(cache.len(), 6);
    }

    /// Counts whole-subtree solves and single-node solves separately.
    #[derive(Default)]
    struct CountingSolver {
        inner: SymbolicSolver,
        subtree_solves: Cell<usize>,
        node_solves: Cell<usize>,
    }

    impl Solver for CountingSolver {
        fn solve(&self, expr: &Expr, ctx: Option<&EvalContext>) -> Result<u64> {
            self.subtree_solves.set(self.subtree_solves.get() + 1);
            self.inner.solve(expr, ctx)
        }

        fn solve_node(
            &self,
            expr: &Expr,
            children: &[u64],
            ctx: Option<&EvalContext>,
        ) -> Result<u64> {
            self.node_solves.set(self.node_solves.get() + 1);
            self.inner.solve_node(expr, children, ctx)
        }
    }

    fn chain(depth: u64) -> Expr {
        (0..depth).fold(Expr::variable("eax", 4), |acc, i| acc + Expr::constant(i, 4))
    }

    #[test]
    fn test_solve_cache_fills_bottom_up() {
        let solver = CountingSolver::default();
        let tree = chain(399);
        let mut cache = SolveCache::new(&solver, None);

        cache.solve(&tree).unwrap();
        assert_eq!(cache.len(), 799);
        assert_eq!(solver.node_solves.get(), 799);

        // Every node beneath the root is now a memo hit.
        let mut node = tree.clone();
        while let Some(first) = node.children().first().map(|child| (*child).clone()) {
            cache.solve(&first).unwrap();
            node = first;
        }
        assert_eq!(solver.node_solves.get(), 799);
        assert_eq!(solver.subtree_solves.get(), 0);
    }

    #[test]
    fn test_solve_shared_node_once() {
        let solver = CountingSolver::default();
        let shared = Expr::variable("x", 4) * Expr::constant(3, 4);
        let tree = &shared + &shared;

        let mut cache = SolveCache::new(&solver, None);
        cache.solve(&tree).unwrap();
        assert_eq!(solver.node_solves.get(), 4);
    }

    #[test]
    fn test_deep_tree_does_not_overflow() {
        let solver = SymbolicSolver::new();
        let ctx = EvalContext::new().with_variable("eax", 1);
        let depth = 20_000;
        let expected = (0..depth).fold(1u64, |acc, i| acc.wrapping_add(i)) & 0xffff_ffff;

        assert_eq!(solver.solve(&chain(depth), Some(&ctx)).unwrap(), expected);
    }
}
