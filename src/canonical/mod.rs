//! Architecture-independent canonicalization.
//!
//! Two lifted expressions that compute the same thing with different physical registers, a
//! different operand order for commutative operators, or different absolute addresses should
//! compare equal once canonicalized. The [`Canonicalizer`] gets there in three passes over a
//! batch of trees:
//!
//! 1. **Tagging** - registers (and optionally address constants) are swapped for anonymous
//!    placeholders, remembering which original each placeholder stands for.
//! 2. **Ranking** - every placeholder is fingerprinted by the solved values of its ancestors,
//!    and all fingerprints of the batch are sorted together.
//! 3. **Renaming** - canonical names (`0indreg`, `1indreg`, ..., `0archindva`, ...) are handed
//!    out in ranked order and substituted into the trees.
//!
//! Canonical numbering is computed jointly over the batch and is only meaningful relative to
//! it: every occurrence of a register anywhere in the batch gets the same canonical name.
//! No state is kept between calls, so the canonical forms of separate calls can be compared
//! with each other directly.
//!
//! # Examples
//!
//! ```rust
//! use symcanon::{arch::Architecture, workspace::MemoryWorkspace};
//! use symcanon::{Canonicalizer, CanonicalizeOptions, Expr, SymbolicSolver};
//!
//! let v = |name: &str| Expr::variable(name, 4);
//!
//! let registers = Architecture::I386.register_table();
//! let workspace = MemoryWorkspace::new();
//! let solver = SymbolicSolver::new();
//! let engine = Canonicalizer::new(&solver, &registers, &workspace);
//!
//! let options = CanonicalizeOptions::default();
//! let first = engine.canonicalize(&[(v("arg0") + v("ecx")) * (v("ebx") + v("ebx"))], None, &options)?;
//! let second = engine.canonicalize(&[(v("arg0") + v("ebx")) * (v("ecx") + v("ecx"))], None, &options)?;
//! assert_eq!(first, second);
//! # Ok::<(), symcanon::Error>(())
//! ```

mod config;
mod ranker;
mod renamer;
mod tagger;

pub use config::{
    CanonicalizeOptions, ADDRESS_NAME_SUFFIX, ADDRESS_PLACEHOLDER, REGISTER_NAME_SUFFIX,
    REGISTER_PLACEHOLDER,
};

use log::debug;
use rayon::prelude::*;

use crate::{
    arch::RegisterTable,
    expr::Expr,
    solver::{EvalContext, Solver},
    workspace::Workspace,
    Result,
};

/// Summary of one canonicalization run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalReport {
    /// Number of register placeholders minted.
    pub register_placeholders: usize,
    /// Number of address placeholders minted.
    pub address_placeholders: usize,
    /// Canonical register names as `(original, canonical)`, ordered by original name.
    pub register_names: Vec<(String, String)>,
    /// Canonical address names as `(original, canonical)`, ordered by address.
    pub address_names: Vec<(u64, String)>,
    /// Fingerprint ties between different originals. Non-zero values mean the numbering of
    /// the tied originals follows walk order rather than position.
    pub collisions: usize,
}

impl CanonicalReport {
    /// Returns the canonical name assigned to an original register.
    #[must_use]
    pub fn register_name(&self, original: &str) -> Option<&str> {
        self.register_names
            .iter()
            .find(|(name, _)| name == original)
            .map(|(_, canonical)| canonical.as_str())
    }

    /// Returns the canonical name assigned to an original address.
    #[must_use]
    pub fn address_name(&self, original: u64) -> Option<&str> {
        self.address_names
            .iter()
            .find(|(address, _)| *address == original)
            .map(|(_, canonical)| canonical.as_str())
    }
}

/// The canonicalization engine.
///
/// Holds its collaborators by reference; it keeps no state of its own between calls, so one
/// engine can serve any number of independent batches, including concurrently through
/// [`Canonicalizer::canonicalize_batches`].
#[derive(Debug)]
pub struct Canonicalizer<'a, S: ?Sized, R: ?Sized, W: ?Sized> {
    solver: &'a S,
    registers: &'a R,
    workspace: &'a W,
}

impl<'a, S, R, W> Canonicalizer<'a, S, R, W>
where
    S: Solver + ?Sized,
    R: RegisterTable + ?Sized,
    W: Workspace + ?Sized,
{
    /// Creates an engine over the given collaborators.
    ///
    /// # Arguments
    ///
    /// * `solver` - Evaluates nodes to concrete values for fingerprinting.
    /// * `registers` - Decides which variable names are physical registers.
    /// * `workspace` - Answers address, thunk and string queries.
    #[must_use]
    pub fn new(solver: &'a S, registers: &'a R, workspace: &'a W) -> Self {
        Self {
            solver,
            registers,
            workspace,
        }
    }

    /// Canonicalizes a batch of trees.
    ///
    /// Output tree `i` corresponds to input tree `i`. Operand order, operator kinds and
    /// leaves other than registers (and, when enabled, addresses) are preserved.
    ///
    /// # Arguments
    ///
    /// * `trees` - The batch; all trees share one canonical numbering.
    /// * `ctx` - Optional execution context handed to the solver.
    /// * `options` - Run options.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::MalformedTree`] if an input tree violates the node contract
    /// - [`crate::Error::Evaluation`] if the solver fails on any node
    /// - [`crate::Error::CollaboratorUnavailable`] if a lookup cannot be answered
    /// - [`crate::Error::Error`] if the options are invalid
    pub fn canonicalize(
        &self,
        trees: &[Expr],
        ctx: Option<&EvalContext>,
        options: &CanonicalizeOptions,
    ) -> Result<Vec<Expr>> {
        self.canonicalize_with_report(trees, ctx, options)
            .map(|(trees, _)| trees)
    }

    /// Canonicalizes a batch of trees and reports the names that were assigned.
    ///
    /// # Errors
    ///
    /// Same as [`Canonicalizer::canonicalize`].
    pub fn canonicalize_with_report(
        &self,
        trees: &[Expr],
        ctx: Option<&EvalContext>,
        options: &CanonicalizeOptions,
    ) -> Result<(Vec<Expr>, CanonicalReport)> {
        options.validate()?;
        for tree in trees {
            tree.validate()?;
        }

        let batch = tagger::tag(trees, self.registers, self.workspace, options)?;
        let ranking = ranker::rank(&batch, self.solver, ctx)?;
        let names = renamer::assign_names(&ranking, &batch)?;
        let canonical =
            renamer::rename(&batch, &names, self.workspace, options.placeholder_width)?;

        let report = CanonicalReport {
            register_placeholders: batch.registers.len(),
            address_placeholders: batch.addresses.len(),
            register_names: names.register_pairs(),
            address_names: names.address_pairs(),
            collisions: ranking.collisions,
        };
        debug!(
            "canonicalized {} trees: {} registers, {} addresses, {} collisions",
            canonical.len(),
            report.register_names.len(),
            report.address_names.len(),
            report.collisions
        );

        Ok((canonical, report))
    }

    /// Canonicalizes independent batches in parallel.
    ///
    /// Each batch is numbered on its own, exactly as if passed to
    /// [`Canonicalizer::canonicalize`]; a failing batch does not affect the others.
    pub fn canonicalize_batches(
        &self,
        batches: &[Vec<Expr>],
        ctx: Option<&EvalContext>,
        options: &CanonicalizeOptions,
    ) -> Vec<Result<Vec<Expr>>>
    where
        S: Sync,
        R: Sync,
        W: Sync,
    {
        batches
            .par_iter()
            .map(|batch| self.canonicalize(batch, ctx, options))
            .collect()
    }
}

/// Canonicalizes a batch of trees with a one-off [`Canonicalizer`].
///
/// # Errors
///
/// Same as [`Canonicalizer::canonicalize`].
pub fn canonicalize<S, R, W>(
    trees: &[Expr],
    solver: &S,
    registers: &R,
    workspace: &W,
    ctx: Option<&EvalContext>,
    options: &CanonicalizeOptions,
) -> Result<Vec<Expr>>
where
    S: Solver + ?Sized,
    R: RegisterTable + ?Sized,
    W: Workspace + ?Sized,
{
    Canonicalizer::new(solver, registers, workspace).canonicalize(trees, ctx, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        solver::SymbolicSolver,
        test::{arg, fixture_workspace, i386_registers, reg, UnavailableWorkspace},
        Error, OperatorKind,
    };

    #[test]
    fn test_report_contents() {
        let registers = i386_registers();
        let workspace = fixture_workspace();
        let solver = SymbolicSolver::new();
        let engine = Canonicalizer::new(&solver, &registers, &workspace);

        let trees = [(arg(0) + reg("ecx")) * (reg("ebx") + reg("ebx"))];
        let (canonical, report) = engine
            .canonicalize_with_report(&trees, None, &CanonicalizeOptions::default())
            .unwrap();

        assert_eq!(canonical.len(), 1);
        assert_eq!(report.register_placeholders, 3);
        assert_eq!(report.address_placeholders, 0);
        assert_eq!(report.register_names.len(), 2);
        assert_eq!(report.collisions, 0);
        assert!(report.register_name("ecx").is_some());
        assert_ne!(report.register_name("ecx"), report.register_name("ebx"));
        assert_eq!(report.register_name("eax"), None);
    }

    #[test]
    fn test_malformed_rejected_before_collaborators() {
        let registers = i386_registers();
        let solver = SymbolicSolver::new();
        let engine = Canonicalizer::new(&solver, &registers, &UnavailableWorkspace);

        let broken = reg("eax") + Expr::operator(OperatorKind::Mul, Vec::new());
        let options = CanonicalizeOptions::default().with_anonymize_addresses(true);
        assert!(matches!(
            engine.canonicalize(&[broken], None, &options),
            Err(Error::MalformedTree { .. })
        ));
    }

    #[test]
    fn test_workspace_failure_aborts() {
        let registers = i386_registers();
        let solver = SymbolicSolver::new();
        let engine = Canonicalizer::new(&solver, &registers, &UnavailableWorkspace);

        let tree = reg("eax") + Expr::constant(0x56560020, 4);
        let options = CanonicalizeOptions::default().with_anonymize_addresses(true);
        assert!(matches!(
            engine.canonicalize(&[tree.clone()], None, &options),
            Err(Error::CollaboratorUnavailable(_))
        ));

        // Without address anonymization the workspace is never consulted.
        assert!(engine
            .canonicalize(&[tree], None, &CanonicalizeOptions::default())
            .is_ok());
    }

    #[test]
    fn test_invalid_options() {
        let registers = i386_registers();
        let workspace = fixture_workspace();
        let solver = SymbolicSolver::new();

        let options = CanonicalizeOptions::default().with_placeholder_width(5);
        let result = canonicalize(&[reg("eax")], &solver, &registers, &workspace, None, &options);
        assert!(matches!(result, Err(Error::Error(_))));
    }

    #[test]
    fn test_empty_batch() {
        let registers = i386_registers();
        let workspace = fixture_workspace();
        let solver = SymbolicSolver::new();

        let result = canonicalize(
            &[],
            &solver,
            &registers,
            &workspace,
            None,
            &CanonicalizeOptions::default(),
        )
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_placeholder_width_applies() {
        let registers = i386_registers();
        let workspace = fixture_workspace();
        let solver = SymbolicSolver::new();

        let options = CanonicalizeOptions::default().with_placeholder_width(8);
        let result =
            canonicalize(&[reg("al")], &solver, &registers, &workspace, None, &options).unwrap();
        assert_eq!(result[0], Expr::variable("0indreg", 8));
    }
}
