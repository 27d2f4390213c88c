//! # symcanon Prelude
//!
//! Convenient glob import of the types needed to build expressions and canonicalize them.
//!
//! ```rust
//! use symcanon::prelude::*;
//!
//! let tree = Expr::variable("eax", 4) + Expr::constant(1, 4);
//! assert_eq!(tree.to_string(), "(eax + 0x1)");
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all symcanon operations
pub use crate::Error;

/// The result type used throughout symcanon
pub use crate::Result;

// ================================================================================================
// Expressions
// ================================================================================================

/// Expression nodes, identities and operators
pub use crate::expr::{Expr, ExprKind, NodeId, OperatorKind};

// ================================================================================================
// Canonicalization
// ================================================================================================

/// The engine, its options and run report
pub use crate::canonical::{canonicalize, CanonicalReport, Canonicalizer, CanonicalizeOptions};

// ================================================================================================
// Collaborators
// ================================================================================================

/// Expression evaluation
pub use crate::solver::{EvalContext, Solver, SolverConfig, SymbolicSolver};

/// Register tables
pub use crate::arch::{Architecture, RegisterTable, StaticRegisterTable};

/// Image services
pub use crate::workspace::{MemoryWorkspace, Workspace};
