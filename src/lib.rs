// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # symcanon
//!
//! Architecture-independent canonicalization of lifted symbolic expressions.
//!
//! Lifting machine code produces symbolic expression trees such as
//! `(arg0 + ecx) * (ebx + ebx)`. Two functions that do the same thing rarely use the same
//! registers, the same operand order or the same absolute addresses, so their trees differ
//! even when their semantics do not. `symcanon` rewrites batches of such trees into a
//! canonical form in which those differences disappear:
//!
//! ```text
//! (arg0 + ecx) * (ebx + ebx)   ─┐
//! (arg0 + ebx) * (ecx + ecx)   ─┴─►  (arg0 + Nindreg) * (Mindreg + Mindreg)
//! ```
//!
//! while expressions that genuinely differ (a different constant, a register used in a
//! different position) stay different. Canonical names are assigned per batch: trees that
//! describe one piece of code (for example all effects of one function) go into one batch
//! and share a numbering, and the canonical forms of different batches are then compared.
//!
//! ## Quick Start
//!
//! ```rust
//! use symcanon::prelude::*;
//!
//! let v = |name: &str| Expr::variable(name, 4);
//!
//! let registers = Architecture::I386.register_table();
//! let workspace = MemoryWorkspace::new();
//! let solver = SymbolicSolver::new();
//! let engine = Canonicalizer::new(&solver, &registers, &workspace);
//! let options = CanonicalizeOptions::default();
//!
//! let first = engine.canonicalize(&[(v("arg0") + v("ecx")) * (v("ebx") + v("ebx"))], None, &options)?;
//! let second = engine.canonicalize(&[(v("arg0") + v("ebx")) * (v("ecx") + v("ecx"))], None, &options)?;
//! let third = engine.canonicalize(&[(v("arg0") + v("ecx")) * (v("ebx") + v("ecx"))], None, &options)?;
//!
//! assert_eq!(first, second);
//! assert_ne!(first, third);
//! # Ok::<(), symcanon::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`expr`] - Expression nodes with stable identities, and the tree walker
//! - [`solver`] - Concrete evaluation of expressions ([`Solver`], [`SymbolicSolver`])
//! - [`arch`] - Register tables ([`arch::RegisterTable`], [`arch::Architecture`])
//! - [`workspace`] - Image services ([`workspace::Workspace`], [`workspace::MemoryWorkspace`])
//! - [`canonical`] - The canonicalization engine ([`Canonicalizer`])
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade: per-run summaries at `debug`, individual
//! fingerprints at `trace`, and fingerprint collisions at `warn`. No logger is installed by
//! the library itself.
#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
pub mod prelude;

pub mod arch;
pub mod canonical;
pub mod expr;
pub mod solver;
pub mod workspace;

/// `symcanon` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `symcanon` Error type
pub use error::Error;

pub use canonical::{canonicalize, CanonicalReport, Canonicalizer, CanonicalizeOptions};
pub use expr::{Expr, ExprKind, NodeId, OperatorKind};
pub use solver::{EvalContext, Solver, SolverConfig, SymbolicSolver};
