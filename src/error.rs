use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::MalformedTree {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::MalformedTree {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! evaluation_error {
    ($fmt:expr) => {
        crate::Error::Evaluation {
            message: $fmt.to_string(),
        }
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Evaluation {
            message: format!($fmt, $($arg)*),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// A canonicalization run either produces a complete set of rewritten trees or fails as a
/// whole. None of the variants below are retried internally; retry policy around the solver
/// or workspace collaborators belongs to the caller.
///
/// # Error Categories
///
/// - [`Error::Evaluation`] - The solver could not produce a concrete value for a node
/// - [`Error::MalformedTree`] - An input tree violates the expression node contract
/// - [`Error::CollaboratorUnavailable`] - A workspace or register table lookup could not answer
/// - [`Error::Error`] - Miscellaneous failures, such as invalid options
///
/// # Examples
///
/// ```rust
/// use symcanon::{Canonicalizer, CanonicalizeOptions, Error, Expr, SymbolicSolver};
/// use symcanon::arch::Architecture;
/// use symcanon::workspace::MemoryWorkspace;
///
/// let registers = Architecture::I386.register_table();
/// let workspace = MemoryWorkspace::new();
/// let solver = SymbolicSolver::new();
/// let engine = Canonicalizer::new(&solver, &registers, &workspace);
///
/// let broken = Expr::operator(symcanon::OperatorKind::Add, Vec::new());
/// match engine.canonicalize(&[broken], None, &CanonicalizeOptions::default()) {
///     Err(Error::MalformedTree { message, .. }) => println!("rejected: {message}"),
///     other => panic!("unexpected result: {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The solver could not produce a concrete value for a node.
    ///
    /// Fingerprints are meaningless without every ancestor value, so the whole batch fails.
    /// Typical causes are a missing variable binding in strict mode or a division by zero
    /// under the supplied context.
    #[error("Evaluation failed - {message}")]
    Evaluation {
        /// Description of the node that could not be solved
        message: String,
    },

    /// An input tree violates the expression node contract.
    ///
    /// Raised before any rewriting begins, for example for an operator node without
    /// operands or a node with a zero width. The error includes the source location
    /// where the violation was detected.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed tree - {file}:{line}: {message}")]
    MalformedTree {
        /// The message to be printed for the MalformedTree error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A workspace or register table lookup could not answer.
    ///
    /// The run is aborted; no default answer is substituted.
    #[error("Collaborator unavailable - {0}")]
    CollaboratorUnavailable(String),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
