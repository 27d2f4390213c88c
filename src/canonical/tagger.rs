//! First pass: replace registers and addresses with anonymous placeholders.
//!
//! Every register variable (and, when requested, every constant that points into mapped
//! memory) is swapped for a freshly minted placeholder variable with a fixed generic name.
//! The placeholder's identity is recorded in a side map together with the original node, so
//! later passes can tell apart "this occurrence of `ecx`" from "that occurrence of `ecx`"
//! while still collapsing both onto one canonical name through the original register name.
//!
//! A node shared between several parents is replaced by one shared placeholder, so the
//! ranking pass still sees one placeholder reached through several paths.
//!
//! Constants pointing at a function with a known thunk name are not anonymized; they are
//! replaced by a variable carrying the thunk name verbatim.

use std::collections::HashMap;

use log::trace;

use crate::{
    arch::RegisterTable,
    canonical::config::{CanonicalizeOptions, ADDRESS_PLACEHOLDER, REGISTER_PLACEHOLDER},
    expr::{try_walk, Expr, ExprKind, NodeId},
    workspace::Workspace,
    Result,
};

/// The register a placeholder stands in for.
#[derive(Debug, Clone)]
pub(crate) struct OriginalRegister {
    /// The original variable node.
    pub node: Expr,
    /// Register name, the key canonical names are collapsed on.
    pub name: String,
}

/// The address constant a placeholder stands in for.
#[derive(Debug, Clone)]
pub(crate) struct OriginalAddress {
    /// The original constant node.
    pub node: Expr,
    /// Address value, the key canonical names are collapsed on.
    pub value: u64,
}

/// Output of the tagging pass.
#[derive(Debug, Default)]
pub(crate) struct TaggedBatch {
    /// Trees with placeholders substituted, in input order.
    pub trees: Vec<Expr>,
    /// Register placeholders by identity.
    pub registers: HashMap<NodeId, OriginalRegister>,
    /// Address placeholders by identity.
    pub addresses: HashMap<NodeId, OriginalAddress>,
}

/// Substitutes placeholders for registers and, optionally, address constants.
///
/// # Errors
///
/// Propagates [`crate::Error::CollaboratorUnavailable`] from the register table or workspace.
pub(crate) fn tag<R, W>(
    trees: &[Expr],
    registers: &R,
    workspace: &W,
    options: &CanonicalizeOptions,
) -> Result<TaggedBatch>
where
    R: RegisterTable + ?Sized,
    W: Workspace + ?Sized,
{
    let mut batch = TaggedBatch {
        trees: Vec::with_capacity(trees.len()),
        ..TaggedBatch::default()
    };

    let mut minted: HashMap<NodeId, Expr> = HashMap::new();
    for tree in trees {
        let tagged = try_walk(tree, |_path, node| {
            if let Some(placeholder) = minted.get(&node.id()) {
                return Ok(Some(placeholder.clone()));
            }
            let replacement = tag_node(node, registers, workspace, options, &mut batch)?;
            if let Some(placeholder) = &replacement {
                minted.insert(node.id(), placeholder.clone());
            }
            Ok(replacement)
        })?;
        batch.trees.push(tagged);
    }

    trace!(
        "tagged {} register and {} address placeholders",
        batch.registers.len(),
        batch.addresses.len()
    );
    Ok(batch)
}

fn tag_node<R, W>(
    node: &Expr,
    registers: &R,
    workspace: &W,
    options: &CanonicalizeOptions,
    batch: &mut TaggedBatch,
) -> Result<Option<Expr>>
where
    R: RegisterTable + ?Sized,
    W: Workspace + ?Sized,
{
    match node.kind() {
        ExprKind::Constant { value, .. } if options.anonymize_addresses => {
            if !workspace.is_valid_address(*value)? {
                return Ok(None);
            }

            if workspace.is_function(*value)? {
                if let Some(api) = workspace.thunk_name(*value)? {
                    return Ok(Some(Expr::variable(api, workspace.pointer_width())));
                }
            }

            let placeholder = Expr::variable(ADDRESS_PLACEHOLDER, options.placeholder_width);
            batch.addresses.insert(
                placeholder.id(),
                OriginalAddress {
                    node: node.clone(),
                    value: *value,
                },
            );
            Ok(Some(placeholder))
        }
        ExprKind::Variable { name, .. } => {
            if registers.register_index(name)?.is_none() {
                return Ok(None);
            }

            let placeholder = Expr::variable(REGISTER_PLACEHOLDER, options.placeholder_width);
            batch.registers.insert(
                placeholder.id(),
                OriginalRegister {
                    node: node.clone(),
                    name: name.clone(),
                },
            );
            Ok(Some(placeholder))
        }
        _ => Ok(None),
    }
}
