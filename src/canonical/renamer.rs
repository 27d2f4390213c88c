//! Third pass: assign canonical names and rewrite the trees.
//!
//! Names are handed out while iterating the sorted fingerprint lists: the first distinct
//! original register met becomes `0indreg`, the next `1indreg`, and so on; addresses become
//! `0archindva`, `1archindva`, ... The tables are keyed by the original register name and
//! original address value, never by placeholder identity, so every occurrence of the same
//! register in the batch ends up with the same name.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::{
    canonical::{
        config::{ADDRESS_NAME_SUFFIX, REGISTER_NAME_SUFFIX},
        ranker::Ranking,
        tagger::TaggedBatch,
    },
    expr::{try_walk, Expr, NodeId},
    workspace::Workspace,
    Error, Result,
};

/// Canonical names keyed by original register name and original address value.
#[derive(Debug, Default, Clone)]
pub(crate) struct NameTables {
    pub registers: HashMap<String, String>,
    pub addresses: HashMap<u64, String>,
}

impl NameTables {
    /// Register names as `(original, canonical)` pairs, ordered by original name.
    pub(crate) fn register_pairs(&self) -> Vec<(String, String)> {
        let ordered: BTreeMap<_, _> = self.registers.iter().collect();
        ordered
            .into_iter()
            .map(|(original, canonical)| (original.clone(), canonical.clone()))
            .collect()
    }

    /// Address names as `(original, canonical)` pairs, ordered by address.
    pub(crate) fn address_pairs(&self) -> Vec<(u64, String)> {
        let ordered: BTreeMap<_, _> = self.addresses.iter().collect();
        ordered
            .into_iter()
            .map(|(original, canonical)| (*original, canonical.clone()))
            .collect()
    }
}

/// Assigns canonical names in ranked order.
///
/// # Errors
///
/// Returns [`Error::Error`] if a ranked placeholder is missing from the tagger's side maps.
pub(crate) fn assign_names(ranking: &Ranking, batch: &TaggedBatch) -> Result<NameTables> {
    let mut names = NameTables::default();

    for ranked in &ranking.registers {
        let original = batch
            .registers
            .get(&ranked.id)
            .ok_or_else(|| unknown_placeholder(ranked.id))?;
        let next = names.registers.len();
        names
            .registers
            .entry(original.name.clone())
            .or_insert_with(|| format!("{next}{REGISTER_NAME_SUFFIX}"));
    }

    for ranked in &ranking.addresses {
        let original = batch
            .addresses
            .get(&ranked.id)
            .ok_or_else(|| unknown_placeholder(ranked.id))?;
        let next = names.addresses.len();
        names
            .addresses
            .entry(original.value)
            .or_insert_with(|| format!("{next}{ADDRESS_NAME_SUFFIX}"));
    }

    debug!(
        "assigned {} register and {} address names",
        names.registers.len(),
        names.addresses.len()
    );
    Ok(names)
}

/// Replaces every placeholder with its canonical variable.
///
/// # Errors
///
/// Propagates [`Error::CollaboratorUnavailable`] from the workspace string lookup.
pub(crate) fn rename<W>(
    batch: &TaggedBatch,
    names: &NameTables,
    workspace: &W,
    width: u8,
) -> Result<Vec<Expr>>
where
    W: Workspace + ?Sized,
{
    let mut renamed: HashMap<NodeId, Expr> = HashMap::new();
    let mut trees = Vec::with_capacity(batch.trees.len());

    for tree in &batch.trees {
        let rewritten = try_walk(tree, |_path, node| {
            let id = node.id();
            if let Some(canonical) = renamed.get(&id) {
                return Ok(Some(canonical.clone()));
            }

            let canonical = if let Some(original) = batch.registers.get(&id) {
                let name = names
                    .registers
                    .get(&original.name)
                    .ok_or_else(|| unknown_placeholder(id))?;
                Expr::variable(name.as_str(), width)
            } else if let Some(original) = batch.addresses.get(&id) {
                let name = names
                    .addresses
                    .get(&original.value)
                    .ok_or_else(|| unknown_placeholder(id))?;
                let variable = Expr::variable(name.as_str(), width);
                match workspace.string_literal(original.value)? {
                    Some(label) => variable.with_label(label),
                    None => variable,
                }
            } else {
                return Ok(None);
            };

            renamed.insert(id, canonical.clone());
            Ok(Some(canonical))
        })?;
        trees.push(rewritten);
    }

    Ok(trees)
}

fn unknown_placeholder(id: NodeId) -> Error {
    Error::Error(format!("placeholder {id} has no recorded original"))
}
