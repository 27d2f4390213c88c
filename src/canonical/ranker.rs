//! Second pass: order placeholders by position fingerprint.
//!
//! Numbering registers in the order they are first met is unstable: `(arg0 + ecx)` and
//! `(ecx + arg0)` meet `ecx` at different points of the walk. Instead, each placeholder gets
//! a fingerprint built from the *solved values* of the nodes on its path from the root. All
//! placeholders solve to the same value, so the fingerprint only depends on the shape and
//! the non-register content around the placeholder, and commutative reorderings produce the
//! same values.
//!
//! Fingerprints are collected over the whole batch and sorted as one step. Each segment is
//! a zero-padded 16 digit hex value, so lexicographic order matches numeric order.
//!
//! ```text
//! sym:00000000d3a1f2c4:00000000819e2b07:000000007f3ac011
//! ^^^ ^^^^^^^^^^^^^^^^ ^^^^^^^^^^^^^^^^ ^^^^^^^^^^^^^^^^
//! tag      root          ...parent       placeholder
//! ```

use std::{collections::BTreeMap, fmt::Write as _};

use log::{trace, warn};

use crate::{
    canonical::tagger::TaggedBatch,
    expr::{try_visit, Expr, NodeId},
    solver::{EvalContext, SolveCache, Solver},
    Result,
};

/// A placeholder occurrence and the fingerprint of its position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct RankedPlaceholder {
    /// Position fingerprint, the primary sort key.
    pub fingerprint: String,
    /// Placeholder identity. Placeholders are minted in walk order, so this breaks ties
    /// deterministically.
    pub id: NodeId,
}

/// Output of the ranking pass.
#[derive(Debug, Default)]
pub(crate) struct Ranking {
    /// Register placeholder occurrences, sorted.
    pub registers: Vec<RankedPlaceholder>,
    /// Address placeholder occurrences, sorted.
    pub addresses: Vec<RankedPlaceholder>,
    /// Adjacent entries sharing a fingerprint but standing for different originals.
    pub collisions: usize,
}

/// Computes and sorts the position fingerprints of every placeholder in the batch.
///
/// # Errors
///
/// Propagates [`crate::Error::Evaluation`] from the solver.
pub(crate) fn rank<S>(batch: &TaggedBatch, solver: &S, ctx: Option<&EvalContext>) -> Result<Ranking>
where
    S: Solver + ?Sized,
{
    let mut cache = SolveCache::new(solver, ctx);

    for tree in &batch.trees {
        cache.solve(tree)?;
    }

    let mut ranking = Ranking::default();
    for tree in &batch.trees {
        try_visit(tree, |path, node| {
            let id = node.id();
            if batch.registers.contains_key(&id) {
                let fingerprint = fingerprint("sym", path, node, &mut cache)?;
                trace!("register placeholder {id} at {fingerprint}");
                ranking.registers.push(RankedPlaceholder { fingerprint, id });
            } else if batch.addresses.contains_key(&id) {
                let fingerprint = fingerprint("va", path, node, &mut cache)?;
                trace!("address placeholder {id} at {fingerprint}");
                ranking.addresses.push(RankedPlaceholder { fingerprint, id });
            }
            Ok(())
        })?;
    }

    trace!("solved {} distinct nodes", cache.len());
    ranking.registers.sort();
    ranking.addresses.sort();

    ranking.collisions = count_collisions(&ranking.registers, |id| {
        batch
            .registers
            .get(&id)
            .map(|original| (original.name.clone(), &original.node))
    }) + count_collisions(&ranking.addresses, |id| {
        batch
            .addresses
            .get(&id)
            .map(|original| (original.value.to_string(), &original.node))
    });

    Ok(ranking)
}

fn fingerprint<S>(
    tag: &str,
    path: &[Expr],
    node: &Expr,
    cache: &mut SolveCache<'_, S>,
) -> Result<String>
where
    S: Solver + ?Sized,
{
    let mut fingerprint = String::with_capacity(tag.len() + (path.len() + 1) * 17);
    fingerprint.push_str(tag);
    for ancestor in path.iter().chain(std::iter::once(node)) {
        let value = cache.solve(ancestor)?;
        let _ = write!(fingerprint, ":{value:016x}");
    }
    Ok(fingerprint)
}

/// Counts fingerprint ties between placeholders of different originals.
///
/// Entries sharing a fingerprint form one group; a group standing for `n` distinct originals
/// adds `n - 1`, however its entries happen to be ordered. Such ties are ordered by identity
/// rather than merged, but the resulting numbering depends on walk order, so they are
/// reported.
fn count_collisions<'b, F>(sorted: &[RankedPlaceholder], original: F) -> usize
where
    F: Fn(NodeId) -> Option<(String, &'b Expr)>,
{
    let mut collisions = 0;
    let mut start = 0;

    while start < sorted.len() {
        let fingerprint = &sorted[start].fingerprint;
        let end = sorted[start..]
            .iter()
            .position(|entry| entry.fingerprint != *fingerprint)
            .map_or(sorted.len(), |offset| start + offset);

        let mut originals: BTreeMap<String, &Expr> = BTreeMap::new();
        for entry in &sorted[start..end] {
            if let Some((key, node)) = original(entry.id) {
                originals.entry(key).or_insert(node);
            }
        }

        if originals.len() > 1 {
            warn!(
                "fingerprint collision at {} between {:?}",
                fingerprint,
                originals.values().collect::<Vec<_>>()
            );
            collisions += originals.len() - 1;
        }
        start = end;
    }

    collisions
}
