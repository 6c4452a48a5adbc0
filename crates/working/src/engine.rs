//! The transformation engine: pure evaluation of a task ancestor chain.
//!
//! Given the consumed lot's spec (the implicit root) and the root-first
//! chain of tasks ending at one RELEASE leaf, compute the leaf's output
//! packaging, dimensions, and quantity. Evaluation is a pure fold with no
//! IO and no side effects; the caller persists provisional/real stock and
//! ledger rows from the returned value.
//!
//! Quantity basis follows the running packaging: grams while the material
//! is a ROLL, pieces after the single ROLL → count transition. That
//! transition happens at a CONVERTING step declaring `size_y > 0` on roll
//! input, and never a second time; a step that would turn counted material
//! back into a roll is a structural error.

use serde::{Deserialize, Serialize};

use papermill_core::{DomainError, DomainResult};
use papermill_stock::{PackagingType, StockSpec, pieces_from_weight};

use crate::task::{Task, TaskKind};

/// The evaluated output of one root-to-leaf chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainOutput {
    pub packaging: PackagingType,
    pub grammage: u32,
    pub size_x: u32,
    pub size_y: u32,
    /// Grams for ROLL output, pieces otherwise.
    pub quantity: i64,
}

impl ChainOutput {
    /// Build the output lot's spec, carrying the root's paper attributes.
    pub fn to_spec(&self, root: &StockSpec) -> StockSpec {
        StockSpec {
            product_id: root.product_id,
            packaging: self.packaging,
            grammage: self.grammage,
            size_x: self.size_x,
            size_y: self.size_y,
            color: root.color.clone(),
            pattern: root.pattern.clone(),
            certification: root.certification.clone(),
        }
    }
}

/// Evaluate a root-first ancestor chain terminating at one RELEASE leaf.
///
/// `root_quantity` is in the root spec's packaging units. A malformed chain
/// (empty, RELEASE before the end, non-RELEASE leaf, cutting a roll on the
/// guillotine, growing the format) fails fast with a structural error.
pub fn evaluate_chain(
    root: &StockSpec,
    root_quantity: i64,
    chain: &[&Task],
) -> DomainResult<ChainOutput> {
    let Some((leaf, steps)) = chain.split_last() else {
        return Err(DomainError::structural("cannot evaluate an empty chain"));
    };

    let mut state = ChainOutput {
        packaging: root.packaging,
        grammage: root.grammage,
        size_x: root.size_x,
        size_y: root.size_y,
        quantity: root_quantity,
    };

    for step in steps {
        state = apply_step(state, step)?;
    }

    match leaf.kind() {
        TaskKind::Release { quantity: declared } => {
            // The chain caps what physically exists; the declared value is
            // what the operator promised downstream. Emit the smaller.
            state.quantity = declared.min(state.quantity);
            Ok(state)
        }
        _ => Err(DomainError::structural("chain leaf must be a release task")),
    }
}

fn apply_step(mut state: ChainOutput, step: &Task) -> DomainResult<ChainOutput> {
    match step.kind() {
        TaskKind::Converting { size_x, size_y } => {
            if state.packaging.is_roll() {
                if size_y > 0 {
                    // The single ROLL → count transition: weight becomes a
                    // piece count on the target format.
                    state.quantity =
                        pieces_from_weight(state.quantity, state.grammage, size_x, size_y);
                    state.packaging = PackagingType::Sheet;
                }
                // size_y == 0 is slitting/re-reeling: weight is conserved.
            } else if size_y == 0 {
                return Err(DomainError::structural(
                    "counted material cannot return to a roll",
                ));
            }
            state.size_x = size_x;
            state.size_y = size_y;
            Ok(state)
        }
        TaskKind::Guillotine { size_x, size_y } => {
            if state.packaging.is_roll() {
                return Err(DomainError::structural(
                    "guillotine requires count-based input",
                ));
            }
            if size_x > state.size_x || size_y > state.size_y {
                return Err(DomainError::structural(
                    "guillotine target exceeds the running format",
                ));
            }
            // Remainder area is loss; it is not emitted as separate output.
            let multiple = i64::from(state.size_x / size_x) * i64::from(state.size_y / size_y);
            state.quantity = state.quantity.saturating_mul(multiple);
            state.size_x = size_x;
            state.size_y = size_y;
            Ok(state)
        }
        TaskKind::Release { .. } => Err(DomainError::structural(
            "release must be the leaf of its chain",
        )),
    }
}
