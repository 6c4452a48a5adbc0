//! Physical spec of a paper lot.

use serde::{Deserialize, Serialize};

use papermill_core::{DomainError, DomainResult, ProductId};

/// How a lot is packaged, which fixes its quantity basis.
///
/// ROLL quantities are continuous weight in grams; every other packaging is
/// a discrete piece count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackagingType {
    Roll,
    Sheet,
    Ream,
    Box,
}

impl PackagingType {
    pub fn is_roll(self) -> bool {
        matches!(self, PackagingType::Roll)
    }

    pub fn is_count_based(self) -> bool {
        !self.is_roll()
    }
}

/// Immutable physical spec of a lot.
///
/// Fixed when the lot enters the system; a changed spec means a different
/// lot. Dimensions are millimetres; a continuous roll has `size_y == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSpec {
    pub product_id: ProductId,
    pub packaging: PackagingType,
    /// Paper weight in g/m².
    pub grammage: u32,
    /// Width in mm.
    pub size_x: u32,
    /// Length in mm; 0 for a continuous roll.
    pub size_y: u32,
    pub color: Option<String>,
    pub pattern: Option<String>,
    pub certification: Option<String>,
}

impl StockSpec {
    pub fn validate(&self) -> DomainResult<()> {
        if self.grammage == 0 {
            return Err(DomainError::validation("grammage must be positive"));
        }
        if self.size_x == 0 {
            return Err(DomainError::validation("size_x must be positive"));
        }
        if self.packaging.is_roll() && self.size_y != 0 {
            return Err(DomainError::validation("a roll has no size_y"));
        }
        if self.packaging.is_count_based() && self.size_y == 0 {
            return Err(DomainError::validation(
                "count-based packaging requires size_y",
            ));
        }
        Ok(())
    }
}

/// Pieces of `size_x` × `size_y` mm at `grammage` g/m² that a continuous
/// weight of `weight_g` grams yields.
///
/// One piece weighs `grammage × (size_x / 1000) × (size_y / 1000)` grams.
/// Floor division; the remainder weight is loss. This is the single
/// weight-to-count conversion used at a ROLL → count packaging boundary.
pub fn pieces_from_weight(weight_g: i64, grammage: u32, size_x: u32, size_y: u32) -> i64 {
    let piece_area = i128::from(grammage) * i128::from(size_x) * i128::from(size_y);
    if piece_area == 0 || weight_g <= 0 {
        return 0;
    }
    // weight_g × 10⁶ / (grammage × x × y), widened so mm² never overflows.
    let pieces = i128::from(weight_g) * 1_000_000 / piece_area;
    i64::try_from(pieces).unwrap_or(i64::MAX)
}
