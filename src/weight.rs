//! Calibrated power-law weight model.
//!
//! `weight = k * area^1.5`, where `area` is the bounding-box area in square pixels
//! and `k` is a run-level calibration constant supplied from outside.

use crate::error::WeightError;

/// Calibration constant used when none is configured.
pub const DEFAULT_CALIBRATION_K: f64 = 0.00005;

/// Exponent applied to the box area.
pub const AREA_EXPONENT: f64 = 1.5;

/// Estimate a weight from a box area with calibration constant `k`.
///
/// Defined for `area == 0` (returns 0). Negative or non-finite areas are rejected
/// instead of producing NaN, so a malformed box cannot poison a track's statistics.
pub fn estimate(area: f64, k: f64) -> Result<f64, WeightError> {
    if !area.is_finite() || area < 0.0 {
        return Err(WeightError::InvalidArea(area));
    }
    Ok(k * area.powf(AREA_EXPONENT))
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightModel {
    k: f64,
}

impl WeightModel {
    pub fn new(k: f64) -> Result<Self, WeightError> {
        if !k.is_finite() || k <= 0.0 {
            return Err(WeightError::InvalidCalibration(k));
        }
        Ok(Self { k })
    }

    pub fn calibration(&self) -> f64 {
        self.k
    }

    pub fn estimate(&self, area: f64) -> Result<f64, WeightError> {
        estimate(area, self.k)
    }
}

impl Default for WeightModel {
    fn default() -> Self {
        Self {
            k: DEFAULT_CALIBRATION_K,
        }
    }
}
