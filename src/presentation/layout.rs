//! Sector geometry shared by the renderer and the selection engine.
//!
//! Angles are in degrees. Sector `i` of `n` covers `[i * 360/n, (i+1) * 360/n)`
//! measured clockwise from the pointer, which sits at the fixed reference
//! direction. Rotating the wheel clockwise by `r` degrees moves the wheel-frame
//! angle `(-r) mod 360` under the pointer.

use std::sync::Arc;

/// Degrees in one full turn.
pub const FULL_TURN: f64 = 360.0;

/// One option's slice of the wheel.
#[derive(Debug, Clone, PartialEq)]
pub struct Sector {
    /// Position of the option in the group.
    pub index: usize,
    /// Option label.
    pub label: String,
    /// Start angle in the wheel frame.
    pub start_deg: f64,
    /// Angular width.
    pub sweep_deg: f64,
}

/// Stable sector assignment for an ordered option sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct WheelLayout {
    labels: Arc<[String]>,
}

impl WheelLayout {
    /// Lay out `labels` in their given order.
    pub fn new(labels: Arc<[String]>) -> Self {
        Self { labels }
    }

    /// Number of sectors.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the wheel has no sector.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Width of every sector, `360 / n`.
    pub fn sector_width(&self) -> f64 {
        if self.labels.is_empty() {
            return FULL_TURN;
        }
        FULL_TURN / self.labels.len() as f64
    }

    /// Sector of option `index`.
    pub fn sector(&self, index: usize) -> Option<Sector> {
        let label = self.labels.get(index)?;
        let width = self.sector_width();
        Some(Sector {
            index,
            label: label.clone(),
            start_deg: index as f64 * width,
            sweep_deg: width,
        })
    }

    /// All sectors in option order.
    pub fn sectors(&self) -> Vec<Sector> {
        (0..self.labels.len())
            .filter_map(|index| self.sector(index))
            .collect()
    }

    /// Index of the sector under the pointer for a wheel rotated by `rotation`.
    pub fn sector_at(&self, rotation: f64) -> Option<usize> {
        if self.labels.is_empty() {
            return None;
        }
        let angle = normalize(-rotation);
        let index = (angle / self.sector_width()).floor() as usize;
        Some(index.min(self.labels.len() - 1))
    }

    /// Normalized rotation in `[0, 360)` that puts the point at `fraction`
    /// (0 = sector start, 1 = sector end) of sector `index` under the pointer.
    ///
    /// This is the inverse of [`WheelLayout::sector_at`].
    pub fn resting_rotation(&self, index: usize, fraction: f64) -> f64 {
        let point = (index as f64 + fraction.clamp(0.0, 1.0)) * self.sector_width();
        normalize(FULL_TURN - point)
    }
}

/// Normalize any angle into `[0, 360)`.
fn normalize(angle: f64) -> f64 {
    // rem_euclid can round up to the modulus for tiny negative inputs
    let normalized = angle.rem_euclid(FULL_TURN);
    if normalized >= FULL_TURN { 0.0 } else { normalized }
}
