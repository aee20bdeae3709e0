//! Boundary between the selection engine and whatever draws the wheel.

pub mod console;
pub mod layout;

use thiserror::Error;

pub use self::layout::{Sector, WheelLayout};

/// One animation frame, as produced by the selection engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WheelFrame {
    /// Continuous variant: absolute wheel rotation in degrees.
    Rotation {
        /// Accumulated rotation, not normalized.
        angle: f64,
    },
    /// Discrete variant: index of the highlighted sector.
    Highlight {
        /// Highlighted option.
        index: usize,
    },
}

/// Failure reported by a rendering surface.
#[derive(Debug, Error)]
#[error("render failed: {message}")]
pub struct RenderError {
    message: String,
    #[source]
    source: Option<std::io::Error>,
}

impl RenderError {
    /// Error without an underlying cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Error caused by an I/O failure on the output device.
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self {
            message: message.into(),
            source: Some(source),
        }
    }
}

/// Surface able to draw the wheel.
///
/// Sectors must be drawn in layout order so that the engine's winner index and
/// the highlighted sector always agree.
pub trait WheelSurface: Send + Sync {
    /// Draw the sectors for a new spin.
    fn layout(&self, layout: &WheelLayout) -> Result<(), RenderError>;
    /// Remove the winner mark left by a previous spin.
    fn clear_winner(&self) -> Result<(), RenderError>;
    /// Draw one animation frame.
    fn draw_frame(&self, frame: &WheelFrame) -> Result<(), RenderError>;
    /// Mark exactly one sector as the winner.
    fn mark_winner(&self, sector: &Sector) -> Result<(), RenderError>;
}
