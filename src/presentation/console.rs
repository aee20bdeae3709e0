//! Terminal rendering of the wheel: one status line rewritten in place.

use std::{
    io::{self, Write},
    sync::Mutex,
};

use super::{RenderError, Sector, WheelFrame, WheelLayout, WheelSurface};

struct ConsoleState {
    out: Box<dyn Write + Send>,
    layout: Option<WheelLayout>,
    pointed: Option<usize>,
}

/// Surface printing the option under the pointer whenever it changes.
pub struct ConsoleSurface {
    state: Mutex<ConsoleState>,
}

impl ConsoleSurface {
    /// Surface writing to standard output.
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Surface writing to an arbitrary sink.
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            state: Mutex::new(ConsoleState {
                out,
                layout: None,
                pointed: None,
            }),
        }
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut ConsoleState) -> io::Result<T>,
    ) -> Result<T, RenderError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| RenderError::new("console surface poisoned"))?;
        f(&mut state).map_err(|err| RenderError::io("console write failed", err))
    }
}

impl WheelSurface for ConsoleSurface {
    fn layout(&self, layout: &WheelLayout) -> Result<(), RenderError> {
        self.with_state(|state| {
            let labels: Vec<String> = layout
                .sectors()
                .into_iter()
                .map(|sector| format!("[{}] {}", sector.index, sector.label))
                .collect();
            writeln!(state.out, "wheel: {}", labels.join("  "))?;
            state.layout = Some(layout.clone());
            state.pointed = None;
            state.out.flush()
        })
    }

    fn clear_winner(&self) -> Result<(), RenderError> {
        self.with_state(|state| {
            state.pointed = None;
            Ok(())
        })
    }

    fn draw_frame(&self, frame: &WheelFrame) -> Result<(), RenderError> {
        self.with_state(|state| {
            let Some(layout) = state.layout.as_ref() else {
                return Ok(());
            };
            let index = match *frame {
                WheelFrame::Rotation { angle } => layout.sector_at(angle),
                WheelFrame::Highlight { index } => Some(index),
            };
            if index.is_none() || index == state.pointed {
                return Ok(());
            }
            let label = index
                .and_then(|i| layout.sector(i))
                .map(|sector| sector.label)
                .unwrap_or_default();
            state.pointed = index;
            write!(state.out, "\r  > {label:<32}")?;
            state.out.flush()
        })
    }

    fn mark_winner(&self, sector: &Sector) -> Result<(), RenderError> {
        self.with_state(|state| {
            state.pointed = Some(sector.index);
            writeln!(state.out, "\r  * {:<32}", sector.label)?;
            state.out.flush()
        })
    }
}
