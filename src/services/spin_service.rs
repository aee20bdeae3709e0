//! Spin control for the selected group.

use crate::{
    engine::SpinHandle,
    error::ServiceError,
    state::{AppState, spin_machine::{SessionId, SpinSnapshot}},
};

/// Spin the wheel over a frozen copy of the selected group's options.
pub async fn start_spin(state: &mut AppState) -> Result<SpinHandle, ServiceError> {
    let group = state
        .selected()
        .ok_or(ServiceError::NoGroupSelected)?
        .to_owned();
    let options = state.store().options(&group)?;
    state.engine_mut().start(&group, options).await
}

/// Stop the running spin before its reveal.
pub async fn stop_spin(state: &mut AppState) -> Result<SessionId, ServiceError> {
    state.engine_mut().cancel().await
}

/// Current spin state.
pub fn status(state: &AppState) -> SpinSnapshot {
    state.engine().snapshot()
}
