//! Library crate for lottery-wheel, exposing modules for the binary and integration tests.

/// Runtime configuration loading.
pub mod config;
/// Storage backends for the group collection.
pub mod dao;
/// Wire messages and user notifications.
pub mod dto;
/// Winner selection and wheel animation.
pub mod engine;
/// Service-level errors.
pub mod error;
/// Rendering boundary of the wheel.
pub mod presentation;
/// Console front end.
pub mod routes;
/// Operations invoked by the front end.
pub mod services;
/// Application state, group store and spin state machine.
pub mod state;
