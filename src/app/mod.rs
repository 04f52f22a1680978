//! Client application logic: state, input handling and the actions they produce.

pub mod action;
pub mod commands;
pub mod event;
pub mod handler;
pub mod state;
