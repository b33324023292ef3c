//! Terminal client for the tasky task-management API.
//!
//! [`session`] keeps credentials on disk, [`api`] talks to the backend,
//! [`controller`] holds the view state machine, and [`tui`] draws it.

pub mod api;
pub mod config;
pub mod controller;
pub mod session;
pub mod tui;
