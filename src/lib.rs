//! Region/year case dashboard core.
//!
//! Loads a daily per-region case table once, keeps a per-session selection,
//! and recomputes three chart views (daily new cases, latest category split,
//! cross-region ranking) on every selection change. Drawing is left to
//! whatever observes [`sinks::ViewSinks`].

pub mod config;
pub mod controller;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod selection;
pub mod sinks;
