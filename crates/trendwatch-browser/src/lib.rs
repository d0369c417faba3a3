//! Browser automation capability interface for trendwatch
//!
//! This crate defines the capability-based interface between the core and a
//! concrete automation backend (navigate, wait for elements, read text, fill
//! and submit fields, persist and restore authenticated state). It contains no
//! backend code itself apart from an in-memory mock for tests.

mod mock;
mod state;
mod traits;

pub use mock::*;
pub use state::*;
pub use traits::*;
