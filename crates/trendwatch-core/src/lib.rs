//! Core scraping and alerting logic for trendwatchd
//!
//! This crate contains:
//! - Session acquisition (restore-and-probe, then the interactive login machine:
//!   Unauthenticated -> Identifying -> ChallengeCheck -> PasswordEntry -> Confirming -> Authenticated)
//! - Trend extraction behind a DOM capability trait
//! - Popularity score normalization
//! - Identity-preserving upsert of scraped trends
//! - Price alert sweeps with cooldown-based deduplication
//! - Read views for the dashboard

mod alerts;
mod extract;
mod login;
mod notify;
mod pipeline;
mod reconcile;
mod score;
mod session;
mod views;

#[cfg(test)]
mod testing;

pub use alerts::*;
pub use extract::*;
pub use login::*;
pub use notify::*;
pub use pipeline::*;
pub use reconcile::*;
pub use score::*;
pub use session::*;
pub use views::*;
