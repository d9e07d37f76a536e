//! Savings Calendar service core: authentication, authorization, per-user
//! dated savings entries and the administrative surface, exposed as
//! services for a thin routing layer to mount.

pub mod admin;
pub mod auth;
pub mod config;
pub mod error;
pub mod savings;
pub mod state;
pub mod store;
pub mod telemetry;

pub use error::AuthError;
pub use state::AppState;
