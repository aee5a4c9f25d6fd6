//! src/lib.rs
//!
//! Campaign audience editor: a group-backed client roster and a manual
//! staging list, kept free of duplicates, filtered and paged for the
//! operator, and reduced to the recipient set handed to the sender.
pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod model;
pub mod notify;
pub mod ranking;
pub mod roster;
pub mod routes;
pub mod selector;
pub mod session;
pub mod staging;
pub mod stats;
pub mod transfer;
pub mod view;

pub use error::{AudienceError, Result};
pub use session::AudienceSession;
