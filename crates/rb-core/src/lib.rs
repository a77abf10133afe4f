//! reply-board/crates/rb-core/src/lib.rs
//!
//! The central domain types and interface definitions for Reply-Board.

pub mod error;
pub mod events;
pub mod models;
pub mod pagination;
pub mod search;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use events::*;
pub use models::*;
pub use pagination::*;
pub use search::*;
pub use traits::*;
