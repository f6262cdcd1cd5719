//! Uncodie Core - Entity Types
//!
//! Plain data structures shared by every crate in the workspace: the rows we
//! read from the relational store, the enums that classify them, identity
//! helpers and the error taxonomy. No I/O lives here.

pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;

pub use entities::*;
pub use enums::*;
pub use error::*;
pub use identity::*;
