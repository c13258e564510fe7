//! Core types for Parley.

pub mod history;
pub mod media;
pub mod message;

pub use history::*;
pub use media::*;
pub use message::*;
