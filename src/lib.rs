//! Calliope — trait-driven dialogue selection and branching scenes for games.
//!
//! Characters carry traits, fragments of dialogue declare what they need
//! and what they favour, and scenes are graphs of beats whose branches
//! read relationships, traits and scene-local facts. The engine casts a
//! scene, picks and renders a line for each beat, applies the line's side
//! effects and walks the graph.

pub mod config;
pub mod core;
pub mod schema;

pub use crate::config::CalliopeConfig;
pub use crate::core::engine::{BeatLine, Calliope, CalliopeBuilder, CalliopeError};
pub use crate::core::library::{ContentLibrary, ContentPack};
