//! Runtime components, from the shared stores up to the composition root.

pub mod assembler;
pub mod casting;
pub mod engine;
pub mod library;
pub mod line_builder;
pub mod modifiers;
pub mod orchestrator;
pub mod relationships;
pub mod scene_context;
pub mod scoring;
pub mod selection;
pub mod validation;
