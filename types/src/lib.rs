//! Core domain types for Primer.
//!
//! This crate is IO-free and async-free: the model catalog with its
//! deterministic selector, and the content shapes the generation layer
//! hands back to callers. Everything here is either immutable after
//! construction or a plain data carrier.

mod content;
mod model;

pub use content::{
    ContentKind, Flashcard, FlashcardSet, ModuleContent, ModuleSection, Nudge, NudgeSet,
    QuizQuestion, QuizSet,
};
pub use model::{
    Capability, CatalogError, Complexity, ContentType, EnumKind, EnumParseError, ModelCatalog,
    ModelDescriptor, Speed,
};
