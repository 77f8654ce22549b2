//! Content generation engine for Primer.
//!
//! Sits between callers and the completion client: turns one "generate
//! flashcards about X" call into a throttled, fallback-protected model
//! sweep, recovers structured data from whatever text comes back, and
//! guarantees the caller a structurally valid object - from the model when
//! possible, from a deterministic template when not.

mod generate;
mod recovery;
mod validate;

pub use generate::{Generated, GenerateError, Generator, Source};
pub use recovery::{JsonShape, Recovery, recover};
pub use validate::{
    fallback_flashcards, fallback_module, fallback_nudges, fallback_quiz, normalize_flashcards,
    validate_flashcards, validate_module, validate_nudges, validate_quiz,
};
