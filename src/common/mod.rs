//! Ambient infrastructure shared by every stage: arenas, source text and
//! spans, diagnostics, and target descriptors.

pub mod arena;
pub mod error;
pub mod source;
pub mod target;
