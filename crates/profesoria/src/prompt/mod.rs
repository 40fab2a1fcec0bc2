//! Instruction construction for the three model-backed operations.
//!
//! - [`InstructionBuilder`]: low-level assembly of headed blocks, numbered
//!   rules and context fields.
//! - [`templates`]: the skeleton, unit-content and grading instructions.
//!
//! Nothing here touches the network or any state.

pub mod builder;
pub mod templates;

pub use builder::InstructionBuilder;
pub use templates::{grading_prompt, skeleton_prompt, unit_content_prompt};
