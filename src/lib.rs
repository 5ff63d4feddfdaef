// Clippy allows for reasonable defaults
#![allow(clippy::new_without_default)] // Default not always appropriate for stateful types
#![allow(clippy::derivable_impls)] // Explicit Default impls can be clearer
#![allow(clippy::field_reassign_with_default)] // Builder pattern is clearer
#![allow(clippy::unnecessary_map_or)] // map_or can be clearer than alternatives
#![allow(clippy::needless_borrow)] // Explicit borrows can clarify ownership
#![allow(clippy::redundant_closure)] // |x| f(x) can be clearer than f

// Module declarations
pub mod assembler;
pub mod capture;
pub mod collector;
pub mod config;
pub mod enrichment;
pub mod events;
pub mod export;
pub mod harvest;
pub mod models;
pub mod resolver;
pub mod source;
mod utils;

// Re-export the types most callers need
pub use capture::{CaptureError, CaptureOutcome, CaptureSession};
pub use config::{ConfigManager, HarvestConfig};
pub use models::*;
pub use source::{DomSource, HtmlFrames};
