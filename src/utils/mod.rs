//! Shared utility functions.
//!
//! This module contains reusable utilities used across the codebase:
//! - `format`: Human-readable formatting (sizes, etc.)
//! - `text`: Filename sanitization and text cleanup

mod format;
mod text;

pub use format::format_size;
pub use text::{collapse_blank_lines, sanitize_filename, squash_whitespace};
