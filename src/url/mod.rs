//! URL handling module for Sumi-Lens
//!
//! This module provides URL syntax validation (the gate every URL passes before
//! any network call) and parsing of URL lists from text, TXT and CSV input.

mod input;
mod validate;

pub use input::{parse_url_list, InputFormat};
pub use validate::validate_url;
