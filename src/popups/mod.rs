//!
//! The contents of the popups blocks can open.
pub mod music;
pub mod weather;
