//! Report rendering for terminal and machine consumers.

pub mod render;

pub use render::{render_json, render_report};
