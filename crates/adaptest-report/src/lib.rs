//! Report rendering for adaptest.
//!
//! Takes a computed `ValidityReport` and renders it for humans: Markdown for
//! terminals and ticket systems, HTML for the admin dashboard.

pub mod html;
pub mod markdown;

pub use html::{generate_html, write_html_report};
pub use markdown::generate_markdown;
