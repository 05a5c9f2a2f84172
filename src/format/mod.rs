//! Content formatting: text to display nodes, display nodes to HTML.
//!
//! - `blocks`: paragraphs, line breaks, bullet lists and fenced code
//! - `inline`: code spans, emphasis variants and bare links
//! - `html`: escaping HTML renderer

pub mod blocks;
pub mod html;
pub mod inline;

pub use blocks::{CodeBlock, ContentFormatter, DisplayNode};
pub use html::{COPIED_LABEL, COPY_LABEL, render_html};
pub use inline::{Inline, InlineParser};
