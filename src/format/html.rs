//! HTML rendering of display nodes.

use std::fmt::Write as _;

use crate::format::blocks::{CodeBlock, DisplayNode};
use crate::format::inline::Inline;

/// Label of a code block's copy button.
pub const COPY_LABEL: &str = "Copy";
/// Label shown while a copy is acknowledged.
pub const COPIED_LABEL: &str = "Copied";

/// Render `nodes` to an HTML fragment.
///
/// `copied` is the index of the code block whose copy is currently
/// acknowledged, if any.
#[must_use]
pub fn render_html(nodes: &[DisplayNode], copied: Option<usize>) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            DisplayNode::Paragraph(spans) => {
                out.push_str("<p>");
                push_inline(&mut out, spans);
                out.push_str("</p>");
            }
            DisplayNode::LineBreak => out.push_str("<br>"),
            DisplayNode::List(items) => {
                out.push_str("<ul>");
                for item in items {
                    out.push_str("<li>");
                    push_inline(&mut out, item);
                    out.push_str("</li>");
                }
                out.push_str("</ul>");
            }
            DisplayNode::CodeBlock(block) => push_code_block(&mut out, block, copied),
        }
    }
    out
}

fn push_code_block(out: &mut String, block: &CodeBlock, copied: Option<usize>) {
    let label = if copied == Some(block.index) {
        COPIED_LABEL
    } else {
        COPY_LABEL
    };
    let _ = write!(
        out,
        "<div class=\"code-block\"><button type=\"button\" class=\"copy\" data-index=\"{}\">{label}</button><pre><code",
        block.index
    );
    if let Some(language) = &block.language {
        out.push_str(" class=\"language-");
        push_escaped(out, language);
        out.push('"');
    }
    out.push('>');
    push_escaped(out, &block.text);
    out.push_str("</code></pre></div>");
}

fn push_inline(out: &mut String, spans: &[Inline]) {
    for span in spans {
        match span {
            Inline::Text(text) => push_escaped(out, text),
            Inline::Code(text) => {
                out.push_str("<code>");
                push_escaped(out, text);
                out.push_str("</code>");
            }
            Inline::Strong(children) => wrap(out, "strong", children),
            Inline::Emphasis(children) => wrap(out, "em", children),
            Inline::Underline(children) => wrap(out, "u", children),
            Inline::Strikethrough(children) => wrap(out, "del", children),
            Inline::Link(url) => {
                out.push_str("<a href=\"");
                push_escaped(out, url);
                out.push_str("\" target=\"_blank\" rel=\"noopener noreferrer\">");
                push_escaped(out, url);
                out.push_str("</a>");
            }
        }
    }
}

fn wrap(out: &mut String, tag: &str, children: &[Inline]) {
    let _ = write!(out, "<{tag}>");
    push_inline(out, children);
    let _ = write!(out, "</{tag}>");
}

/// Escape text for use in element content and quoted attributes.
pub fn push_escaped(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
}
