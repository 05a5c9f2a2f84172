//! Line-level parsing of message text into display nodes.
//!
//! The formatter is stateless: every call parses the whole input again.

use crate::format::inline::{Inline, InlineParser};

const FENCE: &str = "```";
const BULLET: &str = "* ";

/// A fenced code block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CodeBlock {
    /// Position among sibling nodes; keys the copy acknowledgement.
    pub index: usize,
    /// Language hint written after the opening fence.
    pub language: Option<String>,
    /// Buffered lines joined with `\n`, verbatim.
    pub text: String,
}

/// A structured unit of displayed content.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DisplayNode {
    /// One non-blank line outside code and lists.
    Paragraph(Vec<Inline>),
    /// A blank line.
    LineBreak,
    /// A fenced code block.
    CodeBlock(CodeBlock),
    /// Consecutive bullet lines, one entry per item.
    List(Vec<Vec<Inline>>),
}

/// Turns message text into [`DisplayNode`]s.
#[derive(Clone, Debug)]
pub struct ContentFormatter {
    inline: InlineParser,
}

impl ContentFormatter {
    /// Build a formatter.
    ///
    /// # Errors
    /// Returns an error if the inline pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            inline: InlineParser::new()?,
        })
    }

    /// The inline parser used for paragraphs and list items.
    #[must_use]
    pub const fn inline(&self) -> &InlineParser {
        &self.inline
    }

    /// Parse `text` into nodes, in line order.
    #[must_use]
    pub fn format(&self, text: &str) -> Vec<DisplayNode> {
        if text.is_empty() {
            return Vec::new();
        }
        let mut pass = Pass::default();
        for raw in text.split('\n') {
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            self.line(&mut pass, line);
        }
        pass.flush_code();
        self.flush_list(&mut pass);
        pass.nodes
    }

    fn line<'a>(&self, pass: &mut Pass<'a>, line: &'a str) {
        let trimmed = line.trim();

        if let Some(hint) = trimmed.strip_prefix(FENCE) {
            self.flush_list(pass);
            if pass.in_code {
                pass.flush_code();
                pass.in_code = false;
            } else {
                pass.in_code = true;
                let hint = hint.trim();
                pass.language = (!hint.is_empty()).then(|| hint.to_string());
            }
            return;
        }

        if pass.in_code {
            pass.code.push(line);
            return;
        }

        if trimmed.starts_with(BULLET) {
            pass.list.push(trimmed);
            return;
        }
        self.flush_list(pass);

        if trimmed.is_empty() {
            pass.nodes.push(DisplayNode::LineBreak);
        } else {
            pass.nodes.push(DisplayNode::Paragraph(self.inline.parse(line)));
        }
    }

    fn flush_list(&self, pass: &mut Pass<'_>) {
        if pass.list.is_empty() {
            return;
        }
        let items = pass
            .list
            .drain(..)
            .map(|item| self.inline.parse(item.strip_prefix('*').unwrap_or(item).trim()))
            .collect();
        pass.nodes.push(DisplayNode::List(items));
    }
}

#[derive(Default)]
struct Pass<'a> {
    nodes: Vec<DisplayNode>,
    in_code: bool,
    language: Option<String>,
    code: Vec<&'a str>,
    list: Vec<&'a str>,
}

impl Pass<'_> {
    fn flush_code(&mut self) {
        let language = self.language.take();
        if self.code.is_empty() {
            return;
        }
        let text = self.code.join("\n");
        self.code.clear();
        let index = self.nodes.len();
        self.nodes.push(DisplayNode::CodeBlock(CodeBlock {
            index,
            language,
            text,
        }));
    }
}
