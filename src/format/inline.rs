//! Inline markup: code spans, emphasis variants and bare links.

use regex::{Captures, Regex};

/// Combined inline pattern. Alternatives are tried in precedence order at
/// each position: code, strong, emphasis, underline, strikethrough, link.
const INLINE_PATTERN: &str =
    r"(`[^`]+`)|(\*\*[^*]+\*\*)|(\*[^*]+\*)|(__[^_]+__)|(~~[^~]+~~)|(https?://\S+)";

/// One inline span.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Inline {
    /// Literal text.
    Text(String),
    /// Inline code; its contents are never reinterpreted.
    Code(String),
    /// `**strong**`
    Strong(Vec<Inline>),
    /// `*emphasis*`
    Emphasis(Vec<Inline>),
    /// `__underline__`
    Underline(Vec<Inline>),
    /// `~~strikethrough~~`
    Strikethrough(Vec<Inline>),
    /// Bare `http(s)://` URL.
    Link(String),
}

impl Inline {
    /// Text with the markup removed.
    #[must_use]
    pub fn plain_text(spans: &[Self]) -> String {
        let mut out = String::new();
        for span in spans {
            span.push_plain(&mut out);
        }
        out
    }

    fn push_plain(&self, out: &mut String) {
        match self {
            Self::Text(text) | Self::Code(text) | Self::Link(text) => out.push_str(text),
            Self::Strong(children)
            | Self::Emphasis(children)
            | Self::Underline(children)
            | Self::Strikethrough(children) => {
                for child in children {
                    child.push_plain(out);
                }
            }
        }
    }
}

/// Parser for inline markup.
#[derive(Clone, Debug)]
pub struct InlineParser {
    pattern: Regex,
}

impl InlineParser {
    /// Compile the inline pattern.
    ///
    /// # Errors
    /// Returns an error if the pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(INLINE_PATTERN)?,
        })
    }

    /// Parse one line of text into spans.
    ///
    /// Delimited spans have their inner text parsed again, so strong text
    /// may contain code or underline. Code spans and links are leaves.
    #[must_use]
    pub fn parse(&self, text: &str) -> Vec<Inline> {
        let mut spans = Vec::new();
        let mut last = 0;
        for caps in self.pattern.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if whole.start() > last {
                spans.push(Inline::Text(text[last..whole.start()].to_string()));
            }
            spans.push(self.span(&caps, whole.as_str()));
            last = whole.end();
        }
        if last < text.len() {
            spans.push(Inline::Text(text[last..].to_string()));
        }
        spans
    }

    fn span(&self, caps: &Captures<'_>, matched: &str) -> Inline {
        let inner = |width: usize| &matched[width..matched.len() - width];
        if caps.get(1).is_some() {
            Inline::Code(inner(1).to_string())
        } else if caps.get(2).is_some() {
            Inline::Strong(self.parse(inner(2)))
        } else if caps.get(3).is_some() {
            Inline::Emphasis(self.parse(inner(1)))
        } else if caps.get(4).is_some() {
            Inline::Underline(self.parse(inner(2)))
        } else if caps.get(5).is_some() {
            Inline::Strikethrough(self.parse(inner(2)))
        } else {
            Inline::Link(matched.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> InlineParser {
        InlineParser::new().unwrap()
    }

    fn text(value: &str) -> Inline {
        Inline::Text(value.to_string())
    }

    #[test]
    fn test_plain_text_is_one_span() {
        assert_eq!(parser().parse("hello there"), vec![text("hello there")]);
        assert!(parser().parse("").is_empty());
    }

    #[test]
    fn test_each_markup_kind() {
        let spans = parser().parse("`c` **s** *e* __u__ ~~d~~");
        assert_eq!(
            spans,
            vec![
                Inline::Code("c".to_string()),
                text(" "),
                Inline::Strong(vec![text("s")]),
                text(" "),
                Inline::Emphasis(vec![text("e")]),
                text(" "),
                Inline::Underline(vec![text("u")]),
                text(" "),
                Inline::Strikethrough(vec![text("d")]),
            ]
        );
    }

    #[test]
    fn test_code_span_contents_are_protected() {
        let spans = parser().parse("run `a **b** https://x.io`");
        assert_eq!(
            spans,
            vec![text("run "), Inline::Code("a **b** https://x.io".to_string())]
        );
    }

    #[test]
    fn test_delimited_spans_nest() {
        let spans = parser().parse("**see `x` and __y__**");
        assert_eq!(
            spans,
            vec![Inline::Strong(vec![
                text("see "),
                Inline::Code("x".to_string()),
                text(" and "),
                Inline::Underline(vec![text("y")]),
            ])]
        );
    }

    #[test]
    fn test_bare_links() {
        let spans = parser().parse("docs at https://example.com/a?b=1 now");
        assert_eq!(
            spans,
            vec![
                text("docs at "),
                Inline::Link("https://example.com/a?b=1".to_string()),
                text(" now"),
            ]
        );
    }

    #[test]
    fn test_unclosed_markers_stay_literal() {
        assert_eq!(parser().parse("2 * 3 = `6"), vec![text("2 * 3 = `6")]);
    }

    #[test]
    fn test_plain_text_strips_markup() {
        let spans = parser().parse("**bold** and `code`");
        assert_eq!(Inline::plain_text(&spans), "bold and code");
    }
}
