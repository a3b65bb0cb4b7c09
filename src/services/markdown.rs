//! Markdown rendering service
//!
//! Converts post bodies to HTML with pulldown-cmark. Raw HTML in the source
//! is escaped rather than passed through, since post content is rendered
//! into public pages.
//!
//! # Example
//!
//! ```
//! use mtg_blog::services::markdown::MarkdownRenderer;
//!
//! let renderer = MarkdownRenderer::new();
//! let html = renderer.render("# Deck Tech\n\nThis is **bold** text.");
//! assert!(html.contains("<h1>"));
//! assert!(html.contains("<strong>"));
//! ```

use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

/// Markdown renderer with tables, strikethrough and task lists enabled
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: Options,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        Self { options }
    }

    /// Renders Markdown text to HTML.
    ///
    /// Fenced code blocks keep their language as a `language-*` class so a
    /// theme can highlight them client side.
    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.options);
        let events = process_events(parser);

        let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }

    /// Plain-text excerpt of at most `max_chars` characters, for listings
    pub fn excerpt(&self, markdown: &str, max_chars: usize) -> String {
        let mut text = String::new();
        for event in Parser::new_ext(markdown, self.options) {
            match event {
                Event::Text(t) | Event::Code(t) => text.push_str(&t),
                Event::SoftBreak
                | Event::HardBreak
                | Event::End(TagEnd::Paragraph)
                | Event::End(TagEnd::Heading(_))
                | Event::End(TagEnd::Item) => text.push(' '),
                _ => {}
            }
        }

        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.chars().count() <= max_chars {
            return text;
        }
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}…", cut.trim_end())
    }
}

fn process_events(parser: Parser<'_>) -> Vec<Event<'_>> {
    let mut events = Vec::new();
    let mut code_lang: Option<String> = None;
    let mut code_content = String::new();
    let mut in_code_block = false;

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                in_code_block = true;
                code_content.clear();
                code_lang = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                    _ => None,
                };
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                let block = match code_lang.take() {
                    Some(lang) => format!(
                        "<pre><code class=\"language-{}\">{}</code></pre>\n",
                        html_escape(&lang),
                        html_escape(&code_content)
                    ),
                    None => format!("<pre><code>{}</code></pre>\n", html_escape(&code_content)),
                };
                events.push(Event::Html(block.into()));
            }
            Event::Text(text) if in_code_block => code_content.push_str(&text),
            Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
            other => events.push(other),
        }
    }

    events
}

/// Escapes HTML special characters in a string.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
