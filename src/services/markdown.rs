//! Markdown rendering
//!
//! Converts content bodies to HTML with pulldown-cmark and extracts the
//! plain text used for summaries. Raw HTML in the source is escaped, so
//! authors cannot inject markup.
//!
//! # Example
//!
//! ```
//! use medstudy::services::markdown::MarkdownRenderer;
//!
//! let renderer = MarkdownRenderer::new();
//! let html = renderer.render("# Sepse\n\nLactato **> 2** mmol/L.");
//! assert!(html.contains("<h1>"));
//! assert!(html.contains("<strong>"));
//! ```

use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

/// Length of an auto-generated summary, in characters
pub const SUMMARY_LENGTH: usize = 200;

/// Stateless, thread-safe Markdown renderer.
///
/// Supports headings, lists, links, images, blockquotes, tables,
/// strikethrough, task lists and smart punctuation. Fenced code blocks get
/// a `language-*` class.
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

    /// Render Markdown to HTML
    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.options);
        let events = process_events(parser);

        let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }

    /// Text content of the document with whitespace collapsed
    pub fn plain_text(&self, markdown: &str) -> String {
        let mut text = String::new();
        for event in Parser::new_ext(markdown, self.options) {
            match event {
                Event::Text(t) | Event::Code(t) => {
                    text.push_str(&t);
                    text.push(' ');
                }
                Event::SoftBreak | Event::HardBreak | Event::End(_) => text.push(' '),
                _ => {}
            }
        }
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// The first `SUMMARY_LENGTH` characters of the plain text
    pub fn summary(&self, markdown: &str) -> String {
        let text = self.plain_text(markdown);
        text.chars().take(SUMMARY_LENGTH).collect::<String>().trim_end().to_string()
    }
}

/// Escape raw HTML and turn fenced code blocks into plain `<pre><code>`
fn process_events(parser: Parser<'_>) -> Vec<Event<'_>> {
    let mut events = Vec::new();
    let mut code_lang: Option<String> = None;
    let mut code_content: Option<String> = None;

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                code_content = Some(String::new());
                code_lang = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.trim().is_empty() => Some(lang.trim().to_string()),
                    _ => None,
                };
            }
            Event::End(TagEnd::CodeBlock) => {
                let code = code_content.take().unwrap_or_default();
                let block = match code_lang.take() {
                    Some(lang) => format!(
                        "<pre><code class=\"language-{}\">{}</code></pre>\n",
                        html_escape(&lang),
                        html_escape(&code)
                    ),
                    None => format!("<pre><code>{}</code></pre>\n", html_escape(&code)),
                };
                events.push(Event::Html(block.into()));
            }
            Event::Text(text) if code_content.is_some() => {
                if let Some(code) = code_content.as_mut() {
                    code.push_str(&text);
                }
            }
            Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
            other => events.push(other),
        }
    }

    events
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_blocks() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("## Conduta\n\n- Oxigênio\n- *Acesso venoso*\n\n> Reavaliar");
        assert!(html.contains("<h2>Conduta</h2>"));
        assert!(html.contains("<li>Oxigênio</li>"));
        assert!(html.contains("<em>Acesso venoso</em>"));
        assert!(html.contains("<blockquote>"));
    }

    #[test]
    fn test_render_table_and_strikethrough() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("| Droga | Dose |\n|---|---|\n| Adrenalina | 1 mg |\n\n~~errado~~");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>Adrenalina</td>"));
        assert!(html.contains("<del>errado</del>"));
    }

    #[test]
    fn test_code_block_language_class() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("```sql\nSELECT 1 < 2;\n```");
        assert!(html.contains("<pre><code class=\"language-sql\">SELECT 1 &lt; 2;"));

        let plain = renderer.render("    indentado");
        assert!(plain.contains("<pre><code>indentado"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("<script>alert(1)</script>\n\ntexto <b>x</b>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn test_plain_text_and_summary() {
        let renderer = MarkdownRenderer::new();
        assert_eq!(
            renderer.plain_text("# Título\n\nTexto com **negrito** e `código`."),
            "Título Texto com negrito e código ."
        );

        let long = "palavra ".repeat(100);
        let summary = renderer.summary(&long);
        assert!(summary.chars().count() <= SUMMARY_LENGTH);
        assert!(summary.starts_with("palavra palavra"));
        assert_eq!(renderer.summary(""), "");
    }
}
