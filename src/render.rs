//! reveal.js page rendering.
//!
//! Slide text is embedded verbatim in `<textarea data-template>` blocks and
//! converted to HTML in the browser by the reveal.js markdown plugin. No
//! escaping or sanitization happens here.

use thiserror::Error;

use crate::deck::{Deck, SlideGroup};

/// Marker replaced by the rendered sections.
pub const CONTENT_PLACEHOLDER: &str = "{{content}}";

const DEFAULT_SHELL: &str = r#"<!DOCTYPE html>
<html>
<head>
    <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/reveal.js@4.3.1/dist/reveal.css">
    <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/reveal.js@4.3.1/dist/theme/white.css">
    <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/highlight.js@11.7.0/styles/github.min.css">
    <style>
        .reveal h1, .reveal h2, .reveal h3 { color: #2c3e50; }
        .reveal .slides section { text-align: left; }
        .reveal h1, .reveal h2, .reveal h3 { text-align: center; }
        .reveal pre { width: 100%; }
        .reveal code { background: #f4f4f4; padding: 2px 4px; border-radius: 3px; }
    </style>
</head>
<body>
    <div class="reveal">
        <div class="slides">
            {{content}}
        </div>
    </div>
    <script src="https://cdn.jsdelivr.net/npm/reveal.js@4.3.1/dist/reveal.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/reveal.js@4.3.1/plugin/markdown/markdown.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/reveal.js@4.3.1/plugin/highlight/highlight.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/reveal.js@4.3.1/plugin/notes/notes.js"></script>
    <script>
        Reveal.initialize({
            hash: true,
            plugins: [ RevealMarkdown, RevealHighlight, RevealNotes ],
            markdown: {
                smartypants: true
            }
        });
    </script>
</body>
</html>"#;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("page template has no {{{{content}}}} placeholder")]
    MissingPlaceholder,
}

/// Renders a [`Deck`] into a full reveal.js page.
#[derive(Debug, Clone)]
pub struct Renderer {
    shell: String,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    /// Renderer using the built-in reveal.js 4.3.1 page.
    pub fn new() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
        }
    }

    /// Renderer using a custom page template.
    pub fn with_shell(shell: impl Into<String>) -> Result<Self, RenderError> {
        let shell = shell.into();
        if !shell.contains(CONTENT_PLACEHOLDER) {
            return Err(RenderError::MissingPlaceholder);
        }
        Ok(Self { shell })
    }

    /// The `<section>` markup for every group, one group per line.
    pub fn sections(&self, deck: &Deck) -> String {
        deck.groups()
            .iter()
            .map(render_group)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The complete page. Identical decks always produce identical pages.
    pub fn page(&self, deck: &Deck) -> String {
        self.shell
            .replacen(CONTENT_PLACEHOLDER, &self.sections(deck), 1)
    }
}

fn render_group(group: &SlideGroup) -> String {
    if group.is_vertical() {
        let nested: Vec<String> = group.slides().iter().map(|s| markdown_section(s)).collect();
        format!("<section>{}</section>", nested.join("\n"))
    } else {
        group
            .slides()
            .first()
            .map(|s| markdown_section(s))
            .unwrap_or_default()
    }
}

fn markdown_section(markdown: &str) -> String {
    format!(
        "<section data-markdown><textarea data-template>{}</textarea></section>",
        markdown
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_group() {
        let html = Renderer::new().sections(&Deck::parse("# Hi"));
        assert_eq!(
            html,
            "<section data-markdown><textarea data-template># Hi</textarea></section>"
        );
    }

    #[test]
    fn test_vertical_group_is_nested() {
        let html = Renderer::new().sections(&Deck::parse("A\n--\nB"));
        assert_eq!(
            html,
            "<section><section data-markdown><textarea data-template>A</textarea></section>\n\
             <section data-markdown><textarea data-template>B</textarea></section></section>"
        );
    }

    #[test]
    fn test_empty_deck_renders_shell() {
        let page = Renderer::new().page(&Deck::parse(""));
        assert!(page.contains("<div class=\"slides\">"));
        assert!(!page.contains("<section"));
        assert!(!page.contains(CONTENT_PLACEHOLDER));
    }

    #[test]
    fn test_custom_shell() {
        let renderer = Renderer::with_shell("<main>{{content}}</main>").unwrap();
        let page = renderer.page(&Deck::parse("A\n---\nB"));
        assert_eq!(
            page,
            "<main><section data-markdown><textarea data-template>A</textarea></section>\n\
             <section data-markdown><textarea data-template>B</textarea></section></main>"
        );
    }

    #[test]
    fn test_custom_shell_requires_placeholder() {
        assert!(matches!(
            Renderer::with_shell("<main></main>"),
            Err(RenderError::MissingPlaceholder)
        ));
    }
}
