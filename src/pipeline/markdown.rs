//! Markdown → styled HTML, the first half of the PDF rendering path.
//!
//! comrak provides a CommonMark + GFM parser. Tables are enabled, and by
//! default a single newline inside a paragraph renders as `<br />` (see
//! [`ConversionConfig::hard_line_breaks`](crate::ConversionConfig)). Raw HTML
//! in the input is not passed through.

use comrak::{markdown_to_html, Options};

const STYLESHEET: &str = include_str!("../../assets/pdf.css");

fn comrak_options(hard_line_breaks: bool) -> Options<'static> {
    let mut options = Options::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    options.render.hardbreaks = hard_line_breaks;
    options
}

/// Convert Markdown to an HTML fragment.
pub fn markdown_to_html_fragment(markdown: &str, hard_line_breaks: bool) -> String {
    markdown_to_html(markdown, &comrak_options(hard_line_breaks))
}

/// Convert Markdown to a complete HTML document carrying the fixed stylesheet.
pub fn styled_html(markdown: &str, hard_line_breaks: bool) -> String {
    let body = markdown_to_html_fragment(markdown, hard_line_breaks);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<style>
{STYLESHEET}
</style>
</head>
<body>
{body}
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_render_as_table_elements() {
        let html = markdown_to_html_fragment("| a | b |\n|---|---|\n| 1 | 2 |\n", true);
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn single_newline_is_a_line_break() {
        let html = markdown_to_html_fragment("first line\nsecond line\n", true);
        assert!(html.contains("<br />"));
        assert_eq!(html.matches("<p>").count(), 1);
    }

    #[test]
    fn soft_breaks_when_disabled() {
        let html = markdown_to_html_fragment("first line\nsecond line\n", false);
        assert!(!html.contains("<br"));
    }

    #[test]
    fn lists_render() {
        let html = markdown_to_html_fragment("- one\n- two\n\n1. first\n2. second\n", true);
        assert!(html.contains("<ul>"));
        assert!(html.contains("<ol>"));
    }

    #[test]
    fn raw_html_is_not_passed_through() {
        let html = markdown_to_html_fragment("<script>alert(1)</script>\n", true);
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn document_embeds_stylesheet() {
        let html = styled_html("# Title", true);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("line-height: 1.5"));
        assert!(html.contains("border: 1px solid"));
        assert!(html.contains("<h1>Title</h1>"));
    }
}
