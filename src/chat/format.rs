//! Turns raw model text into display-safe HTML.
//!
//! Classification is an ordered list of rules; the first rule that accepts
//! the text decides its shape. A text that starts with a bullet marker is a
//! list even when it also contains pipes.

use lazy_static::lazy_static;
use pulldown_cmark::{html, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

/// Shape of a turn's text, borrowing the pieces that still need rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment<'a> {
    List(Vec<&'a str>),
    Table(Vec<Vec<&'a str>>),
    Block(&'a str),
}

pub type Rule = for<'a> fn(&'a str) -> Option<Fragment<'a>>;

/// Evaluated in order, first match wins. `block_rule` accepts everything.
pub const RULES: [Rule; 3] = [list_rule, table_rule, block_rule];

const BULLET: &str = "- ";

pub fn list_rule(text: &str) -> Option<Fragment<'_>> {
    if !text.starts_with(BULLET) {
        return None;
    }
    let items = text
        .split(BULLET)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect();
    Some(Fragment::List(items))
}

pub fn table_rule(text: &str) -> Option<Fragment<'_>> {
    if !text.contains('|') {
        return None;
    }
    let rows = text
        .lines()
        .map(|line| {
            line.split('|')
                .map(str::trim)
                .filter(|cell| !cell.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();
    Some(Fragment::Table(rows))
}

pub fn block_rule(text: &str) -> Option<Fragment<'_>> {
    Some(Fragment::Block(text))
}

pub fn classify(text: &str) -> Fragment<'_> {
    RULES
        .iter()
        .find_map(|rule| rule(text))
        .unwrap_or(Fragment::Block(text))
}

/// Classify and render in one step.
pub fn render(text: &str) -> String {
    classify(text).to_html()
}

impl Fragment<'_> {
    pub fn to_html(&self) -> String {
        match self {
            Fragment::List(items) => {
                let mut out = String::from("<ul>");
                for item in items {
                    out.push_str("<li>");
                    out.push_str(&render_inline(item));
                    out.push_str("</li>");
                }
                out.push_str("</ul>");
                out
            }
            Fragment::Table(rows) => {
                let mut out = String::from("<table>");
                for row in rows {
                    out.push_str("<tr>");
                    for cell in row {
                        out.push_str("<td>");
                        out.push_str(&render_inline(cell));
                        out.push_str("</td>");
                    }
                    out.push_str("</tr>");
                }
                out.push_str("</table>");
                out
            }
            Fragment::Block(text) => render_block(text),
        }
    }
}

fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH
}

pub fn render_block(text: &str) -> String {
    let events = sanitize(Parser::new_ext(text, options()), false);
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    out
}

/// Backslash-escapes anything at the start of a line that the block parser
/// would take as structure: headings, quotes, bullets, ordered-list numbers,
/// fences, rules, setext underlines and HTML blocks.
fn escape_block_markers(text: &str) -> String {
    lazy_static! {
        static ref ORDERED: Regex = Regex::new(r"(?m)^([ \t]*[0-9]{1,9})([.)])").unwrap();
        static ref BULLET_OR_RULE: Regex =
            Regex::new(r"(?m)^([ \t]*)([-+*_])([ \t]|$|[-+*_ \t]*$)").unwrap();
        static ref LEADING: Regex = Regex::new(r"(?m)^([ \t]*)(#|>|<|=|`{3}|~{3})").unwrap();
    }
    let text = ORDERED.replace_all(text, "$1\\$2");
    let text = BULLET_OR_RULE.replace_all(&text, "$1\\$2$3").into_owned();
    LEADING.replace_all(&text, "$1\\$2").into_owned()
}

/// Inline constructs only. Block markers stay literal text.
pub fn render_inline(text: &str) -> String {
    let text = escape_block_markers(text);
    let events = sanitize(Parser::new_ext(&text, options()), true);
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    out
}

fn is_inline_tag(tag: &Tag<'_>) -> bool {
    matches!(
        tag,
        Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link { .. } | Tag::Image { .. }
    )
}

fn is_inline_end(end: &TagEnd) -> bool {
    matches!(
        end,
        TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link | TagEnd::Image
    )
}

fn is_safe_url(url: &str, image: bool) -> bool {
    let url = url.trim().to_ascii_lowercase();
    if url.starts_with("javascript:") || url.starts_with("vbscript:") || url.starts_with("file:") {
        return false;
    }
    if url.starts_with("data:") {
        return image
            && ["data:image/gif;", "data:image/png;", "data:image/jpeg;", "data:image/webp;"]
                .iter()
                .any(|p| url.starts_with(p));
    }
    true
}

/// Escapes raw HTML and drops links/images with unsafe targets (their text
/// stays). With `inline` set, only inline-level tags survive.
fn sanitize<'a>(events: impl Iterator<Item = Event<'a>>, inline: bool) -> Vec<Event<'a>> {
    let mut out = Vec::new();
    // one entry per open link/image: whether its start was kept
    let mut links: Vec<bool> = Vec::new();
    let mut block_text_pending = false;

    for event in events {
        match event {
            Event::Html(raw) | Event::InlineHtml(raw) => out.push(Event::Text(raw)),
            Event::Start(tag @ (Tag::Link { .. } | Tag::Image { .. })) => {
                let safe = match &tag {
                    Tag::Link { dest_url, .. } => is_safe_url(dest_url, false),
                    Tag::Image { dest_url, .. } => is_safe_url(dest_url, true),
                    _ => true,
                };
                links.push(safe);
                if safe {
                    out.push(Event::Start(tag));
                }
            }
            Event::End(end @ (TagEnd::Link | TagEnd::Image)) => {
                if links.pop().unwrap_or(true) {
                    out.push(Event::End(end));
                }
            }
            Event::Start(tag) if inline && !is_inline_tag(&tag) => {
                if block_text_pending {
                    out.push(Event::SoftBreak);
                    block_text_pending = false;
                }
            }
            Event::End(end) if inline && !is_inline_end(&end) => {
                block_text_pending = true;
            }
            Event::Rule | Event::TaskListMarker(_) if inline => {}
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullets_become_a_list() {
        assert_eq!(
            classify("- a\n- b"),
            Fragment::List(vec!["a", "b"])
        );
        assert_eq!(render("- a\n- b"), "<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn list_items_render_inline_markdown() {
        assert_eq!(
            render("- **bold** step\n- `code`"),
            "<ul><li><strong>bold</strong> step</li><li><code>code</code></li></ul>"
        );
    }

    #[test]
    fn only_markers_is_an_empty_list() {
        assert_eq!(classify("- - "), Fragment::List(vec![]));
        assert_eq!(render("- - "), "<ul></ul>");
    }

    #[test]
    fn pipes_become_a_table() {
        assert_eq!(
            classify("a|b\nc|d"),
            Fragment::Table(vec![vec!["a", "b"], vec!["c", "d"]])
        );
        assert_eq!(
            render("a|b\nc|d"),
            "<table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>"
        );
    }

    #[test]
    fn ragged_rows_keep_their_own_cells() {
        assert_eq!(
            classify("| a | b | c |\n| d |\n\n"),
            Fragment::Table(vec![vec!["a", "b", "c"], vec!["d"]])
        );
    }

    #[test]
    fn table_cells_render_inline_markdown() {
        assert_eq!(
            render("*x* | y"),
            "<table><tr><td><em>x</em></td><td>y</td></tr></table>"
        );
    }

    #[test]
    fn leading_bullet_wins_over_pipe() {
        assert!(matches!(classify("- a | b"), Fragment::List(_)));
    }

    #[test]
    fn plain_text_is_block_markdown() {
        assert_eq!(classify("plain text"), Fragment::Block("plain text"));
        assert_eq!(render("plain text"), "<p>plain text</p>\n");
        assert_eq!(
            render("# Title\n\nSome *words*."),
            "<h1>Title</h1>\n<p>Some <em>words</em>.</p>\n"
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let inputs = [
            "- a\n- b",
            "- a | b\n- c",
            "a|b",
            "| a | b | c |\n| d |\n\n",
            "Step | Action\n1. | Breathe",
            "<b>x</b> | [go](javascript:alert(1))",
            "- <img src=x onerror=alert(1)>",
            "**hi** there",
            "# Title\n\n> quoted",
            "",
        ];
        for text in inputs {
            let first = render(text);
            assert_eq!(first, render(text));
            assert_eq!(first, classify(text).to_html());
        }
    }

    #[test]
    fn list_items_keep_block_markers_as_text() {
        assert_eq!(render("- 1. First"), "<ul><li>1. First</li></ul>");
        assert_eq!(
            render("- 1. First do this\n- # tag matters\n- > breathe\n- + extra"),
            "<ul><li>1. First do this</li><li># tag matters</li>\
             <li>&gt; breathe</li><li>+ extra</li></ul>"
        );
    }

    #[test]
    fn table_cells_keep_block_markers_as_text() {
        assert_eq!(
            render("Step | Action\n1. | Breathe\n# of days | 3"),
            "<table><tr><td>Step</td><td>Action</td></tr>\
             <tr><td>1.</td><td>Breathe</td></tr>\
             <tr><td># of days</td><td>3</td></tr></table>"
        );
        assert_eq!(
            render("--- | 2) second"),
            "<table><tr><td>---</td><td>2) second</td></tr></table>"
        );
    }

    #[test]
    fn raw_html_is_escaped() {
        let out = render("hello <script>alert(1)</script>");
        assert!(!out.contains("<script>"));
        assert!(out.contains("&lt;script&gt;"));

        let out = render("- <img src=x onerror=alert(1)>");
        assert!(!out.contains("<img"));

        let out = render("<b>x</b> | y");
        assert!(!out.contains("<b>"));
    }

    #[test]
    fn script_links_are_not_rendered_as_links() {
        let out = render("[click](javascript:alert(1))");
        assert!(!out.contains("href"));
        assert!(out.contains("click"));

        let out = render("[site](https://example.com)");
        assert!(out.contains(r#"<a href="https://example.com">site</a>"#));
    }

    #[test]
    fn inline_rendering_drops_block_wrappers() {
        assert_eq!(render_inline("just *this*"), "just <em>this</em>");
        assert_eq!(render_inline("# heading"), "# heading");
        assert_eq!(render_inline("*starred* word"), "<em>starred</em> word");
        assert_eq!(render_inline("line\n===="), "line\n====");
    }

    #[test]
    fn safe_url_rules() {
        assert!(is_safe_url("https://x.y", false));
        assert!(!is_safe_url(" JavaScript:alert(1)", false));
        assert!(!is_safe_url("data:image/png;base64,AAAA", false));
        assert!(is_safe_url("data:image/png;base64,AAAA", true));
        assert!(!is_safe_url("data:text/html;base64,AAAA", true));
    }
}
