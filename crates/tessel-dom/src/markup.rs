//! Markup reader and writer for the HTML subset templates are written in.
//!
//! The reader is lenient in the way browsers are: stray closing tags are
//! skipped, unclosed elements are closed at end of input, comments and
//! doctypes are dropped. Whitespace-only text between tags is discarded.

use crate::error::MarkupError;
use crate::node::Node;

/// Void elements that never have closing tags.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is raw text up to the matching close tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Parse markup into a list of top-level nodes.
pub fn parse_fragment(html: &str) -> Result<Vec<Node>, MarkupError> {
    let mut roots: Vec<Node> = Vec::new();
    let mut stack: Vec<Node> = Vec::new();
    let mut pos = 0;

    while pos < html.len() {
        let rest = &html[pos..];

        if rest.starts_with("<!--") {
            let end = rest
                .find("-->")
                .ok_or(MarkupError::Unterminated { what: "comment", offset: pos })?;
            pos += end + 3;
            continue;
        }

        if rest.starts_with("<!") || rest.starts_with("<?") {
            let end = rest
                .find('>')
                .ok_or(MarkupError::Unterminated { what: "declaration", offset: pos })?;
            pos += end + 1;
            continue;
        }

        if let Some(after) = rest.strip_prefix("</") {
            let end = after
                .find('>')
                .ok_or(MarkupError::Unterminated { what: "closing tag", offset: pos })?;
            let name = after[..end].trim().to_ascii_lowercase();
            // Close up to the matching open element; ignore strays.
            if let Some(depth) = stack.iter().rposition(|n| n.tag() == Some(name.as_str())) {
                stack.truncate(depth);
            }
            pos += 2 + end + 1;
            continue;
        }

        if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            let (element, self_closing, consumed) = parse_open_tag(html, pos)?;
            pos += consumed;
            attach(&element, &stack, &mut roots);

            let tag = element.tag().unwrap_or_default().to_string();
            if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) && !self_closing {
                let close = format!("</{}", tag);
                let body_end = html[pos..]
                    .to_ascii_lowercase()
                    .find(&close)
                    .map(|i| pos + i)
                    .unwrap_or(html.len());
                if body_end > pos {
                    element.append_child(&Node::text(&html[pos..body_end]));
                }
                pos = body_end;
                if let Some(gt) = html[pos..].find('>') {
                    pos += gt + 1;
                }
                continue;
            }

            if !self_closing && !VOID_ELEMENTS.contains(&tag.as_str()) {
                stack.push(element);
            }
            continue;
        }

        // Text up to the next tag-like `<`
        let mut end = rest.len();
        for (i, _) in rest.match_indices('<').filter(|(i, _)| *i > 0) {
            let next = &rest[i + 1..];
            if next.starts_with(|c: char| c.is_ascii_alphabetic() || c == '/' || c == '!' || c == '?') {
                end = i;
                break;
            }
        }
        let text = &rest[..end];
        if !text.trim().is_empty() {
            attach(&Node::text(decode_entities(text)), &stack, &mut roots);
        }
        pos += end;
    }

    Ok(roots)
}

fn attach(node: &Node, stack: &[Node], roots: &mut Vec<Node>) {
    match stack.last() {
        Some(parent) => parent.append_child(node),
        None => roots.push(node.clone()),
    }
}

/// Parse markup that must contain exactly one top-level element.
pub fn parse_element(html: &str) -> Result<Node, MarkupError> {
    let roots = parse_fragment(html)?;
    let elements: Vec<&Node> = roots.iter().filter(|n| n.is_element()).collect();
    match (elements.as_slice(), roots.len()) {
        ([single], 1) => Ok((*single).clone()),
        _ => Err(MarkupError::RootCount(roots.len())),
    }
}

/// Parse `<tag attrs...>` at `start`. Returns the element, whether it was
/// self-closing and the number of bytes consumed.
fn parse_open_tag(html: &str, start: usize) -> Result<(Node, bool, usize), MarkupError> {
    let bytes = html.as_bytes();
    let mut pos = start + 1;

    let name_start = pos;
    while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'>' && bytes[pos] != b'/' {
        pos += 1;
    }
    let element = Node::element(&html[name_start..pos]);

    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() {
            return Err(MarkupError::Unterminated { what: "tag", offset: start });
        }
        match bytes[pos] {
            b'>' => return Ok((element, false, pos + 1 - start)),
            b'/' if bytes.get(pos + 1) == Some(&b'>') => return Ok((element, true, pos + 2 - start)),
            b'/' => {
                pos += 1;
                continue;
            }
            _ => {}
        }

        // Attribute name (may include @, :, -, etc.)
        let attr_start = pos;
        while pos < bytes.len()
            && bytes[pos] != b'='
            && bytes[pos] != b'>'
            && !bytes[pos].is_ascii_whitespace()
            && !(bytes[pos] == b'/' && bytes.get(pos + 1) == Some(&b'>'))
        {
            pos += 1;
        }
        let name = html[attr_start..pos].to_string();

        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos < bytes.len() && bytes[pos] == b'=' {
            pos += 1;
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            let value = match bytes.get(pos) {
                Some(&quote @ (b'"' | b'\'')) => {
                    let value_start = pos + 1;
                    let len = html[value_start..]
                        .find(quote as char)
                        .ok_or(MarkupError::Unterminated { what: "attribute value", offset: pos })?;
                    pos = value_start + len + 1;
                    &html[value_start..value_start + len]
                }
                _ => {
                    let value_start = pos;
                    while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'>' {
                        pos += 1;
                    }
                    &html[value_start..pos]
                }
            };
            element.set_attribute(&name, decode_entities(value));
        } else {
            // Boolean attribute (no value)
            element.set_attribute(&name, "");
        }
    }
}

/// Decode the handful of entities templates use.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| {
            let entity = &rest[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi))
        });
        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

pub(crate) fn write_node(node: &Node, out: &mut String) {
    let Some(tag) = node.tag() else {
        let parent_tag = node.parent().and_then(|p| p.tag().map(str::to_string));
        if parent_tag.is_some_and(|t| RAW_TEXT_ELEMENTS.contains(&t.as_str())) {
            out.push_str(&node.text_content());
        } else {
            escape_text(&node.text_content(), out);
        }
        return;
    };

    out.push('<');
    out.push_str(tag);
    for (name, value) in node.attributes() {
        out.push(' ');
        out.push_str(&name);
        if !value.is_empty() {
            out.push_str("=\"");
            escape_attribute(&value, out);
            out.push('"');
        }
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&tag) {
        return;
    }
    for child in node.children() {
        write_node(&child, out);
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_nested_elements() {
        let root = parse_element(r#"<div id="app"><p class='x'>Hi <b>there</b></p><br></div>"#).unwrap();
        assert_eq!(root.tag(), Some("div"));
        assert_eq!(root.attribute("id").as_deref(), Some("app"));
        let p = root.first_element_child().unwrap();
        assert_eq!(p.attribute("class").as_deref(), Some("x"));
        assert_eq!(p.text_content(), "Hi there");
        assert_eq!(root.element_children().len(), 2);
    }

    #[test]
    fn test_round_trip_markup() {
        let html = r#"<ul t-repeat="todo in todos"><li t-attrs="todo.done: class='done'" hidden>{{todo.title}}</li></ul>"#;
        let root = parse_element(html).unwrap();
        assert_eq!(root.outer_html(), html);
    }

    #[test]
    fn test_attribute_values_with_markup_characters() {
        let root = parse_element(r#"<a t-attr="{&quot;href&quot;:&quot;/u/{{id}}&quot;}" title="a > b">x</a>"#).unwrap();
        assert_eq!(root.attribute("t-attr").as_deref(), Some(r#"{"href":"/u/{{id}}"}"#));
        assert_eq!(root.attribute("title").as_deref(), Some("a > b"));
        assert_eq!(
            root.outer_html(),
            r#"<a t-attr="{&quot;href&quot;:&quot;/u/{{id}}&quot;}" title="a &gt; b">x</a>"#
        );
    }

    #[test]
    fn test_comments_and_stray_closers_are_skipped() {
        let roots = parse_fragment("<!doctype html><!-- note --><div>a</span>b</div>").unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].text_content(), "ab");
    }

    #[test]
    fn test_self_closing_and_unquoted() {
        let root = parse_element("<div><input type=checkbox checked/><t-view name=main /></div>").unwrap();
        let children = root.element_children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].attribute("type").as_deref(), Some("checkbox"));
        assert_eq!(children[0].attribute("checked").as_deref(), Some(""));
        assert_eq!(children[1].tag(), Some("t-view"));
        assert_eq!(children[1].attribute("name").as_deref(), Some("main"));
    }

    #[test]
    fn test_entities_in_text() {
        let root = parse_element("<p>a &amp; b &lt;c&gt; &#65;&#x42; &unknown;</p>").unwrap();
        assert_eq!(root.text_content(), "a & b <c> AB &unknown;");
        assert_eq!(root.outer_html(), "<p>a &amp; b &lt;c&gt; AB &amp;unknown;</p>");
    }

    #[test]
    fn test_less_than_in_text() {
        let root = parse_element("<p>1 < 2</p>").unwrap();
        assert_eq!(root.text_content(), "1 < 2");
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse_fragment("<div"), Err(MarkupError::Unterminated { what: "tag", .. })));
        assert!(matches!(parse_fragment("<!-- open"), Err(MarkupError::Unterminated { .. })));
        assert!(matches!(parse_fragment(r#"<a href="x>"#), Err(MarkupError::Unterminated { .. })));
        assert!(matches!(parse_element("<a></a><b></b>"), Err(MarkupError::RootCount(2))));
        assert!(matches!(parse_element(""), Err(MarkupError::RootCount(0))));
    }
}
