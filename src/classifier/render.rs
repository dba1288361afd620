//! Renderers for classified payloads.
//!
//! Both renderers walk the same trees with two-space indentation. They differ
//! only in how leaves and punctuation are marked up: [`PlainRenderer`] emits
//! bare text (also used as the "copy formatted" text), [`HtmlRenderer`] emits
//! escaped markup with `json-*` / `xml-*` span classes.

use serde_json::Value;

use super::xml::{XmlDocument, XmlNode};
use super::Classified;

/// Turns a classified payload into display text.
pub trait Renderer {
    fn json(&self, value: &Value) -> String;
    fn xml(&self, doc: &XmlDocument) -> String;
    fn text(&self, text: &str) -> String;

    fn render(&self, payload: &Classified) -> String {
        match payload {
            Classified::Json(value) => self.json(value),
            Classified::Xml(doc) => self.xml(doc),
            Classified::Text(text) => self.text(text),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRenderer;

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl Renderer for PlainRenderer {
    fn json(&self, value: &Value) -> String {
        let mut out = String::new();
        write_json(self, value, 0, &mut out);
        out
    }

    fn xml(&self, doc: &XmlDocument) -> String {
        write_xml_doc(self, doc)
    }

    fn text(&self, text: &str) -> String {
        text.to_string()
    }
}

impl Renderer for HtmlRenderer {
    fn json(&self, value: &Value) -> String {
        let mut out = String::new();
        write_json(self, value, 0, &mut out);
        out
    }

    fn xml(&self, doc: &XmlDocument) -> String {
        write_xml_doc(self, doc)
    }

    fn text(&self, text: &str) -> String {
        escape_html(text)
    }
}

/// Markup hooks for the shared tree walkers.
trait Markup {
    fn escape(&self, s: &str) -> String;
    fn span(&self, class: &str, content: &str) -> String;
}

impl Markup for PlainRenderer {
    fn escape(&self, s: &str) -> String {
        s.to_string()
    }

    fn span(&self, _class: &str, content: &str) -> String {
        content.to_string()
    }
}

impl Markup for HtmlRenderer {
    fn escape(&self, s: &str) -> String {
        escape_html(s)
    }

    fn span(&self, class: &str, content: &str) -> String {
        format!("<span class=\"{}\">{}</span>", class, content)
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn pad(indent: usize) -> String {
    "  ".repeat(indent)
}

/// JSON string literal, with JSON escaping.
fn quoted(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn write_json<M: Markup>(m: &M, value: &Value, indent: usize, out: &mut String) {
    match value {
        Value::Null => out.push_str(&m.span("json-null", "null")),
        Value::Bool(b) => out.push_str(&m.span("json-boolean", &b.to_string())),
        Value::Number(n) => out.push_str(&m.span("json-number", &n.to_string())),
        Value::String(s) => out.push_str(&m.span("json-string", &m.escape(&quoted(s)))),
        Value::Array(items) if items.is_empty() => out.push_str("[]"),
        Value::Array(items) => {
            out.push_str("[\n");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(",\n");
                }
                out.push_str(&pad(indent + 1));
                write_json(m, item, indent + 1, out);
            }
            out.push('\n');
            out.push_str(&pad(indent));
            out.push(']');
        }
        Value::Object(map) if map.is_empty() => out.push_str("{}"),
        Value::Object(map) => {
            out.push_str("{\n");
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(",\n");
                }
                out.push_str(&pad(indent + 1));
                out.push_str(&m.span("json-key", &m.escape(&quoted(key))));
                out.push_str(": ");
                write_json(m, item, indent + 1, out);
            }
            out.push('\n');
            out.push_str(&pad(indent));
            out.push('}');
        }
    }
}

fn write_xml_doc<M: Markup>(m: &M, doc: &XmlDocument) -> String {
    let mut out = String::new();
    for node in &doc.nodes {
        write_xml(m, node, 0, &mut out);
    }
    out.truncate(out.trim_end().len());
    out
}

fn write_xml<M: Markup>(m: &M, node: &XmlNode, indent: usize, out: &mut String) {
    let sp = pad(indent);
    match node {
        XmlNode::ProcessingInstruction { target, data } => {
            let body = match data {
                Some(data) => format!("<?{} {}?>", target, data),
                None => format!("<?{}?>", target),
            };
            out.push_str(&sp);
            out.push_str(&m.span("xml-decl", &m.escape(&body)));
            out.push('\n');
        }
        XmlNode::Comment(text) => {
            out.push_str(&sp);
            out.push_str(&m.span("xml-comment", &m.escape(&format!("<!--{}-->", text))));
            out.push('\n');
        }
        XmlNode::Text(text) => {
            let text = text.trim();
            if !text.is_empty() {
                out.push_str(&sp);
                out.push_str(&m.span("xml-text", &m.escape(text)));
                out.push('\n');
            }
        }
        XmlNode::Element {
            name,
            attributes,
            children,
        } => {
            let tag = m.span("xml-tag", &m.escape(name));
            out.push_str(&sp);
            out.push_str(&m.escape("<"));
            out.push_str(&tag);
            for (attr, value) in attributes {
                out.push(' ');
                out.push_str(&m.span("xml-attr-name", &m.escape(attr)));
                out.push('=');
                out.push_str(&m.span("xml-attr-value", &m.escape(&format!("\"{}\"", value))));
            }

            let children: Vec<&XmlNode> = children.iter().filter(|c| !c.is_blank_text()).collect();
            match children.as_slice() {
                [] => {
                    out.push_str(&m.escape("/>"));
                    out.push('\n');
                }
                [XmlNode::Text(text)] => {
                    out.push_str(&m.escape(">"));
                    out.push_str(&m.span("xml-text", &m.escape(text.trim())));
                    out.push_str(&m.escape("</"));
                    out.push_str(&tag);
                    out.push_str(&m.escape(">"));
                    out.push('\n');
                }
                _ => {
                    out.push_str(&m.escape(">"));
                    out.push('\n');
                    for child in children {
                        write_xml(m, child, indent + 1, out);
                    }
                    out.push_str(&sp);
                    out.push_str(&m.escape("</"));
                    out.push_str(&tag);
                    out.push_str(&m.escape(">"));
                    out.push('\n');
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;

    #[test]
    fn plain_json_is_indented_in_insertion_order() {
        let out = PlainRenderer.render(&classify(r#"{"z":1,"a":[true,null,"s"],"e":{}}"#));
        assert_eq!(
            out,
            "{\n  \"z\": 1,\n  \"a\": [\n    true,\n    null,\n    \"s\"\n  ],\n  \"e\": {}\n}"
        );
    }

    #[test]
    fn html_json_tags_leaf_types() {
        let out = HtmlRenderer.render(&classify(r#"[null,false,2,"<b>"]"#));
        assert!(out.contains(r#"<span class="json-null">null</span>"#));
        assert!(out.contains(r#"<span class="json-boolean">false</span>"#));
        assert!(out.contains(r#"<span class="json-number">2</span>"#));
        assert!(out.contains(r#"<span class="json-string">&quot;&lt;b&gt;&quot;</span>"#));
    }

    #[test]
    fn plain_xml_tree() {
        let raw = "<?xml version=\"1.0\"?>\n<note id=\"7\" lang=\"en\">\n  <!--c-->\n  <to>Tove</to>\n  <empty/>\n  <?pi data?>\n</note>";
        let out = PlainRenderer.render(&classify(raw));
        assert_eq!(
            out,
            "<note id=\"7\" lang=\"en\">\n  <!--c-->\n  <to>Tove</to>\n  <empty/>\n  <?pi data?>\n</note>"
        );
    }

    #[test]
    fn html_xml_is_escaped_and_classed() {
        let out = HtmlRenderer.render(&classify(r#"<a k="v">x &amp; y</a>"#));
        assert_eq!(
            out,
            "&lt;<span class=\"xml-tag\">a</span> <span class=\"xml-attr-name\">k</span>=<span class=\"xml-attr-value\">&quot;v&quot;</span>&gt;<span class=\"xml-text\">x &amp; y</span>&lt;/<span class=\"xml-tag\">a</span>&gt;"
        );
    }

    #[test]
    fn text_is_verbatim_in_plain_and_escaped_in_html() {
        let payload = classify("  a < b  ");
        assert_eq!(PlainRenderer.render(&payload), "  a < b  ");
        assert_eq!(HtmlRenderer.render(&payload), "  a &lt; b  ");
    }
}
