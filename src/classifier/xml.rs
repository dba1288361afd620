//! Owned XML document tree built from a well-formed parse.

use roxmltree::{Document, Node, NodeType, ParsingOptions};

use super::MAX_NESTING;

#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("element nesting deeper than {0} levels")]
    TooDeep(usize),
    #[error(transparent)]
    Parse(#[from] roxmltree::Error),
}

/// Top-level nodes of a document: the root element plus any comments and
/// processing instructions around it. The XML declaration is not a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub nodes: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element {
        name: String,
        /// In document order.
        attributes: Vec<(String, String)>,
        children: Vec<XmlNode>,
    },
    Text(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: Option<String>,
    },
}

impl XmlDocument {
    /// Parse a well-formed document. Nesting is checked before parsing since
    /// the parser itself recurses per element.
    pub fn parse(text: &str) -> Result<Self, XmlError> {
        if !element_depth_within(text, MAX_NESTING) {
            return Err(XmlError::TooDeep(MAX_NESTING));
        }
        let mut options = ParsingOptions::default();
        options.allow_dtd = true;
        let doc = Document::parse_with_options(text, options)?;
        let nodes = doc.root().children().filter_map(convert).collect();
        Ok(Self { nodes })
    }

    /// The document element.
    pub fn root_element(&self) -> Option<&XmlNode> {
        self.nodes
            .iter()
            .find(|n| matches!(n, XmlNode::Element { .. }))
    }
}

impl XmlNode {
    pub fn element_name(&self) -> Option<&str> {
        match self {
            XmlNode::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn children(&self) -> &[XmlNode] {
        match self {
            XmlNode::Element { children, .. } => children,
            _ => &[],
        }
    }

    /// Whitespace-only text, as found between indented elements.
    pub fn is_blank_text(&self) -> bool {
        matches!(self, XmlNode::Text(t) if t.trim().is_empty())
    }
}

/// Upper bound on element nesting, from tag syntax alone. Markup inside
/// comments or CDATA is counted too, so the bound may only overestimate.
fn element_depth_within(text: &str, max: usize) -> bool {
    let mut depth = 0usize;
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        rest = &rest[start + 1..];
        if rest.starts_with('/') {
            depth = depth.saturating_sub(1);
            continue;
        }
        if rest.starts_with('?') || rest.starts_with('!') {
            continue;
        }
        let end = rest.find('>').unwrap_or(rest.len());
        if rest[..end].ends_with('/') {
            continue;
        }
        depth += 1;
        if depth > max {
            return false;
        }
    }
    true
}

fn convert(node: Node<'_, '_>) -> Option<XmlNode> {
    match node.node_type() {
        NodeType::Element => Some(XmlNode::Element {
            name: qualified(node, node.tag_name().namespace(), node.tag_name().name()),
            attributes: node
                .attributes()
                .map(|a| (qualified(node, a.namespace(), a.name()), a.value().to_string()))
                .collect(),
            children: node.children().filter_map(convert).collect(),
        }),
        NodeType::Text => node.text().map(|t| XmlNode::Text(t.to_string())),
        NodeType::Comment => node.text().map(|t| XmlNode::Comment(t.to_string())),
        NodeType::PI => node.pi().map(|pi| XmlNode::ProcessingInstruction {
            target: pi.target.to_string(),
            data: pi.value.map(str::to_string),
        }),
        NodeType::Root => None,
    }
}

/// `prefix:name` when the namespace was bound to a prefix in the source.
fn qualified(scope: Node<'_, '_>, namespace: Option<&str>, name: &str) -> String {
    match namespace.and_then(|ns| scope.lookup_prefix(ns)) {
        Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, name),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_node_kinds_and_attribute_order() {
        let doc = XmlDocument::parse(
            r#"<?xml version="1.0"?><!-- head --><?style x?><msg z="1" a="2"><b>t</b>tail</msg>"#,
        )
        .unwrap();
        assert_eq!(doc.nodes.len(), 3);
        assert_eq!(doc.nodes[0], XmlNode::Comment(" head ".into()));
        assert_eq!(
            doc.nodes[1],
            XmlNode::ProcessingInstruction {
                target: "style".into(),
                data: Some("x".into())
            }
        );
        match doc.root_element().unwrap() {
            XmlNode::Element {
                name,
                attributes,
                children,
            } => {
                assert_eq!(name, "msg");
                assert_eq!(
                    attributes,
                    &vec![("z".to_string(), "1".to_string()), ("a".to_string(), "2".to_string())]
                );
                assert_eq!(children.len(), 2);
                assert_eq!(children[1], XmlNode::Text("tail".into()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn prefixed_names_survive() {
        let doc = XmlDocument::parse(r#"<s:env xmlns:s="urn:x"><s:body/></s:env>"#).unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(root.element_name(), Some("s:env"));
        assert_eq!(root.children()[0].element_name(), Some("s:body"));
    }

    #[test]
    fn depth_bound_counts_open_elements_only() {
        assert!(element_depth_within("<a><b/><c></c><?pi x?><!-- <d> --></a>", 2));
        assert!(!element_depth_within("<a><b><c/></b></a>", 1));
        assert!(element_depth_within("<a/><b/><c/>", 1));
    }

    #[test]
    fn too_deep_is_rejected_before_parsing() {
        let raw = format!("{}{}", "<a>".repeat(50_000), "</a>".repeat(50_000));
        assert!(matches!(
            XmlDocument::parse(&raw),
            Err(XmlError::TooDeep(MAX_NESTING))
        ));
    }

    #[test]
    fn malformed_is_an_error() {
        assert!(XmlDocument::parse("<a><b></a>").is_err());
        assert!(XmlDocument::parse("<a>").is_err());
    }
}
