//! Inline markup handling.
//!
//! [`parse_fragment`] reads an inline fragment (`Hello <strong>world</strong>`)
//! with `html5ever`, in a `<body>` context, so the resulting tree matches
//! what a browser builds for `innerHTML`.
//!
//! [`decompose`] turns a fragment into the flat list of primitive steps the
//! session enqueues. It never touches a render backend, so element
//! references are expressed as indices into the returned list.

use html5ever::{tendril::TendrilSink, Attribute, LocalName, Namespace, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Tag name plus attributes of an element to be created by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpec {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_class(tag: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: vec![("class".to_string(), class.into())],
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }
}

/// One node of a parsed fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentNode {
    /// Text with entities already decoded.
    Text(String),
    Element {
        element: ElementSpec,
        children: Vec<FragmentNode>,
    },
}

/// One primitive produced by [`decompose`]. `parent` is the index of an
/// earlier [`MarkupStep::OpenElement`] in the same list; `None` stands for
/// whatever target the caller was typing into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupStep {
    OpenElement {
        element: ElementSpec,
        parent: Option<usize>,
    },
    Type {
        character: String,
        parent: Option<usize>,
    },
    Paste {
        text: String,
        parent: Option<usize>,
    },
}

/// Returns true when `text` holds something shaped like a tag: `<`, an ASCII
/// letter, and a `>` somewhere after it.
pub fn contains_markup(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        b == b'<'
            && bytes.get(i + 1).is_some_and(u8::is_ascii_alphabetic)
            && bytes[i + 2..].contains(&b'>')
    })
}

/// Parses a fragment into its top-level nodes. Comments and other
/// non-rendering nodes are dropped and the text runs they separated are
/// joined.
pub fn parse_fragment(markup: &str) -> Vec<FragmentNode> {
    let context = QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from("body"));
    let dom = html5ever::parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new()).one(markup);

    // The fragment parser hangs everything off a synthetic `<html>` root.
    let document = dom.document.children.borrow();
    document.first().map(convert_children).unwrap_or_default()
}

fn convert_children(parent: &Handle) -> Vec<FragmentNode> {
    let mut nodes: Vec<FragmentNode> = Vec::new();

    for child in parent.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => {
                let contents = contents.borrow();
                match nodes.last_mut() {
                    Some(FragmentNode::Text(text)) => text.push_str(&contents),
                    _ => nodes.push(FragmentNode::Text(contents.to_string())),
                }
            }
            NodeData::Element { name, attrs, .. } => nodes.push(FragmentNode::Element {
                element: ElementSpec {
                    tag: name.local.to_string(),
                    attributes: attrs.borrow().iter().map(attribute_pair).collect(),
                },
                children: convert_children(child),
            }),
            _ => {}
        }
    }

    nodes
}

fn attribute_pair(attribute: &Attribute) -> (String, String) {
    (attribute.name.local.to_string(), attribute.value.to_string())
}

/// Flattens `markup` into primitive steps, recursing into every element.
/// Text is split with `split` when typing, or kept whole when `paste` is set.
pub fn decompose<P, S>(markup: &str, parse: P, split: S, paste: bool) -> Vec<MarkupStep>
where
    P: Fn(&str) -> Vec<FragmentNode>,
    S: Fn(&str) -> Vec<String>,
{
    let mut steps = Vec::new();
    decompose_nodes(parse(markup), None, &split, paste, &mut steps);
    steps
}

fn decompose_nodes(
    nodes: Vec<FragmentNode>,
    parent: Option<usize>,
    split: &dyn Fn(&str) -> Vec<String>,
    paste: bool,
    steps: &mut Vec<MarkupStep>,
) {
    for node in nodes {
        match node {
            FragmentNode::Text(text) => push_text(&text, parent, split, paste, steps),
            FragmentNode::Element { element, children } => {
                let index = steps.len();
                steps.push(MarkupStep::OpenElement { element, parent });
                decompose_nodes(children, Some(index), split, paste, steps);
            }
        }
    }
}

fn push_text(
    text: &str,
    parent: Option<usize>,
    split: &dyn Fn(&str) -> Vec<String>,
    paste: bool,
    steps: &mut Vec<MarkupStep>,
) {
    if text.is_empty() {
        return;
    }

    if paste {
        steps.push(MarkupStep::Paste {
            text: text.to_string(),
            parent,
        });
    } else {
        steps.extend(
            split(text)
                .into_iter()
                .map(|character| MarkupStep::Type { character, parent }),
        );
    }
}
