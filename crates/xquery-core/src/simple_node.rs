//! In-memory tree implementing [`XdmNode`], for tests and embedding hosts
//! that have no tree of their own.
//!
//! ```
//! use xquery_core::simple_node::{attr, elem, text};
//! use xquery_core::XdmNode;
//!
//! // <root id="r"><child>Hello</child></root>
//! let root = elem("root")
//!     .attr(attr("id", "r"))
//!     .child(elem("child").child(text("Hello")))
//!     .build();
//! assert_eq!(root.children().len(), 1);
//! assert_eq!(root.string_value(), "Hello");
//! ```
//!
//! Nodes are immutable once built. Parent links are weak and are set when
//! the node is attached, so a subtree can be built bottom-up.
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::model::{NodeKind, QName, XdmNode};

struct Inner {
    kind: NodeKind,
    name: Option<QName>,
    value: Option<String>,
    parent: OnceLock<Weak<Inner>>,
    attributes: Vec<SimpleNode>,
    namespaces: Vec<SimpleNode>,
    children: Vec<SimpleNode>,
    text: OnceLock<String>,
}

#[derive(Clone)]
pub struct SimpleNode(Arc<Inner>);

impl PartialEq for SimpleNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for SimpleNode {}

impl std::hash::Hash for SimpleNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for SimpleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleNode")
            .field("kind", &self.0.kind)
            .field("name", &self.0.name.as_ref().map(|q| &q.local))
            .field("value", &self.0.value)
            .finish()
    }
}

impl SimpleNode {
    fn leaf(kind: NodeKind, name: Option<QName>, value: &str) -> Self {
        SimpleNode(Arc::new(Inner {
            kind,
            name,
            value: Some(value.to_string()),
            parent: OnceLock::new(),
            attributes: Vec::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
            text: OnceLock::new(),
        }))
    }

    /// Resolve a namespace prefix through the in-scope namespace nodes of
    /// this node and its ancestors.
    pub fn lookup_namespace_uri(&self, prefix: &str) -> Option<String> {
        let mut cur = Some(self.clone());
        while let Some(n) = cur {
            let hit = n.0.namespaces.iter().find(|ns| {
                ns.0.name.as_ref().and_then(|q| q.prefix.as_deref()) == Some(prefix)
            });
            if let Some(ns) = hit {
                return ns.0.value.clone();
            }
            cur = n.parent();
        }
        None
    }
}

/// Builder for element and document nodes.
pub struct SimpleNodeBuilder {
    kind: NodeKind,
    name: Option<QName>,
    attributes: Vec<SimpleNode>,
    namespaces: Vec<SimpleNode>,
    children: Vec<SimpleNode>,
}

impl SimpleNodeBuilder {
    fn new(kind: NodeKind, name: Option<QName>) -> Self {
        Self {
            kind,
            name,
            attributes: Vec::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn child(mut self, child: impl Into<NodeOrBuilder>) -> Self {
        self.children.push(child.into().build());
        self
    }

    pub fn children<I, C>(mut self, it: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<NodeOrBuilder>,
    {
        self.children.extend(it.into_iter().map(|c| c.into().build()));
        self
    }

    pub fn attr(mut self, attr: SimpleNode) -> Self {
        debug_assert_eq!(attr.kind(), NodeKind::Attribute);
        self.attributes.push(attr);
        self
    }

    pub fn namespace(mut self, ns: SimpleNode) -> Self {
        debug_assert_eq!(ns.kind(), NodeKind::Namespace);
        self.namespaces.push(ns);
        self
    }

    pub fn build(self) -> SimpleNode {
        let node = SimpleNode(Arc::new(Inner {
            kind: self.kind,
            name: self.name,
            value: None,
            parent: OnceLock::new(),
            attributes: self.attributes,
            namespaces: self.namespaces,
            children: self.children,
            text: OnceLock::new(),
        }));
        let inner = &node.0;
        for n in inner
            .attributes
            .iter()
            .chain(&inner.namespaces)
            .chain(&inner.children)
        {
            // a node attached twice keeps its first parent
            let _ = n.0.parent.set(Arc::downgrade(inner));
        }
        node
    }
}

pub enum NodeOrBuilder {
    Built(SimpleNode),
    Builder(SimpleNodeBuilder),
}

impl NodeOrBuilder {
    fn build(self) -> SimpleNode {
        match self {
            NodeOrBuilder::Built(n) => n,
            NodeOrBuilder::Builder(b) => b.build(),
        }
    }
}

impl From<SimpleNode> for NodeOrBuilder {
    fn from(n: SimpleNode) -> Self {
        NodeOrBuilder::Built(n)
    }
}

impl From<SimpleNodeBuilder> for NodeOrBuilder {
    fn from(b: SimpleNodeBuilder) -> Self {
        NodeOrBuilder::Builder(b)
    }
}

pub fn doc() -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Document, None)
}

pub fn elem(name: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Element, Some(QName::local(name)))
}

pub fn attr(name: &str, value: &str) -> SimpleNode {
    SimpleNode::leaf(NodeKind::Attribute, Some(QName::local(name)), value)
}

pub fn text(value: &str) -> SimpleNode {
    SimpleNode::leaf(NodeKind::Text, None, value)
}

pub fn comment(value: &str) -> SimpleNode {
    SimpleNode::leaf(NodeKind::Comment, None, value)
}

pub fn ns(prefix: &str, uri: &str) -> SimpleNode {
    let name = QName {
        prefix: Some(prefix.to_string()),
        local: prefix.to_string(),
        ns_uri: None,
    };
    SimpleNode::leaf(NodeKind::Namespace, Some(name), uri)
}

impl XdmNode for SimpleNode {
    fn kind(&self) -> NodeKind {
        self.0.kind.clone()
    }

    fn name(&self) -> Option<QName> {
        self.0.name.clone()
    }

    fn string_value(&self) -> String {
        match self.0.kind {
            NodeKind::Element | NodeKind::Document => self
                .0
                .text
                .get_or_init(|| {
                    fn collect(n: &SimpleNode, out: &mut String) {
                        for c in &n.0.children {
                            match c.0.kind {
                                NodeKind::Text => out.push_str(c.0.value.as_deref().unwrap_or("")),
                                NodeKind::Element => collect(c, out),
                                _ => {}
                            }
                        }
                    }
                    let mut out = String::new();
                    collect(self, &mut out);
                    out
                })
                .clone(),
            _ => self.0.value.clone().unwrap_or_default(),
        }
    }

    fn parent(&self) -> Option<Self> {
        self.0.parent.get().and_then(Weak::upgrade).map(SimpleNode)
    }

    fn children(&self) -> Vec<Self> {
        self.0.children.clone()
    }

    fn attributes(&self) -> Vec<Self> {
        self.0.attributes.clone()
    }

    fn namespaces(&self) -> Vec<Self> {
        self.0.namespaces.clone()
    }
}
