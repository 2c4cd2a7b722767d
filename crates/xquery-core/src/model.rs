use core::cmp::Ordering;

use crate::engine::runtime::{Error, ErrorCode};
use crate::xdm::XdmAtomicValue;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

impl QName {
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
            ns_uri: None,
        }
    }
}

/// Document order from ancestry and sibling position.
///
/// An ancestor precedes its descendants. Among siblings, attributes come
/// first, then namespaces, then children, each group in adapter order.
/// Nodes under different roots have no order here and yield `err:FOER0000`;
/// adapters hosting several trees override
/// [`XdmNode::compare_document_order`].
pub fn try_compare_by_ancestry<N: XdmNode>(a: &N, b: &N) -> Result<Ordering, Error> {
    if a == b {
        return Ok(Ordering::Equal);
    }
    fn path_to_root<N: XdmNode>(n: &N) -> Vec<N> {
        let mut path = vec![n.clone()];
        let mut cur = n.parent();
        while let Some(p) = cur {
            cur = p.parent();
            path.push(p);
        }
        path.reverse();
        path
    }
    let pa = path_to_root(a);
    let pb = path_to_root(b);
    let common = pa.iter().zip(&pb).take_while(|(x, y)| x == y).count();
    if common == pa.len().min(pb.len()) {
        // one path is a prefix of the other
        return Ok(pa.len().cmp(&pb.len()));
    }
    if common == 0 {
        return Err(Error::from_code(
            ErrorCode::FOER0000,
            "document order is undefined for nodes from different trees",
        ));
    }
    let parent = &pa[common - 1];
    let siblings: Vec<N> = parent
        .attributes()
        .into_iter()
        .chain(parent.namespaces())
        .chain(parent.children())
        .collect();
    let pos_a = siblings.iter().position(|n| *n == pa[common]);
    let pos_b = siblings.iter().position(|n| *n == pb[common]);
    Ok(match (pos_a, pos_b) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => Ordering::Equal,
    })
}

/// Node facade implemented by tree adapters.
pub trait XdmNode: Clone + Eq + core::fmt::Debug + Send + Sync {
    fn kind(&self) -> NodeKind;
    fn name(&self) -> Option<QName>;
    fn string_value(&self) -> String;
    fn base_uri(&self) -> Option<String> {
        None
    }

    /// Typed value used by atomization. Without schema information comment,
    /// processing-instruction and namespace nodes are strings and all other
    /// nodes are untyped.
    fn typed_value(&self) -> Vec<XdmAtomicValue> {
        let s = self.string_value();
        match self.kind() {
            NodeKind::Comment | NodeKind::ProcessingInstruction | NodeKind::Namespace => {
                vec![XdmAtomicValue::String(s)]
            }
            _ => vec![XdmAtomicValue::UntypedAtomic(s)],
        }
    }

    fn parent(&self) -> Option<Self>;
    fn children(&self) -> Vec<Self>;
    fn attributes(&self) -> Vec<Self>;
    fn namespaces(&self) -> Vec<Self> {
        Vec::new()
    }

    fn compare_document_order(&self, other: &Self) -> Result<Ordering, Error> {
        try_compare_by_ancestry(self, other)
    }
}
