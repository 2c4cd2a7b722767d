//! The static type lattice of the XDM.
//!
//! Every item carries one [`XdmType`]. Types form a DAG rooted at
//! [`XdmType::Item`]: the primary edges follow the XML Schema derivation
//! hierarchy, a few secondary edges model union membership (`xs:numeric`)
//! and structural subtyping (maps and arrays are functions).
//!
//! Subtype tests are answered from an ancestor table computed once per
//! process. The table is read-only after construction and shared by all
//! evaluations.

use std::fmt;
use std::sync::LazyLock;

use crate::model::NodeKind;

macro_rules! xdm_types {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Closed enumeration of all item types known to the engine.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum XdmType {
            $($variant),+
        }

        impl XdmType {
            /// All types in declaration order.
            pub const ALL: &'static [XdmType] = &[$(XdmType::$variant),+];

            /// Lexical name as used in sequence types (`xs:integer`, `element()`, ...).
            pub fn name(self) -> &'static str {
                match self {
                    $(XdmType::$variant => $name),+
                }
            }
        }
    };
}

xdm_types! {
    Item => "item()",
    AnyAtomicType => "xs:anyAtomicType",
    UntypedAtomic => "xs:untypedAtomic",
    Numeric => "xs:numeric",
    String => "xs:string",
    NormalizedString => "xs:normalizedString",
    Token => "xs:token",
    Language => "xs:language",
    NmToken => "xs:NMTOKEN",
    Name => "xs:Name",
    NcName => "xs:NCName",
    Id => "xs:ID",
    IdRef => "xs:IDREF",
    Entity => "xs:ENTITY",
    Boolean => "xs:boolean",
    Decimal => "xs:decimal",
    Integer => "xs:integer",
    NonPositiveInteger => "xs:nonPositiveInteger",
    NegativeInteger => "xs:negativeInteger",
    Long => "xs:long",
    Int => "xs:int",
    Short => "xs:short",
    Byte => "xs:byte",
    NonNegativeInteger => "xs:nonNegativeInteger",
    PositiveInteger => "xs:positiveInteger",
    UnsignedLong => "xs:unsignedLong",
    UnsignedInt => "xs:unsignedInt",
    UnsignedShort => "xs:unsignedShort",
    UnsignedByte => "xs:unsignedByte",
    Float => "xs:float",
    Double => "xs:double",
    Duration => "xs:duration",
    YearMonthDuration => "xs:yearMonthDuration",
    DayTimeDuration => "xs:dayTimeDuration",
    DateTime => "xs:dateTime",
    DateTimeStamp => "xs:dateTimeStamp",
    Date => "xs:date",
    Time => "xs:time",
    GYearMonth => "xs:gYearMonth",
    GYear => "xs:gYear",
    GMonthDay => "xs:gMonthDay",
    GDay => "xs:gDay",
    GMonth => "xs:gMonth",
    Base64Binary => "xs:base64Binary",
    HexBinary => "xs:hexBinary",
    AnyUri => "xs:anyURI",
    QName => "xs:QName",
    Notation => "xs:NOTATION",
    Node => "node()",
    Document => "document-node()",
    Element => "element()",
    Attribute => "attribute()",
    Text => "text()",
    Comment => "comment()",
    ProcessingInstruction => "processing-instruction()",
    Namespace => "namespace-node()",
    Function => "function(*)",
    Map => "map(*)",
    Array => "array(*)",
}

const _: () = assert!(XdmType::ALL.len() <= 128, "ancestor bitsets are u128");

impl XdmType {
    /// Direct base type along the schema derivation chain.
    pub fn base(self) -> Option<XdmType> {
        use XdmType::*;
        Some(match self {
            Item => return None,
            AnyAtomicType | Node | Function => Item,
            UntypedAtomic | Numeric | String | Boolean | Decimal | Float | Double | Duration
            | DateTime | Date | Time | GYearMonth | GYear | GMonthDay | GDay | GMonth
            | Base64Binary | HexBinary | AnyUri | QName | Notation => AnyAtomicType,
            NormalizedString => String,
            Token => NormalizedString,
            Language | NmToken | Name => Token,
            NcName => Name,
            Id | IdRef | Entity => NcName,
            Integer => Decimal,
            NonPositiveInteger | Long | NonNegativeInteger => Integer,
            NegativeInteger => NonPositiveInteger,
            Int => Long,
            Short => Int,
            Byte => Short,
            PositiveInteger | UnsignedLong => NonNegativeInteger,
            UnsignedInt => UnsignedLong,
            UnsignedShort => UnsignedInt,
            UnsignedByte => UnsignedShort,
            YearMonthDuration | DayTimeDuration => Duration,
            DateTimeStamp => DateTime,
            Document | Element | Attribute | Text | Comment | ProcessingInstruction
            | Namespace => Node,
            Map | Array => Function,
        })
    }

    /// Supertypes that are not on the derivation chain.
    fn secondary_supertypes(self) -> &'static [XdmType] {
        use XdmType::*;
        match self {
            Decimal | Float | Double => &[Numeric],
            _ => &[],
        }
    }

    /// Promotion roots: the XSD primitives plus `xs:integer` and the two
    /// totally ordered duration subtypes, which arithmetic treats as
    /// separate families.
    fn is_promotion_root(self) -> bool {
        use XdmType::*;
        matches!(
            self,
            UntypedAtomic
                | String
                | Boolean
                | Decimal
                | Integer
                | Float
                | Double
                | Duration
                | YearMonthDuration
                | DayTimeDuration
                | DateTime
                | Date
                | Time
                | GYearMonth
                | GYear
                | GMonthDay
                | GDay
                | GMonth
                | Base64Binary
                | HexBinary
                | AnyUri
                | QName
                | Notation
        )
    }

    fn index(self) -> usize {
        self as usize
    }

    fn bit(self) -> u128 {
        1u128 << self.index()
    }

    /// True when `self` is `ancestor` or derives from it (directly or through
    /// a secondary edge).
    pub fn is_subtype_of(self, ancestor: XdmType) -> bool {
        LATTICE
            .ancestors
            .get(self.index())
            .is_some_and(|set| set & ancestor.bit() != 0)
    }

    /// The promotion root this type belongs to. Non-atomic types and the
    /// abstract atomic types are their own root.
    pub fn primitive(self) -> XdmType {
        LATTICE.primitives.get(self.index()).copied().unwrap_or(self)
    }

    pub fn is_atomic(self) -> bool {
        self.is_subtype_of(XdmType::AnyAtomicType)
    }

    pub fn is_numeric(self) -> bool {
        self.is_subtype_of(XdmType::Numeric)
    }

    pub fn is_node(self) -> bool {
        self.is_subtype_of(XdmType::Node)
    }

    /// Types that can carry values. Abstract union/root types and
    /// `xs:NOTATION` cannot be instantiated or used as cast targets.
    pub fn is_instantiable(self) -> bool {
        use XdmType::*;
        !matches!(
            self,
            Item | AnyAtomicType | Numeric | Notation | Duration | Node | Function
        )
    }

    /// True for `xs:string` and every type derived from it.
    pub fn is_string_like(self) -> bool {
        self.is_subtype_of(XdmType::String)
    }

    /// Look up a type by its local name in the XML Schema namespace.
    pub fn from_xs_local_name(local: &str) -> Option<XdmType> {
        XdmType::ALL
            .iter()
            .copied()
            .find(|t| t.name().strip_prefix("xs:") == Some(local))
    }

    pub fn of_node_kind(kind: &NodeKind) -> XdmType {
        match kind {
            NodeKind::Document => XdmType::Document,
            NodeKind::Element => XdmType::Element,
            NodeKind::Attribute => XdmType::Attribute,
            NodeKind::Text => XdmType::Text,
            NodeKind::Comment => XdmType::Comment,
            NodeKind::ProcessingInstruction => XdmType::ProcessingInstruction,
            NodeKind::Namespace => XdmType::Namespace,
        }
    }
}

impl fmt::Display for XdmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

struct Lattice {
    // ancestors[t] has bit u set iff t <: u (reflexive)
    ancestors: Vec<u128>,
    primitives: Vec<XdmType>,
}

static LATTICE: LazyLock<Lattice> = LazyLock::new(|| {
    fn collect(t: XdmType, acc: &mut u128) {
        if *acc & t.bit() != 0 {
            return;
        }
        *acc |= t.bit();
        if let Some(b) = t.base() {
            collect(b, acc);
        }
        for s in t.secondary_supertypes() {
            collect(*s, acc);
        }
    }
    let ancestors: Vec<u128> = XdmType::ALL
        .iter()
        .map(|t| {
            let mut acc = 0u128;
            collect(*t, &mut acc);
            acc
        })
        .collect();
    let primitives = XdmType::ALL
        .iter()
        .map(|t| {
            let mut cur = Some(*t);
            while let Some(c) = cur {
                if c.is_promotion_root() {
                    return c;
                }
                cur = c.base();
            }
            *t
        })
        .collect();
    Lattice {
        ancestors,
        primitives,
    }
});

#[cfg(test)]
mod tests {
    use super::XdmType::*;
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Byte, Integer, true)]
    #[case(Byte, Numeric, true)]
    #[case(UnsignedByte, NonNegativeInteger, true)]
    #[case(Integer, Decimal, true)]
    #[case(Decimal, Integer, false)]
    #[case(Float, Double, false)]
    #[case(UntypedAtomic, Numeric, false)]
    #[case(UntypedAtomic, AnyAtomicType, true)]
    #[case(Id, String, true)]
    #[case(DayTimeDuration, Duration, true)]
    #[case(Map, Function, true)]
    #[case(Array, Item, true)]
    #[case(Element, Node, true)]
    #[case(Node, Element, false)]
    #[case(Integer, Integer, true)]
    fn subtype_table(#[case] candidate: XdmType, #[case] ancestor: XdmType, #[case] expected: bool) {
        assert_eq!(candidate.is_subtype_of(ancestor), expected);
    }

    #[rstest]
    #[case(Short, Integer)]
    #[case(PositiveInteger, Integer)]
    #[case(Integer, Integer)]
    #[case(Decimal, Decimal)]
    #[case(NcName, String)]
    #[case(DateTimeStamp, DateTime)]
    #[case(YearMonthDuration, YearMonthDuration)]
    #[case(UntypedAtomic, UntypedAtomic)]
    fn primitive_projection(#[case] t: XdmType, #[case] expected: XdmType) {
        assert_eq!(t.primitive(), expected);
    }

    #[test]
    fn integer_is_the_only_numeric_root_with_numeric_ancestor() {
        let roots: Vec<_> = XdmType::ALL
            .iter()
            .copied()
            .filter(|t| t.is_numeric() && t.primitive() == *t)
            .filter(|t| t.base().is_some_and(XdmType::is_numeric))
            .collect();
        assert_eq!(roots, vec![Integer]);
    }

    #[test]
    fn notation_is_not_instantiable() {
        assert!(!Notation.is_instantiable());
        assert!(Notation.is_atomic());
        assert!(Integer.is_instantiable());
    }

    #[test]
    fn lookup_by_local_name() {
        assert_eq!(XdmType::from_xs_local_name("integer"), Some(Integer));
        assert_eq!(XdmType::from_xs_local_name("NCName"), Some(NcName));
        assert_eq!(XdmType::from_xs_local_name("element"), None);
    }
}
