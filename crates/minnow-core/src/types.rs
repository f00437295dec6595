//! The typescheme algebra. A typescheme describes the set of runtime shapes
//! a register may hold at a given program point; the compiler unions and
//! intersects these to decide where it can emit monomorphic opcodes and
//! where it must leave a runtime check in place.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::value::tag::{self, Tag};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeScheme {
    /// A single concrete tag.
    Simple(Tag),
    /// A disjoint union of schemes, kept sorted by the canonical order.
    Alternate(AltType),
    /// A positionally-typed tuple of known arity.
    FiniteTuple(Vec<TypeScheme>),
    /// A tuple of unknown arity whose elements all draw from one alternate.
    TypedTuple(AltType),
    /// A literal word in a signature, partitioning dispatch exactly.
    Bling(String),
    List(Vec<TypeScheme>),
}

impl TypeScheme {
    fn rank(&self) -> u8 {
        match self {
            TypeScheme::Simple(_) => 0,
            TypeScheme::Alternate(_) => 1,
            TypeScheme::FiniteTuple(_) => 2,
            TypeScheme::TypedTuple(_) => 3,
            TypeScheme::Bling(_) => 4,
            TypeScheme::List(_) => 5,
        }
    }

    /// The canonical total order: simple < alternate < finite tuple <
    /// typed tuple < bling < list, then element-wise within a kind.
    pub fn cmp_scheme(&self, other: &TypeScheme) -> Ordering {
        match (self, other) {
            (TypeScheme::Simple(a), TypeScheme::Simple(b)) => a.cmp(b),
            (TypeScheme::Alternate(a), TypeScheme::Alternate(b)) => a.cmp_alt(b),
            (TypeScheme::FiniteTuple(a), TypeScheme::FiniteTuple(b)) => cmp_seq(a, b),
            (TypeScheme::TypedTuple(a), TypeScheme::TypedTuple(b)) => a.cmp_alt(b),
            (TypeScheme::Bling(a), TypeScheme::Bling(b)) => a.cmp(b),
            (TypeScheme::List(a), TypeScheme::List(b)) => cmp_seq(a, b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

fn cmp_seq(a: &[TypeScheme], b: &[TypeScheme]) -> Ordering {
    let by_len = a.len().cmp(&b.len());
    if by_len != Ordering::Equal {
        return by_len;
    }
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = x.cmp_scheme(y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// A sorted, duplicate-free list of schemes: the disjoint union the compiler
/// tracks per register. The sorted-canonical invariant is what lets union,
/// intersection and difference run as linear merges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AltType(pub Vec<TypeScheme>);

impl AltType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(scheme: TypeScheme) -> Self {
        Self(vec![scheme])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeScheme> {
        self.0.iter()
    }

    pub fn cmp_alt(&self, other: &AltType) -> Ordering {
        cmp_seq(&self.0, &other.0)
    }

    pub fn union(&self, other: &AltType) -> AltType {
        let mut out = Vec::with_capacity(self.len() + other.len());
        let (mut vix, mut wix) = (0, 0);
        while vix < self.len() || wix < other.len() {
            if vix == self.len() {
                out.push(other.0[wix].clone());
                wix += 1;
                continue;
            }
            if wix == other.len() {
                out.push(self.0[vix].clone());
                vix += 1;
                continue;
            }
            match self.0[vix].cmp_scheme(&other.0[wix]) {
                Ordering::Equal => {
                    out.push(self.0[vix].clone());
                    vix += 1;
                    wix += 1;
                }
                Ordering::Less => {
                    out.push(self.0[vix].clone());
                    vix += 1;
                }
                Ordering::Greater => {
                    out.push(other.0[wix].clone());
                    wix += 1;
                }
            }
        }
        AltType(out)
    }

    pub fn intersect(&self, other: &AltType) -> AltType {
        let mut out = Vec::new();
        let (mut vix, mut wix) = (0, 0);
        while vix < self.len() && wix < other.len() {
            match self.0[vix].cmp_scheme(&other.0[wix]) {
                Ordering::Equal => {
                    out.push(self.0[vix].clone());
                    vix += 1;
                    wix += 1;
                }
                Ordering::Less => vix += 1,
                Ordering::Greater => wix += 1,
            }
        }
        AltType(out)
    }

    pub fn without(&self, t: &TypeScheme) -> AltType {
        AltType(
            self.0
                .iter()
                .filter(|v| v.cmp_scheme(t) != Ordering::Equal)
                .cloned()
                .collect(),
        )
    }

    /// True iff this is a one-element alternate holding exactly `simple(t)`.
    pub fn only(&self, t: Tag) -> bool {
        match self.0.as_slice() {
            [TypeScheme::Simple(el)] => *el == t,
            _ => false,
        }
    }

    /// Checks the first simple element only. Deliberately weak: callers keep
    /// primitive simples ahead of the compound kinds, so the first simple
    /// decides membership.
    pub fn contains(&self, t: Tag) -> bool {
        for scheme in &self.0 {
            if let TypeScheme::Simple(el) = scheme {
                return *el == t;
            }
        }
        false
    }

    pub fn is_none_of(&self, tags: &[Tag]) -> bool {
        tags.iter().all(|&t| !self.contains(t))
    }

    pub fn contains_only_tuples(&self) -> bool {
        for scheme in &self.0 {
            match scheme {
                TypeScheme::Simple(_) | TypeScheme::Bling(_) | TypeScheme::List(_) => {
                    return false
                }
                TypeScheme::Alternate(inner) => {
                    if !inner.contains_only_tuples() {
                        return false;
                    }
                }
                TypeScheme::FiniteTuple(_) | TypeScheme::TypedTuple(_) => {}
            }
        }
        true
    }

    /// If this is a one-element alternate holding a simple tag at or above
    /// `ub_enums`, that struct tag.
    pub fn is_only_struct(&self, ub_enums: Tag) -> Option<Tag> {
        match self.0.as_slice() {
            [TypeScheme::Simple(el)] if *el >= ub_enums => Some(*el),
            _ => None,
        }
    }
}

/// Builds an alternate from concrete tags, normalizing to canonical order.
pub fn alt_type(tags: &[Tag]) -> AltType {
    let mut sorted: Vec<Tag> = tags.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    AltType(sorted.into_iter().map(TypeScheme::Simple).collect())
}

const ANY_TAGS: [Tag; 12] = [
    tag::NULL,
    tag::INT,
    tag::BOOL,
    tag::STRING,
    tag::FLOAT,
    tag::TYPE,
    tag::FUNC,
    tag::PAIR,
    tag::LIST,
    tag::MAP,
    tag::SET,
    tag::LABEL,
];

/// Every value a register may hold before the compiler knows anything:
/// any single, or a tuple of any singles.
pub static ANY_TYPE: Lazy<AltType> = Lazy::new(|| {
    let singles = alt_type(&ANY_TAGS);
    let mut all = singles.0.clone();
    all.push(TypeScheme::TypedTuple(singles));
    AltType(all)
});

/// All the possible lengths of tuples in a scheme. Single values have
/// length 1; a typed tuple contributes the unknown marker -1, which
/// poisons any finite-tuple sum it takes part in.
pub fn lengths(t: &TypeScheme) -> BTreeSet<i64> {
    let mut result = BTreeSet::new();
    match t {
        TypeScheme::Simple(_) | TypeScheme::Bling(_) | TypeScheme::List(_) => {
            result.insert(1);
        }
        TypeScheme::TypedTuple(_) => {
            result.insert(-1);
        }
        TypeScheme::Alternate(alt) => {
            for v in alt.iter() {
                result.extend(lengths(v));
                if result.contains(&-1) {
                    return result;
                }
            }
        }
        TypeScheme::FiniteTuple(elems) => {
            if elems.is_empty() {
                result.insert(0);
                return result;
            }
            let head = lengths(&elems[0]);
            let rest = lengths(&TypeScheme::FiniteTuple(elems[1..].to_vec()));
            for &j in &head {
                for &k in &rest {
                    if j == -1 || k == -1 {
                        result.insert(-1);
                    } else {
                        result.insert(j + k);
                    }
                }
            }
        }
    }
    result
}

pub fn max_length_or_minus_one(lengths: &BTreeSet<i64>) -> i64 {
    if lengths.contains(&-1) {
        return -1;
    }
    lengths.iter().copied().max().unwrap_or(0)
}

/// All the types that may occur at positional index `ix` of a scheme.
pub fn types_at_index(t: &TypeScheme, ix: i64) -> AltType {
    recursive_types_at_index(t, ix).0
}

// Also reports how many positions each branch may consume, so a finite
// tuple can project the query index through its columns.
fn recursive_types_at_index(t: &TypeScheme, ix: i64) -> (AltType, BTreeSet<i64>) {
    let mut types = AltType::new();
    let mut consumed = BTreeSet::new();
    match t {
        TypeScheme::Simple(s) => {
            if ix == 0 {
                types = types.union(&AltType::single(TypeScheme::Simple(*s)));
            }
            consumed.insert(1);
        }
        TypeScheme::Bling(b) => {
            if ix == 0 {
                types = types.union(&AltType::single(TypeScheme::Bling(b.clone())));
            }
            consumed.insert(1);
        }
        TypeScheme::List(_) => {
            consumed.insert(1);
        }
        TypeScheme::TypedTuple(alt) => {
            types = types.union(alt);
            consumed.insert(ix);
        }
        TypeScheme::Alternate(alt) => {
            for v in alt.iter() {
                let (more_types, more_consumed) = recursive_types_at_index(v, ix);
                types = types.union(&more_types);
                consumed.extend(more_consumed);
            }
        }
        TypeScheme::FiniteTuple(elems) => {
            if elems.is_empty() {
                return (types, consumed);
            }
            let (head_types, head_consumed) = recursive_types_at_index(&elems[0], ix);
            types = head_types;
            consumed = head_consumed.clone();
            let rest = TypeScheme::FiniteTuple(elems[1..].to_vec());
            for jx in head_consumed {
                let (more_types, more_consumed) = recursive_types_at_index(&rest, ix - jx);
                types = types.union(&more_types);
                consumed.extend(more_consumed);
            }
        }
    }
    (types, consumed)
}

/// How the compiler may use a name it resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarAccess {
    GlobalConstantPublic,
    GlobalVariablePublic,
    FunctionArgument,
    LocalConstantThunk,
}

#[derive(Clone, Debug)]
pub struct Variable {
    pub loc: u32,
    pub access: VarAccess,
    pub types: AltType,
}

/// A lexical scope chain mapping names to registers and their typeschemes.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    data: HashMap<String, Variable>,
    pub ext: Option<Arc<Environment>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enclosed_by(ext: Arc<Environment>) -> Self {
        Self {
            data: HashMap::new(),
            ext: Some(ext),
        }
    }

    pub fn define(&mut self, name: impl Into<String>, variable: Variable) {
        self.data.insert(name.into(), variable);
    }

    pub fn get_var(&self, name: &str) -> Option<&Variable> {
        if let Some(v) = self.data.get(name) {
            return Some(v);
        }
        self.ext.as_deref().and_then(|ext| ext.get_var(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tt(tags: &[Tag]) -> TypeScheme {
        TypeScheme::TypedTuple(alt_type(tags))
    }

    #[test]
    fn compare_is_a_total_order() {
        let schemes = vec![
            TypeScheme::Simple(tag::INT),
            TypeScheme::Simple(tag::STRING),
            TypeScheme::Alternate(alt_type(&[tag::INT, tag::BOOL])),
            TypeScheme::FiniteTuple(vec![TypeScheme::Simple(tag::INT)]),
            tt(&[tag::INT]),
            TypeScheme::Bling("with".into()),
            TypeScheme::List(vec![TypeScheme::Simple(tag::INT)]),
        ];
        for a in &schemes {
            assert_eq!(a.cmp_scheme(a), Ordering::Equal);
            for b in &schemes {
                assert_eq!(a.cmp_scheme(b), b.cmp_scheme(a).reverse());
                for c in &schemes {
                    if a.cmp_scheme(b) == Ordering::Less && b.cmp_scheme(c) == Ordering::Less {
                        assert_eq!(a.cmp_scheme(c), Ordering::Less);
                    }
                }
            }
        }
    }

    #[test]
    fn kinds_order_simple_first_list_last() {
        let simple = TypeScheme::Simple(tag::LABEL);
        let alternate = TypeScheme::Alternate(alt_type(&[tag::NULL]));
        let finite = TypeScheme::FiniteTuple(vec![]);
        let typed = tt(&[tag::NULL]);
        let bling = TypeScheme::Bling("a".into());
        let list = TypeScheme::List(vec![]);
        let ordered = [&simple, &alternate, &finite, &typed, &bling, &list];
        for pair in ordered.windows(2) {
            assert_eq!(pair[0].cmp_scheme(pair[1]), Ordering::Less);
        }
    }

    #[test]
    fn union_is_sorted_deduplicated_and_commutative() {
        let a = alt_type(&[tag::INT, tag::STRING]);
        let b = alt_type(&[tag::BOOL, tag::INT]);
        let ab = a.union(&b);
        let ba = b.union(&a);
        assert_eq!(ab, ba);
        assert_eq!(ab, alt_type(&[tag::INT, tag::BOOL, tag::STRING]));
        for w in ab.0.windows(2) {
            assert_eq!(w[0].cmp_scheme(&w[1]), Ordering::Less);
        }
    }

    #[test]
    fn intersect_is_contained_in_both_sides() {
        let a = alt_type(&[tag::INT, tag::BOOL, tag::STRING]);
        let b = alt_type(&[tag::BOOL, tag::STRING, tag::FLOAT]);
        let both = a.intersect(&b);
        assert_eq!(both, alt_type(&[tag::BOOL, tag::STRING]));
        for el in both.iter() {
            assert!(a.0.iter().any(|x| x.cmp_scheme(el) == Ordering::Equal));
            assert!(b.0.iter().any(|x| x.cmp_scheme(el) == Ordering::Equal));
        }
    }

    #[test]
    fn without_removes_exactly_the_matching_element() {
        let a = alt_type(&[tag::INT, tag::BOOL, tag::STRING]);
        let out = a.without(&TypeScheme::Simple(tag::BOOL));
        assert_eq!(out, alt_type(&[tag::INT, tag::STRING]));
        assert_eq!(a.without(&TypeScheme::Bling("x".into())), a);
    }

    #[test]
    fn only_and_contains() {
        assert!(alt_type(&[tag::INT]).only(tag::INT));
        assert!(!alt_type(&[tag::INT, tag::BOOL]).only(tag::INT));
        assert!(alt_type(&[tag::INT, tag::BOOL]).contains(tag::INT));
        // contains checks the first simple element only
        assert!(!alt_type(&[tag::INT, tag::BOOL]).contains(tag::BOOL));
        let tuple_first = AltType(vec![
            TypeScheme::FiniteTuple(vec![]),
            TypeScheme::Simple(tag::INT),
        ]);
        assert!(tuple_first.contains(tag::INT));
    }

    #[test]
    fn lengths_of_singles_and_typed_tuples() {
        assert_eq!(
            lengths(&TypeScheme::Simple(tag::INT)),
            BTreeSet::from([1])
        );
        assert_eq!(lengths(&tt(&[tag::INT])), BTreeSet::from([-1]));
        assert_eq!(
            lengths(&TypeScheme::FiniteTuple(vec![])),
            BTreeSet::from([0])
        );
    }

    #[test]
    fn lengths_of_finite_tuples_sum_pairwise() {
        let pair = TypeScheme::FiniteTuple(vec![
            TypeScheme::Simple(tag::INT),
            TypeScheme::Simple(tag::STRING),
        ]);
        assert_eq!(lengths(&pair), BTreeSet::from([2]));

        let alt = TypeScheme::Alternate(AltType(vec![
            TypeScheme::Simple(tag::INT),
            TypeScheme::FiniteTuple(vec![
                TypeScheme::Simple(tag::INT),
                TypeScheme::Simple(tag::INT),
            ]),
        ]));
        let t = TypeScheme::FiniteTuple(vec![alt, TypeScheme::Simple(tag::BOOL)]);
        assert_eq!(lengths(&t), BTreeSet::from([2, 3]));
    }

    #[test]
    fn unknown_length_poisons_the_sum() {
        let t = TypeScheme::FiniteTuple(vec![
            TypeScheme::Simple(tag::INT),
            tt(&[tag::INT]),
        ]);
        let ls = lengths(&t);
        assert!(ls.contains(&-1));
        assert!(!ls.is_empty());
    }

    #[test]
    fn types_at_index_projects_through_finite_tuples() {
        let t = TypeScheme::FiniteTuple(vec![
            TypeScheme::Simple(tag::INT),
            TypeScheme::Simple(tag::STRING),
            TypeScheme::Simple(tag::BOOL),
        ]);
        assert_eq!(types_at_index(&t, 0), alt_type(&[tag::INT]));
        assert_eq!(types_at_index(&t, 1), alt_type(&[tag::STRING]));
        assert_eq!(types_at_index(&t, 2), alt_type(&[tag::BOOL]));
        assert_eq!(types_at_index(&t, 3), AltType::new());
    }

    #[test]
    fn types_at_index_unions_across_alternates() {
        let t = TypeScheme::Alternate(AltType(vec![
            TypeScheme::Simple(tag::INT),
            TypeScheme::FiniteTuple(vec![
                TypeScheme::Simple(tag::STRING),
                TypeScheme::Simple(tag::BOOL),
            ]),
        ]));
        assert_eq!(types_at_index(&t, 0), alt_type(&[tag::INT, tag::STRING]));
        assert_eq!(types_at_index(&t, 1), alt_type(&[tag::BOOL]));
    }

    #[test]
    fn types_at_index_in_a_typed_tuple_is_the_element_type() {
        let t = tt(&[tag::INT, tag::STRING]);
        assert_eq!(types_at_index(&t, 0), alt_type(&[tag::INT, tag::STRING]));
        assert_eq!(types_at_index(&t, 7), alt_type(&[tag::INT, tag::STRING]));
    }

    #[test]
    fn environment_chains_to_enclosing_scope() {
        let mut outer = Environment::new();
        outer.define(
            "x",
            Variable {
                loc: 4,
                access: VarAccess::GlobalConstantPublic,
                types: alt_type(&[tag::INT]),
            },
        );
        let mut inner = Environment::enclosed_by(Arc::new(outer));
        inner.define(
            "y",
            Variable {
                loc: 5,
                access: VarAccess::FunctionArgument,
                types: alt_type(&[tag::STRING]),
            },
        );
        assert_eq!(inner.get_var("x").map(|v| v.loc), Some(4));
        assert_eq!(inner.get_var("y").map(|v| v.loc), Some(5));
        assert!(inner.get_var("z").is_none());
    }
}
