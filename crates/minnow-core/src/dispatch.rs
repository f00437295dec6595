//! Multiple dispatch. Each function name owns a list of overloads ordered
//! from most to least specific; the builder turns that list into a decision
//! tree keyed on argument type names, with bling words partitioning the
//! search exactly and tuple parameters absorbing a run of arguments.
//!
//! Construction interleaves two passes per overload: first the signature is
//! *overlaid* onto the tree, so that a more specific branch already present
//! also carries the new overload's tail where its types are supertypes of
//! the branch; then the signature is *added* as a plain path. The order is
//! what preserves overload priority without blowing the tree up.

use std::collections::HashMap;

use crate::types::AltType;

pub const BLING: &str = "bling";
pub const TUPLE: &str = "tuple";

/// The empty label marking end-of-signature on a branch.
pub const SENTINEL: &str = "";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub var_type: String,
}

impl Param {
    pub fn new(name: impl Into<String>, var_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            var_type: var_type.into(),
        }
    }

    /// A literal word acting as a fixed separator in the signature.
    pub fn bling(word: impl Into<String>) -> Self {
        Self {
            name: word.into(),
            var_type: BLING.to_string(),
        }
    }

    /// The label this parameter contributes to the tree: the word itself
    /// for bling, the type name otherwise.
    pub fn type_or_bling(&self) -> &str {
        if self.var_type == BLING {
            &self.name
        } else {
            &self.var_type
        }
    }
}

/// One overload: its signature, the types it may return, and where its
/// compiled body starts.
#[derive(Clone, Debug)]
pub struct Function {
    pub sig: Vec<Param>,
    pub returns: AltType,
    pub call_loc: u32,
}

/// The subtype relation the tree consults, as a name-level adjacency map.
/// `points_to` is strict: a type never points to itself.
#[derive(Clone, Debug, Default)]
pub struct TypeHierarchy {
    parents: HashMap<String, Vec<String>>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock hierarchy: every concrete single type points to `single`,
    /// and a single may stand where a tuple is wanted.
    pub fn base() -> Self {
        let mut h = Self::new();
        for t in [
            "null", "int", "bool", "string", "float", "type", "func", "pair", "list", "map",
            "set", "label",
        ] {
            h.add(t, "single");
        }
        h.add("single", TUPLE);
        h
    }

    pub fn add(&mut self, child: &str, parent: &str) {
        self.parents
            .entry(child.to_string())
            .or_default()
            .push(parent.to_string());
    }

    pub fn points_to(&self, child: &str, parent: &str) -> bool {
        if child == parent {
            return false;
        }
        let mut frontier = vec![child];
        let mut seen: Vec<&str> = Vec::new();
        while let Some(t) = frontier.pop() {
            if seen.contains(&t) {
                continue;
            }
            seen.push(t);
            if let Some(ups) = self.parents.get(t) {
                for up in ups {
                    if up == parent {
                        return true;
                    }
                    frontier.push(up);
                }
            }
        }
        false
    }
}

#[derive(Clone, Debug)]
pub struct Branch {
    pub type_name: String,
    pub node: FnTreeNode,
}

#[derive(Clone, Debug, Default)]
pub struct FnTreeNode {
    /// At a leaf reached through the sentinel branch, the overload index.
    pub fn_: Option<usize>,
    pub branches: Vec<Branch>,
}

impl FnTreeNode {
    fn index_of(&self, label: &str) -> Option<usize> {
        self.branches.iter().position(|b| b.type_name == label)
    }

    fn add_or_replace(&mut self, label: &str, node: FnTreeNode) {
        match self.index_of(label) {
            Some(i) => self.branches[i].node = node,
            None => self.branches.push(Branch {
                type_name: label.to_string(),
                node,
            }),
        }
    }

    fn branch(&self, label: &str) -> Option<&FnTreeNode> {
        self.branches
            .iter()
            .find(|b| b.type_name == label)
            .map(|b| &b.node)
    }
}

/// Builds the dispatch tree for one name from its overloads, most specific
/// first.
pub fn build_tree(overloads: &[Function], hierarchy: &TypeHierarchy) -> FnTreeNode {
    let mut tree = FnTreeNode::default();
    for (i, f) in overloads.iter().enumerate() {
        overlay(&mut tree, f, i, 0, hierarchy);
        add_to(&mut tree, f, i, 0);
    }
    tree
}

// Replicates the new overload's tail under existing branches whose labels
// are subtypes of the overload's parameter, so that the more specific
// branch still wins where it applies but falls through to the newcomer
// where it does not.
fn overlay(tree: &mut FnTreeNode, f: &Function, fi: usize, argn: usize, h: &TypeHierarchy) {
    if argn >= f.sig.len() {
        // If an existing branch already ends here, it has precedence.
        if tree.index_of(SENTINEL).is_some() {
            return;
        }
        tree.add_or_replace(
            SENTINEL,
            FnTreeNode {
                fn_: Some(fi),
                branches: Vec::new(),
            },
        );
        return;
    }

    if f.sig[argn].var_type == TUPLE {
        // A tuple element may always be followed by more tuple.
        if tree.index_of(TUPLE).is_none() {
            let mut twig = FnTreeNode::default();
            add_to(&mut twig, f, fi, argn);
            tree.add_or_replace(TUPLE, twig);
        }
        // Or by whatever marks the end of that tuple.
        let tuple_stop = tuple_stop_label(f, argn);
        if tree.index_of(&tuple_stop).is_none() {
            let mut twig = FnTreeNode::default();
            add_to(&mut twig, f, fi, argn + 2);
            tree.add_or_replace(&tuple_stop, twig);
        }
    }

    let snapshot = tree.branches.len();
    for i in 0..snapshot {
        let label = tree.branches[i].type_name.clone();
        if label == f.sig[argn].type_or_bling() || h.points_to(&label, &f.sig[argn].var_type) {
            overlay(&mut tree.branches[i].node, f, fi, argn + 1, h);
            if f.sig[argn].var_type == TUPLE && h.points_to(&label, TUPLE) {
                // The branch's own subtree may also continue the tuple.
                overlay(&mut tree.branches[i].node, f, fi, argn, h);
            }
        } else {
            // Unrelated types: hang the tail of the signature here.
            let mut twig = FnTreeNode::default();
            add_to(&mut twig, f, fi, argn + 1);
            tree.add_or_replace(f.sig[argn].type_or_bling(), twig);
        }
    }
}

fn add_to(tree: &mut FnTreeNode, f: &Function, fi: usize, argn: usize) {
    if argn >= f.sig.len() {
        if tree.index_of(SENTINEL).is_some() {
            return;
        }
        tree.add_or_replace(
            SENTINEL,
            FnTreeNode {
                fn_: Some(fi),
                branches: Vec::new(),
            },
        );
        return;
    }

    if f.sig[argn].var_type == TUPLE {
        let tuple_stop = tuple_stop_label(f, argn);
        match tree.index_of(&tuple_stop) {
            Some(i) => add_to(&mut tree.branches[i].node, f, fi, argn + 2),
            None => {
                let mut twig = FnTreeNode::default();
                if tuple_stop == SENTINEL {
                    twig.fn_ = Some(fi);
                } else {
                    add_to(&mut twig, f, fi, argn + 2);
                }
                tree.add_or_replace(&tuple_stop, twig);
            }
        }
    }

    let label = f.sig[argn].type_or_bling().to_string();
    if let Some(i) = tree.index_of(&label) {
        add_to(&mut tree.branches[i].node, f, fi, argn + 1);
        return;
    }
    let mut twig = FnTreeNode::default();
    add_to(&mut twig, f, fi, argn + 1);
    tree.add_or_replace(&label, twig);
}

fn tuple_stop_label(f: &Function, argn: usize) -> String {
    if argn + 1 < f.sig.len() {
        f.sig[argn + 1].type_or_bling().to_string()
    } else {
        SENTINEL.to_string()
    }
}

/// Walks the tree one argument label at a time: exact branch matches are
/// preferred, then supertype branches; a `tuple` branch may either consume
/// the argument and stay put or descend, with backtracking between the two.
pub fn lookup(tree: &FnTreeNode, args: &[&str], hierarchy: &TypeHierarchy) -> Option<usize> {
    walk(tree, args, 0, hierarchy)
}

// The end-of-signature branch may carry its overload directly or behind a
// further sentinel hop, depending on which pass grew it; chase the chain.
fn resolve_leaf(node: &FnTreeNode) -> Option<usize> {
    let child = node.branch(SENTINEL)?;
    child.fn_.or_else(|| resolve_leaf(child))
}

fn walk(node: &FnTreeNode, args: &[&str], i: usize, h: &TypeHierarchy) -> Option<usize> {
    if i == args.len() {
        return resolve_leaf(node);
    }
    let arg = args[i];
    if let Some(child) = node.branch(arg) {
        if arg != TUPLE {
            if let Some(found) = walk(child, args, i + 1, h) {
                return Some(found);
            }
        }
    }
    for branch in &node.branches {
        if branch.type_name == SENTINEL
            || branch.type_name == arg
            || branch.type_name == TUPLE
            || !h.points_to(arg, &branch.type_name)
        {
            continue;
        }
        if let Some(found) = walk(&branch.node, args, i + 1, h) {
            return Some(found);
        }
    }
    if node.branch(TUPLE).is_some() && (arg == TUPLE || h.points_to(arg, TUPLE)) {
        // Stay here to keep absorbing the tuple run.
        if let Some(found) = walk(node, args, i + 1, h) {
            return Some(found);
        }
        // Or step into the tuple branch and continue from there.
        if let Some(child) = node.branch(TUPLE) {
            if let Some(found) = walk(child, args, i + 1, h) {
                return Some(found);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::alt_type;
    use crate::value::tag;

    fn f(sig: Vec<Param>) -> Function {
        Function {
            sig,
            returns: alt_type(&[tag::INT]),
            call_loc: 0,
        }
    }

    #[test]
    fn exact_signatures_route_to_their_own_overload() {
        let overloads = vec![
            f(vec![Param::new("x", "int"), Param::new("y", "string")]),
            f(vec![Param::new("x", "string"), Param::new("y", "string")]),
        ];
        let h = TypeHierarchy::base();
        let tree = build_tree(&overloads, &h);
        assert_eq!(lookup(&tree, &["int", "string"], &h), Some(0));
        assert_eq!(lookup(&tree, &["string", "string"], &h), Some(1));
        assert_eq!(lookup(&tree, &["int", "int"], &h), None);
        assert_eq!(lookup(&tree, &["int"], &h), None);
    }

    #[test]
    fn overlay_replicates_the_general_tail_under_specific_branches() {
        // foo(x int, y string) then foo(x single, y bool): the int branch
        // must also carry the bool tail.
        let overloads = vec![
            f(vec![Param::new("x", "int"), Param::new("y", "string")]),
            f(vec![Param::new("x", "single"), Param::new("y", "bool")]),
        ];
        let h = TypeHierarchy::base();
        let tree = build_tree(&overloads, &h);
        assert_eq!(lookup(&tree, &["int", "string"], &h), Some(0));
        assert_eq!(lookup(&tree, &["int", "bool"], &h), Some(1));
        assert_eq!(lookup(&tree, &["float", "bool"], &h), Some(1));
        assert_eq!(lookup(&tree, &["float", "string"], &h), None);
    }

    #[test]
    fn specificity_order_wins_where_both_apply() {
        let overloads = vec![
            f(vec![Param::new("x", "int")]),
            f(vec![Param::new("x", "single")]),
        ];
        let h = TypeHierarchy::base();
        let tree = build_tree(&overloads, &h);
        assert_eq!(lookup(&tree, &["int"], &h), Some(0));
        assert_eq!(lookup(&tree, &["string"], &h), Some(1));
    }

    #[test]
    fn bling_words_partition_the_search_exactly() {
        let overloads = vec![
            f(vec![
                Param::new("x", "int"),
                Param::bling("to"),
                Param::new("y", "int"),
            ]),
            f(vec![
                Param::new("x", "int"),
                Param::bling("by"),
                Param::new("y", "int"),
            ]),
        ];
        let h = TypeHierarchy::base();
        let tree = build_tree(&overloads, &h);
        assert_eq!(lookup(&tree, &["int", "to", "int"], &h), Some(0));
        assert_eq!(lookup(&tree, &["int", "by", "int"], &h), Some(1));
        assert_eq!(lookup(&tree, &["int", "with", "int"], &h), None);
    }

    #[test]
    fn a_tuple_parameter_absorbs_a_run_of_arguments() {
        let overloads = vec![f(vec![Param::new("xs", TUPLE)])];
        let h = TypeHierarchy::base();
        let tree = build_tree(&overloads, &h);
        assert_eq!(lookup(&tree, &[], &h), Some(0));
        assert_eq!(lookup(&tree, &["int"], &h), Some(0));
        assert_eq!(lookup(&tree, &["int", "string", "bool"], &h), Some(0));
    }

    #[test]
    fn a_tuple_run_ends_at_its_stop_label() {
        let overloads = vec![f(vec![
            Param::new("xs", TUPLE),
            Param::bling("then"),
            Param::new("y", "int"),
        ])];
        let h = TypeHierarchy::base();
        let tree = build_tree(&overloads, &h);
        assert_eq!(lookup(&tree, &["then", "int"], &h), Some(0));
        assert_eq!(lookup(&tree, &["int", "then", "int"], &h), Some(0));
        assert_eq!(
            lookup(&tree, &["int", "bool", "then", "int"], &h),
            Some(0)
        );
        assert_eq!(lookup(&tree, &["int", "then"], &h), None);
    }

    #[test]
    fn user_types_dispatch_through_added_edges() {
        let mut h = TypeHierarchy::base();
        h.add("Colour", "single");
        let overloads = vec![
            f(vec![Param::new("x", "Colour")]),
            f(vec![Param::new("x", "single")]),
        ];
        let tree = build_tree(&overloads, &h);
        assert_eq!(lookup(&tree, &["Colour"], &h), Some(0));
        assert_eq!(lookup(&tree, &["int"], &h), Some(1));
    }
}
