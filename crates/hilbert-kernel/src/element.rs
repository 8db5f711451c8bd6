//! Formula element trees.
//!
//! An element is either an atom (opaque text) or an operator-tagged list
//! of child elements. Trees are produced by an external parser and then
//! read by the checking engines; mutation is only meant for building.
//!
//! JSON form: an atom is a plain string, a list is
//! `{"op": "AND", "args": [...]}`.

use crate::error::KernelError;
use serde::{Deserialize, Serialize};

/// One node of a formula tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Element {
    /// Opaque text payload: a variable name, a predicate name, a constant.
    Atom(String),

    /// An operator applied to an ordered sequence of children.
    List(ElementList),
}

/// Operator name plus ordered children.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementList {
    #[serde(rename = "op")]
    operator: String,
    #[serde(rename = "args", default, skip_serializing_if = "Vec::is_empty")]
    elements: Vec<Element>,
}

impl Element {
    pub fn atom(text: impl Into<String>) -> Self {
        Self::Atom(text.into())
    }

    pub fn list(operator: impl Into<String>, elements: Vec<Element>) -> Self {
        Self::List(ElementList::new(operator, elements))
    }

    pub fn is_atom(&self) -> bool {
        matches!(self, Self::Atom(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Text payload of an atom.
    pub fn atom_text(&self) -> Option<&str> {
        match self {
            Self::Atom(text) => Some(text),
            Self::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&ElementList> {
        match self {
            Self::Atom(_) => None,
            Self::List(list) => Some(list),
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut ElementList> {
        match self {
            Self::Atom(_) => None,
            Self::List(list) => Some(list),
        }
    }

    /// Operator of a list element.
    pub fn operator(&self) -> Option<&str> {
        self.as_list().map(ElementList::operator)
    }

    /// Children of a list element; atoms have none.
    pub fn children(&self) -> &[Element] {
        match self {
            Self::Atom(_) => &[],
            Self::List(list) => list.elements(),
        }
    }

    /// Whether this is a list with the given operator.
    pub fn has_operator(&self, operator: &str) -> bool {
        self.operator() == Some(operator)
    }

    /// Fully independent deep clone.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// New tree in which every subtree equal to `search` is swapped for a
    /// clone of `replacement`. Replaced subtrees are not searched again.
    pub fn replace(&self, search: &Element, replacement: &Element) -> Self {
        if self == search {
            return replacement.clone();
        }
        match self {
            Self::Atom(_) => self.clone(),
            Self::List(list) => Self::List(ElementList {
                operator: list.operator.clone(),
                elements: list
                    .elements
                    .iter()
                    .map(|child| child.replace(search, replacement))
                    .collect(),
            }),
        }
    }

    /// Whether `search` occurs anywhere in this tree (including the root).
    pub fn contains(&self, search: &Element) -> bool {
        self == search || self.children().iter().any(|child| child.contains(search))
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        1 + self.children().iter().map(Element::size).sum::<usize>()
    }
}

impl ElementList {
    pub fn new(operator: impl Into<String>, elements: Vec<Element>) -> Self {
        Self {
            operator: operator.into(),
            elements,
        }
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Element> {
        self.elements.get(index)
    }

    /// Append a child.
    pub fn add(&mut self, element: Element) {
        self.elements.push(element);
    }

    /// Insert a child before `index` (`index == len` appends).
    pub fn insert(&mut self, index: usize, element: Element) -> Result<(), KernelError> {
        if index > self.elements.len() {
            return Err(self.out_of_range(index));
        }
        self.elements.insert(index, element);
        Ok(())
    }

    /// Swap the child at `index`, returning the previous one.
    pub fn replace(&mut self, index: usize, element: Element) -> Result<Element, KernelError> {
        match self.elements.get_mut(index) {
            Some(slot) => Ok(std::mem::replace(slot, element)),
            None => Err(self.out_of_range(index)),
        }
    }

    /// Remove and return the child at `index`.
    pub fn remove(&mut self, index: usize) -> Result<Element, KernelError> {
        if index >= self.elements.len() {
            return Err(self.out_of_range(index));
        }
        Ok(self.elements.remove(index))
    }

    fn out_of_range(&self, index: usize) -> KernelError {
        KernelError::IndexOutOfRange {
            index,
            len: self.elements.len(),
        }
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Atom(text) => write!(f, "{text}"),
            Self::List(list) => write!(f, "{list}"),
        }
    }
}

impl std::fmt::Display for ElementList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.operator)?;
        for (idx, child) in self.elements.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{child}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pred(name: &str, args: &[&str]) -> Element {
        let mut children = vec![Element::atom(name)];
        children.extend(
            args.iter()
                .map(|arg| Element::list("VAR", vec![Element::atom(*arg)])),
        );
        Element::list("PREDVAR", children)
    }

    #[test]
    fn copy_is_independent() {
        let original = Element::list("AND", vec![pred("A", &[]), pred("B", &[])]);
        let mut copied = original.copy();
        copied
            .as_list_mut()
            .expect("list")
            .add(pred("C", &[]));

        assert_eq!(original.children().len(), 2);
        assert_eq!(copied.children().len(), 3);
        assert_ne!(original, copied);
    }

    #[test]
    fn replace_substitutes_every_equal_subtree() {
        let a = pred("A", &[]);
        let b = pred("B", &[]);
        let formula = Element::list(
            "IMPL",
            vec![a.clone(), Element::list("NOT", vec![a.clone()])],
        );

        let replaced = formula.replace(&a, &b);
        assert_eq!(
            replaced,
            Element::list("IMPL", vec![b.clone(), Element::list("NOT", vec![b])])
        );
        assert!(formula.contains(&a));
        assert!(!replaced.contains(&a));
    }

    #[test]
    fn replace_of_root_returns_replacement() {
        let a = pred("A", &[]);
        let b = pred("B", &["x"]);
        assert_eq!(a.replace(&a, &b), b);
    }

    #[test]
    fn list_mutation_checks_bounds() {
        let mut list = ElementList::new("OR", vec![Element::atom("a")]);
        list.insert(0, Element::atom("b")).expect("insert at front");
        assert_eq!(list.get(0), Some(&Element::atom("b")));
        assert_eq!(
            list.remove(5),
            Err(KernelError::IndexOutOfRange { index: 5, len: 2 })
        );
        let previous = list.replace(1, Element::atom("c")).expect("replace");
        assert_eq!(previous, Element::atom("a"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn json_shape_is_compact() {
        let formula = pred("P", &["x"]);
        let json = serde_json::to_string(&formula).expect("serialize");
        assert_eq!(
            json,
            r#"{"op":"PREDVAR","args":["P",{"op":"VAR","args":["x"]}]}"#
        );
        let back: Element = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, formula);
    }

    #[test]
    fn display_renders_prefix_notation() {
        let formula = Element::list("EQUI", vec![pred("A", &["x", "y"]), pred("A", &["y", "x"])]);
        insta::assert_snapshot!(
            formula.to_string(),
            @"EQUI(PREDVAR(A, VAR(x), VAR(y)), PREDVAR(A, VAR(y), VAR(x)))"
        );
        assert_eq!(formula.size(), 13);
    }
}
