//! The parsed module model.
//!
//! A module is what the external front end hands over after parsing a
//! document: its address, the rule-set revision it was written against,
//! its imports, the inference rules it declares, and an ordered list of
//! labelled axioms and propositions. Propositions may carry formal proofs.

use crate::element::Element;
use serde::{Deserialize, Serialize};

/// Location-independent module identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleAddress(pub String);

impl ModuleAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModuleAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An already-parsed module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub address: ModuleAddress,
    /// Rule-set revision the module was authored against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<Import>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,
}

/// An imported module, referenced locally as `label.node`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    pub label: String,
    pub address: ModuleAddress,
}

/// Declaration of an inference rule the module's proofs may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDeclaration {
    pub name: String,
    pub version: String,
    /// Propositions the rule's soundness rests on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
}

/// A labelled axiom or proposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub label: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Axiom {
        formula: Element,
    },
    Proposition {
        formula: Element,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        proofs: Vec<FormalProof>,
    },
}

/// One formal proof: an ordered list of justified lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormalProof {
    pub lines: Vec<ProofLine>,
}

/// A formula plus the rule application that justifies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofLine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub formula: Element,
    pub reason: Reason,
}

/// Justification of a proof line. The tag is the declared rule name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all_fields = "camelCase")]
pub enum Reason {
    /// Add an axiom or an already proved proposition.
    #[serde(rename = "ADD")]
    Add { reference: String },

    /// From `A` and `A → B` conclude `B`.
    #[serde(rename = "MP")]
    ModusPonens {
        reference1: String,
        reference2: String,
    },

    /// Rename a bound subject variable; `occurrence` 0 renames every
    /// binding, `n` only the n-th quantifier binding `original`.
    #[serde(rename = "RENAME")]
    Rename {
        reference: String,
        original: Element,
        replacement: Element,
        #[serde(default)]
        occurrence: usize,
    },

    /// Substitute a term for a free subject variable.
    #[serde(rename = "SUBST_FREE")]
    SubstFree {
        reference: String,
        subject_variable: Element,
        substitute: Element,
    },

    /// Substitute a formula for a predicate variable.
    #[serde(rename = "SUBST_PRED")]
    SubstPred {
        reference: String,
        predicate_variable: Element,
        substitute: Element,
    },

    /// From `A → B` conclude `A → ∀x B`.
    #[serde(rename = "UNIVERSAL")]
    Universal {
        reference: String,
        subject_variable: Element,
    },

    /// From `B → A` conclude `∃x B → A`.
    #[serde(rename = "EXISTENTIAL")]
    Existential {
        reference: String,
        subject_variable: Element,
    },

    /// Assume `hypothesis`, derive `conclusion`, conclude `H → C`.
    #[serde(rename = "CP")]
    ConditionalProof {
        hypothesis: Hypothesis,
        lines: Vec<ProofLine>,
        conclusion: Conclusion,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub label: String,
    pub formula: Element,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conclusion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub formula: Element,
}

impl Reason {
    /// Declared rule name this reason applies.
    pub fn rule_name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "ADD",
            Self::ModusPonens { .. } => "MP",
            Self::Rename { .. } => "RENAME",
            Self::SubstFree { .. } => "SUBST_FREE",
            Self::SubstPred { .. } => "SUBST_PRED",
            Self::Universal { .. } => "UNIVERSAL",
            Self::Existential { .. } => "EXISTENTIAL",
            Self::ConditionalProof { .. } => "CP",
        }
    }

    /// References this reason points at directly (not nested lines).
    pub fn references(&self) -> Vec<&str> {
        match self {
            Self::Add { reference }
            | Self::Rename { reference, .. }
            | Self::SubstFree { reference, .. }
            | Self::SubstPred { reference, .. }
            | Self::Universal { reference, .. }
            | Self::Existential { reference, .. } => vec![reference.as_str()],
            Self::ModusPonens {
                reference1,
                reference2,
            } => vec![reference1.as_str(), reference2.as_str()],
            Self::ConditionalProof { .. } => Vec::new(),
        }
    }
}

impl Node {
    pub fn axiom(label: impl Into<String>, formula: Element) -> Self {
        Self {
            label: label.into(),
            kind: NodeKind::Axiom { formula },
        }
    }

    pub fn proposition(
        label: impl Into<String>,
        formula: Element,
        proofs: Vec<FormalProof>,
    ) -> Self {
        Self {
            label: label.into(),
            kind: NodeKind::Proposition { formula, proofs },
        }
    }

    pub fn formula(&self) -> &Element {
        match &self.kind {
            NodeKind::Axiom { formula } | NodeKind::Proposition { formula, .. } => formula,
        }
    }

    pub fn is_axiom(&self) -> bool {
        matches!(self.kind, NodeKind::Axiom { .. })
    }

    pub fn proofs(&self) -> &[FormalProof] {
        match &self.kind {
            NodeKind::Axiom { .. } => &[],
            NodeKind::Proposition { proofs, .. } => proofs,
        }
    }
}

impl Module {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: ModuleAddress::new(address),
            rule_version: None,
            imports: Vec::new(),
            rules: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn node(&self, label: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.label == label)
    }

    /// Position of a node in document order.
    pub fn node_index(&self, label: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.label == label)
    }

    pub fn import(&self, label: &str) -> Option<&Import> {
        self.imports.iter().find(|import| import.label == label)
    }

    /// Every declaration of a rule name, in document order.
    pub fn rule_declarations<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a RuleDeclaration> + 'a {
        self.rules.iter().filter(move |rule| rule.name == name)
    }

    pub fn required_modules(&self) -> impl Iterator<Item = &ModuleAddress> {
        self.imports.iter().map(|import| &import.address)
    }
}
