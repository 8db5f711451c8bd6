//! Reference resolution for proof lines.
//!
//! A proof line names the formulas it builds on. A reference is either a
//! local proof line label, the label of an axiom or proposition of the
//! module under check, or `prefix.label` for a node of the module imported
//! under `prefix`.

use crate::check::ModuleContext;
use hilbert_kernel::{Element, Module, ModuleAddress, Node};
use std::collections::{BTreeMap, BTreeSet};

/// Capabilities a proof checker needs to look beyond the current proof.
pub trait ReferenceResolver {
    /// Canonical form used when comparing formulas.
    fn normalized_formula(&self, formula: &Element) -> Element {
        formula.clone()
    }

    /// Canonical local line label, if `reference` names a proof line.
    fn normalized_local_proof_line_reference(&self, reference: &str) -> Option<String>;

    /// Formula of the module-level node `reference` points at.
    fn normalized_reference_formula(&self, reference: &str) -> Option<Element>;

    /// Where the referenced node lives.
    fn reference_context(&self, reference: &str) -> Option<ModuleContext>;

    fn is_local_proof_line_reference(&self, reference: &str) -> bool {
        self.normalized_local_proof_line_reference(reference).is_some()
    }

    /// Whether the referenced node may be used as a premise: an axiom, or
    /// a proposition already proved.
    fn is_proved_formula(&self, reference: &str) -> bool;
}

/// Resolves references against one module and the modules it imports.
///
/// Local propositions count as proved once [`ModuleResolver::mark_proved`]
/// was called for them; imported propositions count as proved when their
/// module was registered as proved.
#[derive(Debug)]
pub struct ModuleResolver<'a> {
    module: &'a Module,
    imports: BTreeMap<String, ImportedModule<'a>>,
    proved: BTreeSet<String>,
}

#[derive(Debug)]
struct ImportedModule<'a> {
    module: &'a Module,
    proved: bool,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(module: &'a Module) -> Self {
        Self {
            module,
            imports: BTreeMap::new(),
            proved: BTreeSet::new(),
        }
    }

    /// Register the module imported under `label`.
    pub fn with_import(
        mut self,
        label: impl Into<String>,
        module: &'a Module,
        proved: bool,
    ) -> Self {
        self.imports
            .insert(label.into(), ImportedModule { module, proved });
        self
    }

    pub fn mark_proved(&mut self, label: impl Into<String>) {
        self.proved.insert(label.into());
    }

    pub fn module(&self) -> &'a Module {
        self.module
    }

    /// Addresses of declared imports that were not registered.
    pub fn missing_imports(&self) -> Vec<&'a ModuleAddress> {
        self.module
            .imports
            .iter()
            .filter(|import| !self.imports.contains_key(&import.label))
            .map(|import| &import.address)
            .collect()
    }

    fn locate(&self, reference: &str) -> Option<Located<'a>> {
        let reference = reference.trim();
        match reference.split_once('.') {
            Some((prefix, label)) => {
                let imported = self.imports.get(prefix)?;
                let node = imported.module.node(label)?;
                Some(Located {
                    module: imported.module,
                    node,
                    proved: node.is_axiom() || imported.proved,
                })
            }
            None => {
                let node = self.module.node(reference)?;
                Some(Located {
                    module: self.module,
                    node,
                    proved: node.is_axiom() || self.proved.contains(reference),
                })
            }
        }
    }
}

struct Located<'a> {
    module: &'a Module,
    node: &'a Node,
    proved: bool,
}

impl ReferenceResolver for ModuleResolver<'_> {
    fn normalized_local_proof_line_reference(&self, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if reference.is_empty()
            || reference.contains('.')
            || self.module.node(reference).is_some()
        {
            return None;
        }
        Some(reference.to_string())
    }

    fn normalized_reference_formula(&self, reference: &str) -> Option<Element> {
        self.locate(reference)
            .map(|located| self.normalized_formula(located.node.formula()))
    }

    fn reference_context(&self, reference: &str) -> Option<ModuleContext> {
        self.locate(reference).map(|located| {
            ModuleContext::new(located.module.address.clone())
                .join(format!("node[{}]", located.node.label))
        })
    }

    fn is_proved_formula(&self, reference: &str) -> bool {
        self.locate(reference).is_some_and(|located| located.proved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hilbert_kernel::Import;

    fn atom_formula(name: &str) -> Element {
        Element::list("PREDVAR", vec![Element::atom(name)])
    }

    fn fixture() -> (Module, Module) {
        let mut base = Module::new("base");
        base.nodes.push(Node::axiom("ax", atom_formula("A")));
        base.nodes
            .push(Node::proposition("thm", atom_formula("B"), Vec::new()));

        let mut main = Module::new("main");
        main.imports.push(Import {
            label: "b".to_string(),
            address: ModuleAddress::new("base"),
        });
        main.nodes
            .push(Node::proposition("p", atom_formula("C"), Vec::new()));
        (base, main)
    }

    #[test]
    fn local_and_imported_references() {
        let (base, main) = fixture();
        let mut resolver = ModuleResolver::new(&main).with_import("b", &base, false);

        assert!(resolver.is_local_proof_line_reference("3"));
        assert!(!resolver.is_local_proof_line_reference("p"));
        assert!(!resolver.is_local_proof_line_reference("b.ax"));

        assert_eq!(resolver.normalized_reference_formula("b.thm"), Some(atom_formula("B")));
        assert_eq!(resolver.normalized_reference_formula("x.thm"), None);

        assert!(resolver.is_proved_formula("b.ax"));
        assert!(!resolver.is_proved_formula("b.thm"));
        assert!(!resolver.is_proved_formula("p"));
        resolver.mark_proved("p");
        assert!(resolver.is_proved_formula("p"));

        let context = resolver.reference_context("b.thm").expect("imported node");
        assert_eq!(context.to_string(), "base:node[thm]");
    }

    #[test]
    fn proved_import_exposes_propositions() {
        let (base, main) = fixture();
        let resolver = ModuleResolver::new(&main).with_import("b", &base, true);
        assert!(resolver.is_proved_formula("b.thm"));
        assert!(resolver.missing_imports().is_empty());
        assert_eq!(
            ModuleResolver::new(&main).missing_imports(),
            vec![&ModuleAddress::new("base")]
        );
    }
}
