//! Verification failures as data.
//!
//! Checkers collect one [`CheckError`] per defect and keep going. The
//! resulting [`CheckErrorList`] is empty exactly when the checked item is
//! valid.

use hilbert_kernel::ModuleAddress;
use serde::{Deserialize, Serialize};

/// Stable numeric codes for check errors.
pub mod codes {
    // Well-formedness.
    pub const UNKNOWN_OPERATOR: u32 = 30_100;
    pub const WRONG_ARITY: u32 = 30_110;
    pub const MISSING_SYMBOL_NAME: u32 = 30_120;
    pub const NOT_A_SUBJECT_VARIABLE: u32 = 30_130;
    pub const VARIABLE_ALREADY_BOUND: u32 = 30_140;
    pub const BARE_ATOM: u32 = 30_150;
    pub const DUPLICATE_LABEL: u32 = 30_160;
    pub const UNKNOWN_REFERENCE: u32 = 30_170;
    pub const UNKNOWN_IMPORT: u32 = 30_180;
    pub const INVALID_RULE_VERSION: u32 = 30_190;

    // Rule negotiation.
    pub const RULE_NOT_DECLARED: u32 = 37_100;
    pub const RULE_UNKNOWN: u32 = 37_110;
    pub const RULE_VERSION_UNSUPPORTED: u32 = 37_120;
    pub const RULE_LINK_NOT_PROVED: u32 = 37_130;

    // Proof lines.
    pub const MISSING_PROOF: u32 = 37_190;
    pub const EMPTY_PROOF: u32 = 37_200;
    pub const DUPLICATE_LINE_LABEL: u32 = 37_210;
    pub const REFERENCE_NOT_FOUND: u32 = 37_220;
    pub const REFERENCE_NOT_PROVED: u32 = 37_230;
    pub const ADD_REQUIRES_MODULE_REFERENCE: u32 = 37_240;
    pub const FORMULA_MISMATCH: u32 = 37_250;
    pub const MODUS_PONENS_MISMATCH: u32 = 37_260;
    pub const NOT_AN_IMPLICATION: u32 = 37_270;
    pub const VARIABLE_FREE_IN_ANTECEDENT: u32 = 37_280;
    pub const RENAME_NOT_POSSIBLE: u32 = 37_290;
    pub const SUBSTITUTION_COLLISION: u32 = 37_300;
    pub const BAD_PREDICATE_PATTERN: u32 = 37_310;
    pub const CONCLUSION_MISMATCH: u32 = 37_320;
    pub const GENERALIZATION_OVER_HYPOTHESIS: u32 = 37_330;
    pub const SUBSTITUTION_OVER_HYPOTHESIS: u32 = 37_335;
    pub const LAST_LINE_MISMATCH: u32 = 37_340;
}

/// Where in a module a check error was found.
///
/// `location` is a dotted path such as `node[thm1].proof[0].line[3]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleContext {
    pub module: ModuleAddress,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
}

impl ModuleContext {
    pub fn new(module: ModuleAddress) -> Self {
        Self {
            module,
            location: String::new(),
        }
    }

    /// Child context one path segment deeper.
    pub fn join(&self, segment: impl AsRef<str>) -> Self {
        let segment = segment.as_ref();
        let location = if self.location.is_empty() {
            segment.to_string()
        } else {
            format!("{}.{segment}", self.location)
        };
        Self {
            module: self.module.clone(),
            location,
        }
    }
}

impl std::fmt::Display for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.location.is_empty() {
            write!(f, "{}", self.module)
        } else {
            write!(f, "{}:{}", self.module, self.location)
        }
    }
}

/// One verification failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckError {
    pub code: u32,
    pub message: String,
    pub context: ModuleContext,
}

impl CheckError {
    pub fn new(code: u32, message: impl Into<String>, context: ModuleContext) -> Self {
        Self {
            code,
            message: message.into(),
            context,
        }
    }
}

impl std::fmt::Display for CheckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.context, self.message)
    }
}

/// Ordered collection of check errors. Empty means success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckErrorList {
    errors: Vec<CheckError>,
}

impl CheckErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: CheckError) {
        self.errors.push(error);
    }

    pub fn add(&mut self, code: u32, message: impl Into<String>, context: &ModuleContext) {
        self.push(CheckError::new(code, message, context.clone()));
    }

    pub fn extend(&mut self, other: CheckErrorList) {
        self.errors.extend(other.errors);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CheckError> {
        self.errors.iter()
    }

    pub fn codes(&self) -> Vec<u32> {
        self.errors.iter().map(|error| error.code).collect()
    }
}

impl IntoIterator for CheckErrorList {
    type Item = CheckError;
    type IntoIter = std::vec::IntoIter<CheckError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a CheckErrorList {
    type Item = &'a CheckError;
    type IntoIter = std::slice::Iter<'a, CheckError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl FromIterator<CheckError> for CheckErrorList {
    fn from_iter<T: IntoIterator<Item = CheckError>>(iter: T) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl std::fmt::Display for CheckErrorList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for error in &self.errors {
            writeln!(f, "{error}")?;
        }
        Ok(())
    }
}
