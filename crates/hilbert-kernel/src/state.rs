//! Per-module verification state machines.
//!
//! A module moves through three stages, each with its own machine:
//!
//! ```text
//! Dependency     undefined → loading → (failed | loaded)
//! WellFormed     unchecked → external → (failed | internal → (failed | checked))
//! FormallyProved unchecked → external → (failed | internal → (failed | proved))
//! ```
//!
//! "External" checks the imported modules, "internal" checks the module's
//! own content. Every machine is a total function of (state, event): events
//! a state does not accept are reported as [`KernelError::InvalidTransition`]
//! and leave the state unchanged. A failed state is only left through
//! [`StageEvent::Restart`].

use crate::error::KernelError;
use serde::{Deserialize, Serialize};

/// The three verification stages, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Dependency,
    WellFormed,
    FormallyProved,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dependency => write!(f, "dependency"),
            Self::WellFormed => write!(f, "well-formed"),
            Self::FormallyProved => write!(f, "formally-proved"),
        }
    }
}

/// Lifecycle events fed into a stage machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageEvent {
    Started,
    Succeeded,
    Failed,
    /// Return to the initial state, from anywhere.
    Restart,
}

impl std::fmt::Display for StageEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Restart => write!(f, "restart"),
        }
    }
}

/// Loading of the modules a module imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyState {
    #[default]
    Undefined,
    LoadingRequiredModules,
    LoadingRequiredModulesFailed,
    LoadedRequiredModules,
}

impl DependencyState {
    pub fn code(self) -> u8 {
        match self {
            Self::Undefined => 0,
            Self::LoadingRequiredModules => 1,
            Self::LoadingRequiredModulesFailed => 2,
            Self::LoadedRequiredModules => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::LoadingRequiredModules => "loading required modules",
            Self::LoadingRequiredModulesFailed => "loading required modules failed",
            Self::LoadedRequiredModules => "loaded required modules",
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, Self::LoadingRequiredModulesFailed)
    }

    pub fn is_loaded(self) -> bool {
        matches!(self, Self::LoadedRequiredModules)
    }

    pub fn next(self, event: StageEvent) -> Result<Self, KernelError> {
        match (self, event) {
            (_, StageEvent::Restart) => Ok(Self::Undefined),
            (Self::Undefined, StageEvent::Started) => Ok(Self::LoadingRequiredModules),
            (Self::LoadingRequiredModules, StageEvent::Succeeded) => {
                Ok(Self::LoadedRequiredModules)
            }
            (Self::LoadingRequiredModules, StageEvent::Failed) => {
                Ok(Self::LoadingRequiredModulesFailed)
            }
            (state, event) => Err(KernelError::InvalidTransition {
                stage: Stage::Dependency,
                state: state.label(),
                event,
            }),
        }
    }
}

/// Syntactic well-formedness of the module and its imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WellFormedState {
    #[default]
    Unchecked,
    ExternalChecking,
    ExternalCheckingFailed,
    InternalChecking,
    InternalCheckingFailed,
    Checked,
}

impl WellFormedState {
    pub fn code(self) -> u8 {
        match self {
            Self::Unchecked => 0,
            Self::ExternalChecking => 1,
            Self::ExternalCheckingFailed => 2,
            Self::InternalChecking => 3,
            Self::InternalCheckingFailed => 4,
            Self::Checked => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Unchecked => "unchecked",
            Self::ExternalChecking => "checking imports for well-formedness",
            Self::ExternalCheckingFailed => "imports not well-formed",
            Self::InternalChecking => "checking well-formedness",
            Self::InternalCheckingFailed => "not well-formed",
            Self::Checked => "well-formed",
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::ExternalCheckingFailed | Self::InternalCheckingFailed
        )
    }

    pub fn is_checked(self) -> bool {
        matches!(self, Self::Checked)
    }

    pub fn next(self, event: StageEvent) -> Result<Self, KernelError> {
        match (self, event) {
            (_, StageEvent::Restart) => Ok(Self::Unchecked),
            (Self::Unchecked, StageEvent::Started) => Ok(Self::ExternalChecking),
            (Self::ExternalChecking, StageEvent::Succeeded) => Ok(Self::InternalChecking),
            (Self::ExternalChecking, StageEvent::Failed) => Ok(Self::ExternalCheckingFailed),
            (Self::InternalChecking, StageEvent::Succeeded) => Ok(Self::Checked),
            (Self::InternalChecking, StageEvent::Failed) => Ok(Self::InternalCheckingFailed),
            (state, event) => Err(KernelError::InvalidTransition {
                stage: Stage::WellFormed,
                state: state.label(),
                event,
            }),
        }
    }
}

/// Formal proof checking of the module and its imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormallyProvedState {
    #[default]
    Unchecked,
    ExternalChecking,
    ExternalCheckingFailed,
    InternalChecking,
    InternalCheckingFailed,
    Proved,
}

impl FormallyProvedState {
    pub fn code(self) -> u8 {
        match self {
            Self::Unchecked => 0,
            Self::ExternalChecking => 1,
            Self::ExternalCheckingFailed => 2,
            Self::InternalChecking => 3,
            Self::InternalCheckingFailed => 4,
            Self::Proved => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Unchecked => "unchecked",
            Self::ExternalChecking => "checking imports for formal correctness",
            Self::ExternalCheckingFailed => "imports not fully proved",
            Self::InternalChecking => "checking formal proofs",
            Self::InternalCheckingFailed => "formal proof check failed",
            Self::Proved => "fully proved",
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::ExternalCheckingFailed | Self::InternalCheckingFailed
        )
    }

    pub fn is_proved(self) -> bool {
        matches!(self, Self::Proved)
    }

    pub fn next(self, event: StageEvent) -> Result<Self, KernelError> {
        match (self, event) {
            (_, StageEvent::Restart) => Ok(Self::Unchecked),
            (Self::Unchecked, StageEvent::Started) => Ok(Self::ExternalChecking),
            (Self::ExternalChecking, StageEvent::Succeeded) => Ok(Self::InternalChecking),
            (Self::ExternalChecking, StageEvent::Failed) => Ok(Self::ExternalCheckingFailed),
            (Self::InternalChecking, StageEvent::Succeeded) => Ok(Self::Proved),
            (Self::InternalChecking, StageEvent::Failed) => Ok(Self::InternalCheckingFailed),
            (state, event) => Err(KernelError::InvalidTransition {
                stage: Stage::FormallyProved,
                state: state.label(),
                event,
            }),
        }
    }
}

/// The three machines of one module, with the cross-stage rules.
///
/// - a stage only starts once the previous stage reached its terminal
///   success state;
/// - restarting a stage restarts every later stage too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleStates {
    pub dependency: DependencyState,
    pub well_formed: WellFormedState,
    pub formally_proved: FormallyProvedState,
}

impl ModuleStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one event into one stage. On error nothing changes.
    pub fn apply(&mut self, stage: Stage, event: StageEvent) -> Result<(), KernelError> {
        if event == StageEvent::Started {
            self.check_prerequisite(stage)?;
        }

        match stage {
            Stage::Dependency => {
                self.dependency = self.dependency.next(event)?;
                if event == StageEvent::Restart {
                    self.well_formed = WellFormedState::Unchecked;
                    self.formally_proved = FormallyProvedState::Unchecked;
                }
            }
            Stage::WellFormed => {
                self.well_formed = self.well_formed.next(event)?;
                if event == StageEvent::Restart {
                    self.formally_proved = FormallyProvedState::Unchecked;
                }
            }
            Stage::FormallyProved => {
                self.formally_proved = self.formally_proved.next(event)?;
            }
        }
        Ok(())
    }

    fn check_prerequisite(&self, stage: Stage) -> Result<(), KernelError> {
        match stage {
            Stage::Dependency => Ok(()),
            Stage::WellFormed if !self.dependency.is_loaded() => {
                Err(KernelError::PrerequisiteNotMet {
                    stage,
                    required: "required modules must be loaded",
                })
            }
            Stage::FormallyProved if !self.well_formed.is_checked() => {
                Err(KernelError::PrerequisiteNotMet {
                    stage,
                    required: "module must be well-formed",
                })
            }
            _ => Ok(()),
        }
    }

    /// Return every stage to its initial state.
    pub fn restart(&mut self) {
        *self = Self::new();
    }

    /// Label of one stage's current state.
    pub fn label(&self, stage: Stage) -> &'static str {
        match stage {
            Stage::Dependency => self.dependency.label(),
            Stage::WellFormed => self.well_formed.label(),
            Stage::FormallyProved => self.formally_proved.label(),
        }
    }

    /// Whether any stage sits in a failure state.
    pub fn has_failure(&self) -> bool {
        self.dependency.is_failure()
            || self.well_formed.is_failure()
            || self.formally_proved.is_failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded() -> ModuleStates {
        let mut states = ModuleStates::new();
        states
            .apply(Stage::Dependency, StageEvent::Started)
            .expect("start loading");
        states
            .apply(Stage::Dependency, StageEvent::Succeeded)
            .expect("finish loading");
        states
    }

    #[test]
    fn well_formed_requires_loaded_dependencies() {
        let mut states = ModuleStates::new();
        let err = states
            .apply(Stage::WellFormed, StageEvent::Started)
            .expect_err("must refuse");
        assert!(matches!(
            err,
            KernelError::PrerequisiteNotMet {
                stage: Stage::WellFormed,
                ..
            }
        ));
        assert_eq!(states.well_formed, WellFormedState::Unchecked);

        let mut states = loaded();
        states
            .apply(Stage::WellFormed, StageEvent::Started)
            .expect("start");
        states
            .apply(Stage::WellFormed, StageEvent::Succeeded)
            .expect("external ok");
        states
            .apply(Stage::WellFormed, StageEvent::Succeeded)
            .expect("internal ok");
        assert_eq!(states.well_formed, WellFormedState::Checked);
    }

    #[test]
    fn failed_dependency_blocks_well_formedness() {
        let mut states = ModuleStates::new();
        states
            .apply(Stage::Dependency, StageEvent::Started)
            .expect("start");
        states
            .apply(Stage::Dependency, StageEvent::Failed)
            .expect("fail");
        assert!(states.has_failure());
        assert!(
            states
                .apply(Stage::WellFormed, StageEvent::Started)
                .is_err()
        );
    }

    #[test]
    fn failure_is_not_overwritten_without_restart() {
        let mut states = loaded();
        states
            .apply(Stage::WellFormed, StageEvent::Started)
            .expect("start");
        states
            .apply(Stage::WellFormed, StageEvent::Failed)
            .expect("fail");
        assert_eq!(states.well_formed, WellFormedState::ExternalCheckingFailed);

        for event in [
            StageEvent::Succeeded,
            StageEvent::Started,
            StageEvent::Failed,
        ] {
            let err = states
                .apply(Stage::WellFormed, event)
                .expect_err("failed state only accepts restart");
            assert!(matches!(err, KernelError::InvalidTransition { .. }));
            assert_eq!(states.well_formed, WellFormedState::ExternalCheckingFailed);
        }

        states
            .apply(Stage::WellFormed, StageEvent::Restart)
            .expect("restart");
        assert_eq!(states.well_formed, WellFormedState::Unchecked);
    }

    #[test]
    fn dependency_restart_cascades() {
        let mut states = loaded();
        states
            .apply(Stage::WellFormed, StageEvent::Started)
            .expect("start");
        states
            .apply(Stage::WellFormed, StageEvent::Succeeded)
            .expect("external");
        states
            .apply(Stage::WellFormed, StageEvent::Succeeded)
            .expect("internal");
        states
            .apply(Stage::FormallyProved, StageEvent::Started)
            .expect("proof start");

        states
            .apply(Stage::Dependency, StageEvent::Restart)
            .expect("restart");
        assert_eq!(states, ModuleStates::new());
    }

    #[test]
    fn proof_stage_requires_well_formedness() {
        let mut states = loaded();
        assert!(
            states
                .apply(Stage::FormallyProved, StageEvent::Started)
                .is_err()
        );
        assert_eq!(states.formally_proved, FormallyProvedState::Unchecked);
    }

    #[test]
    fn codes_and_labels_are_unique() {
        let states = [
            WellFormedState::Unchecked,
            WellFormedState::ExternalChecking,
            WellFormedState::ExternalCheckingFailed,
            WellFormedState::InternalChecking,
            WellFormedState::InternalCheckingFailed,
            WellFormedState::Checked,
        ];
        let codes: std::collections::BTreeSet<u8> = states.iter().map(|s| s.code()).collect();
        let labels: std::collections::BTreeSet<&str> = states.iter().map(|s| s.label()).collect();
        assert_eq!(codes.len(), states.len());
        assert_eq!(labels.len(), states.len());
    }
}
