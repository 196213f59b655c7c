//! Attendance taking for one lesson: pick a class, mark its members, fill in
//! the summary and submit a single report.
//!
//! [`WizardState::next`] is a pure transition function. The only states that
//! wait on the store are [`WizardState::LoadingRoster`] and
//! [`WizardState::Submitting`]; [`session::AttendanceWizard`] performs those
//! calls and feeds their outcome back as events.

use thiserror::Error;
use uuid::Uuid;

use crate::data::class::Class;
use crate::data::person::Person;
use crate::data::report::AttendanceReport;
use crate::data::store::StoreError;

pub mod picker;
pub mod registry;
pub mod roster;
pub mod session;
pub mod summary;

pub use picker::{ClassGroup, Picker};
pub use roster::{Roster, RosterLine};
pub use session::{AttendanceWizard, WizardStage, WizardView};
pub use summary::{SummaryField, SummaryFields, SummaryStage};

#[derive(Debug, Clone, Error)]
pub enum WizardError {
    #[error("{0} doesn't exist")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("lesson is finalized, attendance can't be taken anymore")]
    LessonFinalized,
    #[error("class has no members to take attendance for")]
    EmptyRoster,
    #[error("'{event}' isn't possible while {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
}

impl WizardError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, WizardError::Store(e) if e.is_transient())
    }
}

#[derive(Debug, Clone)]
pub struct LoadingStage {
    pub picker: Picker,
    pub class: Class,
}

#[derive(Debug, Clone)]
pub struct MarkingStage {
    pub picker: Picker,
    pub class: Class,
    pub roster: Roster,
}

#[derive(Debug, Clone)]
pub enum WizardState {
    Idle,
    Picking(Picker),
    LoadingRoster(LoadingStage),
    Marking(MarkingStage),
    Summarizing(SummaryStage),
    Submitting(SummaryStage),
    /// Behaves as the picker, remembering the report just persisted.
    Done {
        picker: Picker,
        report: AttendanceReport,
    },
    Failed {
        error: WizardError,
        recovery: Box<WizardState>,
    },
}

#[derive(Debug, Clone)]
pub enum WizardEvent {
    Open(Picker),
    SelectClass(Uuid),
    RosterLoaded(Vec<Person>),
    RosterFailed(WizardError),
    Toggle(Uuid),
    Advance,
    SetField(SummaryField, String),
    Confirm,
    Submitted(AttendanceReport),
    SubmitFailed(WizardError),
    Retry,
    Cancel,
    Close,
}

impl WizardEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WizardEvent::Open(_) => "open",
            WizardEvent::SelectClass(_) => "select class",
            WizardEvent::RosterLoaded(_) => "roster loaded",
            WizardEvent::RosterFailed(_) => "roster failed",
            WizardEvent::Toggle(_) => "toggle",
            WizardEvent::Advance => "advance",
            WizardEvent::SetField(_, _) => "set field",
            WizardEvent::Confirm => "confirm",
            WizardEvent::Submitted(_) => "submitted",
            WizardEvent::SubmitFailed(_) => "submit failed",
            WizardEvent::Retry => "retry",
            WizardEvent::Cancel => "cancel",
            WizardEvent::Close => "close",
        }
    }
}

impl WizardState {
    pub fn name(&self) -> &'static str {
        match self {
            WizardState::Idle => "idle",
            WizardState::Picking(_) => "picking a class",
            WizardState::LoadingRoster(_) => "loading the roster",
            WizardState::Marking(_) => "marking attendance",
            WizardState::Summarizing(_) => "filling in the summary",
            WizardState::Submitting(_) => "submitting",
            WizardState::Done { .. } => "done",
            WizardState::Failed { .. } => "failed",
        }
    }

    /// The picker every non-idle state carries.
    pub fn picker(&self) -> Option<&Picker> {
        match self {
            WizardState::Idle => None,
            WizardState::Picking(picker) | WizardState::Done { picker, .. } => Some(picker),
            WizardState::LoadingRoster(stage) => Some(&stage.picker),
            WizardState::Marking(stage) => Some(&stage.picker),
            WizardState::Summarizing(stage) | WizardState::Submitting(stage) => {
                Some(&stage.picker)
            }
            WizardState::Failed { recovery, .. } => recovery.picker(),
        }
    }

    pub fn can_advance(&self) -> bool {
        matches!(self, WizardState::Marking(stage) if !stage.roster.is_empty())
    }

    /// Computes the state following `event`. Invalid events are reported as
    /// errors and never change anything.
    pub fn next(&self, event: WizardEvent) -> Result<WizardState, WizardError> {
        use WizardEvent as E;
        use WizardState as S;

        let invalid = |event: &WizardEvent| WizardError::InvalidTransition {
            state: self.name(),
            event: event.name(),
        };

        match (self, event) {
            (_, E::Close) => Ok(S::Idle),

            (S::Idle, E::Open(picker)) => {
                if picker.lesson.is_completed() {
                    return Err(WizardError::LessonFinalized);
                }
                Ok(S::Picking(picker))
            }

            (S::Picking(picker) | S::Done { picker, .. }, E::SelectClass(class_id)) => {
                let class = picker
                    .find_class(class_id)
                    .cloned()
                    .ok_or_else(|| WizardError::NotFound(format!("class {}", class_id)))?;
                Ok(S::LoadingRoster(LoadingStage {
                    picker: picker.clone(),
                    class,
                }))
            }

            (S::LoadingRoster(stage), E::RosterLoaded(persons)) => Ok(S::Marking(MarkingStage {
                picker: stage.picker.clone(),
                class: stage.class.clone(),
                roster: Roster::new(persons),
            })),
            (S::LoadingRoster(stage), E::RosterFailed(error)) => Ok(S::Failed {
                error,
                recovery: Box::new(S::Picking(stage.picker.clone())),
            }),

            (S::Marking(stage), E::Toggle(person_id)) => {
                let mut stage = stage.clone();
                stage.roster.toggle(person_id);
                Ok(S::Marking(stage))
            }
            (S::Marking(stage), E::Advance) => {
                if stage.roster.is_empty() {
                    return Err(WizardError::EmptyRoster);
                }
                Ok(S::Summarizing(SummaryStage::new(
                    stage.picker.clone(),
                    stage.class.clone(),
                    stage.roster.clone(),
                )))
            }

            (S::Summarizing(stage), E::SetField(field, value)) => {
                let mut stage = stage.clone();
                stage.fields.set(field, &value);
                Ok(S::Summarizing(stage))
            }
            (S::Summarizing(stage), E::Confirm) => Ok(S::Submitting(stage.clone())),

            (S::Submitting(stage), E::Submitted(report)) => Ok(S::Done {
                picker: stage.picker.clone(),
                report,
            }),
            (S::Submitting(stage), E::SubmitFailed(error)) => Ok(S::Failed {
                error,
                recovery: Box::new(S::Summarizing(stage.clone())),
            }),

            (S::Failed { recovery, .. }, E::Retry) => Ok(recovery.as_ref().clone()),

            (
                S::LoadingRoster(_) | S::Marking(_) | S::Summarizing(_) | S::Failed { .. },
                E::Cancel,
            ) => match self.picker() {
                Some(picker) => Ok(S::Picking(picker.clone())),
                None => Ok(S::Idle),
            },

            (_, event) => Err(invalid(&event)),
        }
    }
}
