use utoipa::ToSchema;
use uuid::Uuid;

use super::picker::{load_picker, ClassGroup};
use super::roster::RosterLine;
use super::summary::{SummaryField, SummaryFields};
use super::{WizardError, WizardEvent, WizardState};
use crate::context::OperatorContext;
use crate::data::class::Class;
use crate::data::report::{AttendanceReport, LessonRef};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WizardStage {
    Idle,
    Picking,
    LoadingRoster,
    Marking,
    Summarizing,
    Submitting,
    Done,
    Failed,
}

/// Snapshot of a session as shown to the operator.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WizardView {
    pub session_id: Uuid,
    pub stage: WizardStage,
    pub lesson: Option<LessonRef>,
    pub groups: Vec<ClassGroup>,
    pub class: Option<Class>,
    pub roster: Vec<RosterLine>,
    pub present: usize,
    pub fields: Option<SummaryFields>,
    pub can_advance: bool,
    pub error: Option<String>,
    pub retryable: bool,
    pub last_report: Option<AttendanceReport>,
}

/// Drives one [`WizardState`] machine, performing the store calls its
/// loading and submitting states wait on.
#[derive(Debug)]
pub struct AttendanceWizard {
    id: Uuid,
    state: WizardState,
}

impl Default for AttendanceWizard {
    fn default() -> Self {
        AttendanceWizard::new()
    }
}

impl AttendanceWizard {
    pub fn new() -> AttendanceWizard {
        AttendanceWizard {
            id: Uuid::new_v4(),
            state: WizardState::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    fn apply(&mut self, event: WizardEvent) -> Result<(), WizardError> {
        let next = self.state.next(event)?;
        tracing::debug!(
            "Wizard {} moved from {} to {}.",
            self.id,
            self.state.name(),
            next.name()
        );
        self.state = next;
        Ok(())
    }

    pub async fn open(
        &mut self,
        ctx: &OperatorContext<'_>,
        lesson_id: Uuid,
    ) -> Result<(), WizardError> {
        if !matches!(self.state, WizardState::Idle) {
            return Err(WizardError::InvalidTransition {
                state: self.state.name(),
                event: "open",
            });
        }

        let picker = load_picker(ctx, lesson_id).await?;
        self.apply(WizardEvent::Open(picker))
    }

    /// Selects a class and loads its members. The lesson and the class are
    /// read again first: a finalized or removed target sends the session back
    /// to the picker, store failures leave it failed and retryable.
    pub async fn select_class(
        &mut self,
        ctx: &OperatorContext<'_>,
        class_id: Uuid,
    ) -> Result<(), WizardError> {
        self.apply(WizardEvent::SelectClass(class_id))?;
        let lesson_id = self.lesson_id();

        let loaded = match check_targets(ctx, lesson_id, class_id).await {
            Ok(()) => ctx
                .run(ctx.store.query_persons_by_class(ctx.owner, class_id))
                .await
                .map_err(WizardError::from),
            Err(e) => Err(e),
        };

        match loaded {
            Ok(persons) => self.apply(WizardEvent::RosterLoaded(persons)),
            Err(error) if error.is_retryable() => {
                tracing::warn!("Unable to load roster of class {}: {}", class_id, error);
                self.apply(WizardEvent::RosterFailed(error.clone()))?;
                Err(error)
            }
            Err(error) => {
                tracing::info!("Class {} can't take attendance: {}", class_id, error);
                self.apply(WizardEvent::Cancel)?;
                Err(error)
            }
        }
    }

    pub fn toggle(&mut self, person_id: Uuid) -> Result<(), WizardError> {
        self.apply(WizardEvent::Toggle(person_id))
    }

    pub fn advance(&mut self) -> Result<(), WizardError> {
        self.apply(WizardEvent::Advance)
    }

    pub fn set_field(&mut self, field: SummaryField, value: &str) -> Result<(), WizardError> {
        self.apply(WizardEvent::SetField(field, value.to_string()))
    }

    /// Persists the report for the summarized class once the lesson is
    /// confirmed open and the class still present. On failure the typed
    /// summary is kept so the operator can retry or cancel.
    pub async fn submit(
        &mut self,
        ctx: &OperatorContext<'_>,
    ) -> Result<AttendanceReport, WizardError> {
        self.apply(WizardEvent::Confirm)?;

        let report = match &self.state {
            WizardState::Submitting(stage) => stage.report(),
            other => {
                return Err(WizardError::InvalidTransition {
                    state: other.name(),
                    event: "submit",
                })
            }
        };

        let stored = match check_targets(ctx, report.lesson.id, report.class.id).await {
            Ok(()) => ctx
                .run(ctx.store.create_attendance_report(report))
                .await
                .map_err(WizardError::from),
            Err(e) => Err(e),
        };

        match stored {
            Ok(report) => {
                tracing::info!(
                    "Attendance report {} recorded for class {}.",
                    report.id,
                    report.content.class.name
                );
                self.apply(WizardEvent::Submitted(report.clone()))?;
                Ok(report)
            }
            Err(error) => {
                tracing::warn!("Unable to record attendance report: {}", error);
                self.apply(WizardEvent::SubmitFailed(error.clone()))?;
                Err(error)
            }
        }
    }

    pub fn retry(&mut self) -> Result<(), WizardError> {
        self.apply(WizardEvent::Retry)
    }

    pub fn cancel(&mut self) -> Result<(), WizardError> {
        self.apply(WizardEvent::Cancel)
    }

    pub fn close(&mut self) {
        self.state = WizardState::Idle;
    }

    fn lesson_id(&self) -> Uuid {
        self.state
            .picker()
            .map(|p| p.lesson.id)
            .unwrap_or_default()
    }

    pub fn view(&self) -> WizardView {
        let mut view = WizardView {
            session_id: self.id,
            stage: WizardStage::Idle,
            lesson: self.state.picker().map(|p| p.lesson.reference()),
            groups: self
                .state
                .picker()
                .map(|p| p.groups.clone())
                .unwrap_or_default(),
            class: None,
            roster: vec![],
            present: 0,
            fields: None,
            can_advance: self.state.can_advance(),
            error: None,
            retryable: false,
            last_report: None,
        };
        describe(&self.state, &mut view);
        view
    }
}

/// Fails when the lesson was finalized or removed, or the class removed,
/// after the session read them.
async fn check_targets(
    ctx: &OperatorContext<'_>,
    lesson_id: Uuid,
    class_id: Uuid,
) -> Result<(), WizardError> {
    let lesson = ctx
        .run(ctx.store.get_lesson(ctx.owner, lesson_id))
        .await?
        .ok_or_else(|| WizardError::NotFound(format!("lesson {}", lesson_id)))?;
    if lesson.is_completed() {
        return Err(WizardError::LessonFinalized);
    }

    ctx.run(ctx.store.get_class(ctx.owner, class_id))
        .await?
        .ok_or_else(|| WizardError::NotFound(format!("class {}", class_id)))?;
    Ok(())
}

fn describe(state: &WizardState, view: &mut WizardView) {
    match state {
        WizardState::Idle => view.stage = WizardStage::Idle,
        WizardState::Picking(_) => view.stage = WizardStage::Picking,
        WizardState::LoadingRoster(stage) => {
            view.stage = WizardStage::LoadingRoster;
            view.class = Some(stage.class.clone());
        }
        WizardState::Marking(stage) => {
            view.stage = WizardStage::Marking;
            view.class = Some(stage.class.clone());
            view.roster = stage.roster.lines();
            view.present = stage.roster.present_count();
        }
        WizardState::Summarizing(stage) | WizardState::Submitting(stage) => {
            view.stage = match state {
                WizardState::Submitting(_) => WizardStage::Submitting,
                _ => WizardStage::Summarizing,
            };
            view.class = Some(stage.class.clone());
            view.roster = stage.roster.lines();
            view.present = stage.roster.present_count();
            view.fields = Some(stage.fields.clone());
        }
        WizardState::Done { report, .. } => {
            view.stage = WizardStage::Done;
            view.last_report = Some(report.clone());
        }
        WizardState::Failed { error, recovery } => {
            describe(recovery, view);
            view.stage = WizardStage::Failed;
            view.error = Some(error.to_string());
            view.retryable = error.is_retryable();
        }
    }
}
