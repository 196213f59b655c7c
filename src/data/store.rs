use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use super::church::{Church, Congregation, EstablishmentRef};
use super::class::Class;
use super::lesson::{Lesson, LessonStatus};
use super::operator::Operator;
use super::person::Person;
use super::report::{AttendanceReport, NewAttendanceReport};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("requested document doesn't exist")]
    NotFound,
    #[error("document store is unavailable: {0}")]
    Unavailable(String),
    #[error("document store denied access: {0}")]
    PermissionDenied(String),
    #[error("no answer from document store after {0:?}")]
    Timeout(Duration),
    #[error("conflicting document: {0}")]
    Conflict(String),
    #[error("malformed stored data: {0}")]
    Data(String),
}

impl StoreError {
    /// Failures that leave no trace in the store and may be retried as is.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::PermissionDenied(_) | StoreError::Timeout(_)
        )
    }
}

const DUPLICATE_KEY: i32 = 11000;
const UNAUTHORIZED: i32 = 13;

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, WriteFailure};

        match e.kind.as_ref() {
            ErrorKind::Authentication { message, .. } => {
                StoreError::PermissionDenied(message.clone())
            }
            ErrorKind::Command(command) if command.code == UNAUTHORIZED => {
                StoreError::PermissionDenied(command.message.clone())
            }
            ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY => {
                StoreError::Conflict(write.message.clone())
            }
            ErrorKind::BsonSerialization(inner) => StoreError::Data(inner.to_string()),
            ErrorKind::BsonDeserialization(inner) => StoreError::Data(inner.to_string()),
            _ => StoreError::Unavailable(e.to_string()),
        }
    }
}

impl From<bson::ser::Error> for StoreError {
    fn from(e: bson::ser::Error) -> Self {
        StoreError::Data(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[rocket::async_trait]
pub trait OperatorStore: Send + Sync {
    async fn get_operator(&self, id: Uuid) -> StoreResult<Option<Operator>>;
    async fn find_operator_by_email(&self, email: &str) -> StoreResult<Option<Operator>>;
    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn insert_operator(&self, operator: &Operator) -> StoreResult<()>;
}

#[rocket::async_trait]
pub trait EstablishmentStore: Send + Sync {
    async fn get_church(&self, owner: Uuid) -> StoreResult<Option<Church>>;
    async fn save_church(&self, church: &Church) -> StoreResult<()>;

    async fn list_congregations(&self, owner: Uuid) -> StoreResult<Vec<Congregation>>;
    async fn get_congregation(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Congregation>>;
    async fn save_congregation(&self, congregation: &Congregation) -> StoreResult<()>;
    async fn delete_congregation(&self, owner: Uuid, id: Uuid) -> StoreResult<bool>;
}

#[rocket::async_trait]
pub trait ClassStore: Send + Sync {
    /// Classes of `owner`, restricted to one establishment when given.
    async fn query_classes(
        &self,
        owner: Uuid,
        establishment_id: Option<Uuid>,
    ) -> StoreResult<Vec<Class>>;
    async fn get_class(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Class>>;
    async fn save_class(&self, class: &Class) -> StoreResult<()>;
    async fn delete_class(&self, owner: Uuid, id: Uuid) -> StoreResult<bool>;
    /// Rewrites the embedded establishment of every class that points at it.
    async fn rename_establishment(&self, owner: Uuid, establishment: &EstablishmentRef)
        -> StoreResult<u64>;
}

#[rocket::async_trait]
pub trait PersonStore: Send + Sync {
    async fn query_persons_by_class(&self, owner: Uuid, class_id: Uuid)
        -> StoreResult<Vec<Person>>;
    async fn query_persons(&self, owner: Uuid) -> StoreResult<Vec<Person>>;
    async fn get_person(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Person>>;
    async fn save_person(&self, person: &Person) -> StoreResult<()>;
    async fn delete_person(&self, owner: Uuid, id: Uuid) -> StoreResult<bool>;
    async fn delete_persons_by_class(&self, owner: Uuid, class_id: Uuid) -> StoreResult<u64>;
}

#[rocket::async_trait]
pub trait LessonStore: Send + Sync {
    async fn query_lessons(&self, owner: Uuid) -> StoreResult<Vec<Lesson>>;
    async fn get_lesson(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Lesson>>;
    /// Fails with [`StoreError::Conflict`] when the owner already has a lesson
    /// with the same number, quarter and year.
    async fn insert_lesson(&self, lesson: &Lesson) -> StoreResult<()>;
    async fn set_lesson_status(
        &self,
        owner: Uuid,
        id: Uuid,
        status: LessonStatus,
    ) -> StoreResult<bool>;
    async fn delete_lesson(&self, owner: Uuid, id: Uuid) -> StoreResult<bool>;
}

#[rocket::async_trait]
pub trait ReportStore: Send + Sync {
    /// Persists one report, assigning its id and timestamp.
    async fn create_attendance_report(
        &self,
        report: NewAttendanceReport,
    ) -> StoreResult<AttendanceReport>;
    async fn query_reports_by_lesson(
        &self,
        owner: Uuid,
        lesson_id: Uuid,
    ) -> StoreResult<Vec<AttendanceReport>>;
    async fn delete_reports_by_lesson(&self, owner: Uuid, lesson_id: Uuid) -> StoreResult<u64>;
    async fn delete_reports_by_class(&self, owner: Uuid, class_id: Uuid) -> StoreResult<u64>;
}

pub trait Store:
    OperatorStore + EstablishmentStore + ClassStore + PersonStore + LessonStore + ReportStore
{
}

impl<T> Store for T where
    T: OperatorStore + EstablishmentStore + ClassStore + PersonStore + LessonStore + ReportStore
{
}

pub type StoreHandle = Arc<dyn Store>;

/// Resolves the headquarters church or one of its congregations.
pub async fn find_establishment(
    store: &dyn Store,
    owner: Uuid,
    id: Uuid,
) -> StoreResult<Option<EstablishmentRef>> {
    if let Some(church) = store.get_church(owner).await? {
        if church.id == id {
            return Ok(Some(church.establishment()));
        }
    }

    Ok(store
        .get_congregation(owner, id)
        .await?
        .map(|c| c.establishment()))
}

/// Headquarters first, then congregations by name.
pub async fn list_establishments(
    store: &dyn Store,
    owner: Uuid,
) -> StoreResult<Vec<EstablishmentRef>> {
    let mut result = Vec::new();
    if let Some(church) = store.get_church(owner).await? {
        result.push(church.establishment());
    }

    let mut congregations: Vec<EstablishmentRef> = store
        .list_congregations(owner)
        .await?
        .iter()
        .map(Congregation::establishment)
        .collect();
    congregations.sort_by(|a, b| crate::util::compare_names(&a.name, &b.name));
    result.extend(congregations);

    Ok(result)
}

/// Removes a class along with its members and attendance reports.
pub async fn delete_class_cascade(
    store: &dyn Store,
    owner: Uuid,
    class_id: Uuid,
) -> StoreResult<bool> {
    if !store.delete_class(owner, class_id).await? {
        return Ok(false);
    }

    let persons = store.delete_persons_by_class(owner, class_id).await?;
    let reports = store.delete_reports_by_class(owner, class_id).await?;
    tracing::debug!(
        "Class {} removed with {} persons and {} reports.",
        class_id,
        persons,
        reports
    );

    Ok(true)
}

/// Removes a congregation and every class registered under it.
pub async fn delete_congregation_cascade(
    store: &dyn Store,
    owner: Uuid,
    congregation_id: Uuid,
) -> StoreResult<bool> {
    if store.get_congregation(owner, congregation_id).await?.is_none() {
        return Ok(false);
    }

    for class in store.query_classes(owner, Some(congregation_id)).await? {
        delete_class_cascade(store, owner, class.id).await?;
    }

    store.delete_congregation(owner, congregation_id).await
}

pub async fn delete_lesson_cascade(
    store: &dyn Store,
    owner: Uuid,
    lesson_id: Uuid,
) -> StoreResult<bool> {
    if !store.delete_lesson(owner, lesson_id).await? {
        return Ok(false);
    }

    let reports = store.delete_reports_by_lesson(owner, lesson_id).await?;
    tracing::debug!("Lesson {} removed with {} reports.", lesson_id, reports);

    Ok(true)
}
