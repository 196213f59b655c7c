use bson::{doc, Document};
use chrono::Utc;
use mongodb::options::{IndexOptions, ReplaceOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use rocket::futures::TryStreamExt;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::church::{
    Church, Congregation, EstablishmentRef, CHURCH_COLLECTION_NAME, CONGREGATION_COLLECTION_NAME,
};
use super::class::{Class, CLASS_COLLECTION_NAME};
use super::lesson::{Lesson, LessonStatus, LESSON_COLLECTION_NAME};
use super::operator::{Operator, OPERATOR_COLLECTION_NAME};
use super::person::{Person, PERSON_COLLECTION_NAME};
use super::report::{AttendanceReport, NewAttendanceReport, REPORT_COLLECTION_NAME};
use super::store::*;

pub(crate) mod filter {
    use bson::{doc, Document};
    use uuid::Uuid;

    #[inline]
    pub fn by_id(id: Uuid) -> Document {
        doc! { "_id": id.to_string() }
    }

    #[inline]
    pub fn by_owner(owner: Uuid) -> Document {
        doc! { "owner": owner.to_string() }
    }

    #[inline]
    pub fn owned(owner: Uuid, id: Uuid) -> Document {
        doc! { "_id": id.to_string(), "owner": owner.to_string() }
    }

    #[inline]
    pub fn owned_by_field(owner: Uuid, field: &str, id: Uuid) -> Document {
        doc! { "owner": owner.to_string(), field: id.to_string() }
    }
}

/// Document store backed by a MongoDB database.
#[derive(Debug, Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, db_name: &str) -> StoreResult<MongoStore> {
        tracing::info!("Connecting to MongoDB: {}", uri);
        let client = Client::with_uri_str(uri).await?;

        tracing::info!("Using MongoDB database: {}", db_name);
        let store = MongoStore {
            db: client.database(db_name),
        };
        store.db.list_collection_names(None).await?;
        store.ensure_indexes().await?;

        Ok(store)
    }

    pub fn new(db: Database) -> MongoStore {
        MongoStore { db }
    }

    async fn ensure_indexes(&self) -> StoreResult<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.collection::<Operator>(OPERATOR_COLLECTION_NAME)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;

        self.collection::<Lesson>(LESSON_COLLECTION_NAME)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "owner": 1, "number": 1, "quarter": 1, "year": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;

        for (collection, field) in [
            (CLASS_COLLECTION_NAME, "owner"),
            (PERSON_COLLECTION_NAME, "classId"),
            (REPORT_COLLECTION_NAME, "lesson.id"),
        ] {
            self.db
                .collection::<Document>(collection)
                .create_index(IndexModel::builder().keys(doc! { field: 1 }).build(), None)
                .await?;
        }

        Ok(())
    }

    fn collection<T>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    async fn find_all<T>(&self, name: &str, filter: Document) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        let cursor = self.collection::<T>(name).find(filter, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_one<T>(&self, name: &str, filter: Document) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        Ok(self.collection::<T>(name).find_one(filter, None).await?)
    }

    async fn upsert<T>(&self, name: &str, id: Uuid, value: &T) -> StoreResult<()>
    where
        T: serde::Serialize + Send + Sync,
    {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.collection::<T>(name)
            .replace_one(filter::by_id(id), value, options)
            .await?;
        Ok(())
    }

    async fn delete_one(&self, name: &str, filter: Document) -> StoreResult<bool> {
        let result = self
            .collection::<Document>(name)
            .delete_one(filter, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_many(&self, name: &str, filter: Document) -> StoreResult<u64> {
        let result = self
            .collection::<Document>(name)
            .delete_many(filter, None)
            .await?;
        Ok(result.deleted_count)
    }
}

#[rocket::async_trait]
impl OperatorStore for MongoStore {
    async fn get_operator(&self, id: Uuid) -> StoreResult<Option<Operator>> {
        self.find_one(OPERATOR_COLLECTION_NAME, filter::by_id(id))
            .await
    }

    async fn find_operator_by_email(&self, email: &str) -> StoreResult<Option<Operator>> {
        self.find_one(
            OPERATOR_COLLECTION_NAME,
            doc! { "email": email.trim().to_lowercase() },
        )
        .await
    }

    async fn insert_operator(&self, operator: &Operator) -> StoreResult<()> {
        self.collection::<Operator>(OPERATOR_COLLECTION_NAME)
            .insert_one(operator, None)
            .await?;
        Ok(())
    }
}

#[rocket::async_trait]
impl EstablishmentStore for MongoStore {
    async fn get_church(&self, owner: Uuid) -> StoreResult<Option<Church>> {
        self.find_one(CHURCH_COLLECTION_NAME, filter::by_owner(owner))
            .await
    }

    async fn save_church(&self, church: &Church) -> StoreResult<()> {
        self.upsert(CHURCH_COLLECTION_NAME, church.id, church).await
    }

    async fn list_congregations(&self, owner: Uuid) -> StoreResult<Vec<Congregation>> {
        self.find_all(CONGREGATION_COLLECTION_NAME, filter::by_owner(owner))
            .await
    }

    async fn get_congregation(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Congregation>> {
        self.find_one(CONGREGATION_COLLECTION_NAME, filter::owned(owner, id))
            .await
    }

    async fn save_congregation(&self, congregation: &Congregation) -> StoreResult<()> {
        self.upsert(CONGREGATION_COLLECTION_NAME, congregation.id, congregation)
            .await
    }

    async fn delete_congregation(&self, owner: Uuid, id: Uuid) -> StoreResult<bool> {
        self.delete_one(CONGREGATION_COLLECTION_NAME, filter::owned(owner, id))
            .await
    }
}

#[rocket::async_trait]
impl ClassStore for MongoStore {
    async fn query_classes(
        &self,
        owner: Uuid,
        establishment_id: Option<Uuid>,
    ) -> StoreResult<Vec<Class>> {
        let filter = match establishment_id {
            Some(id) => filter::owned_by_field(owner, "establishment.id", id),
            None => filter::by_owner(owner),
        };
        self.find_all(CLASS_COLLECTION_NAME, filter).await
    }

    async fn get_class(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Class>> {
        self.find_one(CLASS_COLLECTION_NAME, filter::owned(owner, id))
            .await
    }

    async fn save_class(&self, class: &Class) -> StoreResult<()> {
        self.upsert(CLASS_COLLECTION_NAME, class.id, class).await
    }

    async fn delete_class(&self, owner: Uuid, id: Uuid) -> StoreResult<bool> {
        self.delete_one(CLASS_COLLECTION_NAME, filter::owned(owner, id))
            .await
    }

    async fn rename_establishment(
        &self,
        owner: Uuid,
        establishment: &EstablishmentRef,
    ) -> StoreResult<u64> {
        let result = self
            .collection::<Document>(CLASS_COLLECTION_NAME)
            .update_many(
                filter::owned_by_field(owner, "establishment.id", establishment.id),
                doc! { "$set": { "establishment": bson::to_bson(establishment)? } },
                None,
            )
            .await?;
        Ok(result.modified_count)
    }
}

#[rocket::async_trait]
impl PersonStore for MongoStore {
    async fn query_persons_by_class(
        &self,
        owner: Uuid,
        class_id: Uuid,
    ) -> StoreResult<Vec<Person>> {
        self.find_all(
            PERSON_COLLECTION_NAME,
            filter::owned_by_field(owner, "classId", class_id),
        )
        .await
    }

    async fn query_persons(&self, owner: Uuid) -> StoreResult<Vec<Person>> {
        self.find_all(PERSON_COLLECTION_NAME, filter::by_owner(owner))
            .await
    }

    async fn get_person(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Person>> {
        self.find_one(PERSON_COLLECTION_NAME, filter::owned(owner, id))
            .await
    }

    async fn save_person(&self, person: &Person) -> StoreResult<()> {
        self.upsert(PERSON_COLLECTION_NAME, person.id, person).await
    }

    async fn delete_person(&self, owner: Uuid, id: Uuid) -> StoreResult<bool> {
        self.delete_one(PERSON_COLLECTION_NAME, filter::owned(owner, id))
            .await
    }

    async fn delete_persons_by_class(&self, owner: Uuid, class_id: Uuid) -> StoreResult<u64> {
        self.delete_many(
            PERSON_COLLECTION_NAME,
            filter::owned_by_field(owner, "classId", class_id),
        )
        .await
    }
}

#[rocket::async_trait]
impl LessonStore for MongoStore {
    async fn query_lessons(&self, owner: Uuid) -> StoreResult<Vec<Lesson>> {
        self.find_all(LESSON_COLLECTION_NAME, filter::by_owner(owner))
            .await
    }

    async fn get_lesson(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Lesson>> {
        self.find_one(LESSON_COLLECTION_NAME, filter::owned(owner, id))
            .await
    }

    async fn insert_lesson(&self, lesson: &Lesson) -> StoreResult<()> {
        self.collection::<Lesson>(LESSON_COLLECTION_NAME)
            .insert_one(lesson, None)
            .await?;
        Ok(())
    }

    async fn set_lesson_status(
        &self,
        owner: Uuid,
        id: Uuid,
        status: LessonStatus,
    ) -> StoreResult<bool> {
        let result = self
            .collection::<Document>(LESSON_COLLECTION_NAME)
            .update_one(
                filter::owned(owner, id),
                doc! { "$set": { "status": bson::to_bson(&status)? } },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_lesson(&self, owner: Uuid, id: Uuid) -> StoreResult<bool> {
        self.delete_one(LESSON_COLLECTION_NAME, filter::owned(owner, id))
            .await
    }
}

#[rocket::async_trait]
impl ReportStore for MongoStore {
    async fn create_attendance_report(
        &self,
        report: NewAttendanceReport,
    ) -> StoreResult<AttendanceReport> {
        let report = report.into_report(Uuid::new_v4(), Utc::now());
        self.collection::<AttendanceReport>(REPORT_COLLECTION_NAME)
            .insert_one(&report, None)
            .await?;
        Ok(report)
    }

    async fn query_reports_by_lesson(
        &self,
        owner: Uuid,
        lesson_id: Uuid,
    ) -> StoreResult<Vec<AttendanceReport>> {
        self.find_all(
            REPORT_COLLECTION_NAME,
            filter::owned_by_field(owner, "lesson.id", lesson_id),
        )
        .await
    }

    async fn delete_reports_by_lesson(&self, owner: Uuid, lesson_id: Uuid) -> StoreResult<u64> {
        self.delete_many(
            REPORT_COLLECTION_NAME,
            filter::owned_by_field(owner, "lesson.id", lesson_id),
        )
        .await
    }

    async fn delete_reports_by_class(&self, owner: Uuid, class_id: Uuid) -> StoreResult<u64> {
        self.delete_many(
            REPORT_COLLECTION_NAME,
            filter::owned_by_field(owner, "class.id", class_id),
        )
        .await
    }
}
