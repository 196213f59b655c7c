use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use super::church::{Church, Congregation, EstablishmentRef};
use super::class::Class;
use super::lesson::{Lesson, LessonStatus};
use super::operator::Operator;
use super::person::Person;
use super::report::{AttendanceReport, NewAttendanceReport};
use super::store::*;

#[derive(Default)]
struct Collections {
    operators: HashMap<Uuid, Operator>,
    churches: HashMap<Uuid, Church>,
    congregations: HashMap<Uuid, Congregation>,
    classes: HashMap<Uuid, Class>,
    persons: HashMap<Uuid, Person>,
    lessons: HashMap<Uuid, Lesson>,
    reports: Vec<AttendanceReport>,
}

/// Process-local store used with `storage: memory` and by tests.
///
/// Can simulate an outage ([`MemoryStore::set_offline`]) and a slow
/// connection ([`MemoryStore::set_latency`]).
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<Collections>,
    offline: AtomicBool,
    latency: RwLock<Option<Duration>>,
}

impl MemoryStore {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut current) = self.latency.write() {
            *current = latency;
        }
    }

    pub fn report_count(&self) -> usize {
        self.data.read().map(|d| d.reports.len()).unwrap_or_default()
    }

    async fn reach(&self) -> StoreResult<()> {
        let latency = self.latency.read().ok().and_then(|l| *l);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    async fn read(&self) -> StoreResult<RwLockReadGuard<'_, Collections>> {
        self.reach().await?;
        self.data
            .read()
            .map_err(|_| StoreError::Unavailable("memory store is poisoned".to_string()))
    }

    async fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Collections>> {
        self.reach().await?;
        self.data
            .write()
            .map_err(|_| StoreError::Unavailable("memory store is poisoned".to_string()))
    }
}

#[rocket::async_trait]
impl OperatorStore for MemoryStore {
    async fn get_operator(&self, id: Uuid) -> StoreResult<Option<Operator>> {
        Ok(self.read().await?.operators.get(&id).cloned())
    }

    async fn find_operator_by_email(&self, email: &str) -> StoreResult<Option<Operator>> {
        let email = email.trim().to_lowercase();
        Ok(self
            .read()
            .await?
            .operators
            .values()
            .find(|o| o.email == email)
            .cloned())
    }

    async fn insert_operator(&self, operator: &Operator) -> StoreResult<()> {
        let mut data = self.write().await?;
        if data.operators.values().any(|o| o.email == operator.email) {
            return Err(StoreError::Conflict(format!(
                "email {} already registered",
                operator.email
            )));
        }
        data.operators.insert(operator.id, operator.clone());
        Ok(())
    }
}

#[rocket::async_trait]
impl EstablishmentStore for MemoryStore {
    async fn get_church(&self, owner: Uuid) -> StoreResult<Option<Church>> {
        Ok(self
            .read()
            .await?
            .churches
            .values()
            .find(|c| c.owner == owner)
            .cloned())
    }

    async fn save_church(&self, church: &Church) -> StoreResult<()> {
        self.write()
            .await?
            .churches
            .insert(church.id, church.clone());
        Ok(())
    }

    async fn list_congregations(&self, owner: Uuid) -> StoreResult<Vec<Congregation>> {
        Ok(self
            .read()
            .await?
            .congregations
            .values()
            .filter(|c| c.owner == owner)
            .cloned()
            .collect())
    }

    async fn get_congregation(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Congregation>> {
        Ok(self
            .read()
            .await?
            .congregations
            .get(&id)
            .filter(|c| c.owner == owner)
            .cloned())
    }

    async fn save_congregation(&self, congregation: &Congregation) -> StoreResult<()> {
        self.write()
            .await?
            .congregations
            .insert(congregation.id, congregation.clone());
        Ok(())
    }

    async fn delete_congregation(&self, owner: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut data = self.write().await?;
        match data.congregations.get(&id) {
            Some(c) if c.owner == owner => Ok(data.congregations.remove(&id).is_some()),
            _ => Ok(false),
        }
    }
}

#[rocket::async_trait]
impl ClassStore for MemoryStore {
    async fn query_classes(
        &self,
        owner: Uuid,
        establishment_id: Option<Uuid>,
    ) -> StoreResult<Vec<Class>> {
        Ok(self
            .read()
            .await?
            .classes
            .values()
            .filter(|c| c.owner == owner)
            .filter(|c| establishment_id.map_or(true, |e| c.establishment.id == e))
            .cloned()
            .collect())
    }

    async fn get_class(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Class>> {
        Ok(self
            .read()
            .await?
            .classes
            .get(&id)
            .filter(|c| c.owner == owner)
            .cloned())
    }

    async fn save_class(&self, class: &Class) -> StoreResult<()> {
        self.write().await?.classes.insert(class.id, class.clone());
        Ok(())
    }

    async fn delete_class(&self, owner: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut data = self.write().await?;
        match data.classes.get(&id) {
            Some(c) if c.owner == owner => Ok(data.classes.remove(&id).is_some()),
            _ => Ok(false),
        }
    }

    async fn rename_establishment(
        &self,
        owner: Uuid,
        establishment: &EstablishmentRef,
    ) -> StoreResult<u64> {
        let mut data = self.write().await?;
        let mut changed = 0;
        for class in data
            .classes
            .values_mut()
            .filter(|c| c.owner == owner && c.establishment.id == establishment.id)
        {
            class.establishment = establishment.clone();
            changed += 1;
        }
        Ok(changed)
    }
}

#[rocket::async_trait]
impl PersonStore for MemoryStore {
    async fn query_persons_by_class(
        &self,
        owner: Uuid,
        class_id: Uuid,
    ) -> StoreResult<Vec<Person>> {
        Ok(self
            .read()
            .await?
            .persons
            .values()
            .filter(|p| p.owner == owner && p.class_id == class_id)
            .cloned()
            .collect())
    }

    async fn query_persons(&self, owner: Uuid) -> StoreResult<Vec<Person>> {
        Ok(self
            .read()
            .await?
            .persons
            .values()
            .filter(|p| p.owner == owner)
            .cloned()
            .collect())
    }

    async fn get_person(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Person>> {
        Ok(self
            .read()
            .await?
            .persons
            .get(&id)
            .filter(|p| p.owner == owner)
            .cloned())
    }

    async fn save_person(&self, person: &Person) -> StoreResult<()> {
        self.write().await?.persons.insert(person.id, person.clone());
        Ok(())
    }

    async fn delete_person(&self, owner: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut data = self.write().await?;
        match data.persons.get(&id) {
            Some(p) if p.owner == owner => Ok(data.persons.remove(&id).is_some()),
            _ => Ok(false),
        }
    }

    async fn delete_persons_by_class(&self, owner: Uuid, class_id: Uuid) -> StoreResult<u64> {
        let mut data = self.write().await?;
        let before = data.persons.len();
        data.persons
            .retain(|_, p| !(p.owner == owner && p.class_id == class_id));
        Ok((before - data.persons.len()) as u64)
    }
}

#[rocket::async_trait]
impl LessonStore for MemoryStore {
    async fn query_lessons(&self, owner: Uuid) -> StoreResult<Vec<Lesson>> {
        Ok(self
            .read()
            .await?
            .lessons
            .values()
            .filter(|l| l.owner == owner)
            .cloned()
            .collect())
    }

    async fn get_lesson(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Lesson>> {
        Ok(self
            .read()
            .await?
            .lessons
            .get(&id)
            .filter(|l| l.owner == owner)
            .cloned())
    }

    async fn insert_lesson(&self, lesson: &Lesson) -> StoreResult<()> {
        let mut data = self.write().await?;
        let duplicate = data.lessons.values().any(|l| {
            l.owner == lesson.owner
                && l.number == lesson.number
                && l.quarter == lesson.quarter
                && l.year == lesson.year
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "lesson {} of quarter {}/{} already scheduled",
                lesson.number, lesson.quarter, lesson.year
            )));
        }
        data.lessons.insert(lesson.id, lesson.clone());
        Ok(())
    }

    async fn set_lesson_status(
        &self,
        owner: Uuid,
        id: Uuid,
        status: LessonStatus,
    ) -> StoreResult<bool> {
        let mut data = self.write().await?;
        match data.lessons.get_mut(&id) {
            Some(l) if l.owner == owner => {
                l.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_lesson(&self, owner: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut data = self.write().await?;
        match data.lessons.get(&id) {
            Some(l) if l.owner == owner => Ok(data.lessons.remove(&id).is_some()),
            _ => Ok(false),
        }
    }
}

#[rocket::async_trait]
impl ReportStore for MemoryStore {
    async fn create_attendance_report(
        &self,
        report: NewAttendanceReport,
    ) -> StoreResult<AttendanceReport> {
        let report = report.into_report(Uuid::new_v4(), Utc::now());
        self.write().await?.reports.push(report.clone());
        Ok(report)
    }

    async fn query_reports_by_lesson(
        &self,
        owner: Uuid,
        lesson_id: Uuid,
    ) -> StoreResult<Vec<AttendanceReport>> {
        Ok(self
            .read()
            .await?
            .reports
            .iter()
            .filter(|r| r.content.owner == owner && r.content.lesson.id == lesson_id)
            .cloned()
            .collect())
    }

    async fn delete_reports_by_lesson(&self, owner: Uuid, lesson_id: Uuid) -> StoreResult<u64> {
        let mut data = self.write().await?;
        let before = data.reports.len();
        data.reports
            .retain(|r| !(r.content.owner == owner && r.content.lesson.id == lesson_id));
        Ok((before - data.reports.len()) as u64)
    }

    async fn delete_reports_by_class(&self, owner: Uuid, class_id: Uuid) -> StoreResult<u64> {
        let mut data = self.write().await?;
        let before = data.reports.len();
        data.reports
            .retain(|r| !(r.content.owner == owner && r.content.class.id == class_id));
        Ok((before - data.reports.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::church::EstablishmentForm;
    use crate::data::class::AgeGroup;
    use crate::data::report::{ClassRef, LessonRef};

    fn church(owner: Uuid) -> Church {
        EstablishmentForm {
            name: "Sede".to_string(),
            address: "Rua A".to_string(),
            city: "Campinas".to_string(),
            state: "SP".to_string(),
        }
        .into_church(owner, None)
    }

    fn report(owner: Uuid, class: &Class, lesson_id: Uuid) -> NewAttendanceReport {
        NewAttendanceReport {
            owner,
            lesson: LessonRef {
                id: lesson_id,
                number: 1,
                quarter: 1,
                year: 2026,
                date: chrono::NaiveDate::from_ymd_opt(2026, 1, 4).unwrap(),
            },
            class: ClassRef {
                id: class.id,
                name: class.name.clone(),
                establishment: class.establishment.clone(),
            },
            attendees: vec![],
            bibles_count: 0,
            magazines_count: 0,
            visitors_count: 0,
            offer_amount: 0.0,
        }
    }

    #[rocket::async_test]
    async fn queries_are_owner_scoped() {
        let store = MemoryStore::default();
        let (owner, other) = (Uuid::new_v4(), Uuid::new_v4());
        let hq = church(owner).establishment();
        let class = Class::new(owner, hq, "Jovens", AgeGroup::Youth);
        store.save_class(&class).await.unwrap();

        assert_eq!(store.query_classes(owner, None).await.unwrap().len(), 1);
        assert!(store.query_classes(other, None).await.unwrap().is_empty());
        assert!(store.get_class(other, class.id).await.unwrap().is_none());
        assert!(!store.delete_class(other, class.id).await.unwrap());
    }

    #[rocket::async_test]
    async fn class_cascade_removes_members_and_reports() {
        let store = MemoryStore::default();
        let owner = Uuid::new_v4();
        let class = Class::new(owner, church(owner).establishment(), "Adultos", AgeGroup::Adult);
        store.save_class(&class).await.unwrap();
        store
            .save_person(&Person::new(owner, class.id, "Ana", false))
            .await
            .unwrap();
        store
            .create_attendance_report(report(owner, &class, Uuid::new_v4()))
            .await
            .unwrap();

        assert!(delete_class_cascade(&store, owner, class.id).await.unwrap());
        assert!(store.query_persons(owner).await.unwrap().is_empty());
        assert_eq!(store.report_count(), 0);
        assert!(!delete_class_cascade(&store, owner, class.id).await.unwrap());
    }

    #[rocket::async_test]
    async fn duplicate_lessons_conflict() {
        let store = MemoryStore::default();
        let owner = Uuid::new_v4();
        let form = crate::data::lesson::LessonForm {
            date: chrono::NaiveDate::from_ymd_opt(2026, 5, 17).unwrap(),
            time: "09:00".to_string(),
            number: 7,
            quarter: 2,
            year: 2026,
            establishment_id: None,
        };
        let time = chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap();

        store
            .insert_lesson(&form.clone().into_lesson(owner, time, None))
            .await
            .unwrap();
        let duplicate = store.insert_lesson(&form.into_lesson(owner, time, None)).await;
        assert!(matches!(duplicate, Err(StoreError::Conflict(_))));
    }

    #[rocket::async_test]
    async fn offline_store_is_unavailable() {
        let store = MemoryStore::default();
        store.set_offline(true);
        let result = store.query_lessons(Uuid::new_v4()).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(result.unwrap_err().is_transient());

        store.set_offline(false);
        assert!(store.query_lessons(Uuid::new_v4()).await.is_ok());
    }
}
