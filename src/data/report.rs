use chrono::{DateTime, NaiveDate, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use super::church::EstablishmentRef;
use crate::util::uuid_str;

pub static REPORT_COLLECTION_NAME: &str = "lessonAttendances";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn toggled(self) -> AttendanceStatus {
        match self {
            AttendanceStatus::Present => AttendanceStatus::Absent,
            AttendanceStatus::Absent => AttendanceStatus::Present,
        }
    }
}

impl Default for AttendanceStatus {
    fn default() -> Self {
        AttendanceStatus::Absent
    }
}

/// One roster line frozen at submission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    #[serde(with = "uuid_str")]
    pub person_id: Uuid,
    pub person_name: String,
    pub is_teacher: bool,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonRef {
    #[serde(with = "uuid_str")]
    pub id: Uuid,
    pub number: u8,
    pub quarter: u8,
    pub year: i32,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassRef {
    #[serde(with = "uuid_str")]
    pub id: Uuid,
    pub name: String,
    pub establishment: EstablishmentRef,
}

/// Report contents as assembled by an attendance session, before the store
/// assigns an id and a timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewAttendanceReport {
    #[serde(with = "uuid_str")]
    pub owner: Uuid,
    pub lesson: LessonRef,
    pub class: ClassRef,
    pub attendees: Vec<Attendee>,
    pub bibles_count: u32,
    pub magazines_count: u32,
    pub visitors_count: u32,
    pub offer_amount: f64,
}

impl NewAttendanceReport {
    pub fn into_report(self, id: Uuid, recorded_at: DateTime<Utc>) -> AttendanceReport {
        AttendanceReport {
            id,
            recorded_at,
            content: self,
        }
    }
}

/// Persisted outcome of one attendance session. Never updated; removed only
/// together with its lesson or class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceReport {
    #[serde(rename = "_id", with = "uuid_str")]
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub content: NewAttendanceReport,
}

impl AttendanceReport {
    pub fn present_count(&self) -> usize {
        self.content
            .attendees
            .iter()
            .filter(|a| a.status == AttendanceStatus::Present)
            .count()
    }

    pub fn absent_count(&self) -> usize {
        self.content.attendees.len() - self.present_count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    #[serde(flatten)]
    pub report: AttendanceReport,
    pub present: usize,
    pub absent: usize,
}

impl From<AttendanceReport> for ReportView {
    fn from(report: AttendanceReport) -> Self {
        ReportView {
            present: report.present_count(),
            absent: report.absent_count(),
            report,
        }
    }
}
