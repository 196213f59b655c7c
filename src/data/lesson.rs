use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use utoipa::ToSchema;
use uuid::Uuid;

use super::church::EstablishmentRef;
use super::report::LessonRef;
use crate::resp::problem::problems::invalid_field;
use crate::resp::problem::Problem;
use crate::util::uuid_str;

pub static LESSON_COLLECTION_NAME: &str = "scheduledLessons";

pub const LESSONS_PER_QUARTER: u8 = 13;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    Scheduled,
    Completed,
    Cancelled,
}

/// Status as shown to operators; `InProgress` is derived from the clock.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    #[serde(rename = "_id", with = "uuid_str")]
    pub id: Uuid,
    #[serde(with = "uuid_str")]
    pub owner: Uuid,
    pub date: NaiveDate,
    #[schema(value_type = String, example = "09:00:00")]
    pub time: NaiveTime,
    pub number: u8,
    pub quarter: u8,
    pub year: i32,
    pub status: LessonStatus,
    /// Lessons without an establishment cover every class of the operator.
    #[serde(default)]
    pub establishment: Option<EstablishmentRef>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Lesson {
    pub fn is_completed(&self) -> bool {
        self.status == LessonStatus::Completed
    }

    pub fn starts_at(&self, tz: Tz) -> DateTime<Utc> {
        let local = self.date.and_time(self.time);
        tz.from_local_datetime(&local)
            .earliest()
            .map(|it| it.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&local))
    }

    /// A scheduled lesson counts as in progress from its start instant on.
    pub fn display_status(&self, now: DateTime<Utc>, tz: Tz) -> DisplayStatus {
        match self.status {
            LessonStatus::Completed => DisplayStatus::Completed,
            LessonStatus::Cancelled => DisplayStatus::Cancelled,
            LessonStatus::Scheduled if now >= self.starts_at(tz) => DisplayStatus::InProgress,
            LessonStatus::Scheduled => DisplayStatus::Scheduled,
        }
    }

    pub fn reference(&self) -> LessonRef {
        LessonRef {
            id: self.id,
            number: self.number,
            quarter: self.quarter,
            year: self.year,
            date: self.date,
        }
    }
}

pub fn parse_lesson_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonForm {
    pub date: NaiveDate,
    /// `HH:MM`
    pub time: String,
    pub number: u8,
    pub quarter: u8,
    pub year: i32,
    #[serde(default)]
    pub establishment_id: Option<Uuid>,
}

impl LessonForm {
    /// Checks the form against the operator's local clock and returns the
    /// parsed lesson time.
    pub fn validate(&self, now: NaiveDateTime) -> Result<NaiveTime, Problem> {
        if !(1..=LESSONS_PER_QUARTER).contains(&self.number) {
            return Err(invalid_field(
                "number",
                "Lesson number must be between 1 and 13.",
            ));
        }
        if !(1..=4).contains(&self.quarter) {
            return Err(invalid_field("quarter", "Quarter must be between 1 and 4."));
        }
        let current_year = now.year();
        if self.year < current_year - 1 || self.year > current_year + 5 {
            return Err(invalid_field("year", "Invalid year."));
        }

        if self.date < now.date() {
            return Err(invalid_field("date", "Lesson date can't be in the past."));
        }

        let time = parse_lesson_time(&self.time)
            .ok_or_else(|| invalid_field("time", "Lesson time is required (HH:MM)."))?;

        // Minutes already gone in the current hour are still accepted.
        if self.date == now.date() && time.hour() < now.hour() {
            return Err(invalid_field(
                "time",
                "For today, the time can't be in an hour that already passed.",
            ));
        }

        Ok(time)
    }

    pub fn into_lesson(
        self,
        owner: Uuid,
        time: NaiveTime,
        establishment: Option<EstablishmentRef>,
    ) -> Lesson {
        Lesson {
            id: Uuid::new_v4(),
            owner,
            date: self.date,
            time,
            number: self.number,
            quarter: self.quarter,
            year: self.year,
            status: LessonStatus::Scheduled,
            establishment,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonView {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub display_status: DisplayStatus,
}

impl LessonView {
    pub fn new(lesson: Lesson, now: DateTime<Utc>, tz: Tz) -> LessonView {
        let display_status = lesson.display_status(now, tz);
        LessonView {
            lesson,
            display_status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonSchedule {
    /// Scheduled lessons, soonest first.
    pub active: Vec<LessonView>,
    /// Finalized lessons, most recent first.
    pub completed: Vec<LessonView>,
}

impl LessonSchedule {
    pub fn build(lessons: Vec<Lesson>, now: DateTime<Utc>, tz: Tz) -> LessonSchedule {
        let (mut active, mut completed): (Vec<Lesson>, Vec<Lesson>) = lessons
            .into_iter()
            .filter(|l| l.status != LessonStatus::Cancelled)
            .partition(|l| l.status == LessonStatus::Scheduled);

        active.sort_by_key(|l| (l.date, l.time));
        completed.sort_by(|a, b| (b.date, b.time).cmp(&(a.date, a.time)));

        LessonSchedule {
            active: active
                .into_iter()
                .map(|l| LessonView::new(l, now, tz))
                .collect(),
            completed: completed
                .into_iter()
                .map(|l| LessonView::new(l, now, tz))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Sao_Paulo;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M").unwrap()
    }

    fn form(date: &str, time: &str) -> LessonForm {
        LessonForm {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            time: time.to_string(),
            number: 3,
            quarter: 2,
            year: 2026,
            establishment_id: None,
        }
    }

    #[test]
    fn ranges_are_enforced() {
        let now = at("2026-05-10", "08:00");
        let mut f = form("2026-05-17", "09:00");
        f.number = 14;
        assert_eq!(f.validate(now).unwrap_err().body["field"], "number");
        f.number = 13;
        f.quarter = 0;
        assert_eq!(f.validate(now).unwrap_err().body["field"], "quarter");
        f.quarter = 4;
        f.year = 2024;
        assert_eq!(f.validate(now).unwrap_err().body["field"], "year");
        f.year = 2031;
        assert!(f.validate(now).is_ok());
        f.year = 2032;
        assert!(f.validate(now).is_err());
    }

    #[test]
    fn time_must_be_well_formed() {
        let now = at("2026-05-10", "08:00");
        assert!(form("2026-05-17", "").validate(now).is_err());
        assert!(form("2026-05-17", "25:00").validate(now).is_err());
        assert_eq!(
            form("2026-05-17", " 09:30 ").validate(now).unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
    }

    #[test]
    fn today_rejects_only_past_hours() {
        let now = at("2026-05-10", "09:40");
        assert!(form("2026-05-10", "08:59").validate(now).is_err());
        assert!(form("2026-05-10", "09:00").validate(now).is_ok());
        assert!(form("2026-05-10", "10:00").validate(now).is_ok());
    }

    #[test]
    fn past_dates_are_rejected() {
        let now = at("2026-05-10", "09:40");
        let error = form("2026-05-09", "23:00").validate(now).unwrap_err();
        assert_eq!(error.body["field"], "date");
        assert!(form("2026-05-11", "07:00").validate(now).is_ok());
    }

    fn lesson(date: &str, time: &str, status: LessonStatus) -> Lesson {
        let f = form(date, time);
        let t = parse_lesson_time(&f.time).unwrap();
        let mut lesson = f.into_lesson(Uuid::new_v4(), t, None);
        lesson.status = status;
        lesson
    }

    #[test]
    fn lesson_in_progress_from_start_instant() {
        let l = lesson("2026-05-10", "09:00", LessonStatus::Scheduled);
        // 09:00 in São Paulo is 12:00 UTC.
        let start = Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap();
        assert_eq!(l.starts_at(Sao_Paulo), start);
        assert_eq!(
            l.display_status(start - chrono::Duration::minutes(1), Sao_Paulo),
            DisplayStatus::Scheduled
        );
        assert_eq!(l.display_status(start, Sao_Paulo), DisplayStatus::InProgress);

        let done = lesson("2026-05-10", "09:00", LessonStatus::Completed);
        assert_eq!(done.display_status(start, Sao_Paulo), DisplayStatus::Completed);
    }

    #[test]
    fn schedule_orders_active_and_completed() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let schedule = LessonSchedule::build(
            vec![
                lesson("2026-03-01", "09:00", LessonStatus::Scheduled),
                lesson("2026-02-01", "09:00", LessonStatus::Completed),
                lesson("2026-02-15", "09:00", LessonStatus::Scheduled),
                lesson("2026-02-22", "09:00", LessonStatus::Completed),
            ],
            now,
            Sao_Paulo,
        );

        let active: Vec<_> = schedule.active.iter().map(|v| v.lesson.date.to_string()).collect();
        assert_eq!(active, vec!["2026-02-15", "2026-03-01"]);
        let completed: Vec<_> = schedule
            .completed
            .iter()
            .map(|v| v.lesson.date.to_string())
            .collect();
        assert_eq!(completed, vec!["2026-02-22", "2026-02-01"]);
    }
}
