use std::collections::BTreeMap;

use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::person::{sort_by_name, Person};
use crate::data::report::{AttendanceStatus, Attendee};

/// Members of the selected class together with their attendance marks.
///
/// Every member starts absent and the set of marked ids always equals the
/// set of member ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Roster {
    persons: Vec<Person>,
    marks: BTreeMap<Uuid, AttendanceStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RosterLine {
    pub person_id: Uuid,
    pub full_name: String,
    pub is_teacher: bool,
    pub status: AttendanceStatus,
}

impl Roster {
    pub fn new(mut persons: Vec<Person>) -> Roster {
        sort_by_name(&mut persons);
        persons.dedup_by_key(|p| p.id);
        let marks = persons
            .iter()
            .map(|p| (p.id, AttendanceStatus::Absent))
            .collect();

        Roster { persons, marks }
    }

    pub fn persons(&self) -> &[Person] {
        &self.persons
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    pub fn mark(&self, person_id: Uuid) -> Option<AttendanceStatus> {
        self.marks.get(&person_id).copied()
    }

    /// Flips the mark of a member. Unknown ids are ignored; returns whether
    /// anything changed.
    pub fn toggle(&mut self, person_id: Uuid) -> bool {
        match self.marks.get_mut(&person_id) {
            Some(status) => {
                *status = status.toggled();
                true
            }
            None => {
                tracing::debug!("Ignoring toggle for {} outside the roster.", person_id);
                false
            }
        }
    }

    pub fn present_count(&self) -> usize {
        self.marks
            .values()
            .filter(|s| **s == AttendanceStatus::Present)
            .count()
    }

    pub fn lines(&self) -> Vec<RosterLine> {
        self.persons
            .iter()
            .map(|p| RosterLine {
                person_id: p.id,
                full_name: p.full_name.clone(),
                is_teacher: p.is_teacher,
                status: self.mark(p.id).unwrap_or_default(),
            })
            .collect()
    }

    /// Freezes the marks into report entries, in roster order.
    pub fn attendees(&self) -> Vec<Attendee> {
        self.persons
            .iter()
            .map(|p| Attendee {
                person_id: p.id,
                person_name: p.full_name.clone(),
                is_teacher: p.is_teacher,
                status: self.mark(p.id).unwrap_or_default(),
            })
            .collect()
    }
}
