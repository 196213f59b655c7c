use chrono::{DateTime, NaiveDate, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use super::optional_text;
use crate::resp::problem::problems::invalid_field;
use crate::resp::problem::Problem;
use crate::util::{compare_names, uuid_str};

pub static PERSON_COLLECTION_NAME: &str = "people";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MaritalStatus {
    Single,
    Married,
    Divorced,
    Widowed,
    Other,
}

/// A student or teacher enrolled in exactly one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(rename = "_id", with = "uuid_str")]
    pub id: Uuid,
    #[serde(with = "uuid_str")]
    pub owner: Uuid,
    #[serde(with = "uuid_str")]
    pub class_id: Uuid,
    pub full_name: String,
    pub age: u32,
    #[serde(default)]
    pub is_teacher: bool,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub marital_status: Option<MaritalStatus>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    /// Free text, e.g. "5 anos".
    #[serde(default)]
    pub conversion_time: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Person {
    pub fn new(owner: Uuid, class_id: Uuid, full_name: impl ToString, is_teacher: bool) -> Person {
        Person {
            id: Uuid::new_v4(),
            owner,
            class_id,
            full_name: full_name.to_string(),
            age: 1,
            is_teacher,
            birthday: None,
            phone: None,
            marital_status: None,
            street: None,
            number: None,
            district: None,
            conversion_time: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

pub fn sort_by_name(persons: &mut [Person]) {
    persons.sort_by(|a, b| compare_names(&a.full_name, &b.full_name));
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonForm {
    pub full_name: String,
    pub age: u32,
    pub class_id: Uuid,
    #[serde(default)]
    pub is_teacher: bool,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub marital_status: Option<MaritalStatus>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub conversion_time: Option<String>,
}

impl PersonForm {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.full_name.trim().is_empty() {
            return Err(invalid_field("fullName", "Full name is required."));
        }
        if self.age < 1 {
            return Err(invalid_field("age", "Age must be a positive number."));
        }
        Ok(())
    }

    /// Writes the form over `person`, keeping its identity and owner.
    pub fn apply_to(self, person: Person) -> Person {
        Person {
            class_id: self.class_id,
            full_name: self.full_name.trim().to_string(),
            age: self.age,
            is_teacher: self.is_teacher,
            birthday: self.birthday,
            phone: optional_text(self.phone),
            marital_status: self.marital_status,
            street: optional_text(self.street),
            number: optional_text(self.number),
            district: optional_text(self.district),
            conversion_time: optional_text(self.conversion_time),
            ..person
        }
    }

    pub fn into_person(self, owner: Uuid) -> Person {
        let blank = Person::new(owner, self.class_id, "", self.is_teacher);
        self.apply_to(blank)
    }
}

/// Members of one class split the way the class details screen lists them.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassMembers {
    pub teachers: Vec<Person>,
    pub students: Vec<Person>,
}

impl ClassMembers {
    pub fn split(persons: Vec<Person>) -> ClassMembers {
        let (mut teachers, mut students): (Vec<Person>, Vec<Person>) =
            persons.into_iter().partition(|p| p.is_teacher);
        sort_by_name(&mut teachers);
        sort_by_name(&mut students);
        ClassMembers { teachers, students }
    }
}
