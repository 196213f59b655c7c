use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use super::church::EstablishmentRef;
use crate::resp::problem::problems::invalid_field;
use crate::resp::problem::Problem;
use crate::util::uuid_str;

pub static CLASS_COLLECTION_NAME: &str = "classes";

/// Age brackets offered by the lesson magazines.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Nursery,
    Kindergarten,
    Primary,
    Junior,
    PreTeen,
    Adolescent,
    Teen,
    Youth,
    Adult,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 9] = [
        AgeGroup::Nursery,
        AgeGroup::Kindergarten,
        AgeGroup::Primary,
        AgeGroup::Junior,
        AgeGroup::PreTeen,
        AgeGroup::Adolescent,
        AgeGroup::Teen,
        AgeGroup::Youth,
        AgeGroup::Adult,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AgeGroup::Nursery => "Maternal – 1 a 2 anos",
            AgeGroup::Kindergarten => "Jardim de Infância – 3 a 4 anos",
            AgeGroup::Primary => "Primários – 5 a 6 anos",
            AgeGroup::Junior => "Juniores – 7 a 8 anos",
            AgeGroup::PreTeen => "Pré-Adolescentes – 9 a 10 anos",
            AgeGroup::Adolescent => "Adolescentes – 11 a 14 anos",
            AgeGroup::Teen => "Juvenis – 15 a 17 anos",
            AgeGroup::Youth => "Jovens – 18 a 25 anos",
            AgeGroup::Adult => "Adultos – a partir de 26 anos",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    #[serde(rename = "_id", with = "uuid_str")]
    pub id: Uuid,
    #[serde(with = "uuid_str")]
    pub owner: Uuid,
    pub establishment: EstablishmentRef,
    pub name: String,
    pub age_group: AgeGroup,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Class {
    pub fn new(
        owner: Uuid,
        establishment: EstablishmentRef,
        name: impl ToString,
        age_group: AgeGroup,
    ) -> Class {
        Class {
            id: Uuid::new_v4(),
            owner,
            establishment,
            name: name.to_string(),
            age_group,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassForm {
    pub establishment_id: Uuid,
    pub name: String,
    pub age_group: AgeGroup,
}

impl ClassForm {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.name.trim().is_empty() {
            return Err(invalid_field("name", "Class name is required."));
        }
        Ok(())
    }

    pub fn apply_to(self, class: Class, establishment: EstablishmentRef) -> Class {
        Class {
            establishment,
            name: self.name.trim().to_string(),
            age_group: self.age_group,
            updated_at: Some(Utc::now()),
            ..class
        }
    }
}

/// Member counts shown on the students overview.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassOverview {
    pub class: Class,
    pub student_count: usize,
    pub teacher_count: usize,
}
