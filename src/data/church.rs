use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::resp::problem::problems::invalid_field;
use crate::resp::problem::Problem;
use crate::util::uuid_str;

pub static CHURCH_COLLECTION_NAME: &str = "churches";
pub static CONGREGATION_COLLECTION_NAME: &str = "congregations";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EstablishmentKind {
    Headquarters,
    Congregation,
}

impl EstablishmentKind {
    pub fn label(self) -> &'static str {
        match self {
            EstablishmentKind::Headquarters => "Sede",
            EstablishmentKind::Congregation => "Congregação",
        }
    }
}

/// Denormalized reference to the headquarters church or one of its
/// congregations, embedded in classes, lessons and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EstablishmentRef {
    #[serde(with = "uuid_str")]
    pub id: Uuid,
    pub name: String,
    pub kind: EstablishmentKind,
}

impl EstablishmentRef {
    pub fn is_headquarters(&self) -> bool {
        self.kind == EstablishmentKind::Headquarters
    }
}

/// The headquarters church. Every operator registers at most one.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Church {
    #[serde(rename = "_id", with = "uuid_str")]
    pub id: Uuid,
    #[serde(with = "uuid_str")]
    pub owner: Uuid,
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Church {
    pub fn establishment(&self) -> EstablishmentRef {
        EstablishmentRef {
            id: self.id,
            name: self.name.clone(),
            kind: EstablishmentKind::Headquarters,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Congregation {
    #[serde(rename = "_id", with = "uuid_str")]
    pub id: Uuid,
    #[serde(with = "uuid_str")]
    pub owner: Uuid,
    #[serde(with = "uuid_str")]
    pub headquarters_id: Uuid,
    pub headquarters_name: String,
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Congregation {
    pub fn establishment(&self) -> EstablishmentRef {
        EstablishmentRef {
            id: self.id,
            name: self.name.clone(),
            kind: EstablishmentKind::Congregation,
        }
    }
}

/// Address form shared by the headquarters and congregation screens.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EstablishmentForm {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
}

impl EstablishmentForm {
    /// Trims every field and checks the required ones.
    pub fn validate(self) -> Result<EstablishmentForm, Problem> {
        let form = EstablishmentForm {
            name: self.name.trim().to_string(),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
        };

        if form.name.is_empty() {
            return Err(invalid_field("name", "Name is required."));
        }
        if form.address.is_empty() {
            return Err(invalid_field("address", "Address is required."));
        }
        if form.city.is_empty() {
            return Err(invalid_field("city", "City is required."));
        }
        let state_len = form.state.chars().count();
        if state_len < 2 {
            return Err(invalid_field("state", "State is required (e.g. SP)."));
        }
        if state_len > 50 {
            return Err(invalid_field("state", "State is too long."));
        }

        Ok(form)
    }

    pub fn into_church(self, owner: Uuid, existing: Option<Church>) -> Church {
        match existing {
            Some(church) => Church {
                name: self.name,
                address: self.address,
                city: self.city,
                state: self.state,
                updated_at: Some(Utc::now()),
                ..church
            },
            None => Church {
                id: Uuid::new_v4(),
                owner,
                name: self.name,
                address: self.address,
                city: self.city,
                state: self.state,
                created_at: Utc::now(),
                updated_at: None,
            },
        }
    }

    pub fn into_congregation(self, headquarters: &Church) -> Congregation {
        Congregation {
            id: Uuid::new_v4(),
            owner: headquarters.owner,
            headquarters_id: headquarters.id,
            headquarters_name: headquarters.name.clone(),
            name: self.name,
            address: self.address,
            city: self.city,
            state: self.state,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn apply_to(self, congregation: Congregation) -> Congregation {
        Congregation {
            name: self.name,
            address: self.address,
            city: self.city,
            state: self.state,
            updated_at: Some(Utc::now()),
            ..congregation
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(state: &str) -> EstablishmentForm {
        EstablishmentForm {
            name: "  Igreja Central ".to_string(),
            address: "Rua A, 10".to_string(),
            city: "Campinas".to_string(),
            state: state.to_string(),
        }
    }

    #[test]
    fn fields_are_trimmed() {
        let valid = form("SP").validate().expect("form should be valid");
        assert_eq!(valid.name, "Igreja Central");
    }

    #[test]
    fn state_length_is_checked() {
        assert_eq!(form("S").validate().unwrap_err().body["field"], "state");
        assert!(form(&"x".repeat(51)).validate().is_err());
        assert!(form("São Paulo").validate().is_ok());
    }

    #[test]
    fn updating_church_keeps_identity() {
        let owner = Uuid::new_v4();
        let created = form("SP").validate().unwrap().into_church(owner, None);
        let updated = EstablishmentForm {
            name: "Igreja Nova".to_string(),
            ..form("RJ")
        }
        .into_church(owner, Some(created.clone()));

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Igreja Nova");
        assert!(updated.updated_at.is_some());
    }
}
