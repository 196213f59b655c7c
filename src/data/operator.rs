use std::borrow::Cow;

use chrono::{DateTime, Utc};
use crypto::bcrypt::bcrypt;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::security::Security;
use crate::util::uuid_str;

pub static OPERATOR_COLLECTION_NAME: &str = "users";

pub mod problem {
    use crate::resp::problem::Problem;
    use rocket::http::Status;

    #[inline]
    pub fn bad_email(email: impl ToString, detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad email.")
            .insert_str("email", email)
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn bad_field(field: &str, detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad registration data.")
            .insert_str("field", field)
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn bad_password(detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad password.")
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn bad_login() -> Problem {
        Problem::new_untyped(Status::Unauthorized, "Bad email or password.")
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PasswordHash([u8; 24]);

impl PasswordHash {
    pub fn new(password: impl AsRef<str>, security: &Security) -> PasswordHash {
        let mut pw_hash: [u8; 24] = [0; 24];

        let mut sha = Sha256::new();
        sha2::Digest::update(&mut sha, password.as_ref().as_bytes());

        bcrypt(
            security.hash_cost,
            &security.salt,
            sha.finalize().as_slice(),
            &mut pw_hash,
        );

        PasswordHash(pw_hash)
    }
}

/// The authenticated person operating the system. Owns every church,
/// class, person, lesson and report they register.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operator {
    #[serde(rename = "_id", with = "uuid_str")]
    pub id: Uuid,
    pub full_name: String,
    pub age: u32,
    pub phone: String,
    pub email: String,
    pub pw_hash: PasswordHash,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Operator {
    pub fn id_for_email(email: impl AsRef<str>) -> Uuid {
        Uuid::new_v5(
            &Uuid::NAMESPACE_OID,
            email.as_ref().trim().to_lowercase().as_bytes(),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperatorResponse {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub age: u32,
}

impl From<Operator> for OperatorResponse {
    fn from(value: Operator) -> Self {
        OperatorResponse {
            id: value.id,
            full_name: value.full_name,
            email: value.email,
            phone: value.phone,
            age: value.age,
        }
    }
}

#[derive(Clone, FromForm, ToSchema)]
pub struct SignupData<'r> {
    pub full_name: Cow<'r, str>,
    pub age: u32,
    pub phone: Cow<'r, str>,
    #[schema(format = "email")]
    pub email: Cow<'r, str>,
    #[schema(format = "password")]
    pub password: Cow<'r, str>,
}

impl std::fmt::Debug for SignupData<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SignupData:{}", self.email)
    }
}

impl SignupData<'_> {
    pub fn id(&self) -> Uuid {
        Operator::id_for_email(&self.email)
    }

    pub fn validate(&self) -> Result<(), crate::resp::problem::Problem> {
        if self.full_name.trim().is_empty() {
            return Err(problem::bad_field("full_name", "Name is required."));
        }

        if self.age < 1 {
            return Err(problem::bad_field("age", "Age must be a positive number."));
        }

        if self.phone.trim().chars().count() < 10 {
            return Err(problem::bad_field(
                "phone",
                "Phone must have at least 10 digits.",
            ));
        }

        if !self.email.contains('@') {
            return Err(problem::bad_email(
                self.email.to_string(),
                "Not a valid e-mail address.",
            ));
        }

        if self.password.len() < 6 {
            return Err(problem::bad_password(
                "Password must be at least 6 characters (bytes) long.",
            ));
        }

        if self.password.len() > 1024 {
            return Err(problem::bad_password(
                "Passwords longer than 1024 characters aren't supported.",
            ));
        }

        Ok(())
    }

    pub fn into_operator(self, security: &Security) -> Operator {
        let id = self.id();
        tracing::info!("Creating a new operator with UUID: {}", id);

        Operator {
            id,
            full_name: self.full_name.trim().to_string(),
            age: self.age,
            phone: self.phone.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            pw_hash: PasswordHash::new(self.password.as_ref(), security),
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, FromForm, ToSchema)]
pub struct LoginData {
    pub email: String,
    #[schema(format = "password")]
    pub password: String,
}

impl std::fmt::Debug for LoginData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LoginData:{}", self.email)
    }
}

impl LoginData {
    pub fn validate(&self) -> Result<(), crate::resp::problem::Problem> {
        if !self.email.contains('@') || self.password.len() < 6 || self.password.len() > 1024 {
            return Err(problem::bad_login());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::fixture;

    fn signup(password: &'static str) -> SignupData<'static> {
        SignupData {
            full_name: Cow::Borrowed("Maria da Silva"),
            age: 42,
            phone: Cow::Borrowed("11987654321"),
            email: Cow::Borrowed("Maria@Example.com"),
            password: Cow::Borrowed(password),
        }
    }

    #[test]
    fn password_hash_depends_on_password() {
        let security = fixture::security();
        assert_eq!(
            PasswordHash::new("segredo", &security),
            PasswordHash::new("segredo", &security)
        );
        assert_ne!(
            PasswordHash::new("segredo", &security),
            PasswordHash::new("segredo2", &security)
        );
    }

    #[test]
    fn signup_validation() {
        assert!(signup("123456").validate().is_ok());
        assert!(signup("12345").validate().is_err());

        let mut short_phone = signup("123456");
        short_phone.phone = Cow::Borrowed("1234");
        assert!(short_phone.validate().is_err());

        let mut bad_email = signup("123456");
        bad_email.email = Cow::Borrowed("maria.example.com");
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn operator_id_ignores_email_case() {
        let operator = signup("123456").into_operator(&fixture::security());
        assert_eq!(operator.email, "maria@example.com");
        assert_eq!(operator.id, Operator::id_for_email("maria@example.com"));
    }
}
