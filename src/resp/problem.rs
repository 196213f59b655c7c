use std::io::Cursor;

use rocket::http::ContentType;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::{response, Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use utoipa::ToSchema;

use crate::data::store::StoreError;
use crate::wizard::WizardError;

/// Implements [RFC7807](https://tools.ietf.org/html/rfc7807).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Problem {
    #[serde(skip)]
    pub status: Status,
    pub type_uri: String,
    pub title: String,

    pub detail: Option<String>,
    pub instance_uri: Option<String>,

    #[schema(value_type = Object)]
    pub body: Map<String, Value>,
}

impl Default for Problem {
    fn default() -> Self {
        Problem {
            status: Status::InternalServerError,
            type_uri: "about:blank".to_string(),
            title: "Problem".to_string(),
            detail: None,
            instance_uri: None,
            body: Map::new(),
        }
    }
}

impl Problem {
    pub fn new(status: Status, type_uri: impl ToString, title: impl ToString) -> Problem {
        Problem {
            status,
            type_uri: type_uri.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn new_untyped(status: Status, title: impl ToString) -> Problem {
        Problem {
            status,
            type_uri: "about:blank".to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn detail(&mut self, value: impl ToString) -> &mut Problem {
        self.detail = Some(value.to_string());
        self
    }

    pub fn instance_uri(&mut self, value: String) -> &mut Problem {
        self.instance_uri = Some(value);
        self
    }

    pub fn insert_json_value(&mut self, key: impl ToString, value: Value) -> &mut Problem {
        self.body.insert(key.to_string(), value);
        self
    }

    pub fn insert_str(&mut self, key: impl ToString, value: impl ToString) -> &mut Problem {
        self.body
            .insert(key.to_string(), Value::String(value.to_string()));
        self
    }

    /// Whether the client may repeat the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        self.body
            .get("retryable")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.title)
    }
}

impl std::error::Error for Problem {}

impl<'r> Responder<'r, 'static> for Problem {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let mut body = self.body;

        // Following are required by rfc7807
        body.insert(String::from("type"), Value::from(self.type_uri));
        body.insert(String::from("title"), Value::from(self.title));

        // Optional parameters as specified by rfc7807
        if let Some(detail) = self.detail {
            body.insert(String::from("detail"), Value::from(detail));
        }
        body.insert(String::from("status"), Value::from(self.status.code));
        if let Some(instance) = self.instance_uri {
            body.insert(String::from("instance"), Value::from(instance));
        }

        let body_string = Value::Object(body).to_string();

        Response::build()
            .status(self.status)
            .header(ContentType::new("application", "problem+json"))
            .raw_header("Content-Language", "pt-BR")
            .sized_body(body_string.len(), Cursor::new(body_string))
            .ok()
    }
}

pub mod problems {
    use crate::resp::problem::Problem;
    use rocket::http::Status;
    use uuid::Uuid;

    #[inline]
    pub fn not_found(what: &str, id: Uuid) -> Problem {
        Problem::new_untyped(Status::NotFound, format!("{} doesn't exist.", what))
            .insert_str("id", id)
            .to_owned()
    }

    #[inline]
    pub fn invalid_field(field: &str, detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Invalid form field.")
            .insert_str("field", field)
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn conflict(title: impl ToString) -> Problem {
        Problem::new_untyped(Status::Conflict, title)
    }
}

impl From<StoreError> for Problem {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => {
                Problem::new_untyped(Status::NotFound, "Requested document doesn't exist.")
            }
            StoreError::PermissionDenied(detail) => {
                Problem::new_untyped(Status::ServiceUnavailable, "Store refused the request.")
                    .detail(detail)
                    .insert_json_value("retryable", Value::Bool(true))
                    .to_owned()
            }
            StoreError::Unavailable(detail) => Problem::new_untyped(
                Status::ServiceUnavailable,
                "Server was unable to access the document store.",
            )
            .detail(detail)
            .insert_json_value("retryable", Value::Bool(true))
            .to_owned(),
            StoreError::Timeout(after) => Problem::new_untyped(
                Status::ServiceUnavailable,
                "A timeout occurred while accessing the document store.",
            )
            .detail(format!("No answer after {} seconds.", after.as_secs()))
            .insert_json_value("retryable", Value::Bool(true))
            .to_owned(),
            StoreError::Conflict(detail) => {
                problems::conflict("Document already exists.").detail(detail).to_owned()
            }
            StoreError::Data(detail) => Problem::new_untyped(
                Status::InternalServerError,
                "There was a problem with handling stored data.",
            )
            .detail(detail)
            .to_owned(),
        }
    }
}

impl From<WizardError> for Problem {
    fn from(e: WizardError) -> Self {
        let detail = e.to_string();
        match e {
            WizardError::NotFound(what) => {
                Problem::new_untyped(Status::NotFound, "Attendance target doesn't exist.")
                    .insert_str("target", what)
                    .detail(detail)
                    .to_owned()
            }
            WizardError::Store(store) => Problem::from(store),
            WizardError::LessonFinalized => {
                problems::conflict("Lesson is finalized.").detail(detail).to_owned()
            }
            WizardError::EmptyRoster => problems::conflict("Class has no members.")
                .detail(detail)
                .to_owned(),
            WizardError::InvalidTransition { .. } => {
                problems::conflict("Action not available at this stage.")
                    .detail(detail)
                    .to_owned()
            }
        }
    }
}

impl From<jsonwebtoken::errors::Error> for Problem {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match e.into_kind() {
            ErrorKind::ExpiredSignature => {
                Problem::new_untyped(Status::Unauthorized, "Expired JWT signature.")
            }
            _ => Problem::new_untyped(Status::Unauthorized, "Error while handling JWT."),
        }
    }
}

impl From<std::io::Error> for Problem {
    fn from(_: std::io::Error) -> Self {
        Problem::new_untyped(Status::InternalServerError, "Server IO error")
    }
}
