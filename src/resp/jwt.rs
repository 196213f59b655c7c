use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::{Cookie, CookieJar, Status};
use rocket::request::{self, FromRequest, Request};
use rocket::time::OffsetDateTime;
use serde::{Deserialize, Serialize};

use super::util::date_time_as_unix_seconds;
use crate::data::operator::Operator;
use crate::resp::problem::Problem;
use crate::security::Security;
use uuid::Uuid;

pub static AUTH_COOKIE_NAME: &str = "jwt_auth";

/// Claims identifying the operator that owns every document a request
/// touches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorToken {
    #[serde(with = "date_time_as_unix_seconds")]
    iat: DateTime<Utc>,
    #[serde(with = "date_time_as_unix_seconds")]
    exp: DateTime<Utc>,
    pub operator: Uuid,
}

impl OperatorToken {
    pub fn new(operator: &Operator) -> OperatorToken {
        Self::for_id(operator.id)
    }

    pub fn for_id(operator: Uuid) -> OperatorToken {
        let now = Utc::now();
        OperatorToken {
            iat: now,
            exp: now + Duration::weeks(1),
            operator,
        }
    }

    pub fn encode_jwt(
        &self,
        private_key: impl AsRef<[u8]>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let header = Header::new(Algorithm::PS256);
        let key = EncodingKey::from_rsa_pem(private_key.as_ref())?;

        encode(&header, &self, &key)
    }

    pub fn cookie(
        &self,
        private_key: impl AsRef<[u8]>,
    ) -> Result<Cookie<'static>, jsonwebtoken::errors::Error> {
        Ok(
            Cookie::build((AUTH_COOKIE_NAME, self.encode_jwt(private_key)?))
                .secure(true)
                .expires(OffsetDateTime::from_unix_timestamp(self.exp.timestamp()).ok())
                .path("/")
                .http_only(true)
                .build(),
        )
    }
}

pub fn auth_problem(detail: impl ToString) -> Problem {
    Problem::new_untyped(Status::Unauthorized, "Unable to authorize operator.")
        .detail(detail)
        .clone()
}

pub fn decode_token(
    token: &str,
    public_key: impl AsRef<[u8]>,
) -> Result<OperatorToken, jsonwebtoken::errors::Error> {
    decode::<OperatorToken>(
        token,
        &DecodingKey::from_rsa_pem(public_key.as_ref())?,
        &Validation::new(Algorithm::PS256),
    )
    .map(|data| data.claims)
}

pub fn extract_claims(
    cookies: &CookieJar,
    public_key: impl AsRef<[u8]>,
) -> Result<OperatorToken, Problem> {
    let token = match cookies.get(AUTH_COOKIE_NAME) {
        Some(jwt) => jwt.value().to_owned(),
        None => {
            return Err(auth_problem("No JWT auth cookie."));
        }
    };
    tracing::debug!("extracted jwt auth from cookie");

    match decode_token(&token, public_key) {
        Ok(it) => {
            tracing::debug!("decoded operator token for: {}", it.operator);
            Ok(it)
        }
        Err(_) => Err(auth_problem("JWT cookie was malformed.")),
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for OperatorToken {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let security: &Security = match req.rocket().state() {
            Some(it) => it,
            None => {
                return request::Outcome::Error((
                    Status::InternalServerError,
                    auth_problem("Security configuration missing."),
                ))
            }
        };

        tracing::trace!("extracting operator token from request cookies");
        match extract_claims(req.cookies(), &security.jwt_keys.public) {
            Ok(claims) => request::Outcome::Success(claims),
            Err(e) => {
                tracing::debug!("unable to extract claims from cookies");
                request::Outcome::Error((Status::Unauthorized, e))
            }
        }
    }
}

pub mod doc {
    use utoipa::openapi::security::*;

    #[derive(Clone, Copy)]
    pub struct JWTAuth;

    impl From<JWTAuth> for SecurityScheme {
        fn from(_: JWTAuth) -> SecurityScheme {
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(super::AUTH_COOKIE_NAME)))
        }
    }

    impl utoipa::Modify for JWTAuth {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            if let Some(c) = openapi.components.as_mut() {
                c.add_security_scheme("jwt", *self)
            }
        }
    }
}

pub trait HasAuthCookie {
    fn get_auth_cookie(&self, public_key: impl AsRef<[u8]>) -> Option<OperatorToken>;
}

#[cfg(test)]
impl HasAuthCookie for rocket::local::asynchronous::LocalResponse<'_> {
    fn get_auth_cookie(&self, public_key: impl AsRef<[u8]>) -> Option<OperatorToken> {
        let cookie = self.cookies().get(AUTH_COOKIE_NAME)?;
        decode_token(cookie.value(), public_key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::fixture;
    use chrono::SubsecRound;

    #[test]
    fn jwt_configured_properly() {
        let mut now = Utc::now();
        now = now.round_subsecs(0);

        let operator = Uuid::new_v4();

        let token = OperatorToken {
            iat: now,
            exp: now + Duration::weeks(1),
            operator,
        };

        let security = fixture::security();

        let encoded = token
            .encode_jwt(&security.jwt_keys.private)
            .expect("encoding should work for example");

        let decoded = decode_token(&encoded, &security.jwt_keys.public)
            .expect("unable to decode encoded token");

        assert_eq!(now, decoded.iat);
        assert_eq!(now + Duration::weeks(1), decoded.exp);
        assert_eq!(operator, decoded.operator);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let security = fixture::security();
        let mut encoded = OperatorToken::for_id(Uuid::new_v4())
            .encode_jwt(&security.jwt_keys.private)
            .unwrap();
        encoded.push('x');

        assert!(decode_token(&encoded, &security.jwt_keys.public).is_err());
    }
}
