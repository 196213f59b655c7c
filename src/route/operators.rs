use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, Status};
use rocket::serde::json::Json;
use rocket::State;

use crate::config::Config;
use crate::context::OperatorContext;
use crate::data::operator::problem as operator_problem;
use crate::data::operator::{LoginData, Operator, OperatorResponse, PasswordHash, SignupData};
use crate::data::store::{StoreError, StoreHandle};
use crate::resp::jwt::{OperatorToken, AUTH_COOKIE_NAME};
use crate::resp::problem::Problem;
use crate::security::Security;

fn anonymous<'r>(
    operator: uuid::Uuid,
    store: &'r State<StoreHandle>,
    config: &State<Config>,
) -> OperatorContext<'r> {
    OperatorContext::new(operator, store.inner().as_ref(), config.store_timeout())
}

/// Register an operator
///
/// Signing up again with the same email and password logs in instead.
#[utoipa::path(
    request_body(content = SignupData, content_type = "application/x-www-form-urlencoded"),
    responses(
        (
            status = 200,
            description = "Operator registered, auth cookie set",
            body = OperatorResponse
        ),
        (status = 400, description = "Invalid or already registered data", body = Problem),
    )
)]
#[post("/operators/signup", data = "<signup>")]
#[tracing::instrument(
    skip(signup, cookies, store, security, config),
    fields(email = %signup.email)
)]
pub async fn operator_signup(
    signup: Form<SignupData<'_>>,
    cookies: &CookieJar<'_>,
    store: &State<StoreHandle>,
    security: &State<Security>,
    config: &State<Config>,
) -> Result<Json<OperatorResponse>, Problem> {
    signup.validate()?;
    let ctx = anonymous(signup.id(), store, config);

    if let Some(existing) = ctx
        .run(ctx.store.find_operator_by_email(&signup.email))
        .await?
    {
        return if existing.pw_hash == PasswordHash::new(signup.password.as_ref(), security) {
            cookies.add(OperatorToken::new(&existing).cookie(&security.jwt_keys.private)?);
            Ok(Json(existing.into()))
        } else {
            Err(operator_problem::bad_email(
                signup.email.to_string(),
                "Email already registered.",
            ))
        };
    }

    let operator = signup.into_inner().into_operator(security);
    match ctx.run(ctx.store.insert_operator(&operator)).await {
        Ok(()) => {}
        Err(StoreError::Conflict(_)) => {
            return Err(operator_problem::bad_email(
                operator.email,
                "Email already registered.",
            ))
        }
        Err(other) => return Err(other.into()),
    }

    cookies.add(OperatorToken::new(&operator).cookie(&security.jwt_keys.private)?);
    Ok(Json(operator.into()))
}

/// Log in with email and password
#[utoipa::path(
    request_body(content = LoginData, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Logged in, auth cookie set", body = OperatorResponse),
        (status = 401, description = "Bad email or password", body = Problem),
    )
)]
#[post("/operators/login", data = "<login>")]
#[tracing::instrument(skip(login, cookies, store, security, config), fields(email = %login.email))]
pub async fn operator_login(
    login: Form<LoginData>,
    cookies: &CookieJar<'_>,
    store: &State<StoreHandle>,
    security: &State<Security>,
    config: &State<Config>,
) -> Result<Json<OperatorResponse>, Problem> {
    login.validate()?;

    // VULN: no throttling of repeated login attempts
    let ctx = anonymous(Operator::id_for_email(&login.email), store, config);
    let operator = ctx
        .run(ctx.store.find_operator_by_email(&login.email))
        .await?
        .ok_or_else(operator_problem::bad_login)?;

    if operator.pw_hash != PasswordHash::new(&login.password, security) {
        return Err(operator_problem::bad_login());
    }

    cookies.add(OperatorToken::new(&operator).cookie(&security.jwt_keys.private)?);
    Ok(Json(operator.into()))
}

/// Drop the auth cookie
#[utoipa::path(responses((status = 204, description = "Logged out")))]
#[post("/operators/logout")]
#[tracing::instrument(skip(cookies))]
pub async fn operator_logout(cookies: &CookieJar<'_>) -> Status {
    cookies.remove(Cookie::build(AUTH_COOKIE_NAME).path("/").build());
    Status::NoContent
}

/// The logged in operator
#[utoipa::path(
    responses(
        (status = 200, description = "Current operator", body = OperatorResponse),
        (status = 401, description = "Missing or expired token", body = Problem),
        (status = 404, description = "Operator was removed"),
    ),
    security(("jwt" = []))
)]
#[get("/operators/me")]
#[tracing::instrument]
pub async fn operator_me(
    ctx: OperatorContext<'_>,
) -> Result<Option<Json<OperatorResponse>>, Problem> {
    let operator = ctx.run(ctx.store.get_operator(ctx.owner)).await?;
    Ok(operator.map(|it| Json(it.into())))
}

#[cfg(test)]
mod operator_endpoints {
    use rocket::http::{ContentType, Status};

    use crate::data::operator::{Operator, OperatorResponse};
    use crate::resp::jwt::HasAuthCookie;
    use crate::route::testing;
    use crate::security::fixture;

    fn signup_body(email: &str, password: &str) -> String {
        format!(
            "full_name=Maria+da+Silva&age=42&phone=11987654321&email={}&password={}",
            email, password
        )
    }

    #[rocket::async_test]
    async fn signup_sets_auth_cookie() {
        let client = testing::client().await;
        let response = client
            .post("/api/v1/operators/signup")
            .header(ContentType::Form)
            .body(signup_body("maria@example.com", "segredo1"))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.content_type(), Some(ContentType::JSON));
        let token = response
            .get_auth_cookie(&fixture::security().jwt_keys.public)
            .expect("jwt_auth cookie wasn't present");
        assert_eq!(token.operator, Operator::id_for_email("maria@example.com"));

        let body: OperatorResponse = response.into_json().await.expect("invalid response json");
        assert_eq!(body.full_name, "Maria da Silva");
    }

    #[rocket::async_test]
    async fn repeated_signup_checks_password() {
        let client = testing::client().await;
        for (password, status) in [
            ("segredo1", Status::Ok),
            ("segredo1", Status::Ok),
            ("outra-senha", Status::BadRequest),
        ] {
            let response = client
                .post("/api/v1/operators/signup")
                .header(ContentType::Form)
                .body(signup_body("joao@example.com", password))
                .dispatch()
                .await;
            assert_eq!(response.status(), status, "password {}", password);
        }
    }

    #[rocket::async_test]
    async fn short_password_is_rejected() {
        let client = testing::client().await;
        let response = client
            .post("/api/v1/operators/signup")
            .header(ContentType::Form)
            .body(signup_body("ana@example.com", "123"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn login_and_me() {
        let client = testing::client().await;
        client
            .post("/api/v1/operators/signup")
            .header(ContentType::Form)
            .body(signup_body("paulo@example.com", "segredo1"))
            .dispatch()
            .await;

        let wrong = client
            .post("/api/v1/operators/login")
            .header(ContentType::Form)
            .body("email=paulo@example.com&password=errada1")
            .dispatch()
            .await;
        assert_eq!(wrong.status(), Status::Unauthorized);

        let response = client
            .post("/api/v1/operators/login")
            .header(ContentType::Form)
            .body("email=paulo@example.com&password=segredo1")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let owner = Operator::id_for_email("paulo@example.com");
        let me = client
            .get("/api/v1/operators/me")
            .cookie(testing::auth_cookie(owner))
            .dispatch()
            .await;
        assert_eq!(me.status(), Status::Ok);
        let body: OperatorResponse = me.into_json().await.expect("invalid response json");
        assert_eq!(body.id, owner);
    }

    #[rocket::async_test]
    async fn me_requires_auth() {
        let client = testing::client().await;
        let response = client.get("/api/v1/operators/me").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
