use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::context::OperatorContext;
use crate::currency::{format_currency_br, parse_currency_br};
use crate::resp::problem::problems::not_found;
use crate::resp::problem::Problem;
use crate::wizard::picker::load_picker;
use crate::wizard::registry::{SessionRegistry, SharedWizard};
use crate::wizard::{AttendanceWizard, ClassGroup, SummaryField, SummaryFields, WizardView};

fn session(
    sessions: &SessionRegistry,
    ctx: &OperatorContext<'_>,
    id: Uuid,
) -> Result<SharedWizard, Problem> {
    sessions
        .get(ctx.owner, id)
        .ok_or_else(|| not_found("Attendance session", id))
}

/// Classes attendance can be taken for in a lesson
#[utoipa::path(
    params(("id", description = "lesson ID")),
    responses(
        (status = 200, description = "Classes grouped by establishment", body = Vec<ClassGroup>),
        (status = 404, description = "Lesson doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/lessons/<id>/classes")]
#[tracing::instrument]
pub async fn lesson_classes(
    id: Uuid,
    ctx: OperatorContext<'_>,
) -> Result<Json<Vec<ClassGroup>>, Problem> {
    let picker = load_picker(&ctx, id).await?;
    Ok(Json(picker.groups))
}

/// Start taking attendance for a lesson
#[utoipa::path(
    params(("id", description = "lesson ID")),
    responses(
        (status = 200, description = "New session, picking a class", body = WizardView),
        (status = 404, description = "Lesson doesn't exist", body = Problem),
        (status = 409, description = "Lesson is finalized", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/lessons/<id>/attendance")]
#[tracing::instrument(skip(sessions))]
pub async fn attendance_open(
    id: Uuid,
    ctx: OperatorContext<'_>,
    sessions: &State<SessionRegistry>,
) -> Result<Json<WizardView>, Problem> {
    let mut wizard = AttendanceWizard::new();
    wizard.open(&ctx, id).await?;

    let view = wizard.view();
    sessions.insert(ctx.owner, wizard);
    Ok(Json(view))
}

#[utoipa::path(
    params(("session", description = "attendance session ID")),
    responses(
        (status = 200, description = "Session state", body = WizardView),
        (status = 404, description = "Session doesn't exist or expired", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/attendance/<session>")]
#[tracing::instrument(skip(sessions))]
pub async fn attendance_get(
    session: Uuid,
    ctx: OperatorContext<'_>,
    sessions: &State<SessionRegistry>,
) -> Result<Json<WizardView>, Problem> {
    let wizard = self::session(sessions, &ctx, session)?;
    let view = wizard.lock().await.view();
    Ok(Json(view))
}

/// Close a session, discarding anything not submitted
#[utoipa::path(
    params(("session", description = "attendance session ID")),
    responses(
        (status = 200, description = "ID of the closed session", body = String),
        (status = 404, description = "Session doesn't exist or expired"),
    ),
    security(("jwt" = []))
)]
#[delete("/attendance/<session>")]
#[tracing::instrument(skip(sessions))]
pub async fn attendance_close(
    session: Uuid,
    ctx: OperatorContext<'_>,
    sessions: &State<SessionRegistry>,
) -> Option<String> {
    let wizard = sessions.get(ctx.owner, session)?;
    wizard.lock().await.close();
    sessions
        .remove(ctx.owner, session)
        .then(|| session.to_string())
}

/// Pick the class to take attendance for and load its roster
#[utoipa::path(
    params(
        ("session", description = "attendance session ID"),
        ("class_id", description = "class ID"),
    ),
    responses(
        (status = 200, description = "Roster ready for marking", body = WizardView),
        (status = 404, description = "Session or class doesn't exist", body = Problem),
        (status = 409, description = "Lesson was finalized", body = Problem),
        (status = 503, description = "Roster couldn't be loaded", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/attendance/<session>/class/<class_id>")]
#[tracing::instrument(skip(sessions))]
pub async fn attendance_select_class(
    session: Uuid,
    class_id: Uuid,
    ctx: OperatorContext<'_>,
    sessions: &State<SessionRegistry>,
) -> Result<Json<WizardView>, Problem> {
    let wizard = self::session(sessions, &ctx, session)?;
    let mut wizard = wizard.lock().await;
    wizard.select_class(&ctx, class_id).await?;
    Ok(Json(wizard.view()))
}

/// Flip one member between present and absent
#[utoipa::path(
    params(
        ("session", description = "attendance session ID"),
        ("person_id", description = "person ID"),
    ),
    responses(
        (status = 200, description = "Updated roster", body = WizardView),
        (status = 404, description = "Session or person doesn't exist", body = Problem),
        (status = 409, description = "Not marking attendance", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/attendance/<session>/toggle/<person_id>")]
#[tracing::instrument(skip(sessions))]
pub async fn attendance_toggle(
    session: Uuid,
    person_id: Uuid,
    ctx: OperatorContext<'_>,
    sessions: &State<SessionRegistry>,
) -> Result<Json<WizardView>, Problem> {
    let wizard = self::session(sessions, &ctx, session)?;
    let mut wizard = wizard.lock().await;
    wizard.toggle(person_id)?;
    Ok(Json(wizard.view()))
}

/// Move from marking to the summary form
#[utoipa::path(
    params(("session", description = "attendance session ID")),
    responses(
        (status = 200, description = "Summary form", body = WizardView),
        (status = 409, description = "Class has no members", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/attendance/<session>/advance")]
#[tracing::instrument(skip(sessions))]
pub async fn attendance_advance(
    session: Uuid,
    ctx: OperatorContext<'_>,
    sessions: &State<SessionRegistry>,
) -> Result<Json<WizardView>, Problem> {
    let wizard = self::session(sessions, &ctx, session)?;
    let mut wizard = wizard.lock().await;
    wizard.advance()?;
    Ok(Json(wizard.view()))
}

/// Replace the summary inputs; the offering is reformatted as typed
#[utoipa::path(
    params(("session", description = "attendance session ID")),
    request_body = SummaryFields,
    responses(
        (status = 200, description = "Summary form", body = WizardView),
        (status = 409, description = "Not in the summary form", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/attendance/<session>/summary", format = "application/json", data = "<fields>")]
#[tracing::instrument(skip(sessions))]
pub async fn attendance_summary(
    session: Uuid,
    fields: Json<SummaryFields>,
    ctx: OperatorContext<'_>,
    sessions: &State<SessionRegistry>,
) -> Result<Json<WizardView>, Problem> {
    let wizard = self::session(sessions, &ctx, session)?;
    let mut wizard = wizard.lock().await;

    let fields = fields.into_inner();
    wizard.set_field(SummaryField::BibleCount, &fields.bible_count)?;
    wizard.set_field(SummaryField::MagazineCount, &fields.magazine_count)?;
    wizard.set_field(SummaryField::VisitorCount, &fields.visitor_count)?;
    wizard.set_field(SummaryField::OfferingAmount, &fields.offering_amount)?;

    Ok(Json(wizard.view()))
}

/// Record the attendance report
#[utoipa::path(
    params(("session", description = "attendance session ID")),
    responses(
        (status = 200, description = "Report recorded", body = WizardView),
        (status = 404, description = "Lesson or class was removed", body = Problem),
        (status = 409, description = "Not in the summary form or lesson finalized", body = Problem),
        (
            status = 503,
            description = "Report couldn't be stored, retry is possible",
            body = Problem
        ),
    ),
    security(("jwt" = []))
)]
#[post("/attendance/<session>/submit")]
#[tracing::instrument(skip(sessions))]
pub async fn attendance_submit(
    session: Uuid,
    ctx: OperatorContext<'_>,
    sessions: &State<SessionRegistry>,
) -> Result<Json<WizardView>, Problem> {
    let wizard = self::session(sessions, &ctx, session)?;
    let mut wizard = wizard.lock().await;
    wizard.submit(&ctx).await?;
    Ok(Json(wizard.view()))
}

/// Go back to the step that failed, keeping what was entered
#[utoipa::path(
    params(("session", description = "attendance session ID")),
    responses(
        (status = 200, description = "Recovered session", body = WizardView),
        (status = 409, description = "Nothing to retry", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/attendance/<session>/retry")]
#[tracing::instrument(skip(sessions))]
pub async fn attendance_retry(
    session: Uuid,
    ctx: OperatorContext<'_>,
    sessions: &State<SessionRegistry>,
) -> Result<Json<WizardView>, Problem> {
    let wizard = self::session(sessions, &ctx, session)?;
    let mut wizard = wizard.lock().await;
    wizard.retry()?;
    Ok(Json(wizard.view()))
}

/// Drop the current class and return to the class list
#[utoipa::path(
    params(("session", description = "attendance session ID")),
    responses(
        (status = 200, description = "Picking a class", body = WizardView),
        (status = 409, description = "Can't cancel at this stage", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/attendance/<session>/cancel")]
#[tracing::instrument(skip(sessions))]
pub async fn attendance_cancel(
    session: Uuid,
    ctx: OperatorContext<'_>,
    sessions: &State<SessionRegistry>,
) -> Result<Json<WizardView>, Problem> {
    let wizard = self::session(sessions, &ctx, session)?;
    let mut wizard = wizard.lock().await;
    wizard.cancel()?;
    Ok(Json(wizard.view()))
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrencyView {
    /// `1.234,56` form, empty when nothing numeric was typed.
    pub formatted: String,
    pub amount: f64,
}

/// Format typed text as BRL and read its amount back
#[utoipa::path(
    params(("value", description = "Text as typed")),
    responses((status = 200, description = "Formatted text", body = CurrencyView))
)]
#[get("/currency/format?<value>")]
#[tracing::instrument]
pub fn currency_format(value: &str) -> Json<CurrencyView> {
    let formatted = format_currency_br(value);
    let amount = parse_currency_br(&formatted);
    Json(CurrencyView { formatted, amount })
}

#[cfg(test)]
mod attendance_endpoints {
    use std::sync::Arc;

    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::{Client, LocalResponse};
    use serde_json::{json, Value};
    use uuid::Uuid;

    use super::CurrencyView;
    use crate::data::memory::MemoryStore;
    use crate::data::report::ReportView;
    use crate::data::store::{ClassStore, LessonStore, PersonStore};
    use crate::route::testing;
    use crate::wizard::tests::{fixture, Fixture};

    async fn seeded(store: &MemoryStore) -> Fixture {
        let f = fixture();
        store.insert_lesson(&f.picker.lesson).await.unwrap();
        store.save_class(&f.class).await.unwrap();
        store.save_class(&f.empty_class).await.unwrap();
        for person in &f.members {
            store.save_person(person).await.unwrap();
        }
        f
    }

    async fn view(response: LocalResponse<'_>) -> Value {
        assert_eq!(response.status(), Status::Ok);
        response.into_json().await.expect("invalid view json")
    }

    async fn open(client: &Client, f: &Fixture) -> Uuid {
        let opened = view(
            client
                .post(format!("/api/v1/lessons/{}/attendance", f.picker.lesson.id))
                .cookie(testing::auth_cookie(f.owner))
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(opened["stage"], "picking");
        opened["sessionId"]
            .as_str()
            .and_then(|id| id.parse().ok())
            .expect("session id missing")
    }

    async fn post<'c>(client: &'c Client, f: &Fixture, path: String) -> LocalResponse<'c> {
        client
            .post(path)
            .cookie(testing::auth_cookie(f.owner))
            .dispatch()
            .await
    }

    async fn step(client: &Client, f: &Fixture, path: String) -> Value {
        view(post(client, f, path).await).await
    }

    async fn summarize(client: &Client, f: &Fixture, session: Uuid) {
        let marking = step(
            client,
            f,
            format!("/api/v1/attendance/{}/class/{}", session, f.class.id),
        )
        .await;
        assert_eq!(marking["stage"], "marking");
        let names: Vec<_> = marking["roster"]
            .as_array()
            .unwrap()
            .iter()
            .map(|line| line["fullName"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Ana", "Bruno", "Carla"]);

        let first = marking["roster"][0]["personId"].as_str().unwrap().to_string();
        let toggled = step(
            client,
            f,
            format!("/api/v1/attendance/{}/toggle/{}", session, first),
        )
        .await;
        assert_eq!(toggled["present"], 1);

        step(client, f, format!("/api/v1/attendance/{}/advance", session)).await;
        let summary = view(
            client
                .put(format!("/api/v1/attendance/{}/summary", session))
                .cookie(testing::auth_cookie(f.owner))
                .header(ContentType::JSON)
                .body(
                    json!({
                        "bibleCount": "4",
                        "magazineCount": "",
                        "visitorCount": "abc",
                        "offeringAmount": "1234,567",
                    })
                    .to_string(),
                )
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(summary["fields"]["offeringAmount"], "1.234,56");
    }

    #[rocket::async_test]
    async fn session_records_report() {
        let store = Arc::new(MemoryStore::default());
        let client = testing::client_with(store.clone()).await;
        let f = seeded(&store).await;

        let session = open(&client, &f).await;
        summarize(&client, &f, session).await;

        let done = step(&client, &f, format!("/api/v1/attendance/{}/submit", session)).await;
        assert_eq!(done["stage"], "done");
        assert_eq!(store.report_count(), 1);

        let reports: Vec<ReportView> = client
            .get(format!("/api/v1/lessons/{}/reports", f.picker.lesson.id))
            .cookie(testing::auth_cookie(f.owner))
            .dispatch()
            .await
            .into_json()
            .await
            .expect("invalid reports json");
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!((report.present, report.absent), (1, 2));
        assert_eq!(report.report.content.bibles_count, 4);
        assert_eq!(report.report.content.magazines_count, 0);
        assert_eq!(report.report.content.visitors_count, 0);
        assert_eq!(report.report.content.offer_amount, 1234.56);
    }

    #[rocket::async_test]
    async fn failed_submit_can_be_retried() {
        let store = Arc::new(MemoryStore::default());
        let client = testing::client_with(store.clone()).await;
        let f = seeded(&store).await;

        let session = open(&client, &f).await;
        summarize(&client, &f, session).await;

        store.set_offline(true);
        let failed = post(&client, &f, format!("/api/v1/attendance/{}/submit", session)).await;
        assert_eq!(failed.status(), Status::ServiceUnavailable);
        let problem: Value = failed.into_json().await.expect("invalid problem json");
        assert_eq!(problem["retryable"], true);
        assert_eq!(store.report_count(), 0);

        let state = view(
            client
                .get(format!("/api/v1/attendance/{}", session))
                .cookie(testing::auth_cookie(f.owner))
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(state["stage"], "failed");
        assert_eq!(state["fields"]["bibleCount"], "4");

        store.set_offline(false);
        let recovered = step(&client, &f, format!("/api/v1/attendance/{}/retry", session)).await;
        assert_eq!(recovered["stage"], "summarizing");
        step(&client, &f, format!("/api/v1/attendance/{}/submit", session)).await;
        assert_eq!(store.report_count(), 1);
    }

    #[rocket::async_test]
    async fn empty_class_cannot_be_marked() {
        let store = Arc::new(MemoryStore::default());
        let client = testing::client_with(store.clone()).await;
        let f = seeded(&store).await;

        let session = open(&client, &f).await;
        let marking = view(
            post(
                &client,
                &f,
                format!("/api/v1/attendance/{}/class/{}", session, f.empty_class.id),
            )
            .await,
        )
        .await;
        assert_eq!(marking["canAdvance"], false);

        let response = post(&client, &f, format!("/api/v1/attendance/{}/advance", session)).await;
        assert_eq!(response.status(), Status::Conflict);
    }

    #[rocket::async_test]
    async fn finalizing_closes_open_sessions() {
        let store = Arc::new(MemoryStore::default());
        let client = testing::client_with(store.clone()).await;
        let f = seeded(&store).await;

        let picking = open(&client, &f).await;
        let summarizing = open(&client, &f).await;
        summarize(&client, &f, summarizing).await;

        let lesson = f.picker.lesson.id;
        step(&client, &f, format!("/api/v1/lessons/{}/finalize", lesson)).await;

        let select = format!("/api/v1/attendance/{}/class/{}", picking, f.class.id);
        let response = post(&client, &f, select).await;
        assert_eq!(response.status(), Status::Conflict);

        let submit = format!("/api/v1/attendance/{}/submit", summarizing);
        let response = post(&client, &f, submit).await;
        assert_eq!(response.status(), Status::Conflict);
        assert_eq!(store.report_count(), 0);
    }

    #[rocket::async_test]
    async fn removed_class_cannot_be_selected() {
        let store = Arc::new(MemoryStore::default());
        let client = testing::client_with(store.clone()).await;
        let f = seeded(&store).await;
        let session = open(&client, &f).await;

        let removed = client
            .delete(format!("/api/v1/classes/{}", f.class.id))
            .cookie(testing::auth_cookie(f.owner))
            .dispatch()
            .await;
        assert_eq!(removed.status(), Status::Ok);

        let select = format!("/api/v1/attendance/{}/class/{}", session, f.class.id);
        let response = post(&client, &f, select).await;
        assert_eq!(response.status(), Status::NotFound);

        let state = view(
            client
                .get(format!("/api/v1/attendance/{}", session))
                .cookie(testing::auth_cookie(f.owner))
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(state["stage"], "picking");
    }

    #[rocket::async_test]
    async fn sessions_are_private() {
        let store = Arc::new(MemoryStore::default());
        let client = testing::client_with(store.clone()).await;
        let f = seeded(&store).await;
        let session = open(&client, &f).await;

        let response = client
            .get(format!("/api/v1/attendance/{}", session))
            .cookie(testing::auth_cookie(Uuid::new_v4()))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        let closed = client
            .delete(format!("/api/v1/attendance/{}", session))
            .cookie(testing::auth_cookie(f.owner))
            .dispatch()
            .await;
        assert_eq!(closed.status(), Status::Ok);
    }

    #[rocket::async_test]
    async fn currency_is_formatted() {
        let client = testing::client().await;
        let formatted: CurrencyView = client
            .get("/api/v1/currency/format?value=R%24%201234")
            .dispatch()
            .await
            .into_json()
            .await
            .expect("invalid currency json");
        assert_eq!(formatted.formatted, "1.234");
        assert_eq!(formatted.amount, 1234.0);
    }
}
