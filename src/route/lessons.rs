use chrono::Utc;
use chrono_tz::Tz;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::config::Config;
use crate::context::OperatorContext;
use crate::data::lesson::{LessonForm, LessonSchedule, LessonStatus, LessonView};
use crate::data::report::ReportView;
use crate::data::store::{delete_lesson_cascade, find_establishment};
use crate::resp::problem::problems::{conflict, not_found};
use crate::resp::problem::Problem;
use crate::util::compare_names;

fn zone(config: &Config) -> Result<Tz, Problem> {
    config.time_zone().map_err(|e| {
        tracing::error!("{}", e);
        Problem::new_untyped(Status::InternalServerError, "Server time zone is misconfigured.")
    })
}

/// Scheduled and finalized lessons
#[utoipa::path(
    responses((status = 200, description = "Lesson schedule", body = LessonSchedule)),
    security(("jwt" = []))
)]
#[get("/lessons")]
#[tracing::instrument(skip(config))]
pub async fn lesson_list(
    ctx: OperatorContext<'_>,
    config: &State<Config>,
) -> Result<Json<LessonSchedule>, Problem> {
    let tz = zone(config)?;
    let lessons = ctx.run(ctx.store.query_lessons(ctx.owner)).await?;
    Ok(Json(LessonSchedule::build(lessons, Utc::now(), tz)))
}

/// Schedule a lesson
///
/// Only one lesson may exist for a given number, quarter and year.
#[utoipa::path(
    request_body = LessonForm,
    responses(
        (status = 200, description = "Scheduled lesson", body = LessonView),
        (status = 400, description = "Invalid form field", body = Problem),
        (status = 404, description = "Establishment doesn't exist", body = Problem),
        (status = 409, description = "Lesson already scheduled", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/lessons", format = "application/json", data = "<form>")]
#[tracing::instrument(skip(config))]
pub async fn lesson_create(
    form: Json<LessonForm>,
    ctx: OperatorContext<'_>,
    config: &State<Config>,
) -> Result<Json<LessonView>, Problem> {
    let tz = zone(config)?;
    let now = Utc::now();
    let time = form.validate(now.with_timezone(&tz).naive_local())?;

    let establishment = match form.establishment_id {
        Some(id) => Some(
            ctx.run(find_establishment(ctx.store, ctx.owner, id))
                .await?
                .ok_or_else(|| not_found("Establishment", id))?,
        ),
        None => None,
    };

    let lesson = form.into_inner().into_lesson(ctx.owner, time, establishment);
    ctx.run(ctx.store.insert_lesson(&lesson)).await?;
    tracing::info!(
        "Lesson {}/{}/{} scheduled for {}.",
        lesson.number,
        lesson.quarter,
        lesson.year,
        lesson.date
    );

    Ok(Json(LessonView::new(lesson, now, tz)))
}

#[utoipa::path(
    params(("id", description = "lesson ID")),
    responses(
        (status = 200, description = "Lesson", body = LessonView),
        (status = 404, description = "Lesson doesn't exist"),
    ),
    security(("jwt" = []))
)]
#[get("/lessons/<id>")]
#[tracing::instrument(skip(config))]
pub async fn lesson_get(
    id: Uuid,
    ctx: OperatorContext<'_>,
    config: &State<Config>,
) -> Result<Option<Json<LessonView>>, Problem> {
    let tz = zone(config)?;
    let lesson = ctx.run(ctx.store.get_lesson(ctx.owner, id)).await?;
    Ok(lesson.map(|it| Json(LessonView::new(it, Utc::now(), tz))))
}

/// Delete a lesson that wasn't finalized, with its attendance reports
#[utoipa::path(
    params(("id", description = "lesson ID")),
    responses(
        (status = 200, description = "ID of the removed lesson", body = String),
        (status = 404, description = "Lesson doesn't exist"),
        (status = 409, description = "Lesson is finalized", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/lessons/<id>")]
#[tracing::instrument]
pub async fn lesson_delete(id: Uuid, ctx: OperatorContext<'_>) -> Result<Option<String>, Problem> {
    let lesson = match ctx.run(ctx.store.get_lesson(ctx.owner, id)).await? {
        Some(it) => it,
        None => return Ok(None),
    };
    if lesson.is_completed() {
        return Err(conflict("Finalized lessons can't be deleted."));
    }

    let removed = ctx
        .run(delete_lesson_cascade(ctx.store, ctx.owner, id))
        .await?;
    Ok(removed.then(|| id.to_string()))
}

/// Mark a lesson as completed; attendance can no longer be taken for it
#[utoipa::path(
    params(("id", description = "lesson ID")),
    responses(
        (status = 200, description = "Finalized lesson", body = LessonView),
        (status = 404, description = "Lesson doesn't exist", body = Problem),
        (status = 409, description = "Lesson already finalized", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/lessons/<id>/finalize")]
#[tracing::instrument(skip(config))]
pub async fn lesson_finalize(
    id: Uuid,
    ctx: OperatorContext<'_>,
    config: &State<Config>,
) -> Result<Json<LessonView>, Problem> {
    let tz = zone(config)?;
    let mut lesson = ctx
        .run(ctx.store.get_lesson(ctx.owner, id))
        .await?
        .ok_or_else(|| not_found("Lesson", id))?;
    if lesson.is_completed() {
        return Err(conflict("Lesson is already finalized."));
    }

    if !ctx
        .run(ctx.store.set_lesson_status(ctx.owner, id, LessonStatus::Completed))
        .await?
    {
        return Err(not_found("Lesson", id));
    }
    lesson.status = LessonStatus::Completed;
    tracing::info!("Lesson {} finalized.", id);

    Ok(Json(LessonView::new(lesson, Utc::now(), tz)))
}

/// Attendance reports recorded for a lesson, by class name
#[utoipa::path(
    params(("id", description = "lesson ID")),
    responses(
        (status = 200, description = "Reports", body = Vec<ReportView>),
        (status = 404, description = "Lesson doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/lessons/<id>/reports")]
#[tracing::instrument]
pub async fn lesson_reports(
    id: Uuid,
    ctx: OperatorContext<'_>,
) -> Result<Json<Vec<ReportView>>, Problem> {
    ctx.run(ctx.store.get_lesson(ctx.owner, id))
        .await?
        .ok_or_else(|| not_found("Lesson", id))?;

    let mut reports = ctx
        .run(ctx.store.query_reports_by_lesson(ctx.owner, id))
        .await?;
    reports.sort_by(|a, b| {
        compare_names(&a.content.class.name, &b.content.class.name)
            .then_with(|| a.recorded_at.cmp(&b.recorded_at))
    });

    Ok(Json(reports.into_iter().map(ReportView::from).collect()))
}
