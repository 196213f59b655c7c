use rocket::serde::json::Json;
use uuid::Uuid;

use crate::context::OperatorContext;
use crate::data::church::{Church, Congregation, EstablishmentForm, EstablishmentRef};
use crate::data::store::{delete_congregation_cascade, list_establishments};
use crate::resp::problem::problems::{conflict, not_found};
use crate::resp::problem::Problem;
use crate::util::compare_names;

/// The operator's headquarters church
#[utoipa::path(
    responses(
        (status = 200, description = "Headquarters church", body = Church),
        (status = 404, description = "No church registered yet"),
    ),
    security(("jwt" = []))
)]
#[get("/church")]
#[tracing::instrument]
pub async fn church_get(ctx: OperatorContext<'_>) -> Result<Option<Json<Church>>, Problem> {
    let church = ctx.run(ctx.store.get_church(ctx.owner)).await?;
    Ok(church.map(Json))
}

/// Register or update the headquarters church
#[utoipa::path(
    request_body = EstablishmentForm,
    responses(
        (status = 200, description = "Stored church", body = Church),
        (status = 400, description = "Invalid form field", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/church", format = "application/json", data = "<form>")]
#[tracing::instrument]
pub async fn church_put(
    form: Json<EstablishmentForm>,
    ctx: OperatorContext<'_>,
) -> Result<Json<Church>, Problem> {
    let form = form.into_inner().validate()?;
    let existing = ctx.run(ctx.store.get_church(ctx.owner)).await?;
    let renamed = existing.as_ref().map_or(false, |c| c.name != form.name);

    let church = form.into_church(ctx.owner, existing);
    ctx.run(ctx.store.save_church(&church)).await?;

    if renamed {
        ctx.run(ctx.store.rename_establishment(ctx.owner, &church.establishment()))
            .await?;
    }

    Ok(Json(church))
}

/// Headquarters and congregations, headquarters first
#[utoipa::path(
    responses((status = 200, description = "Establishments", body = Vec<EstablishmentRef>)),
    security(("jwt" = []))
)]
#[get("/establishments")]
#[tracing::instrument]
pub async fn establishment_list(
    ctx: OperatorContext<'_>,
) -> Result<Json<Vec<EstablishmentRef>>, Problem> {
    Ok(Json(
        ctx.run(list_establishments(ctx.store, ctx.owner)).await?,
    ))
}

#[utoipa::path(
    responses((status = 200, description = "Congregations by name", body = Vec<Congregation>)),
    security(("jwt" = []))
)]
#[get("/congregations")]
#[tracing::instrument]
pub async fn congregation_list(
    ctx: OperatorContext<'_>,
) -> Result<Json<Vec<Congregation>>, Problem> {
    let mut congregations = ctx.run(ctx.store.list_congregations(ctx.owner)).await?;
    congregations.sort_by(|a, b| compare_names(&a.name, &b.name));
    Ok(Json(congregations))
}

/// Register a congregation under the headquarters church
#[utoipa::path(
    request_body = EstablishmentForm,
    responses(
        (status = 200, description = "Stored congregation", body = Congregation),
        (status = 400, description = "Invalid form field", body = Problem),
        (status = 409, description = "Headquarters not registered yet", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/congregations", format = "application/json", data = "<form>")]
#[tracing::instrument]
pub async fn congregation_create(
    form: Json<EstablishmentForm>,
    ctx: OperatorContext<'_>,
) -> Result<Json<Congregation>, Problem> {
    let form = form.into_inner().validate()?;
    let church = ctx
        .run(ctx.store.get_church(ctx.owner))
        .await?
        .ok_or_else(|| conflict("Register the headquarters church first."))?;

    let congregation = form.into_congregation(&church);
    ctx.run(ctx.store.save_congregation(&congregation)).await?;
    Ok(Json(congregation))
}

#[utoipa::path(
    params(("id", description = "congregation ID")),
    responses(
        (status = 200, description = "Congregation", body = Congregation),
        (status = 404, description = "Congregation doesn't exist"),
    ),
    security(("jwt" = []))
)]
#[get("/congregations/<id>")]
#[tracing::instrument]
pub async fn congregation_get(
    id: Uuid,
    ctx: OperatorContext<'_>,
) -> Result<Option<Json<Congregation>>, Problem> {
    let congregation = ctx.run(ctx.store.get_congregation(ctx.owner, id)).await?;
    Ok(congregation.map(Json))
}

#[utoipa::path(
    params(("id", description = "congregation ID")),
    request_body = EstablishmentForm,
    responses(
        (status = 200, description = "Updated congregation", body = Congregation),
        (status = 404, description = "Congregation doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/congregations/<id>", format = "application/json", data = "<form>")]
#[tracing::instrument]
pub async fn congregation_update(
    id: Uuid,
    form: Json<EstablishmentForm>,
    ctx: OperatorContext<'_>,
) -> Result<Json<Congregation>, Problem> {
    let form = form.into_inner().validate()?;
    let existing = ctx
        .run(ctx.store.get_congregation(ctx.owner, id))
        .await?
        .ok_or_else(|| not_found("Congregation", id))?;
    let renamed = existing.name != form.name;

    let congregation = form.apply_to(existing);
    ctx.run(ctx.store.save_congregation(&congregation)).await?;

    if renamed {
        ctx.run(
            ctx.store
                .rename_establishment(ctx.owner, &congregation.establishment()),
        )
        .await?;
    }

    Ok(Json(congregation))
}

/// Delete a congregation together with its classes
#[utoipa::path(
    params(("id", description = "congregation ID")),
    responses(
        (status = 200, description = "ID of the removed congregation", body = String),
        (status = 404, description = "Congregation doesn't exist"),
    ),
    security(("jwt" = []))
)]
#[delete("/congregations/<id>")]
#[tracing::instrument]
pub async fn congregation_delete(
    id: Uuid,
    ctx: OperatorContext<'_>,
) -> Result<Option<String>, Problem> {
    let removed = ctx
        .run(delete_congregation_cascade(ctx.store, ctx.owner, id))
        .await?;
    Ok(removed.then(|| id.to_string()))
}

#[cfg(test)]
mod church_endpoints {
    use rocket::http::{ContentType, Status};
    use serde_json::json;
    use uuid::Uuid;

    use crate::data::church::{Church, Congregation, EstablishmentRef};
    use crate::data::class::{AgeGroup, Class};
    use crate::route::testing;

    fn form(name: &str) -> String {
        json!({ "name": name, "address": "Rua A, 10", "city": "Campinas", "state": "SP" })
            .to_string()
    }

    #[rocket::async_test]
    async fn church_is_registered_once() {
        let client = testing::client().await;
        let owner = Uuid::new_v4();

        let missing = client
            .get("/api/v1/church")
            .cookie(testing::auth_cookie(owner))
            .dispatch()
            .await;
        assert_eq!(missing.status(), Status::NotFound);

        let created: Church = client
            .put("/api/v1/church")
            .cookie(testing::auth_cookie(owner))
            .header(ContentType::JSON)
            .body(form("Igreja Central"))
            .dispatch()
            .await
            .into_json()
            .await
            .expect("invalid response json");

        let updated: Church = client
            .put("/api/v1/church")
            .cookie(testing::auth_cookie(owner))
            .header(ContentType::JSON)
            .body(form("Igreja Nova"))
            .dispatch()
            .await
            .into_json()
            .await
            .expect("invalid response json");

        assert_eq!(created.id, updated.id);
        assert_eq!(updated.name, "Igreja Nova");
    }

    #[rocket::async_test]
    async fn invalid_form_is_rejected() {
        let client = testing::client().await;
        let response = client
            .put("/api/v1/church")
            .cookie(testing::auth_cookie(Uuid::new_v4()))
            .header(ContentType::JSON)
            .body(json!({ "name": "", "address": "x", "city": "y", "state": "SP" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn congregations_need_headquarters() {
        let client = testing::client().await;
        let owner = Uuid::new_v4();

        let orphan = client
            .post("/api/v1/congregations")
            .cookie(testing::auth_cookie(owner))
            .header(ContentType::JSON)
            .body(form("Vila Nova"))
            .dispatch()
            .await;
        assert_eq!(orphan.status(), Status::Conflict);

        client
            .put("/api/v1/church")
            .cookie(testing::auth_cookie(owner))
            .header(ContentType::JSON)
            .body(form("Sede"))
            .dispatch()
            .await;
        for name in ["Vila Nova", "Alto da Serra"] {
            let response = client
                .post("/api/v1/congregations")
                .cookie(testing::auth_cookie(owner))
                .header(ContentType::JSON)
                .body(form(name))
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::Ok);
        }

        let establishments: Vec<EstablishmentRef> = client
            .get("/api/v1/establishments")
            .cookie(testing::auth_cookie(owner))
            .dispatch()
            .await
            .into_json()
            .await
            .expect("invalid response json");
        let names: Vec<_> = establishments.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Sede", "Alto da Serra", "Vila Nova"]);
    }

    #[rocket::async_test]
    async fn deleting_congregation_removes_its_classes() {
        let client = testing::client().await;
        let store = testing::store(&client);
        let owner = Uuid::new_v4();

        client
            .put("/api/v1/church")
            .cookie(testing::auth_cookie(owner))
            .header(ContentType::JSON)
            .body(form("Sede"))
            .dispatch()
            .await;
        let congregation: Congregation = client
            .post("/api/v1/congregations")
            .cookie(testing::auth_cookie(owner))
            .header(ContentType::JSON)
            .body(form("Vila Nova"))
            .dispatch()
            .await
            .into_json()
            .await
            .expect("invalid response json");

        let class = Class::new(owner, congregation.establishment(), "Jovens", AgeGroup::Youth);
        store.save_class(&class).await.unwrap();

        let response = client
            .delete(format!("/api/v1/congregations/{}", congregation.id))
            .cookie(testing::auth_cookie(owner))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert!(store.get_class(owner, class.id).await.unwrap().is_none());

        let again = client
            .delete(format!("/api/v1/congregations/{}", congregation.id))
            .cookie(testing::auth_cookie(owner))
            .dispatch()
            .await;
        assert_eq!(again.status(), Status::NotFound);
    }
}
