use std::collections::HashMap;

use rocket::serde::json::Json;
use uuid::Uuid;

use crate::context::OperatorContext;
use crate::data::class::{Class, ClassForm, ClassOverview};
use crate::data::person::{ClassMembers, Person, PersonForm};
use crate::data::store::{delete_class_cascade, find_establishment};
use crate::resp::problem::problems::not_found;
use crate::resp::problem::Problem;
use crate::wizard::picker::{group_classes, ClassGroup};

/// All classes grouped by establishment
#[utoipa::path(
    responses((status = 200, description = "Classes by establishment", body = Vec<ClassGroup>)),
    security(("jwt" = []))
)]
#[get("/classes")]
#[tracing::instrument]
pub async fn class_list(ctx: OperatorContext<'_>) -> Result<Json<Vec<ClassGroup>>, Problem> {
    let classes = ctx.run(ctx.store.query_classes(ctx.owner, None)).await?;
    Ok(Json(group_classes(classes)))
}

/// Classes with their student and teacher counts
#[utoipa::path(
    responses((status = 200, description = "Member counts per class", body = Vec<ClassOverview>)),
    security(("jwt" = []))
)]
#[get("/classes/overview")]
#[tracing::instrument]
pub async fn class_overview(
    ctx: OperatorContext<'_>,
) -> Result<Json<Vec<ClassOverview>>, Problem> {
    let classes = ctx.run(ctx.store.query_classes(ctx.owner, None)).await?;
    let persons = ctx.run(ctx.store.query_persons(ctx.owner)).await?;

    let mut counts: HashMap<Uuid, (usize, usize)> = HashMap::new();
    for person in persons {
        let entry = counts.entry(person.class_id).or_default();
        if person.is_teacher {
            entry.1 += 1;
        } else {
            entry.0 += 1;
        }
    }

    let overview = group_classes(classes)
        .into_iter()
        .flat_map(|g| g.classes)
        .map(|class| {
            let (student_count, teacher_count) = counts.get(&class.id).copied().unwrap_or_default();
            ClassOverview {
                class,
                student_count,
                teacher_count,
            }
        })
        .collect();

    Ok(Json(overview))
}

#[utoipa::path(
    params(("id", description = "class ID")),
    responses(
        (status = 200, description = "Class", body = Class),
        (status = 404, description = "Class doesn't exist"),
    ),
    security(("jwt" = []))
)]
#[get("/classes/<id>")]
#[tracing::instrument]
pub async fn class_get(id: Uuid, ctx: OperatorContext<'_>) -> Result<Option<Json<Class>>, Problem> {
    let class = ctx.run(ctx.store.get_class(ctx.owner, id)).await?;
    Ok(class.map(Json))
}

#[utoipa::path(
    request_body = ClassForm,
    responses(
        (status = 200, description = "Stored class", body = Class),
        (status = 400, description = "Invalid form field", body = Problem),
        (status = 404, description = "Establishment doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/classes", format = "application/json", data = "<form>")]
#[tracing::instrument]
pub async fn class_create(
    form: Json<ClassForm>,
    ctx: OperatorContext<'_>,
) -> Result<Json<Class>, Problem> {
    form.validate()?;
    let establishment = ctx
        .run(find_establishment(ctx.store, ctx.owner, form.establishment_id))
        .await?
        .ok_or_else(|| not_found("Establishment", form.establishment_id))?;

    let form = form.into_inner();
    let class = Class::new(ctx.owner, establishment, form.name.trim(), form.age_group);
    ctx.run(ctx.store.save_class(&class)).await?;
    tracing::info!("Class {} created.", class.id);

    Ok(Json(class))
}

#[utoipa::path(
    params(("id", description = "class ID")),
    request_body = ClassForm,
    responses(
        (status = 200, description = "Updated class", body = Class),
        (status = 404, description = "Class or establishment doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/classes/<id>", format = "application/json", data = "<form>")]
#[tracing::instrument]
pub async fn class_update(
    id: Uuid,
    form: Json<ClassForm>,
    ctx: OperatorContext<'_>,
) -> Result<Json<Class>, Problem> {
    form.validate()?;
    let existing = ctx
        .run(ctx.store.get_class(ctx.owner, id))
        .await?
        .ok_or_else(|| not_found("Class", id))?;
    let establishment = ctx
        .run(find_establishment(ctx.store, ctx.owner, form.establishment_id))
        .await?
        .ok_or_else(|| not_found("Establishment", form.establishment_id))?;

    let class = form.into_inner().apply_to(existing, establishment);
    ctx.run(ctx.store.save_class(&class)).await?;

    Ok(Json(class))
}

/// Delete a class with its members and attendance reports
#[utoipa::path(
    params(("id", description = "class ID")),
    responses(
        (status = 200, description = "ID of the removed class", body = String),
        (status = 404, description = "Class doesn't exist"),
    ),
    security(("jwt" = []))
)]
#[delete("/classes/<id>")]
#[tracing::instrument]
pub async fn class_delete(id: Uuid, ctx: OperatorContext<'_>) -> Result<Option<String>, Problem> {
    let removed = ctx
        .run(delete_class_cascade(ctx.store, ctx.owner, id))
        .await?;
    Ok(removed.then(|| id.to_string()))
}

/// Teachers and students of a class, by name
#[utoipa::path(
    params(("id", description = "class ID")),
    responses(
        (status = 200, description = "Class members", body = ClassMembers),
        (status = 404, description = "Class doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/classes/<id>/persons")]
#[tracing::instrument]
pub async fn class_members(
    id: Uuid,
    ctx: OperatorContext<'_>,
) -> Result<Json<ClassMembers>, Problem> {
    ctx.run(ctx.store.get_class(ctx.owner, id))
        .await?
        .ok_or_else(|| not_found("Class", id))?;

    let persons = ctx
        .run(ctx.store.query_persons_by_class(ctx.owner, id))
        .await?;
    Ok(Json(ClassMembers::split(persons)))
}

#[utoipa::path(
    params(("id", description = "person ID")),
    responses(
        (status = 200, description = "Person", body = Person),
        (status = 404, description = "Person doesn't exist"),
    ),
    security(("jwt" = []))
)]
#[get("/persons/<id>")]
#[tracing::instrument]
pub async fn person_get(
    id: Uuid,
    ctx: OperatorContext<'_>,
) -> Result<Option<Json<Person>>, Problem> {
    let person = ctx.run(ctx.store.get_person(ctx.owner, id)).await?;
    Ok(person.map(Json))
}

/// Enroll a student or teacher
#[utoipa::path(
    request_body = PersonForm,
    responses(
        (status = 200, description = "Stored person", body = Person),
        (status = 400, description = "Invalid form field", body = Problem),
        (status = 404, description = "Class doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/persons", format = "application/json", data = "<form>")]
#[tracing::instrument]
pub async fn person_create(
    form: Json<PersonForm>,
    ctx: OperatorContext<'_>,
) -> Result<Json<Person>, Problem> {
    form.validate()?;
    ctx.run(ctx.store.get_class(ctx.owner, form.class_id))
        .await?
        .ok_or_else(|| not_found("Class", form.class_id))?;

    let person = form.into_inner().into_person(ctx.owner);
    ctx.run(ctx.store.save_person(&person)).await?;

    Ok(Json(person))
}

#[utoipa::path(
    params(("id", description = "person ID")),
    request_body = PersonForm,
    responses(
        (status = 200, description = "Updated person", body = Person),
        (status = 404, description = "Person or class doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/persons/<id>", format = "application/json", data = "<form>")]
#[tracing::instrument]
pub async fn person_update(
    id: Uuid,
    form: Json<PersonForm>,
    ctx: OperatorContext<'_>,
) -> Result<Json<Person>, Problem> {
    form.validate()?;
    let existing = ctx
        .run(ctx.store.get_person(ctx.owner, id))
        .await?
        .ok_or_else(|| not_found("Person", id))?;
    ctx.run(ctx.store.get_class(ctx.owner, form.class_id))
        .await?
        .ok_or_else(|| not_found("Class", form.class_id))?;

    let mut person = form.into_inner().apply_to(existing);
    person.updated_at = Some(chrono::Utc::now());
    ctx.run(ctx.store.save_person(&person)).await?;

    Ok(Json(person))
}

#[utoipa::path(
    params(("id", description = "person ID")),
    responses(
        (status = 200, description = "ID of the removed person", body = String),
        (status = 404, description = "Person doesn't exist"),
    ),
    security(("jwt" = []))
)]
#[delete("/persons/<id>")]
#[tracing::instrument]
pub async fn person_delete(id: Uuid, ctx: OperatorContext<'_>) -> Result<Option<String>, Problem> {
    let removed = ctx.run(ctx.store.delete_person(ctx.owner, id)).await?;
    Ok(removed.then(|| id.to_string()))
}

#[cfg(test)]
mod class_endpoints {
    use rocket::http::{ContentType, Status};
    use serde_json::json;
    use uuid::Uuid;

    use crate::data::church::Church;
    use crate::data::class::{Class, ClassOverview};
    use crate::data::person::{ClassMembers, Person};
    use crate::route::testing;
    use crate::wizard::picker::ClassGroup;

    async fn church(client: &rocket::local::asynchronous::Client, owner: Uuid) -> Church {
        client
            .put("/api/v1/church")
            .cookie(testing::auth_cookie(owner))
            .header(ContentType::JSON)
            .body(
                json!({ "name": "Sede", "address": "Rua A", "city": "Campinas", "state": "SP" })
                    .to_string(),
            )
            .dispatch()
            .await
            .into_json()
            .await
            .expect("invalid church json")
    }

    async fn class(
        client: &rocket::local::asynchronous::Client,
        owner: Uuid,
        establishment: Uuid,
        name: &str,
    ) -> Class {
        client
            .post("/api/v1/classes")
            .cookie(testing::auth_cookie(owner))
            .header(ContentType::JSON)
            .body(
                json!({ "establishmentId": establishment, "name": name, "ageGroup": "adult" })
                    .to_string(),
            )
            .dispatch()
            .await
            .into_json()
            .await
            .expect("invalid class json")
    }

    async fn person(
        client: &rocket::local::asynchronous::Client,
        owner: Uuid,
        class_id: Uuid,
        name: &str,
        is_teacher: bool,
    ) -> Person {
        client
            .post("/api/v1/persons")
            .cookie(testing::auth_cookie(owner))
            .header(ContentType::JSON)
            .body(
                json!({ "fullName": name, "age": 30, "classId": class_id, "isTeacher": is_teacher })
                    .to_string(),
            )
            .dispatch()
            .await
            .into_json()
            .await
            .expect("invalid person json")
    }

    #[rocket::async_test]
    async fn class_needs_known_establishment() {
        let client = testing::client().await;
        let response = client
            .post("/api/v1/classes")
            .cookie(testing::auth_cookie(Uuid::new_v4()))
            .header(ContentType::JSON)
            .body(
                json!({ "establishmentId": Uuid::new_v4(), "name": "Jovens", "ageGroup": "youth" })
                    .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn members_are_split_and_counted() {
        let client = testing::client().await;
        let owner = Uuid::new_v4();
        let hq = church(&client, owner).await;
        let adults = class(&client, owner, hq.id, "Adultos").await;
        class(&client, owner, hq.id, "Jovens").await;

        person(&client, owner, adults.id, "Zé", false).await;
        person(&client, owner, adults.id, "Ana", false).await;
        person(&client, owner, adults.id, "Pr. Paulo", true).await;

        let members: ClassMembers = client
            .get(format!("/api/v1/classes/{}/persons", adults.id))
            .cookie(testing::auth_cookie(owner))
            .dispatch()
            .await
            .into_json()
            .await
            .expect("invalid members json");
        assert_eq!(members.teachers.len(), 1);
        let students: Vec<_> = members.students.iter().map(|p| p.full_name.as_str()).collect();
        assert_eq!(students, vec!["Ana", "Zé"]);

        let overview: Vec<ClassOverview> = client
            .get("/api/v1/classes/overview")
            .cookie(testing::auth_cookie(owner))
            .dispatch()
            .await
            .into_json()
            .await
            .expect("invalid overview json");
        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].class.name, "Adultos");
        assert_eq!((overview[0].student_count, overview[0].teacher_count), (2, 1));
        assert_eq!((overview[1].student_count, overview[1].teacher_count), (0, 0));

        let groups: Vec<ClassGroup> = client
            .get("/api/v1/classes")
            .cookie(testing::auth_cookie(owner))
            .dispatch()
            .await
            .into_json()
            .await
            .expect("invalid groups json");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].classes.len(), 2);
    }

    #[rocket::async_test]
    async fn deleting_class_removes_members() {
        let client = testing::client().await;
        let owner = Uuid::new_v4();
        let hq = church(&client, owner).await;
        let adults = class(&client, owner, hq.id, "Adultos").await;
        let ana = person(&client, owner, adults.id, "Ana", false).await;

        let response = client
            .delete(format!("/api/v1/classes/{}", adults.id))
            .cookie(testing::auth_cookie(owner))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let gone = client
            .get(format!("/api/v1/persons/{}", ana.id))
            .cookie(testing::auth_cookie(owner))
            .dispatch()
            .await;
        assert_eq!(gone.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn classes_of_other_operators_are_hidden() {
        let client = testing::client().await;
        let owner = Uuid::new_v4();
        let hq = church(&client, owner).await;
        let adults = class(&client, owner, hq.id, "Adultos").await;

        let response = client
            .get(format!("/api/v1/classes/{}", adults.id))
            .cookie(testing::auth_cookie(Uuid::new_v4()))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }
}
