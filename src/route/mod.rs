use std::collections::BTreeMap;

use rocket::{Build, Rocket, Route};

pub mod attendance;
pub mod church;
pub mod classes;
pub mod files;
pub mod lessons;
pub mod operators;

use attendance::*;
use church::*;
use classes::*;
use files::*;
use lessons::*;
use operators::*;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::data::{
    church as ch, class as cl, lesson as ls, operator as op, person as pe, report as rp,
};
use crate::resp::{jwt::doc::JWTAuth, problem::Problem};
use crate::wizard as wz;

#[derive(OpenApi)]
#[openapi(
    paths(
        operator_signup,
        operator_login,
        operator_logout,
        operator_me,
        church_get,
        church_put,
        establishment_list,
        congregation_list,
        congregation_create,
        congregation_get,
        congregation_update,
        congregation_delete,
        class_list,
        class_overview,
        class_get,
        class_create,
        class_update,
        class_delete,
        class_members,
        person_get,
        person_create,
        person_update,
        person_delete,
        lesson_list,
        lesson_create,
        lesson_get,
        lesson_delete,
        lesson_finalize,
        lesson_reports,
        lesson_classes,
        attendance_open,
        attendance_get,
        attendance_close,
        attendance_select_class,
        attendance_toggle,
        attendance_advance,
        attendance_summary,
        attendance_submit,
        attendance_retry,
        attendance_cancel,
        currency_format
    ),
    components(schemas(
        op::OperatorResponse,
        op::SignupData<'_>,
        op::LoginData,
        ch::EstablishmentKind,
        ch::EstablishmentRef,
        ch::EstablishmentForm,
        ch::Church,
        ch::Congregation,
        cl::AgeGroup,
        cl::Class,
        cl::ClassForm,
        cl::ClassOverview,
        pe::MaritalStatus,
        pe::Person,
        pe::PersonForm,
        pe::ClassMembers,
        ls::LessonStatus,
        ls::DisplayStatus,
        ls::Lesson,
        ls::LessonForm,
        ls::LessonView,
        ls::LessonSchedule,
        rp::AttendanceStatus,
        rp::Attendee,
        rp::LessonRef,
        rp::ClassRef,
        rp::NewAttendanceReport,
        rp::AttendanceReport,
        rp::ReportView,
        wz::ClassGroup,
        wz::RosterLine,
        wz::SummaryField,
        wz::SummaryFields,
        wz::WizardStage,
        wz::WizardView,
        CurrencyView,
        Problem
    )),
    modifiers(&JWTAuth, &V1_PREFIX)
)]
pub struct ApiDocV1;

pub struct PathPrefix(pub &'static str);
static V1_PREFIX: PathPrefix = PathPrefix("/api/v1");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut new_paths = BTreeMap::new();

        for (path, item) in std::mem::take(&mut openapi.paths.paths) {
            new_paths.insert(self.0.to_string() + path.as_ref(), item);
        }

        openapi.paths.paths = new_paths;
    }
}

pub fn api_v1() -> Vec<Route> {
    routes![
        operator_signup,
        operator_login,
        operator_logout,
        operator_me,
        church_get,
        church_put,
        establishment_list,
        congregation_list,
        congregation_create,
        congregation_get,
        congregation_update,
        congregation_delete,
        class_list,
        class_overview,
        class_get,
        class_create,
        class_update,
        class_delete,
        class_members,
        person_get,
        person_create,
        person_update,
        person_delete,
        lesson_list,
        lesson_create,
        lesson_get,
        lesson_delete,
        lesson_finalize,
        lesson_reports,
        lesson_classes,
        attendance_open,
        attendance_get,
        attendance_close,
        attendance_select_class,
        attendance_toggle,
        attendance_advance,
        attendance_summary,
        attendance_submit,
        attendance_retry,
        attendance_cancel,
        currency_format
    ]
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/api/v1", api_v1())
        .mount(
            "/",
            SwaggerUi::new("/swagger/<_..>").url("/api/v1/openapi.json", ApiDocV1::openapi()),
        )
        .mount("/", routes![app, app_path])
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use rocket::http::Cookie;
    use rocket::local::asynchronous::Client;
    use uuid::Uuid;

    use crate::config::{Config, StorageBackend};
    use crate::data::memory::MemoryStore;
    use crate::data::store::{Store, StoreHandle};
    use crate::resp::jwt::OperatorToken;
    use crate::security::fixture;

    pub async fn client_with(store: Arc<MemoryStore>) -> Client {
        let mut config = Config::default();
        config.storage = StorageBackend::Memory;
        config.timezone = "America/Sao_Paulo".to_string();
        config.store_timeout_secs = 2;
        let rocket = crate::build(config, store, fixture::security())
            .expect("unable to build rocket instance");
        Client::tracked(rocket)
            .await
            .expect("valid rocket instance")
    }

    pub async fn client() -> Client {
        client_with(Arc::new(MemoryStore::default())).await
    }

    pub fn store(client: &Client) -> &dyn Store {
        client
            .rocket()
            .state::<StoreHandle>()
            .expect("store isn't managed")
            .as_ref()
    }

    pub fn auth_cookie(owner: Uuid) -> Cookie<'static> {
        OperatorToken::for_id(owner)
            .cookie(&fixture::security().jwt_keys.private)
            .expect("unable to sign test token")
    }

    #[rocket::async_test]
    async fn openapi_lists_prefixed_paths() {
        let client = client().await;
        let doc: serde_json::Value = client
            .get("/api/v1/openapi.json")
            .dispatch()
            .await
            .into_json()
            .await
            .expect("invalid openapi json");
        assert!(doc["paths"]["/api/v1/lessons/{id}/attendance"].is_object());
        assert!(doc["components"]["securitySchemes"]["jwt"].is_object());
    }
}
