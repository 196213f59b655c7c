use std::future::Future;
use std::time::Duration;

use rocket::http::Status;
use rocket::outcome::try_outcome;
use rocket::request::{self, FromRequest, Request};
use uuid::Uuid;

use crate::config::Config;
use crate::data::store::{Store, StoreError, StoreHandle, StoreResult};
use crate::resp::jwt::OperatorToken;
use crate::resp::problem::Problem;

/// Everything a request needs to reach the document store on behalf of one
/// operator.
#[derive(Clone, Copy)]
pub struct OperatorContext<'r> {
    pub owner: Uuid,
    pub store: &'r dyn Store,
    pub timeout: Duration,
}

impl std::fmt::Debug for OperatorContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OperatorContext:{}", self.owner)
    }
}

impl<'r> OperatorContext<'r> {
    pub fn new(owner: Uuid, store: &'r dyn Store, timeout: Duration) -> OperatorContext<'r> {
        OperatorContext {
            owner,
            store,
            timeout,
        }
    }

    /// Awaits a store call, giving up after the configured timeout.
    pub async fn run<T, F>(&self, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Store call timed out after {:?}.", self.timeout);
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for OperatorContext<'r> {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let token = try_outcome!(req.guard::<OperatorToken>().await);

        let (store, config) = match (
            req.rocket().state::<StoreHandle>(),
            req.rocket().state::<Config>(),
        ) {
            (Some(store), Some(config)) => (store, config),
            _ => {
                return request::Outcome::Error((
                    Status::InternalServerError,
                    Problem::new_untyped(Status::InternalServerError, "Store isn't configured."),
                ))
            }
        };

        request::Outcome::Success(OperatorContext::new(
            token.operator,
            store.as_ref(),
            config.store_timeout(),
        ))
    }
}
