use idbroker_core::IdentityError;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Identity::{:?}: {}", .0.kind(), .0)]
    Identity(#[from] IdentityError),

    #[error("Json::{:?}: {}", .0, .0)]
    Json(#[from] serde_json::Error),
}
