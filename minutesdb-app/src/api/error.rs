use log::error;
use miette::Diagnostic;
use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::{Request, Response};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ApiError {
    #[error("DATABASE_URL is not configured")]
    Unavailable,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    UnprocessableEntity(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    DbError(#[from] diesel::result::Error),

    #[error(transparent)]
    SerializeError(#[from] serde_json::Error),

    #[error(transparent)]
    CsvError(#[from] csv::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl ApiError {
    fn status(&self) -> Status {
        match self {
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Forbidden(_) => Status::Forbidden,
            ApiError::UnprocessableEntity(_) => Status::UnprocessableEntity,
            ApiError::PayloadTooLarge(_) => Status::PayloadTooLarge,
            ApiError::Unavailable
            | ApiError::DbError(_)
            | ApiError::SerializeError(_)
            | ApiError::CsvError(_)
            | ApiError::IoError(_) => Status::InternalServerError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status == Status::InternalServerError {
            error!("{:#?}", self);
        }

        let rendered = serde_json::json!({ "error": self.to_string() }).to_string();

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(rendered.len(), std::io::Cursor::new(rendered))
            .ok()
    }
}
