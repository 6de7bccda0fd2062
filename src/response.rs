use actix_web::{error::JsonPayloadError, HttpRequest, HttpResponse};
use serde::Serialize;

use crate::error::AppError;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(data: T, msg: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(msg.into()),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(msg.into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rule: Option<&'static str>,
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let app_err = match err {
        JsonPayloadError::ContentType => AppError::validation("Requête invalide."),
        JsonPayloadError::Deserialize(e) => AppError::validation(format!("Données invalides: {}", e)),
        _ => AppError::validation("Requête invalide."),
    };
    app_err.into()
}

pub fn response_from_error(err: &AppError) -> HttpResponse {
    use actix_web::ResponseError;

    let (field, resource_type, rule) = match err {
        AppError::Validation { field, .. } => (field.clone(), None, None),
        AppError::NotFound { resource, .. } => (None, *resource, None),
        AppError::Duplicate { field, .. } => (field.clone(), None, None),
        AppError::BusinessRule { rule, .. } => (None, None, *rule),
        _ => (None, None, None),
    };

    HttpResponse::build(err.status_code()).json(ErrorBody {
        success: false,
        error: err.kind(),
        message: err.to_string(),
        field,
        resource_type,
        rule,
    })
}
