use actix_web::{http::StatusCode, ResponseError};
use log::error;
use thiserror::Error;

use crate::response::response_from_error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    Authorization(String),
    #[error("{message}")]
    NotFound {
        message: String,
        resource: Option<&'static str>,
    },
    #[error("{message}")]
    Duplicate {
        message: String,
        field: Option<String>,
    },
    #[error("{message}")]
    BusinessRule {
        message: String,
        rule: Option<&'static str>,
    },
    #[error("{0}")]
    Database(String),
    #[error("{0}")]
    Email(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation { message: msg.into(), field: None }
    }

    pub fn validation_field(msg: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation { message: msg.into(), field: Some(field.into()) }
    }

    pub fn need_login() -> Self {
        Self::Authentication("Authentification requise.".to_string())
    }

    pub fn forbidden() -> Self {
        Self::Authorization("Vous n'avez pas les permissions nécessaires.".to_string())
    }

    pub fn not_found(msg: impl Into<String>, resource: &'static str) -> Self {
        Self::NotFound { message: msg.into(), resource: Some(resource) }
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::Duplicate { message: msg.into(), field: None }
    }

    pub fn duplicate_field(msg: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Duplicate { message: msg.into(), field: Some(field.into()) }
    }

    pub fn business_rule(msg: impl Into<String>, rule: &'static str) -> Self {
        Self::BusinessRule { message: msg.into(), rule: Some(rule) }
    }

    /// Error kind exposed in the JSON envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ValidationError",
            Self::Authentication(_) => "AuthenticationError",
            Self::Authorization(_) => "AuthorizationError",
            Self::NotFound { .. } => "NotFoundError",
            Self::Duplicate { .. } => "DuplicateError",
            Self::BusinessRule { .. } => "BusinessRuleError",
            Self::Database(_) => "DatabaseError",
            Self::Email(_) => "EmailError",
        }
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        let msg = err.to_string();
        if msg.contains("UNIQUE") || msg.contains("Duplicate") {
            return Self::duplicate("Cette entrée existe déjà.");
        }
        error!("database error: {}", err);
        Self::Database("Erreur de base de données.".to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Duplicate { .. } => StatusCode::CONFLICT,
            Self::BusinessRule { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Database(_) | Self::Email(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        response_from_error(self)
    }
}
