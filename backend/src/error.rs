//! Error handling for the Pescadería sales backend
//!
//! Provides consistent error responses in English and Spanish

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::ValidationError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String, message_es: String },

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_es: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Insufficient stock for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::ValidationError(errors.to_string())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Spanish rendering of a validation failure, shown at the shop counter
pub fn validation_message_es(err: &ValidationError) -> String {
    match err {
        ValidationError::EmptySale => "La venta necesita al menos un producto".to_string(),
        ValidationError::NonPositiveQuantity { line } => {
            format!("Línea {}: la cantidad debe ser mayor que cero", line)
        }
        ValidationError::NonPositiveUnitPrice { line } => {
            format!("Línea {}: el precio unitario debe ser mayor que cero", line)
        }
        ValidationError::FractionalQuantity { line, unit } => format!(
            "Línea {}: los productos vendidos por {} requieren una cantidad entera",
            line, unit
        ),
        ValidationError::TooManyDecimalPlaces { field, max } => {
            format!("{} admite como máximo {} decimales", field, max)
        }
        ValidationError::ReasonTooShort { min, .. } => format!(
            "El motivo de anulación debe tener al menos {} caracteres",
            min
        ),
        ValidationError::InvalidDocument => {
            "El documento del cliente solo puede contener dígitos".to_string()
        }
        ValidationError::Blank { field } => format!("{} no puede estar vacío", field),
        ValidationError::TooLong { field, max } => {
            format!("{} es demasiado largo (máximo {} caracteres)", field, max)
        }
        ValidationError::NonPositiveAmount { field } => {
            format!("{} debe ser al menos 0.01", field)
        }
        ValidationError::Negative { field } => format!("{} no puede ser negativo", field),
        ValidationError::TooLarge { field, max } => {
            format!("{} no puede superar {}", field, max)
        }
        ValidationError::AmountOverflow { field } => {
            format!("{} es demasiado grande para calcularse", field)
        }
        ValidationError::InvalidDateRange => {
            "La fecha inicial no puede ser posterior a la fecha final".to_string()
        }
        ValidationError::CancelledOnCreate => {
            "Una venta debe crearse como pendiente o completada".to_string()
        }
        ValidationError::InactiveProduct { line } => {
            format!("Línea {}: el producto está inactivo", line)
        }
    }
}

impl AppError {
    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "TOKEN_EXPIRED".to_string(),
                    message_en: "Token has expired".to_string(),
                    message_es: "El token ha expirado".to_string(),
                    field: None,
                },
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "INVALID_TOKEN".to_string(),
                    message_en: "Invalid token".to_string(),
                    message_es: "Token inválido".to_string(),
                    field: None,
                },
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail {
                    code: "INSUFFICIENT_PERMISSIONS".to_string(),
                    message_en: "You do not have permission to perform this action".to_string(),
                    message_es: "No tiene permiso para realizar esta acción".to_string(),
                    field: None,
                },
            ),
            AppError::Unauthorized { message, message_es } => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "UNAUTHORIZED".to_string(),
                    message_en: message.clone(),
                    message_es: message_es.clone(),
                    field: None,
                },
            ),
            AppError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: err.to_string(),
                    message_es: validation_message_es(err),
                    field: Some(err.field().to_string()),
                },
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_es: format!("Datos inválidos: {}", msg),
                    field: None,
                },
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "DUPLICATE_ENTRY".to_string(),
                    message_en: format!("A record with this {} already exists", field),
                    message_es: format!("Ya existe un registro con este {}", field),
                    field: Some(field.clone()),
                },
            ),
            AppError::Conflict {
                resource,
                message,
                message_es,
            } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "CONFLICT".to_string(),
                    message_en: message.clone(),
                    message_es: message_es.clone(),
                    field: Some(resource.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_es: format!("No se encontró {}", resource),
                    field: None,
                },
            ),
            AppError::InsufficientStock {
                product,
                requested,
                available,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INSUFFICIENT_STOCK".to_string(),
                    message_en: format!(
                        "Insufficient stock for {}: requested {}, available {}",
                        product, requested, available
                    ),
                    message_es: format!(
                        "Stock insuficiente para {}: solicitado {}, disponible {}",
                        product, requested, available
                    ),
                    field: Some("quantity".to_string()),
                },
            ),
            AppError::InvalidState(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INVALID_STATE".to_string(),
                    message_en: msg.clone(),
                    message_es: format!("Operación no permitida en el estado actual: {}", msg),
                    field: None,
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message_en: "A database error occurred".to_string(),
                    message_es: "Ocurrió un error en la base de datos".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_es: "Error interno del servidor".to_string(),
                    field: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: "An internal server error occurred".to_string(),
                    message_es: "Error interno del servidor".to_string(),
                    field: None,
                },
            ),
        }
    }

    /// HTTP status this error maps to
    pub fn status_code(&self) -> StatusCode {
        self.status_and_detail().0
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
