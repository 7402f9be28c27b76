use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use validator::ValidationErrors;

use crate::db::StoreError;
use crate::AppState;

/// One failed field in a validation response.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Detail of a 500 response, kept out of the body until
/// [`expose_internal_errors`] decides whether the caller may see it.
#[derive(Debug, Clone)]
pub struct InternalDetail(pub String);

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation(vec![FieldError {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{what} not found"))
    }

    pub fn forbidden() -> Self {
        ApiError::Forbidden("Access denied".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Validation(errors) => {
                let body = ErrorBody {
                    success: false,
                    message: "Validation failed".to_string(),
                    errors,
                    error: None,
                };
                (status, Json(body)).into_response()
            }
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "request failed");
                let body = ErrorBody {
                    success: false,
                    message: "Internal server error".to_string(),
                    errors: Vec::new(),
                    error: None,
                };
                let mut response = (status, Json(body)).into_response();
                response.extensions_mut().insert(InternalDetail(detail));
                response
            }
            other => {
                let body = ErrorBody {
                    success: false,
                    message: other.to_string(),
                    errors: Vec::new(),
                    error: None,
                };
                (status, Json(body)).into_response()
            }
        }
    }
}

/// Echo internal error text in the response body outside production.
pub async fn expose_internal_errors(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if state.config.is_production() {
        return response;
    }
    match response.extensions().get::<InternalDetail>().cloned() {
        Some(InternalDetail(detail)) => {
            let body = ErrorBody {
                success: false,
                message: "Internal server error".to_string(),
                errors: Vec::new(),
                error: Some(detail),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
        None => response,
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, list)| {
                list.iter().map(move |e| FieldError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{field} is invalid ({})", e.code)),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::Validation(fields)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<crate::auth::AuthError> for ApiError {
    fn from(err: crate::auth::AuthError) -> Self {
        use crate::auth::AuthError;
        match err {
            AuthError::MissingToken | AuthError::InvalidToken(_) => {
                ApiError::Unauthorized("Invalid or missing token".to_string())
            }
            AuthError::InvalidCredentials => ApiError::Unauthorized("Invalid credentials".to_string()),
            AuthError::Hashing(detail) | AuthError::Signing(detail) => ApiError::Internal(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use validator::Validate;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn forbidden_returns_403() {
        let response = ApiError::forbidden().into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Access denied");
    }

    #[tokio::test]
    async fn not_found_names_the_resource() {
        let response = ApiError::not_found("Prescription").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["message"], "Prescription not found");
    }

    #[tokio::test]
    async fn internal_hides_detail_in_body() {
        let response = ApiError::Internal("pool timed out".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<InternalDetail>().is_some());
        let json = body_json(response).await;
        assert_eq!(json["message"], "Internal server error");
        assert!(json.get("error").is_none());
    }

    #[derive(Validate)]
    struct Signup {
        #[validate(email(message = "Invalid email"))]
        email: String,
        #[validate(length(min = 6))]
        password: String,
    }

    #[tokio::test]
    async fn validation_errors_list_fields() {
        let signup = Signup {
            email: "nope".into(),
            password: "123".into(),
        };
        let err: ApiError = signup.validate().unwrap_err().into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        let errors = json["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0]["field"], "email");
        assert_eq!(errors[0]["message"], "Invalid email");
        assert_eq!(errors[1]["field"], "password");
    }
}
