use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use reservation_core::Error as CoreError;
use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Missing Authorization header")]
    MissingCredentials,

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl GatewayError {
    /// Machine-readable reason carried in the `error` field
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Core(e) => e.kind(),
            GatewayError::MissingCredentials => "AuthError",
            GatewayError::BadRequest(_) => "ValidationError",
        }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MissingCredentials => StatusCode::UNAUTHORIZED,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Core(e) => match e {
                CoreError::Validation(_) | CoreError::Integrity(_) => StatusCode::BAD_REQUEST,
                CoreError::Auth(_) => StatusCode::UNAUTHORIZED,
                CoreError::Ownership(_) => StatusCode::FORBIDDEN,
                CoreError::NotFoundOrExpired(_) => StatusCode::NOT_FOUND,
                CoreError::PaymentInProgress(_) => StatusCode::CONFLICT,
                CoreError::SolutionExpired(_) => StatusCode::GONE,
                CoreError::Payment(_) => StatusCode::PAYMENT_REQUIRED,
                CoreError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        HttpResponse::build(status).json(serde_json::json!({
            "error": self.kind(),
            "message": self.to_string()
        }))
    }
}
