use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reservation_core::{Error, IdentityVerifier, Result, SubjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: usize,
}

/// Verifies HS256 identity tokens and yields their `sub` claim
pub struct JwtIdentityVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

/// Accepts both `Bearer <token>` and a bare token
fn strip_scheme(header: &str) -> &str {
    let header = header.trim();
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .unwrap_or(header)
        .trim()
}

#[async_trait]
impl IdentityVerifier for JwtIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<SubjectId> {
        let token = strip_scheme(token);
        if token.is_empty() {
            return Err(Error::Auth("Empty identity token".to_string()));
        }

        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(token_data) if !token_data.claims.sub.is_empty() => {
                Ok(SubjectId::new(token_data.claims.sub))
            }
            Ok(_) => Err(Error::Auth("Token has no subject".to_string())),
            Err(err) => {
                tracing::warn!("JWT validation failed: {:?}", err);
                Err(Error::Auth("Invalid or expired token".to_string()))
            }
        }
    }
}
