use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use jsonwebtoken::{DecodingKey, Validation};

use crate::errors::{AccessError, AccessResult};
use crate::models::{DepartmentCode, Identity, UserId};

/// Verification side of the bearer tokens issued by the authentication service.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: Arc::new(secret.into()),
        }
    }

    pub fn from_env() -> AccessResult<Self> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AccessError::configuration("JWT_SECRET not set"))?;
        Ok(Self::new(secret.into_bytes()))
    }

    pub fn decode(&self, token: &str) -> AccessResult<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AccessError::token(err.to_string()))
    }

    pub fn verify(&self, token: &str) -> AccessResult<Identity> {
        let identity = self.decode(token)?.into_identity();
        identity.validate()?;
        Ok(identity)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub departments: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn into_identity(self) -> Identity {
        Identity {
            id: UserId::new(self.sub),
            roles: self.roles,
            group_ids: self.groups,
            departments: self.departments.into_iter().map(DepartmentCode::new).collect(),
            capabilities: self.capabilities,
        }
    }
}

/// Identity extracted from `Authorization: Bearer <jwt>`.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for VerifiedIdentity
where
    S: Send + Sync,
    Arc<JwtConfig>: FromRef<S>,
{
    type Rejection = AccessError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AccessError::unauthenticated("Authorization header missing"))?;

        let jwt = Arc::<JwtConfig>::from_ref(state);
        jwt.verify(token).map(VerifiedIdentity)
    }
}
