//! Session gate shared by every protected route.
//!
//! The session cookie carries a signed token issued by the auth service;
//! decoding and signature checks are left to `jsonwebtoken`. Any valid
//! session passes: there is no role model.

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{web, FromRequest, HttpMessage, HttpRequest, ResponseError};
use chrono::{Duration, Utc};
use futures::future::{ready, Ready};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid session token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

/// The authenticated user behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    iat: i64,
    exp: i64,
}

/// Signing material and cookie name for session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    cookie_name: String,
}

impl SessionKeys {
    pub fn new(config: &SessionConfig) -> Self {
        let secret = config.secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            cookie_name: config.cookie_name.clone(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn verify(&self, token: &str) -> Result<Session, SessionError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(Session {
            user_id: data.claims.sub,
            email: data.claims.email,
        })
    }

    /// Signs a token the gate will accept. Used for development logins and tests.
    pub fn issue(&self, user_id: &str, email: &str, ttl: Duration) -> Result<String, SessionError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    fn authenticate(&self, req: &HttpRequest) -> Result<Session, ApiError> {
        let cookie = req.cookie(&self.cookie_name).ok_or(ApiError::Unauthorized)?;
        self.verify(cookie.value()).map_err(|err| {
            debug!(error = %err, path = req.path(), "rejected session cookie");
            ApiError::Unauthorized
        })
    }
}

fn session_from_request(req: &HttpRequest) -> Result<Session, ApiError> {
    if let Some(session) = req.extensions().get::<Session>() {
        return Ok(session.clone());
    }
    match req.app_data::<web::Data<SessionKeys>>() {
        Some(keys) => keys.authenticate(req),
        None => {
            warn!("session keys are not registered; rejecting request");
            Err(ApiError::Unauthorized)
        }
    }
}

impl FromRequest for Session {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(session_from_request(req))
    }
}

/// Middleware gating a whole scope: requests without a valid session get
/// a 401 and never reach the inner service.
pub async fn require_session<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, actix_web::Error>
where
    B: MessageBody + 'static,
{
    match session_from_request(req.request()) {
        Ok(session) => {
            req.extensions_mut().insert(session);
            next.call(req).await.map(ServiceResponse::map_into_left_body)
        }
        Err(err) => {
            let response = err.error_response();
            Ok(req.into_response(response).map_into_right_body())
        }
    }
}
