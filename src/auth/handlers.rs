use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use validator::Validate;

use crate::db::UserId;
use crate::AppState;
use crate::Result;

#[derive(Deserialize, Validate)]
pub struct CredentialsRequest {
    #[validate(length(min = 1, max = 64, message = "username must be 1 to 64 characters"))]
    pub username: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: UserId,
    pub username: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn register(
    req: web::Json<CredentialsRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    req.validate()?;
    info!("Received registration request for username: {}", req.username);

    match state.auth_service.register(&req.username, &req.password).await {
        Ok(user) => Ok(HttpResponse::Ok().json(RegisterResponse {
            id: user.id,
            username: user.username,
        })),
        Err(e) => {
            error!("Registration failed for username: {}: {}", req.username, e);
            Err(e)
        }
    }
}

pub async fn login(
    req: web::Json<CredentialsRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    req.validate()?;
    info!("Received login request for username: {}", req.username);

    let tokens = state.auth_service.login(&req.username, &req.password).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

pub async fn refresh_token(
    req: web::Json<RefreshTokenRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let tokens = state
        .auth_service
        .refresh(&req.access_token, &req.refresh_token)
        .await?;
    Ok(HttpResponse::Ok().json(tokens))
}
