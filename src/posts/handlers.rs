use actix_web::{http::header, web, HttpResponse};
use serde::Deserialize;
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::AppState;
use crate::Result;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: String,
}

pub async fn list_posts(
    _user: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let posts = state.post_service.list_posts().await?;
    Ok(HttpResponse::Ok().json(posts))
}

pub async fn get_post(
    _user: AuthenticatedUser,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let post = state.post_service.get_post(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn create_post(
    user: AuthenticatedUser,
    req: web::Json<CreatePostRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    req.validate()?;
    let post = state
        .post_service
        .create_post(&req.content, user.user_id, req.parent_id)
        .await?;

    Ok(HttpResponse::Created()
        .insert_header((header::LOCATION, format!("/posts/{}", post.id)))
        .json(post))
}

pub async fn update_post(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    req: web::Json<UpdatePostRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    req.validate()?;
    let post = state
        .post_service
        .update_post(path.into_inner(), &req.content, user.user_id)
        .await?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn delete_post(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state
        .post_service
        .delete_post(path.into_inner(), user.user_id)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
