use actix_web::{web, HttpResponse};

use crate::{
    database::MongoDB,
    models::NewEvent,
    services::{auth_service::Claims, event_service},
    utils::error::AppError,
};

#[utoipa::path(
    post,
    path = "/api/eventos",
    tag = "Eventos",
    request_body = NewEvent,
    responses(
        (status = 201, description = "Event stored"),
        (status = 400, description = "Missing type or non-object payload")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    body: web::Json<NewEvent>,
) -> Result<HttpResponse, AppError> {
    let event = event_service::record(&db, claims.user_id()?, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "data": event
    })))
}
