use actix_web::{web, HttpResponse};

use crate::{
    config::AppConfig,
    database::MongoDB,
    services::{
        assistant_service::{self, AlertsReply, ChatReply, ChatRequest},
        auth_service::Claims,
    },
    utils::error::AppError,
};

#[utoipa::path(
    post,
    path = "/api/chat/mensaje",
    tag = "Chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply over the user's month", body = ChatReply),
        (status = 400, description = "Empty message")
    ),
    security(("bearer_auth" = []))
)]
pub async fn message(
    db: web::Data<MongoDB>,
    config: web::Data<AppConfig>,
    claims: web::ReqData<Claims>,
    body: web::Json<ChatRequest>,
) -> Result<HttpResponse, AppError> {
    let text = body.message()?;
    let reply = assistant_service::reply(&db, &config, claims.user_id()?, text).await?;
    Ok(HttpResponse::Ok().json(reply))
}

#[utoipa::path(
    get,
    path = "/api/chat/alertas",
    tag = "Chat",
    responses((status = 200, description = "Proactive budget, goal and balance alerts", body = AlertsReply)),
    security(("bearer_auth" = []))
)]
pub async fn alerts(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let reply = assistant_service::alerts(&db, claims.user_id()?).await?;
    Ok(HttpResponse::Ok().json(reply))
}
