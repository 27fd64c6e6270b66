use actix_web::{web, HttpResponse};

use crate::{
    database::MongoDB,
    models::{ToggleAlertRequest, ToggleAlertResponse},
    services::{alert_service, auth_service::Claims},
    utils::error::AppError,
};

#[utoipa::path(
    get,
    path = "/api/alertas",
    tag = "Alertas",
    responses((status = 200, description = "Subscribed categories")),
    security(("bearer_auth" = []))
)]
pub async fn list(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let categories = alert_service::subscriptions(&db, claims.user_id()?).await?;
    Ok(HttpResponse::Ok().json(categories))
}

#[utoipa::path(
    post,
    path = "/api/alertas/toggle",
    tag = "Alertas",
    request_body = ToggleAlertRequest,
    responses(
        (status = 201, description = "Subscribed", body = ToggleAlertResponse),
        (status = 200, description = "Subscription cancelled", body = ToggleAlertResponse),
        (status = 400, description = "Missing or unknown category")
    ),
    security(("bearer_auth" = []))
)]
pub async fn toggle(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    body: web::Json<ToggleAlertRequest>,
) -> Result<HttpResponse, AppError> {
    let category = alert_service::parse_category(body.categoria.as_deref())?;
    let result = alert_service::toggle(&db, claims.user_id()?, category).await?;

    if result.activa {
        Ok(HttpResponse::Created().json(result))
    } else {
        Ok(HttpResponse::Ok().json(result))
    }
}
