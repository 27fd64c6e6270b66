use actix_web::{web, HttpResponse};

use crate::{
    database::MongoDB,
    models::NewDiscountCode,
    services::{
        auth_service::Claims,
        codigos_service::{self, CodeFilters, VerifyOutcome, VoteOutcome},
    },
    utils::error::{parse_object_id, AppError},
};

const CODE_NOT_FOUND: &str = "Código no encontrado";

#[utoipa::path(
    get,
    path = "/api/codigos",
    tag = "Codigos",
    params(
        ("tienda" = Option<String>, Query, description = "Store name, case-insensitive substring"),
        ("categoria" = Option<String>, Query, description = "Coupon category, `todos` for all"),
        ("orden" = Option<String>, Query, description = "`populares` or `recientes`")
    ),
    responses(
        (status = 200, description = "Coupons with creator summary"),
        (status = 400, description = "Invalid category")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list(
    db: web::Data<MongoDB>,
    filters: web::Query<CodeFilters>,
) -> Result<HttpResponse, AppError> {
    let codes = codigos_service::list_codes(&db, &filters).await?;
    Ok(HttpResponse::Ok().json(codes))
}

#[utoipa::path(
    post,
    path = "/api/codigos",
    tag = "Codigos",
    request_body = NewDiscountCode,
    responses(
        (status = 201, description = "Coupon created, creator earns reputation"),
        (status = 400, description = "Missing fields")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    body: web::Json<NewDiscountCode>,
) -> Result<HttpResponse, AppError> {
    let code = codigos_service::create_code(&db, claims.user_id()?, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "msg": "Código creado exitosamente",
        "codigo": code
    })))
}

#[utoipa::path(
    put,
    path = "/api/codigos/{id}/votar",
    tag = "Codigos",
    params(("id" = String, Path, description = "Coupon id")),
    responses(
        (status = 200, description = "Like toggled", body = VoteOutcome),
        (status = 404, description = "Coupon not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn vote(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let code_id = parse_object_id(&path, CODE_NOT_FOUND)?;
    let outcome = codigos_service::vote(&db, code_id, claims.user_id()?).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[utoipa::path(
    put,
    path = "/api/codigos/{id}/verificar",
    tag = "Codigos",
    params(("id" = String, Path, description = "Coupon id")),
    responses(
        (status = 200, description = "Coupon verified once, later calls are no-ops", body = VerifyOutcome),
        (status = 404, description = "Coupon not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify(
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let code_id = parse_object_id(&path, CODE_NOT_FOUND)?;
    let outcome = codigos_service::verify(&db, code_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/codigos/scraper",
    tag = "Codigos",
    request_body = Vec<NewDiscountCode>,
    responses(
        (status = 201, description = "Batch inserted"),
        (status = 400, description = "Empty or invalid batch"),
        (status = 403, description = "Missing or wrong API key")
    ),
    security(("api_key" = []))
)]
pub async fn scraper(
    db: web::Data<MongoDB>,
    body: web::Json<Vec<NewDiscountCode>>,
) -> Result<HttpResponse, AppError> {
    let count = codigos_service::insert_scraped(&db, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "msg": format!("Se insertaron {} códigos exitosamente.", count),
        "count": count
    })))
}
