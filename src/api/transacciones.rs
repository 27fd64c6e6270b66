use actix_web::{web, HttpResponse};

use crate::{
    database::MongoDB,
    models::NewTransaction,
    services::{
        auth_service::Claims,
        transaction_service::{self, StatisticsQuery, TransactionQuery},
    },
    utils::error::{parse_object_id, AppError},
};

#[utoipa::path(
    get,
    path = "/api/transacciones",
    tag = "Transacciones",
    params(
        ("tipo" = Option<String>, Query, description = "`ingreso` or `gasto`"),
        ("categoria" = Option<String>, Query, description = "Transaction category"),
        ("fechaInicio" = Option<String>, Query, description = "Inclusive lower date bound"),
        ("fechaFin" = Option<String>, Query, description = "Inclusive upper date bound"),
        ("limit" = Option<i64>, Query, description = "Page size, default 50"),
        ("page" = Option<i64>, Query, description = "1-based page")
    ),
    responses((status = 200, description = "Page of transactions, newest first")),
    security(("bearer_auth" = []))
)]
pub async fn list(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    query: web::Query<TransactionQuery>,
) -> Result<HttpResponse, AppError> {
    let page = transaction_service::list_transactions(&db, claims.user_id()?, &query).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    post,
    path = "/api/transacciones",
    tag = "Transacciones",
    request_body = NewTransaction,
    responses(
        (status = 201, description = "Transaction recorded, savings derived"),
        (status = 400, description = "Invalid fields or unknown coupon")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    body: web::Json<NewTransaction>,
) -> Result<HttpResponse, AppError> {
    let transaction =
        transaction_service::create_transaction(&db, claims.user_id()?, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "data": transaction,
        "mensaje": "💰 Transacción registrada exitosamente"
    })))
}

#[utoipa::path(
    get,
    path = "/api/transacciones/estadisticas",
    tag = "Transacciones",
    params(
        ("mes" = Option<u32>, Query, description = "Month 1-12, all time when both are absent"),
        ("anio" = Option<i32>, Query, description = "Year")
    ),
    responses((status = 200, description = "Totals by kind, expenses by category, coupon savings")),
    security(("bearer_auth" = []))
)]
pub async fn statistics(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    query: web::Query<StatisticsQuery>,
) -> Result<HttpResponse, AppError> {
    let stats = transaction_service::statistics(&db, claims.user_id()?, &query).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": stats
    })))
}

#[utoipa::path(
    delete,
    path = "/api/transacciones/{id}",
    tag = "Transacciones",
    params(("id" = String, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Transaction deleted"),
        (status = 403, description = "Owned by another user"),
        (status = 404, description = "Transaction not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&path, "Transacción no encontrada")?;
    transaction_service::delete_transaction(&db, claims.user_id()?, id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "mensaje": "Transacción eliminada"
    })))
}
