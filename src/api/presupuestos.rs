use actix_web::{web, HttpResponse};

use crate::{
    database::MongoDB,
    models::{BudgetInput, PeriodQuery, UpdateBudget},
    services::{
        auth_service::Claims,
        budget_service::{self, Saved},
    },
    utils::error::{parse_object_id, AppError},
};

const BUDGET_NOT_FOUND: &str = "Presupuesto no encontrado";

#[utoipa::path(
    get,
    path = "/api/presupuestos/actual",
    tag = "Presupuestos",
    params(
        ("mes" = Option<u32>, Query, description = "Month, defaults to the current one"),
        ("anio" = Option<i32>, Query, description = "Year, defaults to the current one")
    ),
    responses((status = 200, description = "Budget for the period, created empty on first access")),
    security(("bearer_auth" = []))
)]
pub async fn current(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    query: web::Query<PeriodQuery>,
) -> Result<HttpResponse, AppError> {
    let budget = budget_service::get_or_create(&db, claims.user_id()?, &query).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": budget
    })))
}

#[utoipa::path(
    post,
    path = "/api/presupuestos",
    tag = "Presupuestos",
    request_body = BudgetInput,
    responses(
        (status = 201, description = "Budget created for the period"),
        (status = 200, description = "Existing budget for the period replaced"),
        (status = 400, description = "Invalid categories")
    ),
    security(("bearer_auth" = []))
)]
pub async fn save(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    body: web::Json<BudgetInput>,
) -> Result<HttpResponse, AppError> {
    let (budget, saved) = budget_service::save(&db, claims.user_id()?, body.into_inner()).await?;

    let (mut response, mensaje) = match saved {
        Saved::Created => (HttpResponse::Created(), "💵 Presupuesto creado"),
        Saved::Updated => (HttpResponse::Ok(), "Presupuesto actualizado"),
    };
    Ok(response.json(serde_json::json!({
        "success": true,
        "data": budget,
        "mensaje": mensaje
    })))
}

#[utoipa::path(
    put,
    path = "/api/presupuestos/{id}",
    tag = "Presupuestos",
    params(("id" = String, Path, description = "Budget id")),
    responses(
        (status = 200, description = "Budget updated"),
        (status = 403, description = "Owned by another user"),
        (status = 404, description = "Budget not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    body: web::Json<UpdateBudget>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&path, BUDGET_NOT_FOUND)?;
    let budget = budget_service::update(&db, claims.user_id()?, id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": budget,
        "mensaje": "Presupuesto actualizado"
    })))
}

#[utoipa::path(
    put,
    path = "/api/presupuestos/{id}/sincronizar",
    tag = "Presupuestos",
    params(("id" = String, Path, description = "Budget id")),
    responses(
        (status = 200, description = "Spent amounts recomputed from the month's expenses"),
        (status = 404, description = "Budget not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn synchronize(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&path, BUDGET_NOT_FOUND)?;
    let budget = budget_service::synchronize(&db, claims.user_id()?, id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": budget,
        "mensaje": "Presupuesto sincronizado"
    })))
}

#[utoipa::path(
    get,
    path = "/api/presupuestos/historial",
    tag = "Presupuestos",
    responses((status = 200, description = "Last twelve periods, newest first")),
    security(("bearer_auth" = []))
)]
pub async fn history(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let budgets = budget_service::history(&db, claims.user_id()?).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": budgets.len(),
        "data": budgets
    })))
}
