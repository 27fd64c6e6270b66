use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::{
    database::MongoDB,
    models::{FundsRequest, GoalStatus, NewGoal, UpdateGoal},
    services::{
        auth_service::Claims,
        goal_service::{self, FundsMove},
    },
    utils::error::{parse_object_id, AppError},
};

const GOAL_NOT_FOUND: &str = "Meta no encontrada";

#[derive(Debug, Deserialize)]
pub struct GoalListQuery {
    pub estado: Option<GoalStatus>,
}

#[utoipa::path(
    get,
    path = "/api/metas",
    tag = "Metas",
    params(("estado" = Option<String>, Query, description = "activa, completada, pausada or cancelada")),
    responses((status = 200, description = "Goals ordered by deadline")),
    security(("bearer_auth" = []))
)]
pub async fn list(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    query: web::Query<GoalListQuery>,
) -> Result<HttpResponse, AppError> {
    let goals = goal_service::list_goals(&db, claims.user_id()?, query.estado).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": goals.len(),
        "data": goals
    })))
}

#[utoipa::path(
    post,
    path = "/api/metas",
    tag = "Metas",
    request_body = NewGoal,
    responses(
        (status = 201, description = "Goal created"),
        (status = 400, description = "Invalid fields")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    body: web::Json<NewGoal>,
) -> Result<HttpResponse, AppError> {
    let goal = goal_service::create_goal(&db, claims.user_id()?, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "data": goal,
        "mensaje": "🎯 Meta de ahorro creada"
    })))
}

#[utoipa::path(
    put,
    path = "/api/metas/{id}",
    tag = "Metas",
    params(("id" = String, Path, description = "Goal id")),
    request_body = UpdateGoal,
    responses(
        (status = 200, description = "Goal updated"),
        (status = 403, description = "Owned by another user"),
        (status = 404, description = "Goal not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    body: web::Json<UpdateGoal>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&path, GOAL_NOT_FOUND)?;
    let goal = goal_service::update_goal(&db, claims.user_id()?, id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": goal,
        "mensaje": "Meta actualizada"
    })))
}

async fn move_funds(
    db: &MongoDB,
    claims: &Claims,
    path: &str,
    body: FundsRequest,
    movement: FundsMove,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(path, GOAL_NOT_FOUND)?;
    let result = goal_service::move_funds(db, claims.user_id()?, id, movement, body.monto).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": result.goal,
        "mensaje": result.mensaje
    })))
}

#[utoipa::path(
    put,
    path = "/api/metas/{id}/agregar-fondos",
    tag = "Metas",
    params(("id" = String, Path, description = "Goal id")),
    request_body = FundsRequest,
    responses(
        (status = 200, description = "Funds deposited, goal completes when target is reached"),
        (status = 400, description = "Invalid amount")
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_funds(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    body: web::Json<FundsRequest>,
) -> Result<HttpResponse, AppError> {
    move_funds(&db, &claims, &path, body.into_inner(), FundsMove::Deposit).await
}

#[utoipa::path(
    put,
    path = "/api/metas/{id}/retirar-fondos",
    tag = "Metas",
    params(("id" = String, Path, description = "Goal id")),
    request_body = FundsRequest,
    responses(
        (status = 200, description = "Funds withdrawn"),
        (status = 400, description = "Invalid amount or more than saved")
    ),
    security(("bearer_auth" = []))
)]
pub async fn withdraw_funds(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    body: web::Json<FundsRequest>,
) -> Result<HttpResponse, AppError> {
    move_funds(&db, &claims, &path, body.into_inner(), FundsMove::Withdraw).await
}

#[utoipa::path(
    delete,
    path = "/api/metas/{id}",
    tag = "Metas",
    params(("id" = String, Path, description = "Goal id")),
    responses(
        (status = 200, description = "Goal deleted"),
        (status = 404, description = "Goal not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete(
    db: web::Data<MongoDB>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&path, GOAL_NOT_FOUND)?;
    goal_service::delete_goal(&db, claims.user_id()?, id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "mensaje": "Meta eliminada"
    })))
}
