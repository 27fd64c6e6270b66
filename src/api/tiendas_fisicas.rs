use actix_web::{web, HttpResponse};

use crate::{
    database::MongoDB,
    models::NearQuery,
    services::store_service,
    utils::error::AppError,
};

#[utoipa::path(
    get,
    path = "/api/tiendas-fisicas",
    tag = "Tiendas",
    params(
        ("lng" = Option<f64>, Query, description = "Longitude of the search center"),
        ("lat" = Option<f64>, Query, description = "Latitude of the search center"),
        ("maxDistancia" = Option<f64>, Query, description = "Radius in meters, default 5000")
    ),
    responses(
        (status = 200, description = "Stores, nearest first when a center is given"),
        (status = 400, description = "Incomplete or out-of-range coordinates")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list(
    db: web::Data<MongoDB>,
    query: web::Query<NearQuery>,
) -> Result<HttpResponse, AppError> {
    let stores = store_service::list_stores(&db, &query).await?;
    Ok(HttpResponse::Ok().json(stores))
}

#[utoipa::path(
    post,
    path = "/api/tiendas-fisicas/demo",
    tag = "Tiendas",
    responses(
        (status = 201, description = "Store collection replaced with the demo set"),
        (status = 403, description = "Missing or wrong API key")
    ),
    security(("api_key" = []))
)]
pub async fn seed_demo(db: web::Data<MongoDB>) -> Result<HttpResponse, AppError> {
    let inserted = store_service::seed_demo(&db).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "msg": format!("Se insertaron {} tiendas demo.", inserted)
    })))
}
