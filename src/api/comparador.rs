use actix_web::{web, HttpResponse};

use crate::{
    database::MongoDB,
    services::comparator_service::{self, CompareQuery},
    utils::error::AppError,
};

#[utoipa::path(
    get,
    path = "/api/comparador/buscar",
    tag = "Comparador",
    params(
        ("producto" = String, Query, description = "Product to compare"),
        ("categoria" = Option<String>, Query, description = "Coupon category, default tecnologia")
    ),
    responses(
        (status = 200, description = "Simulated prices per store with the best verified coupon applied"),
        (status = 400, description = "Missing product")
    ),
    security(("bearer_auth" = []))
)]
pub async fn search(
    db: web::Data<MongoDB>,
    query: web::Query<CompareQuery>,
) -> Result<HttpResponse, AppError> {
    let comparison = comparator_service::compare(&db, &query).await?;
    Ok(HttpResponse::Ok().json(comparison))
}
