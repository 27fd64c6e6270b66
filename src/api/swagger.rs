use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

use crate::middleware::api_key::API_KEY_HEADER;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Finanzas Service API",
        version = "1.0.0",
        description = "Personal finance and discount-coupon backend.\n\n**Authentication:** user endpoints take a JWT Bearer token from `/api/auth/login`; the scraper and demo-seed endpoints take the `x-api-key` header.\n\n**Features:**\n- Community coupons with likes, verification and reputation\n- Income and expense tracking with coupon savings\n- Savings goals and monthly budgets\n- Category alerts, store map and price comparator\n- Rule-based financial assistant"
    ),
    paths(
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::auth::profile,

        crate::api::codigos::list,
        crate::api::codigos::create,
        crate::api::codigos::vote,
        crate::api::codigos::verify,
        crate::api::codigos::scraper,

        crate::api::transacciones::list,
        crate::api::transacciones::create,
        crate::api::transacciones::statistics,
        crate::api::transacciones::delete,

        crate::api::metas::list,
        crate::api::metas::create,
        crate::api::metas::update,
        crate::api::metas::add_funds,
        crate::api::metas::withdraw_funds,
        crate::api::metas::delete,

        crate::api::presupuestos::current,
        crate::api::presupuestos::save,
        crate::api::presupuestos::update,
        crate::api::presupuestos::synchronize,
        crate::api::presupuestos::history,

        crate::api::alertas::list,
        crate::api::alertas::toggle,

        crate::api::chat::message,
        crate::api::chat::alerts,

        crate::api::tiendas_fisicas::list,
        crate::api::tiendas_fisicas::seed_demo,

        crate::api::comparador::search,
        crate::api::eventos::create,
        crate::api::health::health_check,
    ),
    components(
        schemas(
            crate::services::auth_service::LoginRequest,
            crate::services::auth_service::RegisterRequest,
            crate::services::auth_service::AuthResponse,
            crate::models::UserProfile,

            crate::models::CouponCategory,
            crate::models::NewDiscountCode,
            crate::services::codigos_service::VoteOutcome,
            crate::services::codigos_service::VerifyOutcome,

            crate::models::TransactionKind,
            crate::models::TransactionCategory,
            crate::models::NewTransaction,

            crate::models::GoalCategory,
            crate::models::GoalStatus,
            crate::models::NewGoal,
            crate::models::UpdateGoal,
            crate::models::FundsRequest,

            crate::models::BudgetCategory,
            crate::models::BudgetInput,

            crate::models::ToggleAlertRequest,
            crate::models::ToggleAlertResponse,

            crate::services::assistant_service::ChatRequest,
            crate::services::assistant_service::ChatReply,
            crate::services::assistant_service::AlertsReply,
            crate::services::assistant_service::ProactiveAlert,
            crate::services::assistant_service::Urgency,

            crate::models::GeoPoint,
            crate::models::NewEvent,
            crate::api::health::HealthResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Registration, login and profile."),
        (name = "Codigos", description = "Community discount codes: listing, publishing, likes and verification."),
        (name = "Transacciones", description = "Income and expenses, with savings derived from coupons."),
        (name = "Metas", description = "Savings goals and their deposit/withdrawal history."),
        (name = "Presupuestos", description = "Monthly per-category budgets."),
        (name = "Alertas", description = "Subscriptions to new coupons by category."),
        (name = "Chat", description = "Financial assistant replies and proactive alerts."),
        (name = "Tiendas", description = "Physical store locations."),
        (name = "Comparador", description = "Simulated price comparison with coupons applied."),
        (name = "Eventos", description = "Client analytics events."),
        (name = "Health", description = "Service and database health."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Token from /api/auth/login"))
                        .build(),
                ),
            );
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_resources_and_schemes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/codigos/{id}/votar"));
        assert!(doc.paths.paths.contains_key("/api/presupuestos/actual"));
        assert!(doc.paths.paths.contains_key("/api/chat/mensaje"));

        let schemes = &doc.components.as_ref().unwrap().security_schemes;
        assert!(schemes.contains_key("bearer_auth"));
        assert!(schemes.contains_key("api_key"));
    }
}
