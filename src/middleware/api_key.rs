use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};

use crate::config::AppConfig;
use crate::utils::error::AppError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Static API-key guard for machine clients (the coupon scraper).
pub struct ApiKeyMiddleware;

impl<S, B> Transform<S, ServiceRequest> for ApiKeyMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ApiKeyMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyMiddlewareService { service }))
    }
}

pub struct ApiKeyMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for ApiKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let expected = req
            .app_data::<web::Data<AppConfig>>()
            .map(|config| config.scraper_api_key.clone());
        let provided = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        match (expected, provided) {
            (Some(expected), Some(provided)) if !expected.is_empty() && expected == provided => {
                let fut = self.service.call(req);
                Box::pin(async move {
                    let res = fut.await?;
                    Ok(res)
                })
            }
            _ => {
                log::warn!("⛔ {} {} with missing or invalid API key", req.method(), req.path());
                Box::pin(async move {
                    Err(AppError::Forbidden(
                        "⛔ Acceso denegado: API Key inválida o ausente".into(),
                    )
                    .into())
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use actix_web::{http::StatusCode, test, App, HttpResponse};

    async fn ok() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[actix_web::test]
    async fn test_api_key_guard() {
        let config = test_config();
        let key = config.scraper_api_key.clone();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .service(web::resource("/scraper").wrap(ApiKeyMiddleware).route(web::post().to(ok))),
        )
        .await;

        let req = test::TestRequest::post().uri("/scraper").to_request();
        let err = test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::post()
            .uri("/scraper")
            .insert_header((API_KEY_HEADER, "wrong"))
            .to_request();
        let err = test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::post()
            .uri("/scraper")
            .insert_header((API_KEY_HEADER, key))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
