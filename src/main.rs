mod api;
mod config;
mod database;
mod middleware;
mod models;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = config::AppConfig::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    log::info!("🚀 Starting Finanzas Service...");
    log::info!("📊 Database: {}", database::database_name(&config.mongodb_uri));
    if config.openai_api_key.is_some() {
        log::info!("🤖 Assistant delegates to {} ({})", config.openai_model, config.openai_base_url);
    } else {
        log::info!("🤖 Assistant running rule-based replies only");
    }

    let db = database::MongoDB::new(&config.mongodb_uri)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    log::info!("✅ MongoDB connected successfully");

    let bind = (config.host.clone(), config.port);
    let cors_origins = config.cors_origins.clone();
    let db_data = web::Data::new(db);
    let config_data = web::Data::new(config);

    log::info!("🌐 Server starting on {}:{}", bind.0, bind.1);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", bind.0, bind.1);

    HttpServer::new(move || {
        let cors = cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                header::ACCEPT,
                header::HeaderName::from_static(middleware::api_key::API_KEY_HEADER),
            ])
            .expose_headers(vec![header::CONTENT_TYPE])
            .max_age(3600);

        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(db_data.clone())
            .app_data(config_data.clone())
            .wrap(cors)
            .wrap(middleware::SecurityHeaders)
            .wrap(Logger::default())
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi))
            .configure(api::configure)
    })
    .bind(bind)?
    .run()
    .await
}
