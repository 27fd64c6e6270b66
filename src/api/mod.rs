pub mod alertas;
pub mod auth;
pub mod chat;
pub mod codigos;
pub mod comparador;
pub mod eventos;
pub mod health;
pub mod metas;
pub mod presupuestos;
pub mod swagger;
pub mod tiendas_fisicas;
pub mod transacciones;


use actix_web::{error::JsonPayloadError, error::QueryPayloadError, web, HttpRequest};

use crate::middleware::{ApiKeyMiddleware, AuthMiddleware};
use crate::utils::error::AppError;

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    log::debug!("Rejected JSON body: {}", err);
    AppError::Validation(format!("Cuerpo JSON inválido: {}", err)).into()
}

fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::Validation(format!("Parámetros inválidos: {}", err)).into()
}

/// Registers every route of the service. Shared by `main` and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .route("/health", web::get().to(health::health_check))
        // Auth
        .service(
            web::scope("/api/auth")
                .route("/register", web::post().to(auth::register))
                .route("/registro", web::post().to(auth::register))
                .route("/login", web::post().to(auth::login))
                .service(
                    web::resource("/perfil")
                        .wrap(AuthMiddleware)
                        .route(web::get().to(auth::profile)),
                ),
        )
        // Machine clients, API key instead of JWT
        .service(
            web::resource("/api/codigos/scraper")
                .wrap(ApiKeyMiddleware)
                .route(web::post().to(codigos::scraper)),
        )
        .service(
            web::resource("/api/tiendas-fisicas/demo")
                .wrap(ApiKeyMiddleware)
                .route(web::post().to(tiendas_fisicas::seed_demo)),
        )
        .service(
            web::scope("/api/codigos")
                .wrap(AuthMiddleware)
                .route("", web::get().to(codigos::list))
                .route("", web::post().to(codigos::create))
                .route("/{id}/votar", web::put().to(codigos::vote))
                .route("/{id}/verificar", web::put().to(codigos::verify)),
        )
        .service(
            web::scope("/api/transacciones")
                .wrap(AuthMiddleware)
                .route("", web::get().to(transacciones::list))
                .route("", web::post().to(transacciones::create))
                .route("/estadisticas", web::get().to(transacciones::statistics))
                .route("/{id}", web::delete().to(transacciones::delete)),
        )
        .service(
            web::scope("/api/metas")
                .wrap(AuthMiddleware)
                .route("", web::get().to(metas::list))
                .route("", web::post().to(metas::create))
                .route("/{id}", web::put().to(metas::update))
                .route("/{id}", web::delete().to(metas::delete))
                .route("/{id}/agregar-fondos", web::put().to(metas::add_funds))
                .route("/{id}/retirar-fondos", web::put().to(metas::withdraw_funds)),
        )
        .service(
            web::scope("/api/presupuestos")
                .wrap(AuthMiddleware)
                .route("/actual", web::get().to(presupuestos::current))
                .route("/historial", web::get().to(presupuestos::history))
                .route("", web::post().to(presupuestos::save))
                .route("/{id}", web::put().to(presupuestos::update))
                .route("/{id}/sincronizar", web::put().to(presupuestos::synchronize)),
        )
        .service(
            web::scope("/api/alertas")
                .wrap(AuthMiddleware)
                .route("", web::get().to(alertas::list))
                .route("", web::post().to(alertas::toggle))
                .route("/toggle", web::post().to(alertas::toggle)),
        )
        .service(
            web::scope("/api/chat")
                .wrap(AuthMiddleware)
                .route("/mensaje", web::post().to(chat::message))
                .route("/nubi", web::post().to(chat::message))
                .route("/alertas", web::get().to(chat::alerts)),
        )
        .service(
            web::scope("/api/tiendas-fisicas")
                .wrap(AuthMiddleware)
                .route("", web::get().to(tiendas_fisicas::list)),
        )
        .service(
            web::scope("/api/comparador")
                .wrap(AuthMiddleware)
                .route("/buscar", web::get().to(comparador::search)),
        )
        .service(
            web::scope("/api/eventos")
                .wrap(AuthMiddleware)
                .route("", web::post().to(eventos::create)),
        );
}
