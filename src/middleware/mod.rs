pub mod api_key;
pub mod auth;
pub mod security_headers;

pub use api_key::ApiKeyMiddleware;
pub use auth::AuthMiddleware;
pub use security_headers::SecurityHeaders;
