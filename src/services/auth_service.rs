use crate::{
    config::AppConfig,
    database::{MongoDB, USERS},
    models::{User, UserProfile},
    utils::error::{is_duplicate_key, AppError, AppResult},
};
use mongodb::bson::{doc, oid::ObjectId};
use serde::{Deserialize, Serialize};
use jsonwebtoken::{encode, decode, Header, Validation, EncodingKey, DecodingKey, Algorithm};
use chrono::{Utc, Duration};
use uuid::Uuid;
use std::collections::HashSet;

const BCRYPT_COST: u32 = 12;
const TOKEN_TTL_DAYS: i64 = 7;
pub const MIN_PASSWORD_LEN: usize = 6;

// JWT Claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,           // user ObjectId (hex)
    pub email: String,
    pub nombre: String,
    pub iat: usize,            // issued at
    pub exp: usize,            // expiration
    pub jti: String,           // JWT ID
    pub aud: String,           // audience
    pub iss: String,           // issuer
}

impl Claims {
    pub fn user_id(&self) -> AppResult<ObjectId> {
        ObjectId::parse_str(&self.sub)
            .map_err(|_| AppError::Unauthorized("Token no válido".into()))
    }
}

// Request/Response structures
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    #[serde(alias = "correo")]
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    pub nombre: Option<String>,
    #[serde(alias = "correo")]
    pub email: Option<String>,
    pub password: Option<String>,
}

impl RegisterRequest {
    /// Returns `(nombre, email, password)` trimmed and normalised.
    pub fn validate(&self) -> AppResult<(String, String, String)> {
        let nombre = self.nombre.as_deref().map(str::trim).unwrap_or_default();
        let email = normalize_email(self.email.as_deref().unwrap_or_default());
        let password = self.password.as_deref().unwrap_or_default();

        if nombre.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AppError::Validation("Nombre, email y contraseña son obligatorios".into()));
        }
        if !email.contains('@') {
            return Err(AppError::Validation("Email inválido".into()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "La contraseña debe tener al menos {} caracteres",
                MIN_PASSWORD_LEN
            )));
        }
        Ok((nombre.to_string(), email, password.to_string()))
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub usuario: UserProfile,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// Generate JWT token
pub fn generate_jwt(config: &AppConfig, user: &User) -> AppResult<String> {
    let user_id = user
        .id
        .ok_or_else(|| AppError::Internal("Cannot issue a token for an unsaved user".into()))?;

    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_hex(),
        email: user.email.clone(),
        nombre: user.name.clone(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
        jti: Uuid::new_v4().to_string(),
        aud: config.jwt_audience.clone(),
        iss: config.jwt_issuer.clone(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_ref()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
}

// Verify JWT token
pub fn verify_token(config: &AppConfig, token: &str) -> AppResult<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[config.jwt_audience.as_str()]);

    let mut issuers = HashSet::new();
    issuers.insert(config.jwt_issuer.clone());
    validation.iss = Some(issuers);

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_ref()),
        &validation,
    )?;
    Ok(data.claims)
}

async fn hash_password(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(AppError::from)
}

async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password check task failed: {}", e)))?
        .map_err(AppError::from)
}

// User registration
pub async fn register(
    db: &MongoDB,
    config: &AppConfig,
    request: &RegisterRequest,
) -> AppResult<AuthResponse> {
    let (nombre, email, password) = request.validate()?;
    let collection = db.collection::<User>(USERS);

    if collection.find_one(doc! { "email": &email }).await?.is_some() {
        return Err(AppError::Validation("El email ya está registrado".into()));
    }

    let hashed = hash_password(password).await?;
    let mut user = User::new(nombre, email, hashed);

    let result = collection.insert_one(&user).await.map_err(|e| {
        // Lost a race against the unique email index
        if is_duplicate_key(&e) {
            AppError::Validation("El email ya está registrado".into())
        } else {
            AppError::from(e)
        }
    })?;
    user.id = result.inserted_id.as_object_id();

    let token = generate_jwt(config, &user)?;
    log::info!("✅ User registered successfully: {}", user.email);

    Ok(AuthResponse { success: true, token, usuario: UserProfile::from(user) })
}

// User login
pub async fn login(
    db: &MongoDB,
    config: &AppConfig,
    request: &LoginRequest,
) -> AppResult<AuthResponse> {
    let email = normalize_email(request.email.as_deref().unwrap_or_default());
    let password = request.password.clone().unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::Validation("Email y contraseña son obligatorios".into()));
    }

    let invalid = || AppError::Unauthorized("Credenciales inválidas".into());

    let user = db
        .collection::<User>(USERS)
        .find_one(doc! { "email": &email })
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(password, user.password.clone()).await? {
        return Err(invalid());
    }

    let token = generate_jwt(config, &user)?;
    Ok(AuthResponse { success: true, token, usuario: UserProfile::from(user) })
}

// Get current user
pub async fn get_profile(db: &MongoDB, user_id: ObjectId) -> AppResult<UserProfile> {
    let user = db
        .collection::<User>(USERS)
        .find_one(doc! { "_id": user_id })
        .await?
        .ok_or_else(|| AppError::NotFound("Usuario no encontrado".into()))?;

    Ok(UserProfile::from(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    fn saved_user() -> User {
        let mut user = User::new("Ana".into(), "ana@example.cl".into(), "hash".into());
        user.id = Some(ObjectId::new());
        user
    }

    #[test]
    fn test_token_roundtrip() {
        let config = test_config();
        let user = saved_user();

        let token = generate_jwt(&config, &user).unwrap();
        let claims = verify_token(&config, &token).unwrap();

        assert_eq!(claims.user_id().unwrap(), user.id.unwrap());
        assert_eq!(claims.email, "ana@example.cl");
        assert_eq!(claims.iss, config.jwt_issuer);
        // 7 days, give or take the test runtime
        let ttl = claims.exp as i64 - claims.iat as i64;
        assert_eq!(ttl, TOKEN_TTL_DAYS * 24 * 3600);
    }

    #[test]
    fn test_token_rejected_with_other_secret_or_audience() {
        let config = test_config();
        let token = generate_jwt(&config, &saved_user()).unwrap();

        let mut other_secret = test_config();
        other_secret.jwt_secret = "another-secret".into();
        assert!(matches!(verify_token(&other_secret, &token), Err(AppError::Unauthorized(_))));

        let mut other_audience = test_config();
        other_audience.jwt_audience = "someone-else".into();
        assert!(verify_token(&other_audience, &token).is_err());
    }

    #[test]
    fn test_unsaved_user_gets_no_token() {
        let user = User::new("Ana".into(), "ana@example.cl".into(), "hash".into());
        assert!(generate_jwt(&test_config(), &user).is_err());
    }

    #[test]
    fn test_register_validation() {
        let ok = RegisterRequest {
            nombre: Some(" Ana ".into()),
            email: Some(" Ana@Example.CL ".into()),
            password: Some("secreto".into()),
        };
        let (nombre, email, _) = ok.validate().unwrap();
        assert_eq!(nombre, "Ana");
        assert_eq!(email, "ana@example.cl");

        let short = RegisterRequest {
            nombre: Some("Ana".into()),
            email: Some("ana@example.cl".into()),
            password: Some("12345".into()),
        };
        assert!(matches!(short.validate(), Err(AppError::Validation(_))));

        let missing = RegisterRequest { nombre: None, email: Some("a@b.cl".into()), password: None };
        assert!(missing.validate().is_err());
    }

    #[test]
    fn test_login_accepts_legacy_field_name() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"correo":"ana@example.cl","password":"x"}"#).unwrap();
        assert_eq!(req.email.as_deref(), Some("ana@example.cl"));
    }
}
