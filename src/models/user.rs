use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

use crate::utils::dates::to_chrono;

/// Experience points needed per level.
pub const POINTS_PER_LEVEL: i64 = 1000;

/// Registered user (stored in `usuarios`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    /// bcrypt hash
    pub password: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(rename = "reputacion", default)]
    pub reputation: i64,
    #[serde(rename = "ahorroTotal", default)]
    pub total_savings: f64,
    #[serde(rename = "puntosExperiencia", default)]
    pub experience_points: i64,
    #[serde(rename = "nivel", default = "default_level")]
    pub level: i64,
    #[serde(rename = "estadisticas", default)]
    pub stats: UserStats,
    #[serde(rename = "metasActivas", default)]
    pub active_goals: Vec<ObjectId>,
    #[serde(rename = "presupuestoActual", default, skip_serializing_if = "Option::is_none")]
    pub current_budget: Option<ObjectId>,
    #[serde(rename = "creado")]
    pub created_at: BsonDateTime,
}

fn default_level() -> i64 {
    1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserStats {
    #[serde(rename = "cuponesUsados", default)]
    pub coupons_used: i64,
    #[serde(rename = "totalAhorrado", default)]
    pub total_saved: f64,
    #[serde(rename = "transaccionesRegistradas", default)]
    pub transactions_recorded: i64,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: None,
            name,
            email,
            password: password_hash,
            avatar: String::new(),
            reputation: 0,
            total_savings: 0.0,
            experience_points: 0,
            level: 1,
            stats: UserStats::default(),
            active_goals: Vec::new(),
            current_budget: None,
            created_at: BsonDateTime::now(),
        }
    }
}

/// Level for a given amount of experience points (level 1 starts at 0 points).
pub fn level_for_points(points: i64) -> i64 {
    1 + points.max(0) / POINTS_PER_LEVEL
}

/// User as returned by the API (never carries the password hash)
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UserProfile {
    pub id: String,
    pub nombre: String,
    pub email: String,
    pub avatar: String,
    pub reputacion: i64,
    #[serde(rename = "ahorroTotal")]
    pub ahorro_total: f64,
    #[serde(rename = "puntosExperiencia")]
    pub puntos_experiencia: i64,
    pub nivel: i64,
    #[schema(value_type = Object)]
    pub estadisticas: UserStats,
    #[serde(rename = "metasActivas")]
    pub metas_activas: Vec<String>,
    #[serde(rename = "presupuestoActual")]
    pub presupuesto_actual: Option<String>,
    pub creado: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            nombre: user.name,
            email: user.email,
            avatar: user.avatar,
            reputacion: user.reputation,
            ahorro_total: user.total_savings,
            puntos_experiencia: user.experience_points,
            nivel: user.level,
            estadisticas: user.stats,
            metas_activas: user.active_goals.iter().map(|id| id.to_hex()).collect(),
            presupuesto_actual: user.current_budget.map(|id| id.to_hex()),
            creado: to_chrono(user.created_at),
        }
    }
}

/// Public creator info embedded in coupon listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorSummary {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(rename = "reputacion", default)]
    pub reputation: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_progression() {
        assert_eq!(level_for_points(0), 1);
        assert_eq!(level_for_points(999), 1);
        assert_eq!(level_for_points(1000), 2);
        assert_eq!(level_for_points(2500), 3);
        assert_eq!(level_for_points(-10), 1);
    }

    #[test]
    fn test_profile_hides_password() {
        let mut user = User::new("Ana".into(), "ana@example.cl".into(), "$2b$12$hash".into());
        user.id = Some(ObjectId::new());

        let json = serde_json::to_value(UserProfile::from(user)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["nombre"], "Ana");
        assert_eq!(json["nivel"], 1);
        assert_eq!(json["estadisticas"]["transaccionesRegistradas"], 0);
    }

    #[test]
    fn test_legacy_document_fills_defaults() {
        // Users created before the finance features only carry the social fields
        let doc = mongodb::bson::doc! {
            "_id": ObjectId::new(),
            "nombre": "Luis",
            "email": "luis@example.cl",
            "password": "hash",
            "reputacion": 12_i64,
            "creado": BsonDateTime::now(),
        };
        let user: User = mongodb::bson::from_document(doc).unwrap();
        assert_eq!(user.reputation, 12);
        assert_eq!(user.level, 1);
        assert!(user.active_goals.is_empty());
        assert_eq!(user.stats, UserStats::default());
    }
}
