use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

use crate::utils::dates::to_chrono;
use crate::utils::error::{AppError, AppResult};

/// Default search radius for the `$near` lookup, in meters
pub const DEFAULT_MAX_DISTANCE_M: f64 = 5000.0;

/// GeoJSON point, coordinates are `[lng, lat]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: String,
    #[schema(value_type = Vec<f64>)]
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn new(lng: f64, lat: f64) -> AppResult<Self> {
        if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::Validation(format!("Coordenadas inválidas: [{}, {}]", lng, lat)));
        }
        Ok(Self { kind: "Point".to_string(), coordinates: [lng, lat] })
    }

    pub fn lng(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }
}

/// Brick-and-mortar branch of a store (stored in `tiendas_fisicas`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalStore {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "nombre")]
    pub name: String,
    /// Store key shared with coupons (`paris`, `falabella`...)
    #[serde(rename = "tienda")]
    pub store: String,
    #[serde(rename = "direccion")]
    pub address: String,
    #[serde(rename = "ubicacion")]
    pub location: GeoPoint,
    #[serde(rename = "createdAt")]
    pub created_at: BsonDateTime,
}

impl PhysicalStore {
    fn demo(name: &str, store: &str, address: &str, lng: f64, lat: f64) -> AppResult<Self> {
        Ok(Self {
            id: None,
            name: name.to_string(),
            store: store.to_string(),
            address: address.to_string(),
            location: GeoPoint::new(lng, lat)?,
            created_at: BsonDateTime::now(),
        })
    }
}

/// Seed data for development environments.
pub fn demo_stores() -> AppResult<Vec<PhysicalStore>> {
    Ok(vec![
        PhysicalStore::demo(
            "Paris Mall Plaza Vespucio",
            "paris",
            "Av. Vicuña Mackenna 7110, La Florida",
            -70.5898,
            -33.5113,
        )?,
        PhysicalStore::demo(
            "Falabella Costanera Center",
            "falabella",
            "Av. Andrés Bello 2447, Providencia",
            -70.6053,
            -33.4217,
        )?,
    ])
}

#[derive(Debug, Clone, Deserialize)]
pub struct NearQuery {
    pub lng: Option<f64>,
    pub lat: Option<f64>,
    #[serde(rename = "maxDistancia")]
    pub max_distancia: Option<f64>,
}

impl NearQuery {
    /// Point and radius to search around, if both coordinates were sent.
    pub fn center(&self) -> AppResult<Option<(GeoPoint, f64)>> {
        match (self.lng, self.lat) {
            (Some(lng), Some(lat)) => {
                let radius = self.max_distancia.unwrap_or(DEFAULT_MAX_DISTANCE_M);
                if !radius.is_finite() || radius <= 0.0 {
                    return Err(AppError::Validation("maxDistancia debe ser positiva".into()));
                }
                Ok(Some((GeoPoint::new(lng, lat)?, radius)))
            }
            (None, None) => Ok(None),
            _ => Err(AppError::Validation("Se requieren lng y lat juntos".into())),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PhysicalStoreResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub nombre: String,
    pub tienda: String,
    pub direccion: String,
    pub ubicacion: GeoPoint,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl From<PhysicalStore> for PhysicalStoreResponse {
    fn from(store: PhysicalStore) -> Self {
        PhysicalStoreResponse {
            id: store.id.map(|id| id.to_hex()).unwrap_or_default(),
            nombre: store.name,
            tienda: store.store,
            direccion: store.address,
            ubicacion: store.location,
            created_at: to_chrono(store.created_at),
        }
    }
}
