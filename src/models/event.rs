use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, Bson, DateTime as BsonDateTime, Document};
use serde::{Deserialize, Serialize};

use crate::utils::dates::to_chrono;
use crate::utils::error::{AppError, AppResult};

/// Client analytics event (stored in `eventos`, write-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "usuario")]
    pub user: ObjectId,
    /// e.g. `visita_cupones`, `visita_metas`
    #[serde(rename = "tipo")]
    pub kind: String,
    #[serde(rename = "datos", default)]
    pub data: Document,
    #[serde(rename = "creadoEn")]
    pub created_at: BsonDateTime,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct NewEvent {
    pub tipo: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub datos: Option<serde_json::Value>,
}

impl Event {
    pub fn new(user: ObjectId, input: NewEvent) -> AppResult<Self> {
        let kind = input
            .tipo
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Validation("El tipo de evento es obligatorio".into()))?;

        let data = match input.datos {
            None | Some(serde_json::Value::Null) => Document::new(),
            Some(value @ serde_json::Value::Object(_)) => mongodb::bson::to_document(&value)?,
            Some(_) => {
                return Err(AppError::Validation("datos debe ser un objeto".into()));
            }
        };

        Ok(Self { id: None, user, kind, data, created_at: BsonDateTime::now() })
    }
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub usuario: String,
    pub tipo: String,
    pub datos: serde_json::Value,
    #[serde(rename = "creadoEn")]
    pub creado_en: DateTime<Utc>,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        EventResponse {
            id: event.id.map(|id| id.to_hex()).unwrap_or_default(),
            usuario: event.user.to_hex(),
            tipo: event.kind,
            datos: Bson::Document(event.data).into_relaxed_extjson(),
            creado_en: to_chrono(event.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_requires_type() {
        let missing = NewEvent { tipo: None, datos: None };
        assert!(matches!(Event::new(ObjectId::new(), missing), Err(AppError::Validation(_))));

        let blank = NewEvent { tipo: Some("  ".into()), datos: None };
        assert!(Event::new(ObjectId::new(), blank).is_err());
    }

    #[test]
    fn test_event_data_defaults_to_empty_object() {
        let event = Event::new(
            ObjectId::new(),
            NewEvent { tipo: Some("visita_metas".into()), datos: None },
        )
        .unwrap();
        assert_eq!(event.kind, "visita_metas");
        assert!(event.data.is_empty());
    }

    #[test]
    fn test_event_keeps_free_form_data() {
        let event = Event::new(
            ObjectId::new(),
            NewEvent {
                tipo: Some("visita_cupones_categoria".into()),
                datos: Some(json!({ "categoria": "deporte" })),
            },
        )
        .unwrap();
        assert_eq!(event.data.get_str("categoria").unwrap(), "deporte");

        let scalar = NewEvent { tipo: Some("x".into()), datos: Some(json!(3)) };
        assert!(Event::new(ObjectId::new(), scalar).is_err());
    }

    #[test]
    fn test_response_returns_plain_json() {
        let mut event = Event::new(
            ObjectId::new(),
            NewEvent { tipo: Some("visita_presupuesto".into()), datos: Some(json!({ "n": 2 })) },
        )
        .unwrap();
        event.id = Some(ObjectId::new());

        let json = serde_json::to_value(EventResponse::from(event)).unwrap();
        assert_eq!(json["tipo"], "visita_presupuesto");
        assert_eq!(json["datos"]["n"], 2);
        assert_eq!(json["_id"].as_str().map(str::len), Some(24));
    }
}
