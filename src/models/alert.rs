use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

use super::codigo::CouponCategory;

/// Subscription of a user to new coupons of one category (stored in `alertas`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSubscription {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "usuario")]
    pub user: ObjectId,
    #[serde(rename = "categoria")]
    pub category: CouponCategory,
    #[serde(rename = "createdAt")]
    pub created_at: BsonDateTime,
}

impl AlertSubscription {
    pub fn new(user: ObjectId, category: CouponCategory) -> Self {
        Self { id: None, user, category, created_at: BsonDateTime::now() }
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct ToggleAlertRequest {
    pub categoria: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ToggleAlertResponse {
    pub msg: String,
    pub activa: bool,
}

impl ToggleAlertResponse {
    pub fn subscribed(category: CouponCategory) -> Self {
        Self { msg: format!("Suscrito a {} correctamente.", category), activa: true }
    }

    pub fn cancelled(category: CouponCategory) -> Self {
        Self { msg: format!("Suscripción a {} cancelada.", category), activa: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_document_shape() {
        let sub = AlertSubscription::new(ObjectId::new(), CouponCategory::Tecnologia);
        let doc = mongodb::bson::to_document(&sub).unwrap();
        assert_eq!(doc.get_str("categoria").unwrap(), "tecnologia");
        assert!(doc.get_object_id("usuario").is_ok());
        assert!(!doc.contains_key("_id"));
    }

    #[test]
    fn test_toggle_messages() {
        let on = ToggleAlertResponse::subscribed(CouponCategory::Deporte);
        assert_eq!(on.msg, "Suscrito a deporte correctamente.");
        assert!(on.activa);

        let off = ToggleAlertResponse::cancelled(CouponCategory::Hogar);
        assert_eq!(off.msg, "Suscripción a hogar cancelada.");
        assert!(!off.activa);
    }
}
