use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

use crate::utils::dates::{to_bson, to_chrono};
use crate::utils::error::{AppError, AppResult};

pub const MAX_DESCRIPTION_LEN: usize = 200;
pub const MAX_NOTES_LEN: usize = 500;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Ingreso,
    Gasto,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Ingreso => "ingreso",
            TransactionKind::Gasto => "gasto",
        }
    }
}

/// Closed set of transaction categories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, utoipa::ToSchema)]
pub enum TransactionCategory {
    #[serde(rename = "Alimentación")]
    Alimentacion,
    Transporte,
    Entretenimiento,
    Salud,
    #[serde(rename = "Educación")]
    Educacion,
    Vivienda,
    Ropa,
    #[serde(rename = "Tecnología")]
    Tecnologia,
    Servicios,
    Ahorro,
    Otros,
}

impl TransactionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionCategory::Alimentacion => "Alimentación",
            TransactionCategory::Transporte => "Transporte",
            TransactionCategory::Entretenimiento => "Entretenimiento",
            TransactionCategory::Salud => "Salud",
            TransactionCategory::Educacion => "Educación",
            TransactionCategory::Vivienda => "Vivienda",
            TransactionCategory::Ropa => "Ropa",
            TransactionCategory::Tecnologia => "Tecnología",
            TransactionCategory::Servicios => "Servicios",
            TransactionCategory::Ahorro => "Ahorro",
            TransactionCategory::Otros => "Otros",
        }
    }
}

impl fmt::Display for TransactionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Income or expense entry (stored in `transacciones`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "usuario")]
    pub user: ObjectId,
    #[serde(rename = "tipo")]
    pub kind: TransactionKind,
    #[serde(rename = "monto")]
    pub amount: f64,
    #[serde(rename = "categoria")]
    pub category: TransactionCategory,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "fecha")]
    pub date: BsonDateTime,
    #[serde(rename = "cuponUtilizado", default)]
    pub coupon_used: Option<ObjectId>,
    /// Price before the discount
    #[serde(rename = "montoOriginal", default)]
    pub original_amount: Option<f64>,
    #[serde(rename = "ahorroGenerado", default)]
    pub savings: f64,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: BsonDateTime,
    #[serde(rename = "updatedAt")]
    pub updated_at: BsonDateTime,
}

/// Savings generated by a discounted purchase: `original - final` when both
/// are present and positive, zero otherwise.
pub fn savings_for(amount: f64, original_amount: Option<f64>) -> f64 {
    match original_amount {
        Some(original) if original > 0.0 && amount > 0.0 => (original - amount).max(0.0),
        _ => 0.0,
    }
}

impl Transaction {
    pub fn new(user: ObjectId, input: NewTransaction) -> AppResult<Self> {
        input.validate()?;
        let coupon_used = input.coupon_id()?;

        let now = BsonDateTime::now();
        let mut tx = Self {
            id: None,
            user,
            kind: input.tipo,
            amount: input.monto,
            category: input.categoria,
            description: input.descripcion.trim().to_string(),
            date: input.fecha.map(to_bson).unwrap_or(now),
            coupon_used,
            original_amount: input.monto_original,
            savings: 0.0,
            notes: input.notas,
            created_at: now,
            updated_at: now,
        };
        tx.recompute_savings();
        Ok(tx)
    }

    pub fn recompute_savings(&mut self) {
        self.savings = savings_for(self.amount, self.original_amount);
    }

    /// Experience awarded for the savings of this transaction (1 point per $100 saved).
    pub fn experience_points(&self) -> i64 {
        (self.savings / 100.0).floor() as i64
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct NewTransaction {
    pub tipo: TransactionKind,
    pub monto: f64,
    pub categoria: TransactionCategory,
    pub descripcion: String,
    pub fecha: Option<DateTime<Utc>>,
    /// Coupon id as sent by the client; blank means none
    #[serde(rename = "cuponUtilizado")]
    pub cupon_utilizado: Option<String>,
    #[serde(rename = "montoOriginal")]
    pub monto_original: Option<f64>,
    pub notas: Option<String>,
}

impl NewTransaction {
    pub fn coupon_id(&self) -> AppResult<Option<ObjectId>> {
        match self.cupon_utilizado.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(hex) => ObjectId::parse_str(hex)
                .map(Some)
                .map_err(|_| AppError::Validation("Cupón utilizado inválido".into())),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if !self.monto.is_finite() || self.monto < 0.0 {
            return Err(AppError::Validation("El monto debe ser mayor o igual a 0".into()));
        }
        let description = self.descripcion.trim();
        if description.is_empty() {
            return Err(AppError::Validation("La descripción es obligatoria".into()));
        }
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(AppError::Validation(format!(
                "La descripción no puede superar {} caracteres",
                MAX_DESCRIPTION_LEN
            )));
        }
        if let Some(original) = self.monto_original {
            if !original.is_finite() || original < 0.0 {
                return Err(AppError::Validation("El monto original debe ser mayor o igual a 0".into()));
            }
            if original > 0.0 && original < self.monto {
                return Err(AppError::Validation(
                    "El monto original no puede ser menor que el monto pagado".into(),
                ));
            }
        }
        if self.notas.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTES_LEN) {
            return Err(AppError::Validation(format!(
                "Las notas no pueden superar {} caracteres",
                MAX_NOTES_LEN
            )));
        }
        Ok(())
    }
}

/// Coupon fields embedded when listing transactions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponSummary {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub codigo: String,
    pub tienda: String,
    pub descuento: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CouponRef {
    Populated {
        #[serde(rename = "_id")]
        id: String,
        codigo: String,
        tienda: String,
        descuento: String,
    },
    Reference(String),
}

/// Transaction as returned by the API
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub usuario: String,
    pub tipo: TransactionKind,
    pub monto: f64,
    pub categoria: TransactionCategory,
    pub descripcion: String,
    pub fecha: DateTime<Utc>,
    #[serde(rename = "cuponUtilizado")]
    pub cupon_utilizado: Option<CouponRef>,
    #[serde(rename = "montoOriginal")]
    pub monto_original: Option<f64>,
    #[serde(rename = "ahorroGenerado")]
    pub ahorro_generado: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notas: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl TransactionResponse {
    pub fn with_coupons(tx: Transaction, coupons: &HashMap<ObjectId, CouponSummary>) -> Self {
        let cupon_utilizado = tx.coupon_used.map(|id| match coupons.get(&id) {
            Some(c) => CouponRef::Populated {
                id: c.id.to_hex(),
                codigo: c.codigo.clone(),
                tienda: c.tienda.clone(),
                descuento: c.descuento.clone(),
            },
            None => CouponRef::Reference(id.to_hex()),
        });

        TransactionResponse {
            id: tx.id.map(|id| id.to_hex()).unwrap_or_default(),
            usuario: tx.user.to_hex(),
            tipo: tx.kind,
            monto: tx.amount,
            categoria: tx.category,
            descripcion: tx.description,
            fecha: to_chrono(tx.date),
            cupon_utilizado,
            monto_original: tx.original_amount,
            ahorro_generado: tx.savings,
            notas: tx.notes,
            created_at: to_chrono(tx.created_at),
            updated_at: to_chrono(tx.updated_at),
        }
    }
}

impl From<Transaction> for TransactionResponse {
    fn from(tx: Transaction) -> Self {
        Self::with_coupons(tx, &HashMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense(monto: f64, monto_original: Option<f64>) -> NewTransaction {
        NewTransaction {
            tipo: TransactionKind::Gasto,
            monto,
            categoria: TransactionCategory::Alimentacion,
            descripcion: "Supermercado con descuento".into(),
            fecha: None,
            cupon_utilizado: None,
            monto_original,
            notas: None,
        }
    }

    #[test]
    fn test_savings_from_original_amount() {
        let tx = Transaction::new(ObjectId::new(), expense(15000.0, Some(20000.0))).unwrap();
        assert_eq!(tx.savings, 5000.0);
        assert_eq!(tx.experience_points(), 50);
    }

    #[test]
    fn test_no_original_amount_means_no_savings() {
        let tx = Transaction::new(ObjectId::new(), expense(15000.0, None)).unwrap();
        assert_eq!(tx.savings, 0.0);
        assert_eq!(tx.experience_points(), 0);
    }

    #[test]
    fn test_zero_amounts_generate_no_savings() {
        assert_eq!(savings_for(0.0, Some(20000.0)), 0.0);
        assert_eq!(savings_for(15000.0, Some(0.0)), 0.0);
    }

    #[test]
    fn test_original_below_paid_is_rejected() {
        let err = Transaction::new(ObjectId::new(), expense(20000.0, Some(15000.0))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_validation_rules() {
        assert!(expense(-1.0, None).validate().is_err());

        let mut blank = expense(100.0, None);
        blank.descripcion = "   ".into();
        assert!(blank.validate().is_err());

        let mut long = expense(100.0, None);
        long.descripcion = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        assert!(long.validate().is_err());

        let mut accents = expense(100.0, None);
        accents.descripcion = "á".repeat(MAX_DESCRIPTION_LEN);
        assert!(accents.validate().is_ok());
    }

    #[test]
    fn test_coupon_reference_parsing() {
        let mut input = expense(100.0, None);
        input.cupon_utilizado = Some(String::new());
        assert_eq!(input.coupon_id().unwrap(), None);

        let coupon = ObjectId::new();
        input.cupon_utilizado = Some(coupon.to_hex());
        assert_eq!(input.coupon_id().unwrap(), Some(coupon));

        input.cupon_utilizado = Some("abc".into());
        assert!(Transaction::new(ObjectId::new(), input).is_err());
    }

    #[test]
    fn test_category_wire_names_keep_accents() {
        let json = serde_json::json!({
            "tipo": "gasto",
            "monto": 15000,
            "categoria": "Alimentación",
            "descripcion": "Almuerzo"
        });
        let input: NewTransaction = serde_json::from_value(json).unwrap();
        assert_eq!(input.categoria, TransactionCategory::Alimentacion);
        assert_eq!(serde_json::to_value(TransactionCategory::Tecnologia).unwrap(), "Tecnología");
        assert!(serde_json::from_value::<TransactionCategory>(serde_json::json!("Alimentacion")).is_err());
    }

    #[test]
    fn test_response_shape() {
        let mut tx = Transaction::new(ObjectId::new(), expense(15000.0, Some(20000.0))).unwrap();
        tx.id = Some(ObjectId::new());
        let json = serde_json::to_value(TransactionResponse::from(tx)).unwrap();
        assert_eq!(json["ahorroGenerado"], 5000.0);
        assert_eq!(json["montoOriginal"], 20000.0);
        assert_eq!(json["tipo"], "gasto");
        assert!(json["cuponUtilizado"].is_null());
    }
}
