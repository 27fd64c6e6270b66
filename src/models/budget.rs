use std::collections::HashMap;

use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

use crate::utils::dates::to_chrono;
use crate::utils::error::{AppError, AppResult};
use crate::utils::format::percent_2dp;

pub const MAX_NOTES_LEN: usize = 500;
/// Number of periods returned by the history endpoint
pub const HISTORY_LIMIT: i64 = 12;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
pub struct BudgetCategory {
    pub nombre: String,
    pub limite: f64,
    #[serde(default)]
    pub gastado: f64,
}

/// Monthly budget (stored in `presupuestos`, one per user and period)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "usuario")]
    pub user: ObjectId,
    #[serde(rename = "mes")]
    pub month: u32,
    #[serde(rename = "anio")]
    pub year: i32,
    #[serde(rename = "categorias", default)]
    pub categories: Vec<BudgetCategory>,
    #[serde(rename = "totalPresupuesto", default)]
    pub total_budget: f64,
    #[serde(rename = "totalGastado", default)]
    pub total_spent: f64,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: BsonDateTime,
    #[serde(rename = "updatedAt")]
    pub updated_at: BsonDateTime,
}

impl Budget {
    /// Empty budget for a period.
    pub fn empty(user: ObjectId, month: u32, year: i32) -> Self {
        let now = BsonDateTime::now();
        Self {
            id: None,
            user,
            month,
            year,
            categories: Vec::new(),
            total_budget: 0.0,
            total_spent: 0.0,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Must run before every write.
    pub fn recompute_totals(&mut self) {
        self.total_budget = self.categories.iter().map(|c| c.limite).sum();
        self.total_spent = self.categories.iter().map(|c| c.gastado).sum();
        self.updated_at = BsonDateTime::now();
    }

    /// Replaces categories and notes, keeping the period.
    pub fn replace_contents(&mut self, categories: Vec<BudgetCategory>, notes: Option<String>) {
        self.categories = categories;
        self.notes = notes;
        self.recompute_totals();
    }

    /// Overwrites `gastado` from real spending; categories without spending go to 0.
    pub fn apply_spent(&mut self, spent_by_category: &HashMap<String, f64>) {
        for category in &mut self.categories {
            category.gastado = spent_by_category.get(&category.nombre).copied().unwrap_or(0.0);
        }
        self.recompute_totals();
    }

    pub fn usage_percent(&self) -> String {
        percent_2dp(self.total_spent, self.total_budget)
    }

    pub fn usage_value(&self) -> f64 {
        self.usage_percent().parse().unwrap_or(0.0)
    }
}

fn validate_categories(categories: &[BudgetCategory]) -> AppResult<()> {
    for category in categories {
        if category.nombre.trim().is_empty() {
            return Err(AppError::Validation("Cada categoría necesita un nombre".into()));
        }
        if !category.limite.is_finite() || category.limite < 0.0 {
            return Err(AppError::Validation(format!(
                "Límite inválido para la categoría {}",
                category.nombre
            )));
        }
        if !category.gastado.is_finite() || category.gastado < 0.0 {
            return Err(AppError::Validation(format!(
                "Gasto inválido para la categoría {}",
                category.nombre
            )));
        }
    }
    Ok(())
}

fn validate_notes(notes: Option<&String>) -> AppResult<()> {
    if notes.is_some_and(|n| n.chars().count() > MAX_NOTES_LEN) {
        return Err(AppError::Validation(format!(
            "Las notas no pueden superar {} caracteres",
            MAX_NOTES_LEN
        )));
    }
    Ok(())
}

/// Body of `POST /api/presupuestos`
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct BudgetInput {
    pub mes: Option<u32>,
    pub anio: Option<i32>,
    #[serde(default)]
    pub categorias: Vec<BudgetCategory>,
    pub notas: Option<String>,
}

impl BudgetInput {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(mes) = self.mes {
            if !(1..=12).contains(&mes) {
                return Err(AppError::Validation(format!("Mes inválido: {}", mes)));
            }
        }
        validate_categories(&self.categorias)?;
        validate_notes(self.notas.as_ref())
    }
}

/// Body of `PUT /api/presupuestos/:id`
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct UpdateBudget {
    pub categorias: Option<Vec<BudgetCategory>>,
    pub notas: Option<String>,
}

impl UpdateBudget {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(categorias) = &self.categorias {
            validate_categories(categorias)?;
        }
        validate_notes(self.notas.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeriodQuery {
    pub mes: Option<u32>,
    pub anio: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct BudgetResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub usuario: String,
    pub mes: u32,
    pub anio: i32,
    pub categorias: Vec<BudgetCategory>,
    #[serde(rename = "totalPresupuesto")]
    pub total_presupuesto: f64,
    #[serde(rename = "totalGastado")]
    pub total_gastado: f64,
    #[serde(rename = "porcentajeUsado")]
    pub porcentaje_usado: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notas: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<Budget> for BudgetResponse {
    fn from(budget: Budget) -> Self {
        let porcentaje_usado = budget.usage_percent();
        BudgetResponse {
            id: budget.id.map(|id| id.to_hex()).unwrap_or_default(),
            usuario: budget.user.to_hex(),
            mes: budget.month,
            anio: budget.year,
            categorias: budget.categories,
            total_presupuesto: budget.total_budget,
            total_gastado: budget.total_spent,
            porcentaje_usado,
            notas: budget.notes,
            created_at: to_chrono(budget.created_at),
            updated_at: to_chrono(budget.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(nombre: &str, limite: f64, gastado: f64) -> BudgetCategory {
        BudgetCategory { nombre: nombre.into(), limite, gastado }
    }

    #[test]
    fn test_totals_follow_categories() {
        let mut budget = Budget::empty(ObjectId::new(), 11, 2025);
        budget.replace_contents(
            vec![category("Alimentación", 200000.0, 0.0), category("Transporte", 80000.0, 0.0)],
            None,
        );

        assert_eq!(budget.total_budget, 280000.0);
        assert_eq!(budget.total_spent, 0.0);
        assert_eq!(budget.usage_percent(), "0.00");
    }

    #[test]
    fn test_usage_zero_when_no_limits() {
        let budget = Budget::empty(ObjectId::new(), 1, 2026);
        assert_eq!(budget.usage_percent(), "0.00");
        assert_eq!(budget.usage_value(), 0.0);
    }

    #[test]
    fn test_apply_spent_overwrites_and_zeroes_missing() {
        let mut budget = Budget::empty(ObjectId::new(), 11, 2025);
        budget.replace_contents(
            vec![
                category("Alimentación", 200000.0, 999.0),
                category("Transporte", 80000.0, 5000.0),
            ],
            None,
        );

        let spent = HashMap::from([("Alimentación".to_string(), 150000.0)]);
        budget.apply_spent(&spent);

        assert_eq!(budget.categories[0].gastado, 150000.0);
        assert_eq!(budget.categories[1].gastado, 0.0);
        assert_eq!(budget.total_spent, 150000.0);
        assert_eq!(budget.usage_percent(), "53.57");
    }

    #[test]
    fn test_input_validation() {
        let negative = BudgetInput {
            mes: Some(5),
            anio: Some(2025),
            categorias: vec![category("Salud", -1.0, 0.0)],
            notas: None,
        };
        assert!(negative.validate().is_err());

        let bad_month = BudgetInput { mes: Some(13), anio: None, categorias: vec![], notas: None };
        assert!(bad_month.validate().is_err());

        let long_notes = UpdateBudget { categorias: None, notas: Some("x".repeat(501)) };
        assert!(long_notes.validate().is_err());
    }

    #[test]
    fn test_response_carries_percentage_string() {
        let mut budget = Budget::empty(ObjectId::new(), 3, 2025);
        budget.id = Some(ObjectId::new());
        budget.replace_contents(vec![category("Ropa", 1000.0, 250.0)], Some("marzo".into()));

        let json = serde_json::to_value(BudgetResponse::from(budget)).unwrap();
        assert_eq!(json["porcentajeUsado"], "25.00");
        assert_eq!(json["totalPresupuesto"], 1000.0);
        assert_eq!(json["notas"], "marzo");
    }
}
