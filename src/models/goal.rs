use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

use crate::utils::dates::{to_bson, to_chrono};
use crate::utils::error::{AppError, AppResult};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 300;
/// Experience awarded when a goal is completed
pub const COMPLETION_POINTS: i64 = 500;

const DEFAULT_ICON: &str = "🎯";
const DEFAULT_COLOR: &str = "#3B82F6";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, utoipa::ToSchema)]
pub enum GoalCategory {
    Viaje,
    #[serde(rename = "Tecnología")]
    Tecnologia,
    #[serde(rename = "Educación")]
    Educacion,
    Hogar,
    Emergencia,
    #[serde(rename = "Inversión")]
    Inversion,
    #[default]
    Otro,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    #[default]
    Activa,
    Completada,
    Pausada,
    Cancelada,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Activa => "activa",
            GoalStatus::Completada => "completada",
            GoalStatus::Pausada => "pausada",
            GoalStatus::Cancelada => "cancelada",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Deposito,
    Retiro,
}

/// One entry of the append-only funds history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalMovement {
    pub tipo: MovementKind,
    pub monto: f64,
    pub fecha: BsonDateTime,
}

/// Savings goal (stored in `metas`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsGoal {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "usuario")]
    pub user: ObjectId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "montoObjetivo")]
    pub target_amount: f64,
    #[serde(rename = "montoActual", default)]
    pub current_amount: f64,
    #[serde(rename = "categoria", default)]
    pub category: GoalCategory,
    #[serde(rename = "fechaInicio")]
    pub start_date: BsonDateTime,
    #[serde(rename = "fechaLimite", default)]
    pub deadline: Option<BsonDateTime>,
    #[serde(rename = "estado", default)]
    pub status: GoalStatus,
    #[serde(rename = "icono")]
    pub icon: String,
    pub color: String,
    #[serde(rename = "historial", default)]
    pub history: Vec<GoalMovement>,
    #[serde(rename = "createdAt")]
    pub created_at: BsonDateTime,
    #[serde(rename = "updatedAt")]
    pub updated_at: BsonDateTime,
}

/// Result of moving funds in or out of a goal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundsOutcome {
    /// True only on the deposit that moved the goal from active to completed
    pub just_completed: bool,
}

impl SavingsGoal {
    pub fn new(user: ObjectId, input: NewGoal) -> AppResult<Self> {
        input.validate()?;

        let now = BsonDateTime::now();
        Ok(Self {
            id: None,
            user,
            name: input.nombre.trim().to_string(),
            description: input.descripcion,
            target_amount: input.monto_objetivo,
            current_amount: 0.0,
            category: input.categoria.unwrap_or_default(),
            start_date: now,
            deadline: input.fecha_limite.map(to_bson),
            status: GoalStatus::Activa,
            icon: input.icono.unwrap_or_else(|| DEFAULT_ICON.to_string()),
            color: input.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Progress capped at 100, as a number.
    pub fn progress(&self) -> f64 {
        if self.target_amount <= 0.0 {
            return 0.0;
        }
        (self.current_amount / self.target_amount * 100.0).min(100.0)
    }

    /// Progress formatted with two decimals (`"62.50"`).
    pub fn progress_label(&self) -> String {
        format!("{:.2}", self.progress())
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == GoalStatus::Activa
            && self.deadline.is_some_and(|deadline| now > to_chrono(deadline))
    }

    pub fn days_since_creation(&self, now: DateTime<Utc>) -> i64 {
        (now - to_chrono(self.created_at)).num_days()
    }

    fn ensure_movable(&self, amount: f64) -> AppResult<()> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::Validation("Monto inválido".into()));
        }
        if self.status == GoalStatus::Cancelada {
            return Err(AppError::Validation("La meta está cancelada".into()));
        }
        Ok(())
    }

    /// Adds funds and completes the goal once the target is reached.
    pub fn deposit(&mut self, amount: f64) -> AppResult<FundsOutcome> {
        self.ensure_movable(amount)?;

        self.current_amount += amount;
        self.history.push(GoalMovement {
            tipo: MovementKind::Deposito,
            monto: amount,
            fecha: BsonDateTime::now(),
        });
        self.updated_at = BsonDateTime::now();

        let just_completed =
            self.status == GoalStatus::Activa && self.current_amount >= self.target_amount;
        if just_completed {
            self.status = GoalStatus::Completada;
        }

        Ok(FundsOutcome { just_completed })
    }

    /// Takes funds out. A completed goal stays completed.
    pub fn withdraw(&mut self, amount: f64) -> AppResult<FundsOutcome> {
        self.ensure_movable(amount)?;
        if amount > self.current_amount {
            return Err(AppError::Validation("Fondos insuficientes en la meta".into()));
        }

        self.current_amount -= amount;
        self.history.push(GoalMovement {
            tipo: MovementKind::Retiro,
            monto: amount,
            fecha: BsonDateTime::now(),
        });
        self.updated_at = BsonDateTime::now();

        Ok(FundsOutcome { just_completed: false })
    }

    /// Applies a partial update from the client.
    pub fn apply_update(&mut self, update: UpdateGoal) -> AppResult<()> {
        update.validate()?;

        if let Some(nombre) = update.nombre {
            self.name = nombre.trim().to_string();
        }
        if let Some(descripcion) = update.descripcion {
            self.description = Some(descripcion);
        }
        if let Some(monto) = update.monto_objetivo {
            self.target_amount = monto;
        }
        if let Some(fecha) = update.fecha_limite {
            self.deadline = Some(to_bson(fecha));
        }
        if let Some(categoria) = update.categoria {
            self.category = categoria;
        }
        if let Some(estado) = update.estado {
            self.status = estado;
        }
        if let Some(icono) = update.icono {
            self.icon = icono;
        }
        if let Some(color) = update.color {
            self.color = color;
        }
        self.updated_at = BsonDateTime::now();
        Ok(())
    }
}

fn validate_name(nombre: &str) -> AppResult<()> {
    let nombre = nombre.trim();
    if nombre.is_empty() {
        return Err(AppError::Validation("El nombre de la meta es obligatorio".into()));
    }
    if nombre.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "El nombre no puede superar {} caracteres",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

fn validate_description(descripcion: Option<&String>) -> AppResult<()> {
    if descripcion.is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN) {
        return Err(AppError::Validation(format!(
            "La descripción no puede superar {} caracteres",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok(())
}

fn validate_target(monto: f64) -> AppResult<()> {
    if !monto.is_finite() || monto < 1.0 {
        return Err(AppError::Validation("El monto objetivo debe ser al menos 1".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct NewGoal {
    pub nombre: String,
    pub descripcion: Option<String>,
    #[serde(rename = "montoObjetivo")]
    pub monto_objetivo: f64,
    #[serde(rename = "fechaLimite")]
    pub fecha_limite: Option<DateTime<Utc>>,
    pub categoria: Option<GoalCategory>,
    pub icono: Option<String>,
    pub color: Option<String>,
}

impl NewGoal {
    pub fn validate(&self) -> AppResult<()> {
        validate_name(&self.nombre)?;
        validate_description(self.descripcion.as_ref())?;
        validate_target(self.monto_objetivo)
    }
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateGoal {
    pub nombre: Option<String>,
    pub descripcion: Option<String>,
    #[serde(rename = "montoObjetivo")]
    pub monto_objetivo: Option<f64>,
    #[serde(rename = "fechaLimite")]
    pub fecha_limite: Option<DateTime<Utc>>,
    pub categoria: Option<GoalCategory>,
    pub estado: Option<GoalStatus>,
    pub icono: Option<String>,
    pub color: Option<String>,
}

impl UpdateGoal {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(nombre) = &self.nombre {
            validate_name(nombre)?;
        }
        validate_description(self.descripcion.as_ref())?;
        if let Some(monto) = self.monto_objetivo {
            validate_target(monto)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct FundsRequest {
    pub monto: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct GoalMovementResponse {
    pub tipo: MovementKind,
    pub monto: f64,
    pub fecha: DateTime<Utc>,
}

/// Goal as returned by the API, with derived fields
#[derive(Debug, Serialize)]
pub struct GoalResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub usuario: String,
    pub nombre: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descripcion: Option<String>,
    #[serde(rename = "montoObjetivo")]
    pub monto_objetivo: f64,
    #[serde(rename = "montoActual")]
    pub monto_actual: f64,
    pub categoria: GoalCategory,
    #[serde(rename = "fechaInicio")]
    pub fecha_inicio: DateTime<Utc>,
    #[serde(rename = "fechaLimite")]
    pub fecha_limite: Option<DateTime<Utc>>,
    pub estado: GoalStatus,
    pub icono: String,
    pub color: String,
    pub historial: Vec<GoalMovementResponse>,
    pub progreso: String,
    #[serde(rename = "estaVencida")]
    pub esta_vencida: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<SavingsGoal> for GoalResponse {
    fn from(goal: SavingsGoal) -> Self {
        let progreso = goal.progress_label();
        let esta_vencida = goal.is_overdue(Utc::now());

        GoalResponse {
            id: goal.id.map(|id| id.to_hex()).unwrap_or_default(),
            usuario: goal.user.to_hex(),
            nombre: goal.name,
            descripcion: goal.description,
            monto_objetivo: goal.target_amount,
            monto_actual: goal.current_amount,
            categoria: goal.category,
            fecha_inicio: to_chrono(goal.start_date),
            fecha_limite: goal.deadline.map(to_chrono),
            estado: goal.status,
            icono: goal.icon,
            color: goal.color,
            historial: goal
                .history
                .into_iter()
                .map(|m| GoalMovementResponse {
                    tipo: m.tipo,
                    monto: m.monto,
                    fecha: to_chrono(m.fecha),
                })
                .collect(),
            progreso,
            esta_vencida,
            created_at: to_chrono(goal.created_at),
            updated_at: to_chrono(goal.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn goal(target: f64) -> SavingsGoal {
        SavingsGoal::new(
            ObjectId::new(),
            NewGoal {
                nombre: "Notebook nuevo".into(),
                descripcion: None,
                monto_objetivo: target,
                fecha_limite: None,
                categoria: Some(GoalCategory::Tecnologia),
                icono: Some("💻".into()),
                color: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_defaults_on_creation() {
        let g = goal(800000.0);
        assert_eq!(g.status, GoalStatus::Activa);
        assert_eq!(g.current_amount, 0.0);
        assert_eq!(g.color, "#3B82F6");
        assert_eq!(g.icon, "💻");
        assert_eq!(g.progress_label(), "0.00");
    }

    #[test]
    fn test_progress_two_decimals() {
        let mut g = goal(300.0);
        g.deposit(100.0).unwrap();
        assert_eq!(g.progress_label(), "33.33");
    }

    #[test]
    fn test_progress_capped_at_100() {
        let mut g = goal(1000.0);
        g.deposit(1500.0).unwrap();
        assert_eq!(g.progress_label(), "100.00");
    }

    #[test]
    fn test_completion_happens_exactly_once() {
        let mut g = goal(1000.0);

        assert!(!g.deposit(600.0).unwrap().just_completed);
        assert_eq!(g.status, GoalStatus::Activa);

        assert!(g.deposit(400.0).unwrap().just_completed);
        assert_eq!(g.status, GoalStatus::Completada);

        // Further deposits don't complete it again
        assert!(!g.deposit(50.0).unwrap().just_completed);
        assert_eq!(g.status, GoalStatus::Completada);
        assert_eq!(g.history.len(), 3);
    }

    #[test]
    fn test_withdraw_keeps_history_and_status() {
        let mut g = goal(1000.0);
        g.deposit(1000.0).unwrap();
        g.withdraw(300.0).unwrap();

        assert_eq!(g.current_amount, 700.0);
        assert_eq!(g.status, GoalStatus::Completada);
        assert_eq!(g.history.last().map(|m| m.tipo), Some(MovementKind::Retiro));
        assert!(g.withdraw(701.0).is_err());
    }

    #[test]
    fn test_invalid_amounts_rejected() {
        let mut g = goal(1000.0);
        assert!(g.deposit(0.0).is_err());
        assert!(g.deposit(-5.0).is_err());
        assert!(g.deposit(f64::NAN).is_err());
        assert!(g.history.is_empty());
    }

    #[test]
    fn test_cancelled_goal_rejects_funds() {
        let mut g = goal(1000.0);
        g.apply_update(UpdateGoal { estado: Some(GoalStatus::Cancelada), ..Default::default() })
            .unwrap();
        assert!(g.deposit(10.0).is_err());
    }

    #[test]
    fn test_paused_goal_does_not_auto_complete() {
        let mut g = goal(100.0);
        g.apply_update(UpdateGoal { estado: Some(GoalStatus::Pausada), ..Default::default() })
            .unwrap();
        assert!(!g.deposit(200.0).unwrap().just_completed);
        assert_eq!(g.status, GoalStatus::Pausada);
    }

    #[test]
    fn test_overdue_only_when_active() {
        let mut g = goal(1000.0);
        let now = Utc::now();
        g.deadline = Some(to_bson(now - Duration::days(1)));
        assert!(g.is_overdue(now));

        g.status = GoalStatus::Completada;
        assert!(!g.is_overdue(now));
    }

    #[test]
    fn test_validation() {
        let bad_target = NewGoal {
            nombre: "Viaje".into(),
            descripcion: None,
            monto_objetivo: 0.5,
            fecha_limite: None,
            categoria: None,
            icono: None,
            color: None,
        };
        assert!(bad_target.validate().is_err());

        let update = UpdateGoal { nombre: Some(" ".into()), ..Default::default() };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_response_exposes_derived_fields() {
        let mut g = goal(800000.0);
        g.id = Some(ObjectId::new());
        g.deposit(200000.0).unwrap();

        let json = serde_json::to_value(GoalResponse::from(g)).unwrap();
        assert_eq!(json["progreso"], "25.00");
        assert_eq!(json["estado"], "activa");
        assert_eq!(json["categoria"], "Tecnología");
        assert_eq!(json["estaVencida"], false);
        assert_eq!(json["historial"][0]["tipo"], "deposito");
    }
}
