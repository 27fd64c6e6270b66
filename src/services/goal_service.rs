use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};

use crate::{
    database::{MongoDB, GOALS},
    models::{
        goal::COMPLETION_POINTS, GoalResponse, GoalStatus, NewGoal, SavingsGoal, UpdateGoal,
    },
    services::user_service,
    utils::{
        error::{AppError, AppResult},
        format::format_clp,
    },
};

const SAVE_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundsMove {
    Deposit,
    Withdraw,
}

#[derive(Debug)]
pub struct FundsResult {
    pub goal: GoalResponse,
    pub mensaje: String,
}

pub fn funds_message(movement: FundsMove, amount: f64, goal: &SavingsGoal, just_completed: bool) -> String {
    match movement {
        FundsMove::Deposit if just_completed => {
            format!("🎉 ¡Felicitaciones! Completaste tu meta \"{}\"", goal.name)
        }
        FundsMove::Deposit => format!("💰 Agregaste ${} a tu meta", format_clp(amount)),
        FundsMove::Withdraw => format!("💸 Retiraste ${} de tu meta", format_clp(amount)),
    }
}

/// Loads a goal and checks it belongs to `user`.
async fn owned_goal(db: &MongoDB, user: ObjectId, id: ObjectId) -> AppResult<SavingsGoal> {
    let goal = db
        .collection::<SavingsGoal>(GOALS)
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Meta no encontrada".into()))?;

    if goal.user != user {
        log::warn!("⛔ User {} tried to access goal {} of {}", user, id, goal.user);
        return Err(AppError::Forbidden("No autorizado".into()));
    }
    Ok(goal)
}

/// Writes the goal back only if nobody changed it since it was read.
async fn replace_if_unchanged(
    db: &MongoDB,
    goal: &SavingsGoal,
    read: &SavingsGoal,
) -> AppResult<bool> {
    let id = goal.id.ok_or_else(|| AppError::Internal("Goal without id".into()))?;
    let filter = doc! {
        "_id": id,
        "updatedAt": read.updated_at,
        "historial": { "$size": read.history.len() as i64 },
    };

    let result = db.collection::<SavingsGoal>(GOALS).replace_one(filter, goal).await?;
    Ok(result.matched_count == 1)
}

pub async fn list_goals(
    db: &MongoDB,
    user: ObjectId,
    status: Option<GoalStatus>,
) -> AppResult<Vec<GoalResponse>> {
    let mut filter = doc! { "usuario": user };
    if let Some(status) = status {
        filter.insert("estado", status.as_str());
    }

    let goals: Vec<SavingsGoal> = db
        .collection::<SavingsGoal>(GOALS)
        .find(filter)
        .sort(doc! { "fechaLimite": 1 })
        .await?
        .try_collect()
        .await?;

    Ok(goals.into_iter().map(GoalResponse::from).collect())
}

pub async fn create_goal(db: &MongoDB, user: ObjectId, input: NewGoal) -> AppResult<GoalResponse> {
    let mut goal = SavingsGoal::new(user, input)?;
    let result = db.collection::<SavingsGoal>(GOALS).insert_one(&goal).await?;
    goal.id = result.inserted_id.as_object_id();

    if let Some(id) = goal.id {
        user_service::add_active_goal(db, user, id).await?;
    }

    log::info!("🎯 Goal '{}' created for user {} (target {})", goal.name, user, goal.target_amount);
    Ok(GoalResponse::from(goal))
}

pub async fn update_goal(
    db: &MongoDB,
    user: ObjectId,
    id: ObjectId,
    update: UpdateGoal,
) -> AppResult<GoalResponse> {
    update.validate()?;

    for _ in 0..SAVE_ATTEMPTS {
        let read = owned_goal(db, user, id).await?;
        let mut goal = read.clone();
        goal.apply_update(update.clone())?;

        if replace_if_unchanged(db, &goal, &read).await? {
            log::info!("✏️ Goal {} updated", id);
            return Ok(GoalResponse::from(goal));
        }
    }

    Err(AppError::Internal("La meta fue modificada al mismo tiempo, inténtalo nuevamente".into()))
}

/// Deposits into or withdraws from a goal.
///
/// Completion is decided on the written state, so concurrent deposits
/// award the completion bonus once.
pub async fn move_funds(
    db: &MongoDB,
    user: ObjectId,
    id: ObjectId,
    movement: FundsMove,
    amount: Option<f64>,
) -> AppResult<FundsResult> {
    let amount = amount
        .filter(|m| m.is_finite() && *m > 0.0)
        .ok_or_else(|| AppError::Validation("Monto inválido".into()))?;

    for attempt in 1..=SAVE_ATTEMPTS {
        let read = owned_goal(db, user, id).await?;
        let mut goal = read.clone();

        let outcome = match movement {
            FundsMove::Deposit => goal.deposit(amount)?,
            FundsMove::Withdraw => goal.withdraw(amount)?,
        };

        if !replace_if_unchanged(db, &goal, &read).await? {
            log::warn!("🔁 Funds move on goal {} lost a race (attempt {})", id, attempt);
            continue;
        }

        if outcome.just_completed {
            user_service::award_experience(db, user, COMPLETION_POINTS).await?;
            log::info!("🎉 Goal {} completed by user {}", id, user);
        }

        log::info!(
            "💰 Goal {} {:?} {} -> {} / {}",
            id,
            movement,
            amount,
            goal.current_amount,
            goal.target_amount
        );

        let mensaje = funds_message(movement, amount, &goal, outcome.just_completed);
        return Ok(FundsResult { goal: GoalResponse::from(goal), mensaje });
    }

    Err(AppError::Internal("La meta fue modificada al mismo tiempo, inténtalo nuevamente".into()))
}

pub async fn delete_goal(db: &MongoDB, user: ObjectId, id: ObjectId) -> AppResult<()> {
    owned_goal(db, user, id).await?;

    db.collection::<SavingsGoal>(GOALS).delete_one(doc! { "_id": id }).await?;
    user_service::remove_active_goal(db, user, id).await?;

    log::info!("🗑️ Goal {} deleted", id);
    Ok(())
}

/// Active goals of a user, for the assistant context.
pub async fn active_goals(db: &MongoDB, user: ObjectId, limit: i64) -> AppResult<Vec<SavingsGoal>> {
    let goals = db
        .collection::<SavingsGoal>(GOALS)
        .find(doc! { "usuario": user, "estado": GoalStatus::Activa.as_str() })
        .limit(limit)
        .await?
        .try_collect()
        .await?;
    Ok(goals)
}
