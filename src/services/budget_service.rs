use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};

use crate::{
    database::{MongoDB, BUDGETS},
    models::{
        budget::HISTORY_LIMIT, Budget, BudgetInput, BudgetResponse, PeriodQuery, TransactionKind,
        UpdateBudget,
    },
    services::{transaction_service, user_service},
    utils::{
        dates::{current_period, month_bounds},
        error::{AppError, AppResult},
    },
};

/// Whether a budget save created a new period or replaced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Saved {
    Created,
    Updated,
}

fn resolve_period(mes: Option<u32>, anio: Option<i32>) -> AppResult<(u32, i32)> {
    let (current_month, current_year) = current_period();
    let period = (mes.unwrap_or(current_month), anio.unwrap_or(current_year));
    // Validates the month
    month_bounds(period.0, period.1)?;
    Ok(period)
}

async fn find_period(db: &MongoDB, user: ObjectId, month: u32, year: i32) -> AppResult<Option<Budget>> {
    let budget = db
        .collection::<Budget>(BUDGETS)
        .find_one(doc! { "usuario": user, "mes": month as i64, "anio": year as i64 })
        .await?;
    Ok(budget)
}

async fn owned_budget(db: &MongoDB, user: ObjectId, id: ObjectId) -> AppResult<Budget> {
    let budget = db
        .collection::<Budget>(BUDGETS)
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Presupuesto no encontrado".into()))?;

    if budget.user != user {
        log::warn!("⛔ User {} tried to access budget {} of {}", user, id, budget.user);
        return Err(AppError::Forbidden("No autorizado".into()));
    }
    Ok(budget)
}

async fn insert(db: &MongoDB, budget: &mut Budget) -> AppResult<()> {
    budget.recompute_totals();
    let result = db.collection::<Budget>(BUDGETS).insert_one(&*budget).await?;
    budget.id = result.inserted_id.as_object_id();

    if let Some(id) = budget.id {
        let (month, year) = current_period();
        if budget.month == month && budget.year == year {
            user_service::set_current_budget(db, budget.user, id).await?;
        }
    }
    Ok(())
}

async fn replace(db: &MongoDB, budget: &mut Budget) -> AppResult<()> {
    let id = budget.id.ok_or_else(|| AppError::Internal("Budget without id".into()))?;
    budget.recompute_totals();
    db.collection::<Budget>(BUDGETS)
        .replace_one(doc! { "_id": id }, &*budget)
        .await?;
    Ok(())
}

/// Budget for the requested (default current) period, created empty on first access.
pub async fn get_or_create(db: &MongoDB, user: ObjectId, query: &PeriodQuery) -> AppResult<BudgetResponse> {
    let (month, year) = resolve_period(query.mes, query.anio)?;

    if let Some(budget) = find_period(db, user, month, year).await? {
        return Ok(BudgetResponse::from(budget));
    }

    let mut budget = Budget::empty(user, month, year);
    match insert(db, &mut budget).await {
        Ok(()) => {
            log::info!("💵 Empty budget created for user {} ({}/{})", user, month, year);
            Ok(BudgetResponse::from(budget))
        }
        Err(e) => {
            // A concurrent first access created it
            find_period(db, user, month, year)
                .await?
                .map(BudgetResponse::from)
                .ok_or(e)
        }
    }
}

/// Creates the period's budget or replaces its categories and notes.
pub async fn save(db: &MongoDB, user: ObjectId, input: BudgetInput) -> AppResult<(BudgetResponse, Saved)> {
    input.validate()?;
    let (month, year) = resolve_period(input.mes, input.anio)?;

    if let Some(mut existing) = find_period(db, user, month, year).await? {
        existing.replace_contents(input.categorias, input.notas);
        replace(db, &mut existing).await?;
        log::info!("💵 Budget {}/{} updated for user {}", month, year, user);
        return Ok((BudgetResponse::from(existing), Saved::Updated));
    }

    let mut budget = Budget::empty(user, month, year);
    budget.replace_contents(input.categorias, input.notas);
    insert(db, &mut budget).await?;
    log::info!(
        "💵 Budget {}/{} created for user {} (total {})",
        month,
        year,
        user,
        budget.total_budget
    );
    Ok((BudgetResponse::from(budget), Saved::Created))
}

pub async fn update(
    db: &MongoDB,
    user: ObjectId,
    id: ObjectId,
    update: UpdateBudget,
) -> AppResult<BudgetResponse> {
    update.validate()?;
    let mut budget = owned_budget(db, user, id).await?;

    let categories = update.categorias.unwrap_or_else(|| budget.categories.clone());
    let notes = update.notas.or_else(|| budget.notes.clone());
    budget.replace_contents(categories, notes);
    replace(db, &mut budget).await?;

    log::info!("✏️ Budget {} updated", id);
    Ok(BudgetResponse::from(budget))
}

/// Re-derives `gastado` per category from the month's expenses.
pub async fn synchronize(db: &MongoDB, user: ObjectId, id: ObjectId) -> AppResult<BudgetResponse> {
    let mut budget = owned_budget(db, user, id).await?;

    let expenses = transaction_service::month_transactions(
        db,
        budget.user,
        budget.month,
        budget.year,
        Some(TransactionKind::Gasto),
    )
    .await?;
    let spent = transaction_service::spent_by_category(&expenses);

    budget.apply_spent(&spent);
    replace(db, &mut budget).await?;

    log::info!(
        "🔄 Budget {} synchronized: {} spent of {} ({}%)",
        id,
        budget.total_spent,
        budget.total_budget,
        budget.usage_percent()
    );
    Ok(BudgetResponse::from(budget))
}

/// Most recent periods first.
pub async fn history(db: &MongoDB, user: ObjectId) -> AppResult<Vec<BudgetResponse>> {
    let budgets: Vec<Budget> = db
        .collection::<Budget>(BUDGETS)
        .find(doc! { "usuario": user })
        .sort(doc! { "anio": -1, "mes": -1 })
        .limit(HISTORY_LIMIT)
        .await?
        .try_collect()
        .await?;

    Ok(budgets.into_iter().map(BudgetResponse::from).collect())
}

/// Current period's budget without creating it, for the assistant.
pub async fn current(db: &MongoDB, user: ObjectId) -> AppResult<Option<Budget>> {
    let (month, year) = current_period();
    find_period(db, user, month, year).await
}
