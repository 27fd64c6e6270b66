use mongodb::bson::{doc, oid::ObjectId, Document};

use crate::database::{MongoDB, USERS};
use crate::models::user::POINTS_PER_LEVEL;
use crate::utils::error::AppResult;

/// Adds `delta` to a user's community reputation.
pub async fn adjust_reputation(db: &MongoDB, user: ObjectId, delta: i64) -> AppResult<()> {
    let result = db
        .collection::<Document>(USERS)
        .update_one(doc! { "_id": user }, doc! { "$inc": { "reputacion": delta } })
        .await?;

    if result.matched_count == 0 {
        log::warn!("⚠️ Reputation change for missing user {}", user);
    } else {
        log::debug!("⭐ Reputation {:+} for user {}", delta, user);
    }
    Ok(())
}

/// Pipeline that adds points and recomputes `nivel` in the same write.
pub fn experience_pipeline(points: i64) -> Vec<Document> {
    vec![
        doc! {
            "$set": {
                "puntosExperiencia": {
                    "$add": [{ "$ifNull": ["$puntosExperiencia", 0_i64] }, points]
                }
            }
        },
        doc! {
            "$set": {
                "nivel": {
                    "$toLong": {
                        "$add": [1_i64, { "$floor": { "$divide": ["$puntosExperiencia", POINTS_PER_LEVEL] } }]
                    }
                }
            }
        },
    ]
}

/// Awards experience points, keeping the level in sync.
pub async fn award_experience(db: &MongoDB, user: ObjectId, points: i64) -> AppResult<()> {
    if points <= 0 {
        return Ok(());
    }

    db.collection::<Document>(USERS)
        .update_one(doc! { "_id": user }, experience_pipeline(points))
        .await?;

    log::debug!("🏅 +{} XP for user {}", points, user);
    Ok(())
}

/// Updates the user's savings counters after a new transaction.
pub async fn record_transaction(db: &MongoDB, user: ObjectId, savings: f64) -> AppResult<()> {
    let update = if savings > 0.0 {
        doc! {
            "$inc": {
                "ahorroTotal": savings,
                "estadisticas.totalAhorrado": savings,
                "estadisticas.cuponesUsados": 1_i64,
                "estadisticas.transaccionesRegistradas": 1_i64,
            }
        }
    } else {
        doc! { "$inc": { "estadisticas.transaccionesRegistradas": 1_i64 } }
    };

    db.collection::<Document>(USERS)
        .update_one(doc! { "_id": user }, update)
        .await?;
    Ok(())
}

pub async fn add_active_goal(db: &MongoDB, user: ObjectId, goal: ObjectId) -> AppResult<()> {
    db.collection::<Document>(USERS)
        .update_one(doc! { "_id": user }, doc! { "$addToSet": { "metasActivas": goal } })
        .await?;
    Ok(())
}

pub async fn remove_active_goal(db: &MongoDB, user: ObjectId, goal: ObjectId) -> AppResult<()> {
    db.collection::<Document>(USERS)
        .update_one(doc! { "_id": user }, doc! { "$pull": { "metasActivas": goal } })
        .await?;
    Ok(())
}

pub async fn set_current_budget(db: &MongoDB, user: ObjectId, budget: ObjectId) -> AppResult<()> {
    db.collection::<Document>(USERS)
        .update_one(doc! { "_id": user }, doc! { "$set": { "presupuestoActual": budget } })
        .await?;
    Ok(())
}
