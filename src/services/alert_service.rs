use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};

use crate::{
    database::{MongoDB, ALERTS},
    models::{AlertSubscription, CouponCategory, ToggleAlertResponse},
    utils::error::{is_duplicate_key, AppError, AppResult},
};

pub fn parse_category(value: Option<&str>) -> AppResult<CouponCategory> {
    let value = value.map(str::trim).filter(|v| !v.is_empty()).ok_or_else(|| {
        AppError::Validation("La categoría es obligatoria".into())
    })?;
    CouponCategory::parse(value)
        .ok_or_else(|| AppError::Validation(format!("Categoría inválida: {}", value)))
}

/// Categories the user is subscribed to.
pub async fn subscriptions(db: &MongoDB, user: ObjectId) -> AppResult<Vec<CouponCategory>> {
    let subs: Vec<AlertSubscription> = db
        .collection::<AlertSubscription>(ALERTS)
        .find(doc! { "usuario": user })
        .sort(doc! { "createdAt": 1 })
        .await?
        .try_collect()
        .await?;

    Ok(subs.into_iter().map(|s| s.category).collect())
}

/// Subscribes when absent, unsubscribes when present.
pub async fn toggle(db: &MongoDB, user: ObjectId, category: CouponCategory) -> AppResult<ToggleAlertResponse> {
    let collection = db.collection::<AlertSubscription>(ALERTS);
    let filter = doc! { "usuario": user, "categoria": category.as_str() };

    let deleted = collection.delete_one(filter.clone()).await?;
    if deleted.deleted_count > 0 {
        log::info!("🔕 User {} unsubscribed from {}", user, category);
        return Ok(ToggleAlertResponse::cancelled(category));
    }

    match collection.insert_one(AlertSubscription::new(user, category)).await {
        Ok(_) => {
            log::info!("🔔 User {} subscribed to {}", user, category);
            Ok(ToggleAlertResponse::subscribed(category))
        }
        // A concurrent toggle already subscribed; the unique index keeps one row
        Err(e) if is_duplicate_key(&e) => Ok(ToggleAlertResponse::subscribed(category)),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_category() {
        assert_eq!(parse_category(Some("hogar")).unwrap(), CouponCategory::Hogar);
        assert!(matches!(parse_category(None), Err(AppError::Validation(_))));
        assert!(parse_category(Some("  ")).is_err());
        assert!(parse_category(Some("mascotas")).is_err());
    }
}
