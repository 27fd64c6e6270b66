use std::collections::HashMap;

use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document, Regex};
use mongodb::options::ReturnDocument;
use serde::{Deserialize, Serialize};

use crate::{
    database::{MongoDB, ALERTS, CODES, USERS},
    models::{
        codigo::{verify_update, vote_update, CREATE_REPUTATION, VERIFY_REPUTATION},
        AlertSubscription, CouponCategory, CreatorSummary, DiscountCode, DiscountCodeResponse,
        NewDiscountCode, User, VoteDirection,
    },
    services::user_service,
    utils::error::{AppError, AppResult},
};

/// Attempts for a vote toggle before giving up on a contended coupon
const VOTE_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeFilters {
    pub tienda: Option<String>,
    pub categoria: Option<String>,
    pub orden: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct VoteOutcome {
    #[serde(rename = "likesCount")]
    pub likes_count: i64,
    #[serde(rename = "yaVoto")]
    pub ya_voto: bool,
    pub msg: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct VerifyOutcome {
    pub verificado: bool,
    #[serde(rename = "likesCount")]
    pub likes_count: i64,
    #[serde(rename = "yaVerificado")]
    pub ya_verificado: bool,
    pub msg: String,
}

/// Query filter for the coupon listing.
pub fn list_filter(filters: &CodeFilters) -> AppResult<Document> {
    let mut filter = doc! {};

    if let Some(tienda) = filters.tienda.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        // Substring match, user input is matched literally
        filter.insert(
            "tienda",
            Regex { pattern: regex::escape(tienda), options: "i".to_string() },
        );
    }

    if let Some(categoria) = filters.categoria.as_deref().map(str::trim) {
        if !categoria.is_empty() && categoria != "todos" {
            let category = CouponCategory::parse(categoria)
                .ok_or_else(|| AppError::Validation(format!("Categoría inválida: {}", categoria)))?;
            filter.insert("categoria", category.as_str());
        }
    }

    Ok(filter)
}

/// Sort order for the coupon listing (`votos`, `tienda` or newest first).
pub fn list_sort(orden: Option<&str>) -> Document {
    match orden {
        Some("votos") => doc! { "likesCount": -1, "createdAt": -1 },
        Some("tienda") => doc! { "tienda": 1, "createdAt": -1 },
        _ => doc! { "createdAt": -1 },
    }
}

async fn creators_by_id(
    db: &MongoDB,
    ids: Vec<ObjectId>,
) -> AppResult<HashMap<ObjectId, CreatorSummary>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let creators: Vec<CreatorSummary> = db
        .collection::<CreatorSummary>(USERS)
        .find(doc! { "_id": { "$in": ids } })
        .projection(doc! { "nombre": 1, "avatar": 1, "reputacion": 1 })
        .await?
        .try_collect()
        .await?;

    Ok(creators.into_iter().map(|c| (c.id, c)).collect())
}

pub async fn list_codes(db: &MongoDB, filters: &CodeFilters) -> AppResult<Vec<DiscountCodeResponse>> {
    let filter = list_filter(filters)?;
    let codes: Vec<DiscountCode> = db
        .collection::<DiscountCode>(CODES)
        .find(filter)
        .sort(list_sort(filters.orden.as_deref()))
        .await?
        .try_collect()
        .await?;

    let mut creator_ids: Vec<ObjectId> = codes.iter().filter_map(|c| c.creator).collect();
    creator_ids.sort();
    creator_ids.dedup();
    let creators = creators_by_id(db, creator_ids).await?;

    Ok(codes
        .into_iter()
        .map(|code| {
            let creator = code.creator.and_then(|id| creators.get(&id).cloned());
            DiscountCodeResponse::with_creator(code, creator)
        })
        .collect())
}

/// Logs the notification fan-out to users subscribed to the coupon's category.
pub async fn notify_subscribers(db: &MongoDB, code: &DiscountCode) -> AppResult<usize> {
    let subscriptions: Vec<AlertSubscription> = db
        .collection::<AlertSubscription>(ALERTS)
        .find(doc! { "categoria": code.category.as_str() })
        .await?
        .try_collect()
        .await?;

    if subscriptions.is_empty() {
        return Ok(0);
    }

    let user_ids: Vec<ObjectId> = subscriptions.iter().map(|s| s.user).collect();
    let users: Vec<User> = db
        .collection::<User>(USERS)
        .find(doc! { "_id": { "$in": user_ids } })
        .await?
        .try_collect()
        .await?;
    let emails: Vec<&str> = users.iter().map(|u| u.email.as_str()).collect();

    log::info!(
        "🔔 New {} coupon at {}: {} ({}) -> notifying {} users: {}",
        code.category,
        code.store,
        code.code,
        code.discount,
        emails.len(),
        emails.join(", ")
    );

    Ok(emails.len())
}

/// Notification failures never fail the write that triggered them.
async fn notify_quietly(db: &MongoDB, code: &DiscountCode) {
    if let Err(e) = notify_subscribers(db, code).await {
        log::error!("❌ Failed to notify subscribers for {}: {}", code.code, e);
    }
}

pub async fn create_code(
    db: &MongoDB,
    creator: ObjectId,
    mut input: NewDiscountCode,
) -> AppResult<DiscountCodeResponse> {
    input.validate()?;
    // Users can't publish pre-verified coupons
    input.verificado = None;

    let mut code = DiscountCode::new(input, Some(creator));
    let result = db.collection::<DiscountCode>(CODES).insert_one(&code).await?;
    code.id = result.inserted_id.as_object_id();

    user_service::adjust_reputation(db, creator, CREATE_REPUTATION).await?;
    log::info!("🏷️ Coupon {} created for {} by {}", code.code, code.store, creator);

    notify_quietly(db, &code).await;

    Ok(DiscountCodeResponse::from(code))
}

/// Toggles the user's like on a coupon.
///
/// The coupon write is a single conditional update. If another toggle by
/// the same user lands in between, the filter matches nothing and the
/// toggle is re-evaluated against the fresh document.
pub async fn vote(db: &MongoDB, code_id: ObjectId, user: ObjectId) -> AppResult<VoteOutcome> {
    let collection = db.collection::<DiscountCode>(CODES);

    for attempt in 1..=VOTE_ATTEMPTS {
        let code = collection
            .find_one(doc! { "_id": code_id })
            .await?
            .ok_or_else(|| AppError::NotFound("Código no encontrado".into()))?;

        let direction = code.vote_direction(&user);
        let (filter, update) = vote_update(code_id, user, direction);

        let updated = collection
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await?;

        let Some(updated) = updated else {
            log::warn!("🔁 Vote on {} by {} lost a race (attempt {})", code_id, user, attempt);
            continue;
        };

        if let Some(creator) = updated.creator {
            user_service::adjust_reputation(db, creator, direction.reputation_delta()).await?;
        }

        let added = direction == VoteDirection::Added;
        log::info!(
            "👍 Vote {} on {} by {} (likes: {})",
            if added { "added" } else { "removed" },
            code_id,
            user,
            updated.likes_count
        );

        return Ok(VoteOutcome {
            likes_count: updated.likes_count,
            ya_voto: added,
            msg: if added { "Like agregado" } else { "Like eliminado" }.to_string(),
        });
    }

    Err(AppError::Internal("No se pudo registrar el voto, inténtalo nuevamente".into()))
}

/// Marks a coupon verified. Only the first call awards the bonus.
pub async fn verify(db: &MongoDB, code_id: ObjectId) -> AppResult<VerifyOutcome> {
    let collection = db.collection::<DiscountCode>(CODES);
    let (filter, update) = verify_update(code_id);

    let updated = collection
        .find_one_and_update(filter, update)
        .return_document(ReturnDocument::After)
        .await?;

    if let Some(code) = updated {
        if let Some(creator) = code.creator {
            user_service::adjust_reputation(db, creator, VERIFY_REPUTATION).await?;
        }
        log::info!("✅ Coupon {} verified", code_id);

        return Ok(VerifyOutcome {
            verificado: true,
            likes_count: code.likes_count,
            ya_verificado: false,
            msg: "Código verificado oficialmente. Reputación otorgada.".to_string(),
        });
    }

    let code = collection
        .find_one(doc! { "_id": code_id })
        .await?
        .ok_or_else(|| AppError::NotFound("Código no encontrado".into()))?;

    Ok(VerifyOutcome {
        verificado: code.verified,
        likes_count: code.likes_count,
        ya_verificado: true,
        msg: "El código ya estaba verificado.".to_string(),
    })
}

/// Bulk insert from the scraper. Returns how many coupons were stored.
pub async fn insert_scraped(db: &MongoDB, batch: Vec<NewDiscountCode>) -> AppResult<usize> {
    if batch.is_empty() {
        return Err(AppError::Validation("Debe enviar un array de códigos".into()));
    }
    for (i, input) in batch.iter().enumerate() {
        input
            .validate()
            .map_err(|e| AppError::Validation(format!("Código #{}: {}", i + 1, e)))?;
    }

    let mut codes: Vec<DiscountCode> =
        batch.into_iter().map(|input| DiscountCode::new(input, None)).collect();

    let result = db.collection::<DiscountCode>(CODES).insert_many(&codes).await?;
    for (index, id) in result.inserted_ids {
        if let Some(code) = codes.get_mut(index) {
            code.id = id.as_object_id();
        }
    }

    log::info!("🤖 Scraper inserted {} coupons", codes.len());

    for code in &codes {
        notify_quietly(db, code).await;
    }

    Ok(codes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_filter_escapes_store_and_skips_todos() {
        let filter = list_filter(&CodeFilters {
            tienda: Some("paris.cl".into()),
            categoria: Some("todos".into()),
            orden: None,
        })
        .unwrap();

        match filter.get("tienda") {
            Some(mongodb::bson::Bson::RegularExpression(regex)) => {
                assert_eq!(regex.pattern, r"paris\.cl");
                assert_eq!(regex.options, "i");
            }
            other => panic!("expected a regex, got {:?}", other),
        }
        assert!(!filter.contains_key("categoria"));
    }

    #[test]
    fn test_list_filter_category() {
        let filter = list_filter(&CodeFilters {
            categoria: Some("deporte".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(filter.get_str("categoria").unwrap(), "deporte");

        let bad = list_filter(&CodeFilters { categoria: Some("juguetes".into()), ..Default::default() });
        assert!(matches!(bad, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_list_sort() {
        assert_eq!(list_sort(Some("votos")), doc! { "likesCount": -1, "createdAt": -1 });
        assert_eq!(list_sort(Some("tienda")), doc! { "tienda": 1, "createdAt": -1 });
        assert_eq!(list_sort(None), doc! { "createdAt": -1 });
        assert_eq!(list_sort(Some("otro")), doc! { "createdAt": -1 });
    }
}
