use futures::TryStreamExt;
use mongodb::bson::{doc, Document};

use crate::{
    database::{MongoDB, PHYSICAL_STORES},
    models::{demo_stores, NearQuery, PhysicalStore, PhysicalStoreResponse},
    utils::error::AppResult,
};

/// Filter for the store listing: everything, or `$near` a point when given.
pub fn stores_filter(query: &NearQuery) -> AppResult<Document> {
    let Some((point, radius)) = query.center()? else {
        return Ok(doc! {});
    };

    Ok(doc! {
        "ubicacion": {
            "$near": {
                "$geometry": { "type": "Point", "coordinates": [point.lng(), point.lat()] },
                "$maxDistance": radius,
            }
        }
    })
}

pub async fn list_stores(db: &MongoDB, query: &NearQuery) -> AppResult<Vec<PhysicalStoreResponse>> {
    let filter = stores_filter(query)?;
    let stores: Vec<PhysicalStore> = db
        .collection::<PhysicalStore>(PHYSICAL_STORES)
        .find(filter)
        .await?
        .try_collect()
        .await?;

    Ok(stores.into_iter().map(PhysicalStoreResponse::from).collect())
}

/// Replaces every store with the demo set. Returns how many were inserted.
pub async fn seed_demo(db: &MongoDB) -> AppResult<usize> {
    let stores = demo_stores()?;
    let collection = db.collection::<PhysicalStore>(PHYSICAL_STORES);

    let removed = collection.delete_many(doc! {}).await?;
    let result = collection.insert_many(&stores).await?;

    log::info!(
        "🏬 Demo stores seeded: {} removed, {} inserted",
        removed.deleted_count,
        result.inserted_ids.len()
    );
    Ok(result.inserted_ids.len())
}
