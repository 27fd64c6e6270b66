use mongodb::bson::oid::ObjectId;

use crate::{
    database::{MongoDB, EVENTS},
    models::{Event, EventResponse, NewEvent},
    utils::error::AppResult,
};

pub async fn record(db: &MongoDB, user: ObjectId, input: NewEvent) -> AppResult<EventResponse> {
    let mut event = Event::new(user, input)?;
    let result = db.collection::<Event>(EVENTS).insert_one(&event).await?;
    event.id = result.inserted_id.as_object_id();

    log::debug!("📈 Event '{}' recorded for user {}", event.kind, user);
    Ok(EventResponse::from(event))
}
