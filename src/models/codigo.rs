use std::fmt;

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use mongodb::options::UpdateModifications;
use serde::{Deserialize, Serialize};

use crate::models::user::CreatorSummary;
use crate::utils::dates::{to_bson, to_chrono};
use crate::utils::error::{AppError, AppResult};

/// Reputation the creator gains (or loses) per vote
pub const VOTE_REPUTATION: i64 = 2;
/// Likes added to the counter when a coupon is verified
pub const VERIFY_LIKE_BONUS: i64 = 5;
/// Reputation the creator gains when a coupon is verified
pub const VERIFY_REPUTATION: i64 = 10;
/// Reputation the creator gains for publishing a coupon
pub const CREATE_REPUTATION: i64 = 5;

/// Coupon categories (shared with alert subscriptions)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CouponCategory {
    Mujer,
    Hombre,
    Hogar,
    Tecnologia,
    Deporte,
}

impl CouponCategory {
    pub const ALL: [CouponCategory; 5] = [
        CouponCategory::Mujer,
        CouponCategory::Hombre,
        CouponCategory::Hogar,
        CouponCategory::Tecnologia,
        CouponCategory::Deporte,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CouponCategory::Mujer => "mujer",
            CouponCategory::Hombre => "hombre",
            CouponCategory::Hogar => "hogar",
            CouponCategory::Tecnologia => "tecnologia",
            CouponCategory::Deporte => "deporte",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

impl fmt::Display for CouponCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shareable discount code (stored in `codigos`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountCode {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "tienda")]
    pub store: String,
    #[serde(rename = "categoria")]
    pub category: CouponCategory,
    #[serde(rename = "descuento")]
    pub discount: String,
    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "fechaExpiracion", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<BsonDateTime>,
    #[serde(rename = "verificado", default)]
    pub verified: bool,
    /// None for scraper-sourced coupons
    #[serde(rename = "creador", default)]
    pub creator: Option<ObjectId>,
    #[serde(default)]
    pub likes: Vec<ObjectId>,
    #[serde(rename = "likesCount", default)]
    pub likes_count: i64,
    #[serde(rename = "createdAt")]
    pub created_at: BsonDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDirection {
    Added,
    Removed,
}

impl VoteDirection {
    /// Reputation delta applied to the coupon creator
    pub fn reputation_delta(&self) -> i64 {
        match self {
            VoteDirection::Added => VOTE_REPUTATION,
            VoteDirection::Removed => -VOTE_REPUTATION,
        }
    }
}

impl DiscountCode {
    pub fn new(input: NewDiscountCode, creator: Option<ObjectId>) -> Self {
        let verified = input.verificado.unwrap_or(false);
        Self {
            id: None,
            code: input.codigo,
            store: input.tienda,
            category: input.categoria,
            discount: input.descuento,
            description: input.descripcion,
            expires_at: input.fecha_expiracion.map(to_bson),
            verified,
            creator,
            likes: Vec::new(),
            // Pre-verified batches start with the same bonus a manual verify gives
            likes_count: if verified { VERIFY_LIKE_BONUS } else { 0 },
            created_at: BsonDateTime::now(),
        }
    }

    pub fn has_voted(&self, user: &ObjectId) -> bool {
        self.likes.contains(user)
    }

    /// Which way a vote from `user` would toggle right now.
    pub fn vote_direction(&self, user: &ObjectId) -> VoteDirection {
        if self.has_voted(user) {
            VoteDirection::Removed
        } else {
            VoteDirection::Added
        }
    }
}

/// Filter + update pair that applies a vote toggle atomically.
///
/// Membership is part of the filter, so a concurrent toggle by the same
/// user makes the update match nothing instead of drifting the counter.
/// Removal runs as a pipeline so the counter floors at zero server-side.
pub fn vote_update(
    coupon_id: ObjectId,
    user: ObjectId,
    direction: VoteDirection,
) -> (Document, UpdateModifications) {
    match direction {
        VoteDirection::Added => (
            doc! { "_id": coupon_id, "likes": { "$ne": user } },
            UpdateModifications::Document(
                doc! { "$addToSet": { "likes": user }, "$inc": { "likesCount": 1_i64 } },
            ),
        ),
        VoteDirection::Removed => (
            doc! { "_id": coupon_id, "likes": user },
            UpdateModifications::Pipeline(vec![doc! {
                "$set": {
                    "likes": { "$setDifference": ["$likes", [user]] },
                    "likesCount": { "$max": [0_i64, { "$subtract": ["$likesCount", 1_i64] }] },
                }
            }]),
        ),
    }
}

/// Filter + update pair for a one-time verification.
pub fn verify_update(coupon_id: ObjectId) -> (Document, Document) {
    (
        doc! { "_id": coupon_id, "verificado": { "$ne": true } },
        doc! { "$set": { "verificado": true }, "$inc": { "likesCount": VERIFY_LIKE_BONUS } },
    )
}

/// Coupon payload, from a user form or a scraper batch
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct NewDiscountCode {
    pub codigo: String,
    pub tienda: String,
    pub categoria: CouponCategory,
    pub descuento: String,
    pub descripcion: Option<String>,
    #[serde(rename = "fechaExpiracion")]
    pub fecha_expiracion: Option<DateTime<Utc>>,
    /// Only honoured for scraper batches
    pub verificado: Option<bool>,
}

impl NewDiscountCode {
    pub fn validate(&self) -> AppResult<()> {
        for (field, value) in [
            ("codigo", &self.codigo),
            ("tienda", &self.tienda),
            ("descuento", &self.descuento),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("El campo {} es obligatorio", field)));
            }
        }
        Ok(())
    }
}

/// Coupon as returned by the API
#[derive(Debug, Serialize)]
pub struct DiscountCodeResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub codigo: String,
    pub tienda: String,
    pub categoria: CouponCategory,
    pub descuento: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descripcion: Option<String>,
    #[serde(rename = "fechaExpiracion", skip_serializing_if = "Option::is_none")]
    pub fecha_expiracion: Option<DateTime<Utc>>,
    pub verificado: bool,
    pub creador: Option<CreatorResponse>,
    pub likes: Vec<String>,
    #[serde(rename = "likesCount")]
    pub likes_count: i64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CreatorResponse {
    Populated {
        #[serde(rename = "_id")]
        id: String,
        nombre: String,
        avatar: String,
        reputacion: i64,
    },
    Reference(String),
}

impl From<CreatorSummary> for CreatorResponse {
    fn from(c: CreatorSummary) -> Self {
        CreatorResponse::Populated {
            id: c.id.to_hex(),
            nombre: c.name,
            avatar: c.avatar,
            reputacion: c.reputation,
        }
    }
}

impl DiscountCodeResponse {
    /// Builds the response, embedding the creator when it was looked up.
    pub fn with_creator(code: DiscountCode, creator: Option<CreatorSummary>) -> Self {
        let creador = match (creator, code.creator) {
            (Some(summary), _) => Some(CreatorResponse::from(summary)),
            (None, Some(id)) => Some(CreatorResponse::Reference(id.to_hex())),
            (None, None) => None,
        };

        DiscountCodeResponse {
            id: code.id.map(|id| id.to_hex()).unwrap_or_default(),
            codigo: code.code,
            tienda: code.store,
            categoria: code.category,
            descuento: code.discount,
            descripcion: code.description,
            fecha_expiracion: code.expires_at.map(to_chrono),
            verificado: code.verified,
            creador,
            likes: code.likes.iter().map(|id| id.to_hex()).collect(),
            likes_count: code.likes_count,
            created_at: to_chrono(code.created_at),
        }
    }
}

impl From<DiscountCode> for DiscountCodeResponse {
    fn from(code: DiscountCode) -> Self {
        Self::with_creator(code, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::Bson;

    fn sample_coupon(creator: Option<ObjectId>) -> DiscountCode {
        DiscountCode::new(
            NewDiscountCode {
                codigo: "TECH20".into(),
                tienda: "falabella".into(),
                categoria: CouponCategory::Tecnologia,
                descuento: "20% en productos seleccionados".into(),
                descripcion: None,
                fecha_expiracion: None,
                verificado: None,
            },
            creator,
        )
    }

    #[test]
    fn test_category_wire_names() {
        assert_eq!(serde_json::to_value(CouponCategory::Tecnologia).unwrap(), "tecnologia");
        assert_eq!(CouponCategory::parse("deporte"), Some(CouponCategory::Deporte));
        assert_eq!(CouponCategory::parse("Deporte"), None);
        assert!(serde_json::from_str::<CouponCategory>("\"juguetes\"").is_err());
    }

    /// Evaluates the subset of the query language used by the coupon
    /// filters: equality, array membership and `$ne`.
    fn filter_matches(filter: &Document, stored: &Document) -> bool {
        fn holds(value: Option<&Bson>, target: &Bson) -> bool {
            match value {
                Some(Bson::Array(items)) => items.contains(target),
                Some(value) => value == target,
                None => false,
            }
        }

        filter.iter().all(|(key, cond)| match cond {
            Bson::Document(op) if op.contains_key("$ne") => !holds(stored.get(key), op.get("$ne").unwrap()),
            other => holds(stored.get(key), other),
        })
    }

    fn eval(expr: &Bson, stored: &Document) -> Bson {
        match expr {
            Bson::String(path) if path.starts_with('$') => {
                stored.get(&path[1..]).cloned().unwrap_or(Bson::Null)
            }
            Bson::Array(items) => Bson::Array(items.iter().map(|i| eval(i, stored)).collect()),
            Bson::Document(op) => {
                let (name, args) = op.iter().next().unwrap();
                let args: Vec<Bson> = args.as_array().unwrap().iter().map(|a| eval(a, stored)).collect();
                match name.as_str() {
                    "$setDifference" => {
                        let remove = args[1].as_array().unwrap();
                        Bson::Array(
                            args[0].as_array().unwrap().iter().filter(|i| !remove.contains(i)).cloned().collect(),
                        )
                    }
                    "$subtract" => Bson::Int64(args[0].as_i64().unwrap() - args[1].as_i64().unwrap()),
                    "$max" => Bson::Int64(args.iter().map(|a| a.as_i64().unwrap()).max().unwrap()),
                    other => panic!("unsupported operator {}", other),
                }
            }
            other => other.clone(),
        }
    }

    /// Applies the update operators and pipeline stages the coupon writes use.
    fn apply_update(update: &UpdateModifications, stored: &mut Document) {
        match update {
            UpdateModifications::Document(update) => {
                for (op, fields) in update {
                    for (key, value) in fields.as_document().unwrap() {
                        match op.as_str() {
                            "$set" => {
                                stored.insert(key, value.clone());
                            }
                            "$inc" => {
                                let current = stored.get_i64(key).unwrap();
                                stored.insert(key, current + value.as_i64().unwrap());
                            }
                            "$addToSet" => {
                                let items = stored.get_array_mut(key).unwrap();
                                if !items.contains(value) {
                                    items.push(value.clone());
                                }
                            }
                            other => panic!("unsupported operator {}", other),
                        }
                    }
                }
            }
            UpdateModifications::Pipeline(stages) => {
                for stage in stages {
                    let set = stage.get_document("$set").unwrap();
                    let computed: Vec<(String, Bson)> =
                        set.iter().map(|(k, expr)| (k.clone(), eval(expr, stored))).collect();
                    for (key, value) in computed {
                        stored.insert(key, value);
                    }
                }
            }
            other => panic!("unexpected update {:?}", other),
        }
    }

    fn stored_coupon(creator: Option<ObjectId>) -> (ObjectId, Document) {
        let id = ObjectId::new();
        let mut stored = mongodb::bson::to_document(&sample_coupon(creator)).unwrap();
        stored.insert("_id", id);
        (id, stored)
    }

    fn decode(stored: &Document) -> DiscountCode {
        mongodb::bson::from_document(stored.clone()).unwrap()
    }

    /// Runs one toggle the way the service does: direction from a read,
    /// then the conditional write. None when the filter matched nothing.
    fn toggle_from(snapshot: &DiscountCode, stored: &mut Document, user: ObjectId) -> Option<VoteDirection> {
        let id = stored.get_object_id("_id").unwrap();
        let direction = snapshot.vote_direction(&user);
        let (filter, update) = vote_update(id, user, direction);
        if !filter_matches(&filter, stored) {
            return None;
        }
        apply_update(&update, stored);
        Some(direction)
    }

    fn toggle(stored: &mut Document, user: ObjectId) -> Option<VoteDirection> {
        let snapshot = decode(stored);
        toggle_from(&snapshot, stored, user)
    }

    fn verify(stored: &mut Document) -> bool {
        let id = stored.get_object_id("_id").unwrap();
        let (filter, update) = verify_update(id);
        if !filter_matches(&filter, stored) {
            return false;
        }
        apply_update(&UpdateModifications::Document(update), stored);
        true
    }

    #[test]
    fn test_vote_toggle_keeps_counter_in_lockstep() {
        let (_, mut stored) = stored_coupon(None);
        let users: Vec<ObjectId> = (0..4).map(|_| ObjectId::new()).collect();

        for &i in &[0, 1, 2, 1, 3, 0, 0, 2, 1] {
            assert!(toggle(&mut stored, users[i]).is_some());
            let coupon = decode(&stored);
            assert_eq!(coupon.likes_count, coupon.likes.len() as i64);
        }
    }

    #[test]
    fn test_vote_toggle_is_an_involution() {
        let (_, mut stored) = stored_coupon(Some(ObjectId::new()));
        let voter = ObjectId::new();
        let before = decode(&stored);

        assert_eq!(toggle(&mut stored, voter), Some(VoteDirection::Added));
        assert!(decode(&stored).has_voted(&voter));
        assert_eq!(toggle(&mut stored, voter), Some(VoteDirection::Removed));

        let after = decode(&stored);
        assert!(!after.has_voted(&voter));
        assert_eq!(after.likes_count, before.likes_count);
        assert_eq!(after.likes, before.likes);
    }

    #[test]
    fn test_two_voters_increment_independently() {
        let (_, mut stored) = stored_coupon(Some(ObjectId::new()));
        let first = toggle(&mut stored, ObjectId::new()).unwrap();
        let second = toggle(&mut stored, ObjectId::new()).unwrap();

        assert_eq!(decode(&stored).likes_count, 2);
        assert_eq!(first.reputation_delta() + second.reputation_delta(), 2 * VOTE_REPUTATION);
    }

    #[test]
    fn test_stale_toggle_matches_nothing() {
        let (_, mut stored) = stored_coupon(None);
        let voter = ObjectId::new();
        let stale = decode(&stored);

        // A concurrent request by the same user lands first
        assert_eq!(toggle(&mut stored, voter), Some(VoteDirection::Added));
        assert_eq!(toggle_from(&stale, &mut stored, voter), None);

        let coupon = decode(&stored);
        assert_eq!(coupon.likes_count, 1);
        assert_eq!(coupon.likes, vec![voter]);
    }

    #[test]
    fn test_removal_floors_at_zero() {
        let (_, mut stored) = stored_coupon(None);
        let voter = ObjectId::new();
        // Counter drifted below the set size (legacy data)
        stored.insert("likes", vec![Bson::ObjectId(voter)]);
        stored.insert("likesCount", 0_i64);

        assert_eq!(toggle(&mut stored, voter), Some(VoteDirection::Removed));
        let coupon = decode(&stored);
        assert_eq!(coupon.likes_count, 0);
        assert!(coupon.likes.is_empty());
    }

    #[test]
    fn test_verify_awards_bonus_only_once() {
        let (_, mut stored) = stored_coupon(Some(ObjectId::new()));
        toggle(&mut stored, ObjectId::new());

        let mut reputation = 0;
        for _ in 0..2 {
            if verify(&mut stored) {
                reputation += VERIFY_REPUTATION;
            }
        }

        let coupon = decode(&stored);
        assert!(coupon.verified);
        assert_eq!(coupon.likes_count, 1 + VERIFY_LIKE_BONUS);
        assert_eq!(reputation, VERIFY_REPUTATION);

        // Votes after verification keep the bonus on top of the voter set
        toggle(&mut stored, ObjectId::new());
        let coupon = decode(&stored);
        assert_eq!(coupon.likes_count, coupon.likes.len() as i64 + VERIFY_LIKE_BONUS);
    }

    #[test]
    fn test_vote_update_filters_on_membership() {
        let coupon_id = ObjectId::new();
        let user = ObjectId::new();

        let (filter, update) = vote_update(coupon_id, user, VoteDirection::Added);
        assert_eq!(filter.get_document("likes").unwrap().get_object_id("$ne").unwrap(), user);
        match update {
            UpdateModifications::Document(update) => {
                assert_eq!(update.get_document("$inc").unwrap().get_i64("likesCount").unwrap(), 1)
            }
            other => panic!("expected a plain update, got {:?}", other),
        }

        let (filter, update) = vote_update(coupon_id, user, VoteDirection::Removed);
        assert_eq!(filter.get_object_id("likes").unwrap(), user);
        assert!(matches!(update, UpdateModifications::Pipeline(stages) if stages.len() == 1));
    }

    #[test]
    fn test_response_embeds_creator_reference() {
        let creator = ObjectId::new();
        let mut coupon = sample_coupon(Some(creator));
        coupon.id = Some(ObjectId::new());

        let json = serde_json::to_value(DiscountCodeResponse::from(coupon)).unwrap();
        assert_eq!(json["creador"], creator.to_hex());
        assert_eq!(json["likesCount"], 0);
        assert_eq!(json["categoria"], "tecnologia");
    }
}
