use std::collections::HashMap;

use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use serde::{Deserialize, Serialize};

use crate::{
    database::{MongoDB, CODES, TRANSACTIONS},
    models::{
        CouponSummary, NewTransaction, Transaction, TransactionCategory, TransactionKind,
        TransactionResponse,
    },
    services::user_service,
    utils::{
        dates::{month_bounds, parse_date_param, to_bson},
        error::{AppError, AppResult},
    },
};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionQuery {
    pub tipo: Option<TransactionKind>,
    pub categoria: Option<TransactionCategory>,
    #[serde(rename = "fechaInicio")]
    pub fecha_inicio: Option<String>,
    #[serde(rename = "fechaFin")]
    pub fecha_fin: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

impl TransactionQuery {
    pub fn page_size(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Documents to skip for the requested page, saturating on absurd page numbers.
    pub fn skip(&self) -> u64 {
        let offset = (self.page() - 1).saturating_mul(self.page_size());
        u64::try_from(offset).unwrap_or(u64::MAX)
    }

    pub fn filter(&self, user: ObjectId) -> AppResult<Document> {
        let mut filter = doc! { "usuario": user };
        if let Some(tipo) = self.tipo {
            filter.insert("tipo", tipo.as_str());
        }
        if let Some(categoria) = self.categoria {
            filter.insert("categoria", categoria.as_str());
        }

        let mut range = Document::new();
        if let Some(start) = self.fecha_inicio.as_deref().filter(|s| !s.trim().is_empty()) {
            range.insert("$gte", to_bson(parse_date_param(start)?));
        }
        if let Some(end) = self.fecha_fin.as_deref().filter(|s| !s.trim().is_empty()) {
            range.insert("$lte", to_bson(parse_date_param(end)?));
        }
        if !range.is_empty() {
            filter.insert("fecha", range);
        }
        Ok(filter)
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionPage {
    pub success: bool,
    pub count: usize,
    pub total: u64,
    pub page: i64,
    pub pages: u64,
    pub data: Vec<TransactionResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatisticsQuery {
    pub mes: Option<u32>,
    pub anio: Option<i32>,
}

impl StatisticsQuery {
    /// A month filter applies only when both `mes` and `anio` are given.
    pub fn period(&self) -> Option<(u32, i32)> {
        self.mes.zip(self.anio)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KindTotal {
    #[serde(rename = "_id")]
    pub tipo: TransactionKind,
    pub total: f64,
    pub cantidad: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryTotal {
    #[serde(rename = "_id")]
    pub categoria: TransactionCategory,
    pub total: f64,
    pub cantidad: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Statistics {
    pub resumen: Vec<KindTotal>,
    #[serde(rename = "porCategoria")]
    pub por_categoria: Vec<CategoryTotal>,
    #[serde(rename = "ahorroTotal")]
    pub ahorro_total: f64,
}

impl Statistics {
    pub fn total_for(&self, kind: TransactionKind) -> f64 {
        self.resumen.iter().find(|k| k.tipo == kind).map(|k| k.total).unwrap_or(0.0)
    }
}

fn pages_for(total: u64, page_size: i64) -> u64 {
    let size = page_size.max(1) as u64;
    total.div_ceil(size)
}

/// Totals by kind, expenses by category (largest first) and generated savings.
pub fn compute_statistics(transactions: &[Transaction]) -> Statistics {
    let mut by_kind: Vec<KindTotal> = Vec::new();
    let mut by_category: HashMap<TransactionCategory, (f64, u64)> = HashMap::new();
    let mut ahorro_total = 0.0;

    for tx in transactions {
        match by_kind.iter_mut().find(|k| k.tipo == tx.kind) {
            Some(entry) => {
                entry.total += tx.amount;
                entry.cantidad += 1;
            }
            None => by_kind.push(KindTotal { tipo: tx.kind, total: tx.amount, cantidad: 1 }),
        }

        if tx.kind == TransactionKind::Gasto {
            let entry = by_category.entry(tx.category).or_insert((0.0, 0));
            entry.0 += tx.amount;
            entry.1 += 1;
        }

        ahorro_total += tx.savings;
    }

    by_kind.sort_by_key(|k| k.tipo.as_str());

    let mut por_categoria: Vec<CategoryTotal> = by_category
        .into_iter()
        .map(|(categoria, (total, cantidad))| CategoryTotal { categoria, total, cantidad })
        .collect();
    por_categoria.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.categoria.as_str().cmp(b.categoria.as_str()))
    });

    Statistics { resumen: by_kind, por_categoria, ahorro_total }
}

/// Sum of expenses per category name.
pub fn spent_by_category(transactions: &[Transaction]) -> HashMap<String, f64> {
    let mut spent = HashMap::new();
    for tx in transactions.iter().filter(|tx| tx.kind == TransactionKind::Gasto) {
        *spent.entry(tx.category.as_str().to_string()).or_insert(0.0) += tx.amount;
    }
    spent
}

/// All of the user's transactions dated inside the given month.
pub async fn month_transactions(
    db: &MongoDB,
    user: ObjectId,
    month: u32,
    year: i32,
    kind: Option<TransactionKind>,
) -> AppResult<Vec<Transaction>> {
    let (start, end) = month_bounds(month, year)?;
    let mut filter = doc! {
        "usuario": user,
        "fecha": { "$gte": to_bson(start), "$lt": to_bson(end) },
    };
    if let Some(kind) = kind {
        filter.insert("tipo", kind.as_str());
    }

    let transactions = db
        .collection::<Transaction>(TRANSACTIONS)
        .find(filter)
        .await?
        .try_collect()
        .await?;
    Ok(transactions)
}

async fn coupons_by_id(
    db: &MongoDB,
    transactions: &[Transaction],
) -> AppResult<HashMap<ObjectId, CouponSummary>> {
    let mut ids: Vec<ObjectId> = transactions.iter().filter_map(|tx| tx.coupon_used).collect();
    ids.sort();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let coupons: Vec<CouponSummary> = db
        .collection::<CouponSummary>(CODES)
        .find(doc! { "_id": { "$in": ids } })
        .projection(doc! { "codigo": 1, "tienda": 1, "descuento": 1 })
        .await?
        .try_collect()
        .await?;

    Ok(coupons.into_iter().map(|c| (c.id, c)).collect())
}

pub async fn list_transactions(
    db: &MongoDB,
    user: ObjectId,
    query: &TransactionQuery,
) -> AppResult<TransactionPage> {
    let filter = query.filter(user)?;
    let page_size = query.page_size();
    let page = query.page();

    let collection = db.collection::<Transaction>(TRANSACTIONS);
    let transactions: Vec<Transaction> = collection
        .find(filter.clone())
        .sort(doc! { "fecha": -1 })
        .skip(query.skip())
        .limit(page_size)
        .await?
        .try_collect()
        .await?;
    let total = collection.count_documents(filter).await?;

    let coupons = coupons_by_id(db, &transactions).await?;
    let data: Vec<TransactionResponse> = transactions
        .into_iter()
        .map(|tx| TransactionResponse::with_coupons(tx, &coupons))
        .collect();

    Ok(TransactionPage {
        success: true,
        count: data.len(),
        total,
        page,
        pages: pages_for(total, page_size),
        data,
    })
}

pub async fn create_transaction(
    db: &MongoDB,
    user: ObjectId,
    input: NewTransaction,
) -> AppResult<TransactionResponse> {
    let mut tx = Transaction::new(user, input)?;

    if let Some(coupon) = tx.coupon_used {
        let exists = db
            .collection::<Document>(CODES)
            .count_documents(doc! { "_id": coupon })
            .await?;
        if exists == 0 {
            return Err(AppError::Validation("El cupón utilizado no existe".into()));
        }
    }

    let result = db.collection::<Transaction>(TRANSACTIONS).insert_one(&tx).await?;
    tx.id = result.inserted_id.as_object_id();

    user_service::record_transaction(db, user, tx.savings).await?;
    user_service::award_experience(db, user, tx.experience_points()).await?;

    log::info!(
        "💰 Transaction {} {} ({}) for user {} - savings {}",
        tx.kind.as_str(),
        tx.amount,
        tx.category,
        user,
        tx.savings
    );

    Ok(TransactionResponse::from(tx))
}

/// Statistics for a month, or for all time unless both month and year are given.
pub async fn statistics(
    db: &MongoDB,
    user: ObjectId,
    query: &StatisticsQuery,
) -> AppResult<Statistics> {
    let transactions = if let Some((month, year)) = query.period() {
        month_transactions(db, user, month, year, None).await?
    } else {
        db.collection::<Transaction>(TRANSACTIONS)
            .find(doc! { "usuario": user })
            .await?
            .try_collect()
            .await?
    };

    Ok(compute_statistics(&transactions))
}

pub async fn delete_transaction(db: &MongoDB, user: ObjectId, id: ObjectId) -> AppResult<()> {
    let collection = db.collection::<Transaction>(TRANSACTIONS);
    let tx = collection
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Transacción no encontrada".into()))?;

    if tx.user != user {
        log::warn!("⛔ User {} tried to delete transaction {} of {}", user, id, tx.user);
        return Err(AppError::Forbidden("No autorizado".into()));
    }

    collection.delete_one(doc! { "_id": id }).await?;
    log::info!("🗑️ Transaction {} deleted", id);
    Ok(())
}
