use futures::TryStreamExt;
use lazy_static::lazy_static;
use mongodb::bson::doc;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    database::{MongoDB, CODES},
    models::CouponCategory,
    utils::error::{AppError, AppResult},
};

lazy_static! {
    static ref PERCENT: Regex = Regex::new(r"(\d{1,3})\s*%").expect("valid percent regex");
}

/// Stores the comparator simulates, with their price floor
const STORES: [(&str, u64, &str); 3] = [
    ("falabella", 50_000, "https://www.falabella.cl/search?q="),
    ("ripley", 60_000, "https://www.ripley.cl/search?q="),
    ("paris", 70_000, "https://www.paris.cl/search?q="),
];
const PRICE_SPREAD: u64 = 200_000;

#[derive(Debug, Clone, Deserialize)]
pub struct CompareQuery {
    pub producto: Option<String>,
    pub categoria: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CouponOffer {
    pub codigo: String,
    pub descuento: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PriceResult {
    pub tienda: String,
    #[serde(rename = "precioBruto")]
    pub precio_bruto: u64,
    pub link: String,
    #[serde(rename = "precioOriginal")]
    pub precio_original: u64,
    #[serde(rename = "precioFinal")]
    pub precio_final: u64,
    #[serde(rename = "codigoAplicado")]
    pub codigo_aplicado: Option<String>,
    #[serde(rename = "descuentoAplicado")]
    pub descuento_aplicado: String,
}

#[derive(Debug, Serialize)]
pub struct Comparison {
    pub producto: String,
    pub categoria: CouponCategory,
    pub resultados: Vec<PriceResult>,
}

/// Percentage in a discount text such as `"20% en tecnología"`.
pub fn parse_percent(text: &str) -> Option<u32> {
    PERCENT
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|p| *p <= 100)
}

/// Simulated shelf price, stable for the same product and store.
pub fn simulated_price(product: &str, store_index: usize) -> u64 {
    // FNV-1a
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in product.trim().to_lowercase().bytes().chain([store_index as u8]) {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }

    let (_, floor, _) = STORES[store_index % STORES.len()];
    floor + hash % PRICE_SPREAD
}

/// Applies the offer with the highest percentage, if any parses.
pub fn apply_best_coupon(store: &str, price: u64, link: String, offers: &[CouponOffer]) -> PriceResult {
    let best = offers
        .iter()
        .filter_map(|o| parse_percent(&o.descuento).map(|p| (p, o)))
        .fold(None::<(u32, &CouponOffer)>, |best, (p, o)| match best {
            Some((bp, _)) if bp >= p => best,
            _ => Some((p, o)),
        })
        .filter(|(p, _)| *p > 0);

    let (precio_final, codigo_aplicado, percent) = match best {
        Some((p, offer)) => {
            let discounted = (price as f64 * (1.0 - p as f64 / 100.0)).round() as u64;
            (discounted, Some(offer.codigo.clone()), p)
        }
        None => (price, None, 0),
    };

    PriceResult {
        tienda: store.to_string(),
        precio_bruto: price,
        link,
        precio_original: price,
        precio_final,
        codigo_aplicado,
        descuento_aplicado: format!("{}%", percent),
    }
}

pub async fn compare(db: &MongoDB, query: &CompareQuery) -> AppResult<Comparison> {
    let producto = query
        .producto
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::Validation("Debe especificar un producto para comparar.".into()))?
        .to_string();

    let categoria = match query.categoria.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(value) => CouponCategory::parse(value)
            .ok_or_else(|| AppError::Validation(format!("Categoría inválida: {}", value)))?,
        None => CouponCategory::Tecnologia,
    };

    let collection = db.collection::<CouponOffer>(CODES);
    let mut resultados = Vec::with_capacity(STORES.len());

    for (index, (store, _, search_url)) in STORES.iter().enumerate() {
        let offers: Vec<CouponOffer> = collection
            .find(doc! { "tienda": *store, "categoria": categoria.as_str(), "verificado": true })
            .projection(doc! { "codigo": 1, "descuento": 1 })
            .await?
            .try_collect()
            .await?;

        let price = simulated_price(&producto, index);
        let link = format!("{}{}", search_url, urlencoding::encode(&producto));
        resultados.push(apply_best_coupon(store, price, link, &offers));
    }

    resultados.sort_by_key(|r| r.precio_final);
    log::info!("🔎 Compared '{}' ({}) across {} stores", producto, categoria, resultados.len());

    Ok(Comparison { producto, categoria, resultados })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(codigo: &str, descuento: &str) -> CouponOffer {
        CouponOffer { codigo: codigo.into(), descuento: descuento.into() }
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("20% en tecnología"), Some(20));
        assert_eq!(parse_percent("Hasta 35 % OFF"), Some(35));
        assert_eq!(parse_percent("Envío gratis"), None);
        assert_eq!(parse_percent("150% locura"), None);
    }

    #[test]
    fn test_simulated_price_is_stable_and_in_range() {
        let a = simulated_price("Notebook Lenovo", 0);
        assert_eq!(a, simulated_price("  notebook lenovo ", 0));
        assert!((50_000..250_000).contains(&a));

        let paris = simulated_price("Notebook Lenovo", 2);
        assert!((70_000..270_000).contains(&paris));
    }

    #[test]
    fn test_best_coupon_wins() {
        let offers = vec![offer("A10", "10% todo"), offer("B25", "25% en notebooks"), offer("C", "2x1")];
        let result = apply_best_coupon("ripley", 100_000, "link".into(), &offers);

        assert_eq!(result.precio_final, 75_000);
        assert_eq!(result.codigo_aplicado.as_deref(), Some("B25"));
        assert_eq!(result.descuento_aplicado, "25%");
        assert_eq!(result.precio_bruto, 100_000);
    }

    #[test]
    fn test_no_usable_coupon_keeps_price() {
        let result = apply_best_coupon("paris", 99_990, "link".into(), &[offer("X", "Envío gratis")]);
        assert_eq!(result.precio_final, 99_990);
        assert!(result.codigo_aplicado.is_none());
        assert_eq!(result.descuento_aplicado, "0%");
    }

    #[test]
    fn test_final_price_is_rounded() {
        let result = apply_best_coupon("falabella", 99_999, "link".into(), &[offer("Q", "15%")]);
        assert_eq!(result.precio_final, 84_999);
    }
}
