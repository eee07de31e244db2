use std::collections::HashMap;

use serde::Serialize;

use crate::domain::{CellValue, Record};

pub const COL_SELLER: &str = "Продавец";
pub const COL_NAME: &str = "Название";
pub const COL_PRICE: &str = "Цена";
pub const COL_SKU: &str = "SKU";
pub const COL_BRAND: &str = "Бренд";
pub const COL_MAIN_CATEGORY: &str = "Основная категория";
pub const COL_DAYS_ON_SALE: &str = "Кол-во дней когда артикул был в продаже";
pub const COL_DAYS_WITH_PURCHASES: &str = "Кол-во дней, когда артикул покупали";
pub const COL_ORDERS: &str = "Кол-во заказов";
pub const COL_TURNOVER_FBO: &str = "Оборот FBO";
pub const COL_TURNOVER_FBS: &str = "Оборот FBS";
pub const COL_MISSED_REVENUE: &str = "Упущенная выгода";
pub const COL_LAST_STOCK: &str = "Последние остатки на складах";
pub const COL_MISSED_REVENUE_PERCENT: &str = "Упущенная выгода в процентах";
pub const COL_FEEDBACKS: &str = "Отзывов";
pub const COL_SEARCH_QUERIES: &str = "Поисковых запросов";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Supplier {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: u64,
    pub name: String,
    pub price: i64,
    pub total_orders_count: i64,
    pub turnover_fbo: i64,
    pub turnover_fbs: i64,
    pub missed_revenue: i64,
    pub feedback_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Goods {
    pub id: u64,
    pub name: String,
    pub price: i64,
    pub supplier_id: u64,
    pub order_id: u64,
    pub sku: String,
    pub brand: String,
    pub main_category: String,
    pub days_on_sale: i64,
    pub days_with_purchases: i64,
    pub last_stock_balance: i64,
    pub missed_revenue_percent: f64,
    pub search_queries: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Catalog {
    pub suppliers: Vec<Supplier>,
    pub orders: Vec<Order>,
    pub goods: Vec<Goods>,
    pub skipped: Vec<SkippedRow>,
}

struct Row {
    seller: String,
    name: String,
    price: i64,
    sku: String,
    brand: String,
    main_category: String,
    days_on_sale: i64,
    days_with_purchases: i64,
    orders: i64,
    turnover_fbo: i64,
    turnover_fbs: i64,
    missed_revenue: i64,
    last_stock: i64,
    missed_revenue_percent: f64,
    feedbacks: i64,
    search_queries: i64,
}

impl Catalog {
    pub fn from_records(records: &[Record]) -> Self {
        let mut catalog = Catalog::default();
        let mut supplier_ids: HashMap<String, u64> = HashMap::new();

        for (index, record) in records.iter().enumerate() {
            let row = match Row::extract(record) {
                Ok(row) => row,
                Err(reason) => {
                    tracing::debug!(index, %reason, "skipping record");
                    catalog.skipped.push(SkippedRow { index, reason });
                    continue;
                }
            };

            let next_supplier_id = catalog.suppliers.len() as u64 + 1;
            let supplier_id = *supplier_ids.entry(row.seller.clone()).or_insert_with(|| {
                catalog.suppliers.push(Supplier {
                    id: next_supplier_id,
                    name: row.seller.clone(),
                });
                next_supplier_id
            });

            let order_id = catalog.orders.len() as u64 + 1;
            catalog.orders.push(Order {
                id: order_id,
                name: format!("Order SKU: {}", row.sku),
                price: row.price,
                total_orders_count: row.orders,
                turnover_fbo: row.turnover_fbo,
                turnover_fbs: row.turnover_fbs,
                missed_revenue: row.missed_revenue,
                feedback_count: row.feedbacks,
            });

            catalog.goods.push(Goods {
                id: catalog.goods.len() as u64 + 1,
                name: row.name,
                price: row.price,
                supplier_id,
                order_id,
                sku: row.sku,
                brand: row.brand,
                main_category: row.main_category,
                days_on_sale: row.days_on_sale,
                days_with_purchases: row.days_with_purchases,
                last_stock_balance: row.last_stock,
                missed_revenue_percent: row.missed_revenue_percent,
                search_queries: row.search_queries,
            });
        }

        catalog
    }
}

impl Row {
    fn extract(record: &Record) -> Result<Self, String> {
        Ok(Self {
            seller: text(record, COL_SELLER)?,
            name: text(record, COL_NAME)?,
            price: integer(record, COL_PRICE)?,
            sku: text(record, COL_SKU)?,
            brand: text(record, COL_BRAND)?,
            main_category: text(record, COL_MAIN_CATEGORY)?,
            days_on_sale: integer(record, COL_DAYS_ON_SALE)?,
            days_with_purchases: integer(record, COL_DAYS_WITH_PURCHASES)?,
            orders: integer(record, COL_ORDERS)?,
            turnover_fbo: integer(record, COL_TURNOVER_FBO)?,
            turnover_fbs: integer(record, COL_TURNOVER_FBS)?,
            missed_revenue: integer(record, COL_MISSED_REVENUE)?,
            last_stock: integer(record, COL_LAST_STOCK)?,
            missed_revenue_percent: float(record, COL_MISSED_REVENUE_PERCENT)?,
            feedbacks: integer(record, COL_FEEDBACKS)?,
            search_queries: integer(record, COL_SEARCH_QUERIES)?,
        })
    }
}

fn cell<'a>(record: &'a Record, column: &str) -> Result<&'a CellValue, String> {
    record
        .get(column)
        .ok_or_else(|| format!("missing column `{column}`"))
}

fn text(record: &Record, column: &str) -> Result<String, String> {
    Ok(cell(record, column)?.to_string())
}

fn integer(record: &Record, column: &str) -> Result<i64, String> {
    let value = cell(record, column)?;
    let parsed = match value {
        CellValue::Integer(value) => Some(*value),
        CellValue::Float(value) if value.is_finite() => Some(value.trunc() as i64),
        other => other.as_i64(),
    };
    parsed.ok_or_else(|| format!("column `{column}`: `{value}` is not an integer"))
}

fn float(record: &Record, column: &str) -> Result<f64, String> {
    let value = cell(record, column)?;
    value
        .as_f64()
        .ok_or_else(|| format!("column `{column}`: `{value}` is not a number"))
}
