use anyhow::Result;
use contracts::domain::a001_order::Order;
use contracts::domain::a002_order_item::OrderItem;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::domain::{a001_order, a002_order_item};
use crate::shared::data::db::{self, AccessMode};

/// Source files of the import
#[derive(Debug, Clone)]
pub struct ImportPaths {
    pub orders_csv: PathBuf,
    pub order_items_csv: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported { orders: usize, order_items: usize },
    /// Raw tables already present, nothing was read
    Skipped,
}

fn read_records<T: DeserializeOwned>(csv_text: &str, what: &str) -> Result<Vec<T>> {
    // Strip UTF-8 BOM if present
    let text = csv_text.trim_start_matches('\u{FEFF}');

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<T>().enumerate() {
        // +2: header line and 1-based numbering
        let record = row.map_err(|e| anyhow::anyhow!("{}: bad row at line {}: {}", what, index + 2, e))?;
        records.push(record);
    }
    Ok(records)
}

/// Parse an orders export. Only the columns the KPI projection needs are
/// kept; an empty delivered date becomes None.
pub fn parse_orders(csv_text: &str) -> Result<Vec<Order>> {
    let mut orders: Vec<Order> = read_records(csv_text, "orders")?;
    for order in &mut orders {
        if !order.is_delivered() {
            order.order_delivered_customer_date = None;
        }
    }
    Ok(orders)
}

pub fn parse_order_items(csv_text: &str) -> Result<Vec<OrderItem>> {
    read_records(csv_text, "order items")
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path.display(), e))
}

/// Create both raw tables and fill them in one transaction
pub async fn import_on(
    conn: &DatabaseConnection,
    orders: &[Order],
    items: &[OrderItem],
) -> Result<()> {
    let txn = conn.begin().await?;
    a001_order::repository::create_table(&txn).await?;
    a002_order_item::repository::create_table(&txn).await?;
    a001_order::repository::insert_all(&txn, orders).await?;
    a002_order_item::repository::insert_all(&txn, items).await?;
    txn.commit().await?;
    Ok(())
}

/// Load the CSV exports into the raw tables unless they already exist.
///
/// Having only one of the two raw tables is treated as a broken database.
pub async fn import_if_absent(db_path: &Path, paths: &ImportPaths) -> Result<ImportOutcome> {
    let conn = db::open(db_path, AccessMode::ReadWriteCreate).await?;
    let outcome = run(&conn, paths).await;
    conn.close().await?;
    outcome
}

async fn run(conn: &DatabaseConnection, paths: &ImportPaths) -> Result<ImportOutcome> {
    let has_orders = a001_order::repository::exists(conn).await?;
    let has_items = a002_order_item::repository::exists(conn).await?;

    match (has_orders, has_items) {
        (true, true) => {
            tracing::info!("U501: raw tables already present, import skipped");
            return Ok(ImportOutcome::Skipped);
        }
        (false, false) => {}
        _ => anyhow::bail!(
            "Only one of {} / {} exists, refusing to import over a partial dataset",
            a001_order::repository::TABLE_NAME,
            a002_order_item::repository::TABLE_NAME
        ),
    }

    tracing::info!(
        "U501: importing {} and {}",
        paths.orders_csv.display(),
        paths.order_items_csv.display()
    );
    let orders = parse_orders(&read_file(&paths.orders_csv)?)?;
    let items = parse_order_items(&read_file(&paths.order_items_csv)?)?;

    import_on(conn, &orders, &items).await?;

    tracing::info!(
        "U501: imported {} orders and {} order items",
        orders.len(),
        items.len()
    );
    Ok(ImportOutcome::Imported {
        orders: orders.len(),
        order_items: items.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDERS_CSV: &str = "\u{FEFF}order_id,customer_id,order_status,order_purchase_timestamp,order_approved_at,order_delivered_carrier_date,order_delivered_customer_date,order_estimated_delivery_date
e481f51cbdc54678b7cc49136f2d6af7,9ef432eb6251297304e76186b10a928d,delivered,2017-10-02 10:56:33,2017-10-02 11:07:15,2017-10-04 19:55:00,2017-10-10 21:25:13,2017-10-18 00:00:00
a4591c265e18cb1dcee52889e2d8acc3,503740e9ca751ccdda7ba28e9ab8f608,shipped,2017-07-09 21:57:05,2017-07-09 22:10:13,2017-07-11 14:58:04,,2017-08-03 00:00:00
";

    const ITEMS_CSV: &str = "order_id,order_item_id,product_id,seller_id,shipping_limit_date,price,freight_value
e481f51cbdc54678b7cc49136f2d6af7,1,87285b34884572647811a353c7ac498a,3504c0cb71d7fa48d967e0e4c94d59d9,2017-10-06 11:07:15,29.99,8.72
a4591c265e18cb1dcee52889e2d8acc3,1,060cb19345d90064d1015407193c233d,8581055ce74af1daba164fdbd55a40de,2017-07-13 22:10:13,147.90,27.36
";

    #[test]
    fn test_parse_orders_keeps_needed_columns() {
        let orders = parse_orders(ORDERS_CSV).unwrap();

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].order_id, "e481f51cbdc54678b7cc49136f2d6af7");
        assert_eq!(orders[0].order_purchase_timestamp, "2017-10-02 10:56:33");
        assert_eq!(
            orders[0].order_delivered_customer_date.as_deref(),
            Some("2017-10-10 21:25:13")
        );
        assert_eq!(orders[0].order_estimated_delivery_date, "2017-10-18 00:00:00");
        assert_eq!(orders[1].order_delivered_customer_date, None);
    }

    #[test]
    fn test_parse_order_items() {
        let items = parse_order_items(ITEMS_CSV).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[1].seller_id, "8581055ce74af1daba164fdbd55a40de");
        assert_eq!(items[1].order_item_id, 1);
        assert_eq!(items[1].price, 147.90);
        assert_eq!(items[1].freight_value, 27.36);
    }

    #[test]
    fn test_bad_price_reports_line() {
        let csv = "order_id,order_item_id,seller_id,price,freight_value\no1,1,s1,abc,1.0\n";
        let err = parse_order_items(csv).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{}", err);
    }

    #[tokio::test]
    async fn test_import_if_absent_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let orders_csv = dir.path().join("orders.csv");
        let items_csv = dir.path().join("items.csv");
        std::fs::write(&orders_csv, ORDERS_CSV).unwrap();
        std::fs::write(&items_csv, ITEMS_CSV).unwrap();
        let paths = ImportPaths {
            orders_csv,
            order_items_csv: items_csv,
        };
        let db_path = dir.path().join("olist.db");

        let first = import_if_absent(&db_path, &paths).await.unwrap();
        assert_eq!(
            first,
            ImportOutcome::Imported {
                orders: 2,
                order_items: 2
            }
        );

        let second = import_if_absent(&db_path, &paths).await.unwrap();
        assert_eq!(second, ImportOutcome::Skipped);

        let conn = db::open(&db_path, AccessMode::ReadOnly).await.unwrap();
        let orders = a001_order::repository::list_all(&conn).await.unwrap();
        let items = a002_order_item::repository::list_all(&conn).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_csv_leaves_no_tables() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ImportPaths {
            orders_csv: dir.path().join("nope.csv"),
            order_items_csv: dir.path().join("nope_items.csv"),
        };
        let db_path = dir.path().join("olist.db");

        assert!(import_if_absent(&db_path, &paths).await.is_err());

        let conn = db::open(&db_path, AccessMode::ReadOnly).await.unwrap();
        assert!(!a001_order::repository::exists(&conn).await.unwrap());
        assert!(!a002_order_item::repository::exists(&conn).await.unwrap());
    }
}
