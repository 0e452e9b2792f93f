use chrono::NaiveDate;
use contracts::projections::p900_seller_monthly_kpi::SellerMonthKpi;
use once_cell::sync::OnceCell as SyncOnceCell;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::error::KpiError;
use super::projection_builder::{self, UndeliveredPolicy};
use super::repository;
use crate::domain::{a001_order, a002_order_item};
use crate::shared::data::db::{self, AccessMode};

/// Whether the KPI builder may write to the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// Build the KPI table if it is absent, through a write connection that
    /// is closed right after the build
    #[default]
    Writable,
    /// Never write; the KPI table must already exist
    ReadOnly,
}

#[derive(Debug, Clone)]
pub struct KpiSettings {
    pub db_path: PathBuf,
    pub connection_mode: ConnectionMode,
    pub undelivered_policy: UndeliveredPolicy,
}

/// Immutable in-memory copy of the KPI table
#[derive(Debug, Clone, Default)]
pub struct KpiSet {
    rows: Vec<SellerMonthKpi>,
    months: Vec<NaiveDate>,
}

impl KpiSet {
    pub fn new(rows: Vec<SellerMonthKpi>) -> Self {
        let mut months: Vec<NaiveDate> = rows.iter().map(|r| r.order_month).collect();
        months.sort_unstable();
        months.dedup();
        Self { rows, months }
    }

    pub fn rows(&self) -> &[SellerMonthKpi] {
        &self.rows
    }

    /// Distinct months, ascending
    pub fn months(&self) -> &[NaiveDate] {
        &self.months
    }

    pub fn latest_month(&self) -> Option<NaiveDate> {
        self.months.last().copied()
    }

    pub fn for_month(&self, month: NaiveDate) -> impl Iterator<Item = &SellerMonthKpi> {
        self.rows.iter().filter(move |r| r.order_month == month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeOutcome {
    Built { rows: usize },
    AlreadyPresent,
}

/// Build the KPI table on an open write connection unless it already exists
pub async fn materialize_on(
    conn: &DatabaseConnection,
    policy: UndeliveredPolicy,
) -> Result<MaterializeOutcome, KpiError> {
    if repository::exists(conn).await? {
        tracing::info!("P900: {} already materialized, skipping build", repository::TABLE_NAME);
        return Ok(MaterializeOutcome::AlreadyPresent);
    }

    for table in [a001_order::repository::TABLE_NAME, a002_order_item::repository::TABLE_NAME] {
        if !db::table_exists(conn, table).await? {
            return Err(KpiError::MissingInput(table.to_string()));
        }
    }

    let orders = a001_order::repository::list_all(conn).await?;
    let items = a002_order_item::repository::list_all(conn).await?;
    if orders.is_empty() || items.is_empty() {
        tracing::warn!(
            "P900: raw tables are empty ({} orders, {} items), KPI table will be empty",
            orders.len(),
            items.len()
        );
    }

    let kpis = projection_builder::build_seller_monthly_kpis(&orders, &items, policy)?;

    let created = match repository::create_if_absent(conn, &kpis, policy).await {
        Ok(created) => created,
        Err(e) => {
            // another builder may have finished first
            if !repository::exists(conn).await.unwrap_or(false) {
                return Err(e.into());
            }
            tracing::warn!("P900: build lost to a concurrent builder: {}", e);
            false
        }
    };

    if created {
        tracing::info!(
            "P900: built {} seller-month rows from {} orders / {} items ({:?})",
            kpis.len(),
            orders.len(),
            items.len(),
            policy
        );
        Ok(MaterializeOutcome::Built { rows: kpis.len() })
    } else {
        Ok(MaterializeOutcome::AlreadyPresent)
    }
}

/// Open a write connection, build if absent, close the connection
pub async fn materialize(
    db_path: &Path,
    policy: UndeliveredPolicy,
) -> Result<MaterializeOutcome, KpiError> {
    let conn = db::open(db_path, AccessMode::ReadWriteCreate).await?;
    let outcome = materialize_on(&conn, policy).await;
    conn.close().await?;
    outcome
}

/// Read the KPI table through a read-only connection.
///
/// Fails with [`KpiError::PolicyMismatch`] when the table was built under a
/// different undelivered-order policy than `policy`.
pub async fn load(db_path: &Path, policy: UndeliveredPolicy) -> Result<KpiSet, KpiError> {
    if !db_path.exists() {
        return Err(KpiError::KpiTableMissing);
    }

    let conn = db::open(db_path, AccessMode::ReadOnly).await?;
    if !repository::exists(&conn).await? {
        conn.close().await?;
        return Err(KpiError::KpiTableMissing);
    }

    let rows = read_checked(&conn, policy).await;
    conn.close().await?;
    Ok(KpiSet::new(rows?))
}

async fn read_checked(
    conn: &DatabaseConnection,
    policy: UndeliveredPolicy,
) -> Result<Vec<SellerMonthKpi>, KpiError> {
    match repository::stored_policy(conn).await? {
        Some(stored) if stored != policy.as_str() => {
            return Err(KpiError::PolicyMismatch {
                stored,
                configured: policy.as_str().to_string(),
            })
        }
        Some(_) => {}
        None => tracing::warn!(
            "P900: {} has no recorded undelivered_policy, assuming '{}'",
            repository::TABLE_NAME,
            policy.as_str()
        ),
    }
    repository::load_all(conn).await
}

/// One-time build (writable mode only) followed by the read-only load
pub async fn materialize_and_load(settings: &KpiSettings) -> Result<KpiSet, KpiError> {
    if settings.connection_mode == ConnectionMode::Writable {
        materialize(&settings.db_path, settings.undelivered_policy).await?;
    }
    let set = load(&settings.db_path, settings.undelivered_policy).await?;
    tracing::info!(
        "P900: loaded {} seller-month rows over {} months",
        set.rows().len(),
        set.months().len()
    );
    Ok(set)
}

/// Build-once holder for the KPI set.
///
/// Concurrent first callers wait on the same initialization; a failed
/// initialization leaves the cell empty so the next call retries.
pub struct KpiCache {
    cell: OnceCell<Arc<KpiSet>>,
}

impl KpiCache {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
        }
    }

    pub async fn get_or_try_init<F, Fut>(&self, init: F) -> Result<Arc<KpiSet>, KpiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<KpiSet, KpiError>>,
    {
        let set = self
            .cell
            .get_or_try_init(|| async move { init().await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(set))
    }

    pub async fn get_or_materialize(&self, settings: &KpiSettings) -> Result<Arc<KpiSet>, KpiError> {
        self.get_or_try_init(|| materialize_and_load(settings)).await
    }
}

impl Default for KpiCache {
    fn default() -> Self {
        Self::new()
    }
}

static KPI_CACHE: KpiCache = KpiCache::new();
static KPI_SETTINGS: SyncOnceCell<KpiSettings> = SyncOnceCell::new();

/// Register the settings used by [`current`]. Call once at startup.
pub fn configure(settings: KpiSettings) -> anyhow::Result<()> {
    KPI_SETTINGS
        .set(settings)
        .map_err(|_| anyhow::anyhow!("KPI settings already configured"))
}

/// The process-wide KPI set, built on first use
pub async fn current() -> Result<Arc<KpiSet>, KpiError> {
    let settings = KPI_SETTINGS
        .get()
        .ok_or_else(|| anyhow::anyhow!("KPI settings have not been configured"))?;
    KPI_CACHE.get_or_materialize(settings).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::domain::a001_order::Order;
    use contracts::domain::a002_order_item::OrderItem;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn order(id: &str, purchased: &str, delivered: Option<&str>, estimated: &str) -> Order {
        Order {
            order_id: id.to_string(),
            order_purchase_timestamp: purchased.to_string(),
            order_delivered_customer_date: delivered.map(str::to_string),
            order_estimated_delivery_date: estimated.to_string(),
        }
    }

    fn item(order_id: &str, seller: &str, price: f64, freight: f64) -> OrderItem {
        OrderItem {
            order_id: order_id.to_string(),
            order_item_id: 1,
            seller_id: seller.to_string(),
            price,
            freight_value: freight,
        }
    }

    async fn seed_raw(path: &Path) {
        let conn = db::open(path, AccessMode::ReadWriteCreate).await.unwrap();
        a001_order::repository::create_table(&conn).await.unwrap();
        a002_order_item::repository::create_table(&conn).await.unwrap();
        a001_order::repository::insert_all(
            &conn,
            &[
                order("o1", "2024-03-05 09:00:00", Some("2024-03-20 10:00:00"), "2024-03-15 00:00:00"),
                order("o2", "2024-03-12 14:30:00", Some("2024-03-18 10:00:00"), "2024-03-25 00:00:00"),
            ],
        )
        .await
        .unwrap();
        a002_order_item::repository::insert_all(
            &conn,
            &[item("o1", "S", 100.0, 10.0), item("o2", "S", 50.0, 5.0)],
        )
        .await
        .unwrap();
        conn.close().await.unwrap();
    }

    fn settings(path: &Path, mode: ConnectionMode) -> KpiSettings {
        KpiSettings {
            db_path: path.to_path_buf(),
            connection_mode: mode,
            undelivered_policy: UndeliveredPolicy::OnTime,
        }
    }

    #[tokio::test]
    async fn test_materialize_and_load_from_raw_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("olist.db");
        seed_raw(&path).await;

        let set = materialize_and_load(&settings(&path, ConnectionMode::Writable))
            .await
            .unwrap();

        let march = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(set.months(), &[march]);
        assert_eq!(set.rows().len(), 1);
        let row = &set.rows()[0];
        assert_eq!(row.seller_id, "S");
        assert_eq!(row.total_orders, 2);
        assert_eq!(row.total_revenue, 165.0);
        assert_eq!(row.late_delivery_pct, 0.5);
    }

    #[tokio::test]
    async fn test_second_materialize_is_noop_and_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("olist.db");
        seed_raw(&path).await;

        let first = materialize(&path, UndeliveredPolicy::OnTime).await.unwrap();
        assert_eq!(first, MaterializeOutcome::Built { rows: 1 });
        let before = load(&path, UndeliveredPolicy::OnTime).await.unwrap();

        let second = materialize(&path, UndeliveredPolicy::OnTime).await.unwrap();
        assert_eq!(second, MaterializeOutcome::AlreadyPresent);
        let after = load(&path, UndeliveredPolicy::OnTime).await.unwrap();

        assert_eq!(before.rows(), after.rows());
    }

    #[tokio::test]
    async fn test_policy_change_is_reported_not_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("olist.db");
        let conn = db::open(&path, AccessMode::ReadWriteCreate).await.unwrap();
        a001_order::repository::create_table(&conn).await.unwrap();
        a002_order_item::repository::create_table(&conn).await.unwrap();
        a001_order::repository::insert_all(
            &conn,
            &[
                order("o1", "2024-03-05 09:00:00", Some("2024-03-20 10:00:00"), "2024-03-15 00:00:00"),
                order("o2", "2024-03-12 14:30:00", None, "2024-03-25 00:00:00"),
            ],
        )
        .await
        .unwrap();
        a002_order_item::repository::insert_all(
            &conn,
            &[item("o1", "S", 100.0, 10.0), item("o2", "S", 50.0, 5.0)],
        )
        .await
        .unwrap();
        conn.close().await.unwrap();

        let on_time = materialize_and_load(&settings(&path, ConnectionMode::Writable))
            .await
            .unwrap();
        assert_eq!(on_time.rows()[0].late_delivery_pct, 0.5);

        let mut exclude = settings(&path, ConnectionMode::Writable);
        exclude.undelivered_policy = UndeliveredPolicy::Exclude;
        let err = materialize_and_load(&exclude).await.unwrap_err();
        assert!(
            matches!(
                err,
                KpiError::PolicyMismatch { ref stored, ref configured }
                    if stored == "on_time" && configured == "exclude"
            ),
            "{:?}",
            err
        );

        exclude.connection_mode = ConnectionMode::ReadOnly;
        assert!(matches!(
            materialize_and_load(&exclude).await.unwrap_err(),
            KpiError::PolicyMismatch { .. }
        ));

        // dropping the table lets the next build use the configured policy
        let conn = db::open(&path, AccessMode::ReadWriteCreate).await.unwrap();
        db::execute_ddl(&conn, "DROP TABLE seller_monthly_kpis").await.unwrap();
        db::execute_ddl(&conn, "DROP TABLE seller_monthly_kpis_meta").await.unwrap();
        conn.close().await.unwrap();
        exclude.connection_mode = ConnectionMode::Writable;
        let set = materialize_and_load(&exclude).await.unwrap();
        assert_eq!(set.rows()[0].late_delivery_pct, 1.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_builders_on_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("olist.db");
        seed_raw(&path).await;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let path = path.clone();
            handles.push(tokio::spawn(async move {
                materialize(&path, UndeliveredPolicy::OnTime).await
            }));
        }

        let mut built = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                MaterializeOutcome::Built { rows } => {
                    assert_eq!(rows, 1);
                    built += 1;
                }
                MaterializeOutcome::AlreadyPresent => {}
            }
        }
        assert_eq!(built, 1);
        assert_eq!(load(&path, UndeliveredPolicy::OnTime).await.unwrap().rows().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_raw_table_fails_without_partial_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("olist.db");
        let conn = db::open(&path, AccessMode::ReadWriteCreate).await.unwrap();
        a001_order::repository::create_table(&conn).await.unwrap();
        conn.close().await.unwrap();

        let err = materialize(&path, UndeliveredPolicy::OnTime).await.unwrap_err();
        assert!(matches!(err, KpiError::MissingInput(ref t) if t == "order_items"));

        let err = load(&path, UndeliveredPolicy::OnTime).await.unwrap_err();
        assert!(matches!(err, KpiError::KpiTableMissing));
    }

    #[tokio::test]
    async fn test_read_only_mode_never_builds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("olist.db");
        seed_raw(&path).await;

        let err = materialize_and_load(&settings(&path, ConnectionMode::ReadOnly))
            .await
            .unwrap_err();
        assert!(matches!(err, KpiError::KpiTableMissing));

        materialize(&path, UndeliveredPolicy::OnTime).await.unwrap();
        let set = materialize_and_load(&settings(&path, ConnectionMode::ReadOnly))
            .await
            .unwrap();
        assert_eq!(set.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_read_only_mode_with_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");

        let err = materialize_and_load(&settings(&path, ConnectionMode::ReadOnly))
            .await
            .unwrap_err();
        assert!(matches!(err, KpiError::KpiTableMissing));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_cache_initializes_once_under_concurrency() {
        let cache = Arc::new(KpiCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_try_init(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok(KpiSet::default())
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_retries_after_failure() {
        let cache = KpiCache::new();

        let err = cache
            .get_or_try_init(|| async { Err(KpiError::MissingInput("orders".to_string())) })
            .await
            .unwrap_err();
        assert!(matches!(err, KpiError::MissingInput(_)));

        let set = cache
            .get_or_try_init(|| async { Ok(KpiSet::default()) })
            .await
            .unwrap();
        assert!(set.rows().is_empty());
    }

    #[test]
    fn test_kpi_set_months_sorted_and_distinct() {
        let row = |seller: &str, m: u32| SellerMonthKpi {
            seller_id: seller.to_string(),
            order_month: NaiveDate::from_ymd_opt(2024, m, 1).unwrap(),
            total_orders: 1,
            total_revenue: 1.0,
            late_delivery_pct: 0.0,
        };
        let set = KpiSet::new(vec![row("a", 5), row("b", 2), row("c", 5), row("a", 3)]);

        let months: Vec<u32> = set.months().iter().map(|d| chrono::Datelike::month(d)).collect();
        assert_eq!(months, vec![2, 3, 5]);
        assert_eq!(set.latest_month(), NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(set.for_month(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()).count(), 2);
    }
}
