use chrono::NaiveDate;
use contracts::projections::p900_seller_monthly_kpi::SellerMonthKpi;
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseBackend, EntityTrait, QueryOrder, Set, Statement};

use super::error::KpiError;
use super::projection_builder::UndeliveredPolicy;
use crate::shared::data::db;

pub const TABLE_NAME: &str = "seller_monthly_kpis";
pub const META_TABLE_NAME: &str = "seller_monthly_kpis_meta";

const POLICY_KEY: &str = "undelivered_policy";

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS seller_monthly_kpis (
        seller_id TEXT NOT NULL,
        order_month TEXT NOT NULL,
        total_orders INTEGER NOT NULL CHECK (total_orders >= 1),
        total_revenue REAL NOT NULL CHECK (total_revenue >= 0),
        late_delivery_pct REAL NOT NULL CHECK (late_delivery_pct BETWEEN 0 AND 1),
        PRIMARY KEY (seller_id, order_month)
    );
"#;

const CREATE_META_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS seller_monthly_kpis_meta (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL
    );
"#;

const INSERT_CHUNK: usize = 150;

const MONTH_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "seller_monthly_kpis")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub seller_id: String,
    /// First of month, `YYYY-MM-01`
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_month: String,
    pub total_orders: i64,
    pub total_revenue: f64,
    pub late_delivery_pct: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for SellerMonthKpi {
    type Error = KpiError;

    fn try_from(m: Model) -> Result<Self, Self::Error> {
        let order_month = NaiveDate::parse_from_str(&m.order_month, MONTH_FORMAT)
            .map_err(|_| KpiError::InvalidMonth(m.order_month.clone()))?;

        Ok(SellerMonthKpi {
            seller_id: m.seller_id,
            order_month,
            total_orders: m.total_orders,
            total_revenue: m.total_revenue,
            late_delivery_pct: m.late_delivery_pct,
        })
    }
}

impl From<&SellerMonthKpi> for ActiveModel {
    fn from(kpi: &SellerMonthKpi) -> Self {
        ActiveModel {
            seller_id: Set(kpi.seller_id.clone()),
            order_month: Set(kpi.order_month.format(MONTH_FORMAT).to_string()),
            total_orders: Set(kpi.total_orders),
            total_revenue: Set(kpi.total_revenue),
            late_delivery_pct: Set(kpi.late_delivery_pct),
        }
    }
}

pub async fn exists<C: ConnectionTrait>(conn: &C) -> Result<bool, DbErr> {
    db::table_exists(conn, TABLE_NAME).await
}

/// Create the table and fill it in one transaction, recording the
/// undelivered-order policy next to the rows.
///
/// Returns false without touching anything when the table is already there,
/// so a second build against the same file never rewrites it. The write lock
/// is taken at BEGIN: a concurrent builder waits for it, then sees the table.
pub async fn create_if_absent(
    conn: &DatabaseConnection,
    kpis: &[SellerMonthKpi],
    policy: UndeliveredPolicy,
) -> Result<bool, DbErr> {
    conn.execute_unprepared("BEGIN IMMEDIATE").await?;

    match create_locked(conn, kpis, policy).await {
        Ok(true) => {
            conn.execute_unprepared("COMMIT").await?;
            Ok(true)
        }
        Ok(false) => {
            conn.execute_unprepared("ROLLBACK").await?;
            Ok(false)
        }
        Err(e) => {
            conn.execute_unprepared("ROLLBACK").await?;
            Err(e)
        }
    }
}

async fn create_locked<C: ConnectionTrait>(
    conn: &C,
    kpis: &[SellerMonthKpi],
    policy: UndeliveredPolicy,
) -> Result<bool, DbErr> {
    if db::table_exists(conn, TABLE_NAME).await? {
        return Ok(false);
    }
    fill(conn, kpis).await?;
    write_policy(conn, policy).await?;
    Ok(true)
}

async fn fill<C: ConnectionTrait>(conn: &C, kpis: &[SellerMonthKpi]) -> Result<(), DbErr> {
    db::execute_ddl(conn, CREATE_TABLE_SQL).await?;
    for chunk in kpis.chunks(INSERT_CHUNK) {
        let actives: Vec<ActiveModel> = chunk.iter().map(ActiveModel::from).collect();
        Entity::insert_many(actives).exec_without_returning(conn).await?;
    }
    Ok(())
}

async fn write_policy<C: ConnectionTrait>(conn: &C, policy: UndeliveredPolicy) -> Result<(), DbErr> {
    db::execute_ddl(conn, CREATE_META_TABLE_SQL).await?;
    conn.execute(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        "INSERT OR REPLACE INTO seller_monthly_kpis_meta (key, value) VALUES (?, ?)",
        [POLICY_KEY.into(), policy.as_str().into()],
    ))
    .await?;
    Ok(())
}

/// Policy the stored table was built with; None for a table without metadata
pub async fn stored_policy<C: ConnectionTrait>(conn: &C) -> Result<Option<String>, DbErr> {
    if !db::table_exists(conn, META_TABLE_NAME).await? {
        return Ok(None);
    }
    let row = conn
        .query_one(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "SELECT value FROM seller_monthly_kpis_meta WHERE key = ?",
            [POLICY_KEY.into()],
        ))
        .await?;
    row.map(|r| r.try_get::<String>("", "value")).transpose()
}

pub async fn load_all<C: ConnectionTrait>(conn: &C) -> Result<Vec<SellerMonthKpi>, KpiError> {
    Entity::find()
        .order_by_asc(Column::OrderMonth)
        .order_by_asc(Column::SellerId)
        .all(conn)
        .await?
        .into_iter()
        .map(SellerMonthKpi::try_from)
        .collect()
}
