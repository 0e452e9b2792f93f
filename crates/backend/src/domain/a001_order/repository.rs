use contracts::domain::a001_order::Order;
use sea_orm::entity::prelude::*;
use sea_orm::{EntityTrait, QueryOrder, Set};

use crate::shared::data::db;

pub const TABLE_NAME: &str = "orders";

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS orders (
        order_id TEXT PRIMARY KEY NOT NULL,
        order_purchase_timestamp TEXT NOT NULL,
        order_delivered_customer_date TEXT,
        order_estimated_delivery_date TEXT NOT NULL
    );
"#;

/// Rows per INSERT statement, keeps bound parameters well below SQLite limits
const INSERT_CHUNK: usize = 200;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_id: String,
    pub order_purchase_timestamp: String,
    #[sea_orm(nullable)]
    pub order_delivered_customer_date: Option<String>,
    pub order_estimated_delivery_date: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Order {
    fn from(m: Model) -> Self {
        Order {
            order_id: m.order_id,
            order_purchase_timestamp: m.order_purchase_timestamp,
            order_delivered_customer_date: m.order_delivered_customer_date,
            order_estimated_delivery_date: m.order_estimated_delivery_date,
        }
    }
}

impl From<&Order> for ActiveModel {
    fn from(order: &Order) -> Self {
        ActiveModel {
            order_id: Set(order.order_id.clone()),
            order_purchase_timestamp: Set(order.order_purchase_timestamp.clone()),
            order_delivered_customer_date: Set(order.order_delivered_customer_date.clone()),
            order_estimated_delivery_date: Set(order.order_estimated_delivery_date.clone()),
        }
    }
}

pub async fn exists<C: ConnectionTrait>(conn: &C) -> Result<bool, DbErr> {
    db::table_exists(conn, TABLE_NAME).await
}

pub async fn create_table<C: ConnectionTrait>(conn: &C) -> Result<(), DbErr> {
    db::execute_ddl(conn, CREATE_TABLE_SQL).await
}

pub async fn insert_all<C: ConnectionTrait>(conn: &C, orders: &[Order]) -> Result<(), DbErr> {
    for chunk in orders.chunks(INSERT_CHUNK) {
        let actives: Vec<ActiveModel> = chunk.iter().map(ActiveModel::from).collect();
        Entity::insert_many(actives).exec_without_returning(conn).await?;
    }
    Ok(())
}

pub async fn list_all<C: ConnectionTrait>(conn: &C) -> Result<Vec<Order>, DbErr> {
    let orders = Entity::find()
        .order_by_asc(Column::OrderId)
        .all(conn)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(orders)
}
