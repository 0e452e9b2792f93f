use contracts::domain::a002_order_item::OrderItem;
use sea_orm::entity::prelude::*;
use sea_orm::{EntityTrait, QueryOrder, Set};

use crate::shared::data::db;

pub const TABLE_NAME: &str = "order_items";

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS order_items (
        order_id TEXT NOT NULL,
        order_item_id INTEGER NOT NULL,
        seller_id TEXT NOT NULL,
        price REAL NOT NULL,
        freight_value REAL NOT NULL,
        PRIMARY KEY (order_id, order_item_id)
    );
"#;

const INSERT_CHUNK: usize = 150;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_item_id: i64,
    pub seller_id: String,
    pub price: f64,
    pub freight_value: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for OrderItem {
    fn from(m: Model) -> Self {
        OrderItem {
            order_id: m.order_id,
            order_item_id: m.order_item_id,
            seller_id: m.seller_id,
            price: m.price,
            freight_value: m.freight_value,
        }
    }
}

impl From<&OrderItem> for ActiveModel {
    fn from(item: &OrderItem) -> Self {
        ActiveModel {
            order_id: Set(item.order_id.clone()),
            order_item_id: Set(item.order_item_id),
            seller_id: Set(item.seller_id.clone()),
            price: Set(item.price),
            freight_value: Set(item.freight_value),
        }
    }
}

pub async fn exists<C: ConnectionTrait>(conn: &C) -> Result<bool, DbErr> {
    db::table_exists(conn, TABLE_NAME).await
}

pub async fn create_table<C: ConnectionTrait>(conn: &C) -> Result<(), DbErr> {
    db::execute_ddl(conn, CREATE_TABLE_SQL).await
}

pub async fn insert_all<C: ConnectionTrait>(conn: &C, items: &[OrderItem]) -> Result<(), DbErr> {
    for chunk in items.chunks(INSERT_CHUNK) {
        let actives: Vec<ActiveModel> = chunk.iter().map(ActiveModel::from).collect();
        Entity::insert_many(actives).exec_without_returning(conn).await?;
    }
    Ok(())
}

pub async fn list_all<C: ConnectionTrait>(conn: &C) -> Result<Vec<OrderItem>, DbErr> {
    let items = Entity::find()
        .order_by_asc(Column::OrderId)
        .order_by_asc(Column::OrderItemId)
        .all(conn)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(items)
}
