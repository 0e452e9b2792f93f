pub mod p900_seller_monthly_kpi;
