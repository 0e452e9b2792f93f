pub mod api;
pub mod dashboards;
pub mod domain;
pub mod projections;
pub mod routes;
pub mod shared;
pub mod system;
pub mod usecases;

use projections::p900_seller_monthly_kpi::{service as kpi_service, ConnectionMode, KpiSettings};
use usecases::u501_import_olist_csv::{self, ImportPaths};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use axum::http::{header, Method};
    use axum::middleware;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tower_http::cors::{Any, CorsLayer};

    system::tracing::initialize()?;

    let config = shared::config::load_config()?;
    let db_path = config.database_path();
    tracing::info!(
        "Database: {} ({:?}, undelivered orders: {:?})",
        db_path.display(),
        config.kpi.connection_mode,
        config.kpi.undelivered_policy
    );

    // Raw data import only makes sense while the database may be written
    if let Some((orders_csv, order_items_csv)) = config.import_paths() {
        if config.kpi.connection_mode == ConnectionMode::Writable {
            let paths = ImportPaths {
                orders_csv,
                order_items_csv,
            };
            u501_import_olist_csv::import_if_absent(&db_path, &paths).await?;
        } else {
            tracing::warn!("[import] is ignored in read_only connection mode");
        }
    }

    kpi_service::configure(KpiSettings {
        db_path,
        connection_mode: config.kpi.connection_mode,
        undelivered_policy: config.kpi.undelivered_policy,
    })?;

    // Build (if needed) and load before accepting requests; failure is fatal
    let kpis = match kpi_service::current().await {
        Ok(kpis) => kpis,
        Err(e) => {
            tracing::error!("Cannot prepare seller monthly KPIs: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!(
        "Seller monthly KPIs ready: {} rows, months {:?}..{:?}",
        kpis.rows().len(),
        kpis.months().first(),
        kpis.latest_month()
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let app = routes::configure_routes()
        .layer(middleware::from_fn(system::request_logger::request_logger))
        .layer(cors);

    let addr: SocketAddr = ([0, 0, 0, 0], config.server.port).into();

    tracing::info!("Attempting to bind server to http://{}", addr);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => {
            tracing::info!("Server successfully bound to {}", addr);
            listener
        }
        Err(e) => {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                tracing::error!(
                    "Error: Port {} is already in use. Please ensure no other process is using this port.",
                    config.server.port
                );
            } else {
                tracing::error!("Failed to bind to port {}. Error: {}", config.server.port, e);
            }
            return Err(e.into());
        }
    };

    axum::serve(listener, app).await?;

    Ok(())
}
