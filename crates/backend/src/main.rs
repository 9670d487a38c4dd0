pub mod api;
pub mod dashboards;
pub mod routes;
pub mod shared;
pub mod system;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use axum::http::{header, Method};
    use axum::middleware;
    use tokio::net::TcpListener;
    use tower_http::cors::{Any, CorsLayer};

    system::tracing::initialize()?;

    let config = shared::config::load_config()?;

    dashboards::d402_logistics_statistics::source::initialize(&config.statistics)?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let app = routes::configure_routes()
        .layer(middleware::from_fn(
            system::middleware::request_logger::request_logger,
        ))
        .layer(cors);

    let addr = config.server.socket_addr()?;

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
                    addr.port()
                );
            } else {
                tracing::error!("Failed to bind to {}. Error: {}", addr, e);
            }
            return Err(e.into());
        }
    };

    axum::serve(listener, app).await?;

    Ok(())
}
