use crate::monitor::{MonitorNamespace, MonitorNamespaceServer};
use anyhow::Context;
use censorscope_core::Clock;
use censorscope_db::Database;
use http::Method;
use jsonrpsee::server::middleware::http::ProxyGetRequestLayer;
use jsonrpsee::server::{RpcServiceBuilder, ServerBuilder, ServerHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Starts the query API on `addr` and returns its handle. The server runs
/// until the handle is stopped or dropped.
///
/// Besides the `monitor_*` RPC methods, the original REST routes are kept
/// alive as GET aliases proxied onto them.
pub async fn serve(
    addr: SocketAddr,
    db: Database,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<ServerHandle> {
    // CORS headers only; filtering is left to browsers, and the data is
    // public read-only anyway.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST]);
    let middleware = tower::ServiceBuilder::new()
        .layer(cors)
        .layer(ProxyGetRequestLayer::new("/v1/stats", "monitor_stats").context("alias /v1/stats")?)
        .layer(
            ProxyGetRequestLayer::new("/v1/blocks", "monitor_recentBlocks")
                .context("alias /v1/blocks")?,
        )
        .layer(
            ProxyGetRequestLayer::new("/v1/transactions", "monitor_recentTransactions")
                .context("alias /v1/transactions")?,
        )
        .layer(
            ProxyGetRequestLayer::new("/v1/validators", "monitor_validators")
                .context("alias /v1/validators")?,
        );

    let server = ServerBuilder::default()
        .http_only()
        .set_http_middleware(middleware)
        .set_rpc_middleware(RpcServiceBuilder::new().rpc_logger(1024))
        .build(addr)
        .await
        .with_context(|| format!("binding query api to {addr}"))?;
    let rpc = MonitorNamespace::new(db, clock).into_rpc();
    Ok(server.start(rpc))
}
