use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use torrent_engine::app_state::AppState;
use torrent_engine::config::{Args, Config};
use torrent_engine::live::LiveRegistry;
use torrent_engine::peer_client::PeerClient;
use torrent_engine::queue::Queue;
use torrent_engine::store::{Download, DownloadType, ItemType, Store};
use torrent_engine::streaming;
use torrent_engine::tracing::init_tracer;
use torrent_engine::worker::WorkerContext;

#[tokio::main]
async fn main() {
    init_tracer();

    let config = match Config::load(Args::parse()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    let config = Arc::new(config);
    tracing::info!(port = config.server_port, "Loaded configuration");

    let store = Arc::new(
        Store::connect(&config.database_url)
            .await
            .expect("database to be reachable"),
    );

    let cancellation_token = CancellationToken::new();
    let peer_client = Arc::new(
        PeerClient::new(torrent::ClientConfig {
            cancellation_token: Some(cancellation_token.clone()),
            ..Default::default()
        })
        .await
        .expect("peer client to bind its listening ports"),
    );

    let live = Arc::new(LiveRegistry::default());

    let worker_ctx = Arc::new(WorkerContext {
        store: Arc::clone(&store),
        peer_client: Arc::clone(&peer_client),
        live: Arc::clone(&live),
        download_root: config.download_location.clone(),
    });

    let queue = Arc::new(Queue::new(Arc::clone(&worker_ctx), config.max_concurrent_downloads));
    {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            if let Err(e) = queue.rehydrate_on_start().await {
                tracing::error!("Failed to rehydrate pending downloads: {e}");
            }
        });
    }

    let app_state = AppState {
        store,
        queue,
        peer_client,
        live,
        config: Arc::clone(&config),
    };

    let app = Router::new()
        .route("/watch/{id}", get(streaming::watch))
        .route("/downloads", get(list_downloads))
        .route("/downloads", post(create_download))
        .route("/downloads/{id}", delete(remove_download))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), config.server_port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));
    tracing::info!(%addr, "Starting server");

    {
        let cancellation_token = cancellation_token.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(cancellation_token.cancelled_owned())
                .await
                .unwrap();
        });
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            cancellation_token.cancel();
        }
        _ = cancellation_token.cancelled() => {}
    }
    tracing::info!("Shutting down");
}

#[derive(serde::Deserialize)]
struct CreateDownloadRequest {
    id: String,
    item_type: ItemType,
    quality: String,
    #[serde(default)]
    download_type: Option<DownloadType>,
}

async fn create_download(
    axum::extract::State(app): axum::extract::State<AppState>,
    axum::Json(body): axum::Json<CreateDownloadRequest>,
) -> Result<axum::Json<Download>, torrent_engine::error::EngineError> {
    let download = Download::new(
        body.id,
        body.item_type,
        body.quality,
        body.download_type.unwrap_or(DownloadType::Download),
    );
    app.store.insert_download(&download).await?;
    app.queue.add_download(download.clone()).await;
    let queue = Arc::clone(&app.queue);
    tokio::spawn(async move { queue.start_downloads().await });
    Ok(axum::Json(download))
}

async fn remove_download(
    axum::extract::State(app): axum::extract::State<AppState>,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> axum::http::StatusCode {
    app.queue.stop_downloading(&id).await;
    axum::http::StatusCode::NO_CONTENT
}

async fn list_downloads(
    axum::extract::State(app): axum::extract::State<AppState>,
) -> Result<axum::Json<Vec<Download>>, torrent_engine::error::EngineError> {
    let pending = app.store.find_pending().await?;
    Ok(axum::Json(pending))
}
