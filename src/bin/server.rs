use std::{fs::OpenOptions, net::SocketAddr, process::exit, sync::Arc};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt,
};

use household_ledger::{
    AppState, PaginationConfig, ServiceConfig, build_router, graceful_shutdown,
    logging_middleware,
};

/// The REST API server for Household Ledger.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The canonical name of the local timezone, e.g. "Pacific/Auckland".
    #[arg(long, default_value = "Etc/UTC")]
    timezone: String,

    /// The base URL of the web app, used for links in emails.
    #[arg(long, default_value = "http://localhost:3000")]
    app_url: String,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    if time_tz::timezones::get_by_name(&args.timezone).is_none() {
        tracing::error!("\"{}\" is not a valid canonical timezone name", args.timezone);
        exit(1);
    }

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("{error}");
            exit(1);
        }
    };

    let connection = Connection::open(&args.db_path)
        .unwrap_or_else(|error| panic!("Could not open the database at {}: {error}", args.db_path));

    let state = AppState::new(
        connection,
        &config,
        config.mailer(),
        &args.timezone,
        &args.app_url,
        PaginationConfig::default(),
    )
    .expect("Could not initialize the database.");

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(
        build_router(state).layer(middleware::from_fn(logging_middleware)),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("The server stopped unexpectedly.");
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty().with_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file))
        .with_filter(filter::LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Handlers log their own errors.
        .on_failure(());

    router.layer(tracing_layer)
}
