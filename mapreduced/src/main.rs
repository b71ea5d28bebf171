//! Entry point for the anagram MapReduce daemon.
//!
//! Runs every pipeline stage in one process against the configured bus,
//! key/value and object store backends, and serves the HTTP trigger
//! endpoint until interrupted.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use hyper::service::{make_service_fn, service_fn};
use observability_deps::tracing::{error, info};
use snafu::{ResultExt, Snafu};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use map_phase::starter::Starter;
use mapreduced::config::{
    make_bucket_store, make_bus, make_kv, BusConfig, KvConfig, ObjectStoreConfig,
};
use mapreduced::http::route_request;
use mapreduced::pipeline::{spawn_stages, PipelineDeps};

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("invalid config: {source}"))]
    Config { source: mapreduced::config::ParseError },

    #[snafu(display("error subscribing stage workers: {source}"))]
    Subscribe { source: message_bus::BusError },

    #[snafu(display("HTTP server error: {source}"))]
    Serve { source: hyper::Error },
}

#[derive(Debug, clap::Parser)]
#[clap(
    name = "mapreduced",
    about = "Distributed anagram MapReduce over text corpora",
    long_about = "Runs the anagram MapReduce pipeline: bus-triggered stage \
    workers, a barrier controller coordinating through a shared key/value \
    store, and an HTTP endpoint that accepts jobs.\n\nConfiguration options \
    below can be set either with command line flags or with the specified \
    environment variable. If there is a file named '.env' in the current \
    working directory, it is sourced before loading the configuration."
)]
struct Config {
    /// Logging filter, in tracing-subscriber's env-filter syntax.
    #[clap(
        long = "--log-filter",
        env = "LOG_FILTER",
        default_value = "info",
        action
    )]
    log_filter: String,

    /// Address the HTTP trigger endpoint binds to.
    #[clap(
        long = "--api-bind",
        env = "MAPREDUCE_API_BIND_ADDR",
        default_value = "127.0.0.1:8080",
        action
    )]
    api_bind_address: SocketAddr,

    #[clap(flatten)]
    bus_config: BusConfig,

    #[clap(flatten)]
    kv_config: KvConfig,

    #[clap(flatten)]
    object_store_config: ObjectStoreConfig,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .init();

    if let Err(e) = run(config).await {
        error!(error=%e, "mapreduced exited with error");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Error> {
    let bus = make_bus(&config.bus_config).context(ConfigSnafu)?;
    let store = make_bucket_store(&config.object_store_config).context(ConfigSnafu)?;
    let kv = make_kv(&config.kv_config).context(ConfigSnafu)?;

    let deps = PipelineDeps {
        bus: Arc::clone(&bus),
        store: Arc::clone(&store),
        shards: kv.shards,
        control: kv.control,
        reducers: config.kv_config.reducers,
    };

    let shutdown = CancellationToken::new();
    let stages = spawn_stages(&deps, &shutdown).await.context(SubscribeSnafu)?;
    info!(
        bus = bus.type_name(),
        object_store = store.type_name(),
        reducers = config.kv_config.reducers.get(),
        "pipeline stages running"
    );

    let starter = Arc::new(Starter::new(Arc::clone(&store), Arc::clone(&bus)));
    let make_service = make_service_fn(move |_conn| {
        let starter = Arc::clone(&starter);
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req| {
                route_request(Arc::clone(&starter), req)
            }))
        }
    });

    let server = hyper::Server::bind(&config.api_bind_address).serve(make_service);
    info!(address = %config.api_bind_address, "HTTP trigger endpoint listening");

    let graceful = server.with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    });
    let result = graceful.await.context(ServeSnafu);

    shutdown.cancel();
    for handle in stages {
        let _ = handle.await;
    }
    result
}
