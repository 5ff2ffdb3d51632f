use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use rtb_lite::blocklist::BlockList;
use rtb_lite::config::RtbConfig;
use rtb_lite::context_store::ContextStore;
use rtb_lite::events::{EventEmitter, Topics};
use rtb_lite::frequency::FrequencyClient;
use rtb_lite::geoip::GeoIp;
use rtb_lite::inventory_cache::InventoryCache;
use rtb_lite::inventory_loader::InventoryLoader;
use rtb_lite::profiler::Profiler;
use rtb_lite::rank_table::RankTable;
use rtb_lite::selection::SelectionEngine;
use rtb_lite::{handlers, AppState};

/// RTB-lite ad-selection server.
#[derive(Debug, Parser)]
#[command(name = "rtb-lite")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short = 'c', long = "config", default_value = "rtblite.toml")]
    config: String,

    /// Print an example config to stdout and exit.
    #[arg(short = 'e', long = "print-example-config")]
    print_example_config: bool,
}

fn init_tracing(config: &RtbConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.log_dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        None
    } else {
        let appender = tracing_appender::rolling::daily(&config.log_dir, "rtb-lite.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .init();
        Some(guard)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.print_example_config {
        println!("{}", RtbConfig::default().to_pretty_toml());
        return Ok(());
    }

    let config = RtbConfig::load(&cli.config)?;
    let _log_guard = init_tracing(&config);
    tracing::info!("starting rtb-lite with config:\n{}", config.to_pretty_toml());

    let geoip = Arc::new(GeoIp::load(&config.geoip_database_path)?);
    let blocklist = Arc::new(BlockList::load(&config.block_list_path));

    let rank_table = Arc::new(RankTable::load(
        &config.rank_table_path,
        &config.rank_by_adunit_table_path,
    )?);

    let loader = InventoryLoader::new(
        &config.mysql_address,
        &config.mysql_user,
        &config.mysql_password,
        &config.mysql_database,
    );
    let cache = Arc::new(InventoryCache::new(loader, rank_table.clone()));
    cache.refresh().await;
    cache.clone().spawn_refresh_loop(config.mysql_update_interval);

    let frequency = FrequencyClient::connect(
        &config.redis_frequency_address,
        &config.redis_frequency_prefix,
    )
    .await?;

    let context_store = ContextStore::connect(
        &config.redis_join_address,
        &config.redis_join_prefix,
        config.redis_join_impression_timeout,
        config.redis_join_click_timeout,
        config.redis_join_conversion_timeout,
    )
    .await?;

    let topics = Topics {
        request: config.kafka_request_topic.clone(),
        impression: config.kafka_impression_topic.clone(),
        click: config.kafka_click_topic.clone(),
        conversion: config.kafka_conversion_topic.clone(),
    };
    let events = Arc::new(EventEmitter::new(
        config.kafka_enable,
        &config.kafka_brokers,
        topics,
        &config.model_data_save_dir,
    )?);

    let profiler = if config.profiler_enable {
        Profiler::enabled()
    } else {
        Profiler::disabled()
    };
    profiler.spawn_loop(config.profiler_interval);

    let selection = Arc::new(SelectionEngine::new(
        config.traffic_random,
        config.redis_frequency_per_id,
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        cache,
        rank_table,
        selection,
        frequency,
        context_store,
        events,
        geoip,
        blocklist,
        profiler,
    };

    let app = Router::new()
        .route("/request", get(handlers::request::handle))
        .route("/impression", get(handlers::impression::handle))
        .route("/click", get(handlers::click::handle))
        .route("/event", get(handlers::event::handle))
        .route("/rank", get(handlers::rank::get))
        .route("/rank/update", get(handlers::rank::update))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.http_address).await?;
    tracing::info!("listening on {}", config.http_address);
    axum::serve(listener, app).await?;

    Ok(())
}
