use actix_web::{dev::Service, web, App, HttpServer};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use engagement_service::clients::Collaborators;
use engagement_service::config::Config;
use engagement_service::handlers::{
    delete_video, end_session, get_category_rankings, get_feed, get_hashtag_rankings,
    get_trending, get_viral, record_event, register_video, start_session, swipe,
    update_video_category, EngagementHandlerState, FeedHandlerState, RankingsHandlerState,
    SessionHandlerState, VideoHandlerState,
};
use engagement_service::jobs::index_refresher::{start_index_refresher, IndexRefresherConfig};
use engagement_service::jobs::session_reaper::{start_session_reaper, SessionReaperConfig};
use engagement_service::jobs::view_finalizer::{start_view_finalizer, ViewFinalizerConfig};
use engagement_service::services::{
    EventIngest, FeedAssembler, RankingIndex, ScoringPolicy, SessionRegistry, StatsStore,
};
use engagement_service::metrics;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    // Structured JSON logging with env-filter overrides
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_line_number(true)
                .with_file(true),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Starting engagement-service v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!("Environment: {}", config.app.env);

    // Collaborator clients (content, social, identity, trust-safety, graph)
    let collaborators = match Collaborators::from_config(&config.collaborators) {
        Ok(collaborators) => collaborators,
        Err(e) => {
            tracing::error!("Collaborator client setup failed: {:#}", e);
            eprintln!("ERROR: Failed to build collaborator clients: {}", e);
            std::process::exit(1);
        }
    };

    // Core pipeline: stats -> scoring -> index -> feed -> sessions
    let stats = Arc::new(StatsStore::new());
    let policy = ScoringPolicy::new();
    let index = Arc::new(RankingIndex::new(policy.clone()));
    let ingest = Arc::new(EventIngest::new(
        stats.clone(),
        collaborators.videos.clone(),
    ));
    let assembler = Arc::new(FeedAssembler::new(
        index.clone(),
        collaborators.moderation.clone(),
        collaborators.videos.clone(),
    ));
    let registry = Arc::new(SessionRegistry::new(
        assembler.clone(),
        ingest.clone(),
        stats.clone(),
        policy,
        collaborators.likes.clone(),
        collaborators.interests.clone(),
        collaborators.creators.clone(),
        collaborators.videos.clone(),
        config.session.clone(),
    ));
    tracing::info!("Engagement pipeline initialized");

    // Ranking index refresher: the staleness bound lives here.
    let refresher_stats = stats.clone();
    let refresher_index = index.clone();
    let refresher_config = IndexRefresherConfig {
        interval: Duration::from_secs(config.ranking.refresh_interval_secs),
    };
    tokio::spawn(async move {
        start_index_refresher(refresher_stats, refresher_index, refresher_config).await;
    });

    // Watchdog for views whose terminating signal never arrives
    let finalizer_ingest = ingest.clone();
    let finalizer_config = ViewFinalizerConfig {
        sweep_interval: Duration::from_secs(config.ingest.view_sweep_interval_secs),
        finalize_after: Duration::from_secs(config.ingest.view_finalize_timeout_secs),
    };
    tokio::spawn(async move {
        start_view_finalizer(finalizer_ingest, finalizer_config).await;
    });

    // Grace-period cleanup of abandoned swipe sessions
    let reaper_registry = registry.clone();
    let reaper_config = SessionReaperConfig {
        sweep_interval: Duration::from_secs(30),
        grace_period: Duration::from_secs(config.session.grace_period_secs),
    };
    tokio::spawn(async move {
        start_session_reaper(reaper_registry, reaper_config).await;
    });
    tracing::info!("Background jobs started");

    let engagement_state = web::Data::new(EngagementHandlerState {
        ingest: ingest.clone(),
        videos: collaborators.videos.clone(),
        likes: collaborators.likes.clone(),
    });
    let video_state = web::Data::new(VideoHandlerState {
        stats: stats.clone(),
        index: index.clone(),
    });
    let feed_state = web::Data::new(FeedHandlerState {
        assembler: assembler.clone(),
        interests: collaborators.interests.clone(),
        sessions: registry.clone(),
    });
    let rankings_state = web::Data::new(RankingsHandlerState {
        index: index.clone(),
    });
    let session_state = web::Data::new(SessionHandlerState {
        registry: registry.clone(),
    });

    let port = config.app.port;
    tracing::info!("HTTP server listening on 0.0.0.0:{}", port);

    HttpServer::new(move || {
        App::new()
            .app_data(engagement_state.clone())
            .app_data(video_state.clone())
            .app_data(feed_state.clone())
            .app_data(rankings_state.clone())
            .app_data(session_state.clone())
            .route("/health", web::get().to(|| async { "OK" }))
            // Health endpoints for K8s probes
            .route("/api/v1/health", web::get().to(|| async { "OK" }))
            .route("/api/v1/health/live", web::get().to(|| async { "OK" }))
            .route("/api/v1/health/ready", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .wrap_fn(|req, srv| {
                let method = req.method().to_string();
                let path = req
                    .match_pattern()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| req.path().to_string());
                let start = Instant::now();

                let fut = srv.call(req);
                async move {
                    match fut.await {
                        Ok(res) => {
                            metrics::observe_http_request(
                                &method,
                                &path,
                                res.status().as_u16(),
                                start.elapsed(),
                            );
                            Ok(res)
                        }
                        Err(err) => {
                            metrics::observe_http_request(&method, &path, 500, start.elapsed());
                            Err(err)
                        }
                    }
                }
            })
            .service(record_event)
            .service(register_video)
            .service(delete_video)
            .service(update_video_category)
            .service(get_feed)
            .service(get_trending)
            .service(get_viral)
            .service(get_category_rankings)
            .service(get_hashtag_rankings)
            .service(start_session)
            .service(swipe)
            .service(end_session)
    })
    .bind(format!("0.0.0.0:{}", port))?
    .run()
    .await
}
