use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use facegate_core::{ArcFaceEmbedder, ScrfdDetector, SharedConfig, VerificationPipeline};
use tracing::info;
use tracing_subscriber::EnvFilter;

use facegated::{config::DaemonConfig, engine, http};

#[actix_web::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = DaemonConfig::from_env();
    config
        .verify
        .validate()
        .context("invalid verification settings in environment")?;

    info!(
        host = %config.host,
        port = config.port,
        tolerance = config.verify.tolerance,
        confidence_threshold = config.verify.confidence_threshold,
        "facegated v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    // Fail fast: both models must load before the server binds.
    let detector =
        ScrfdDetector::load(&config.scrfd_model_path()).context("loading face detection model")?;
    let embedder = ArcFaceEmbedder::load(&config.arcface_model_path())
        .context("loading face embedding model")?;

    let engine = engine::spawn(VerificationPipeline::new(
        Box::new(detector),
        Box::new(embedder),
    ));
    let shared = SharedConfig::new(config.verify);

    let json_limit = config.json_body_limit();
    let engine_data = web::Data::new(engine);
    let config_data = web::Data::new(shared);

    info!("facegated ready");
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(web::JsonConfig::default().limit(json_limit))
            .app_data(engine_data.clone())
            .app_data(config_data.clone())
            .configure(http::routes)
    })
    .bind((config.host.as_str(), config.port))
    .with_context(|| format!("binding {}:{}", config.host, config.port))?
    .run()
    .await?;

    info!("facegated shut down");
    Ok(())
}
