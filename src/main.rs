mod config;
mod error;
mod handlers;
mod models;
mod services;
mod web; // Browser UI and JSON API

#[cfg(feature = "web-server")]
use web::server::create_router;

use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;

use config::Config;
use handlers::{SessionStore, WasteClassifier};
use services::{GroqService, VisionService};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env first so RUST_LOG from the file applies
    dotenv().ok();

    // Initialize logger
    env_logger::init();

    log::info!("🚀 Starting Waste Classifier...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("❌ {}", e);
            eprintln!("No usable configuration: {}", e);
            return Err(e.into());
        }
    };

    let groq = GroqService::new(&config)?;
    log::info!("✅ Groq service initialized with model: {}", groq.model());
    let vision: Arc<dyn VisionService> = Arc::new(groq);

    let classifier = Arc::new(WasteClassifier::new(vision, &config));
    log::info!("✅ Classifier initialized (category policy: {:?})", classifier.policy());

    let sessions = Arc::new(SessionStore::new(config.max_sessions));

    #[cfg(feature = "web-server")]
    {
        let app = create_router(
            classifier.clone(),
            sessions.clone(),
            config.max_frame_bytes,
            &config.static_dir,
        );

        let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
        log::info!("🌐 Web UI listening on http://{}", config.bind_addr);

        println!("\n♻️ Waste Classifier is running!");
        println!("🌐 Open http://{} in a browser with a webcam", config.bind_addr);
        println!("🛑 Press Ctrl+C to stop\n");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    }

    #[cfg(not(feature = "web-server"))]
    {
        log::warn!("⚠️ Built without the web-server feature, nothing to serve");
        let _ = (classifier, sessions);
        tokio::signal::ctrl_c().await?;
    }

    log::info!("🛑 Shutting down...");
    Ok(())
}

#[cfg(feature = "web-server")]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("❌ Failed to listen for Ctrl+C: {}", e);
    }
}
