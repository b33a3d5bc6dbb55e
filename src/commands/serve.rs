use anyhow::{Context, Result};

use knowledge_extractor::config::Config;
use knowledge_extractor::service::TopicServer;

/// Start the topic modelling API on `port`
pub async fn serve(port: u16, mut config: Config) -> Result<()> {
    let host = config
        .server
        .bind_address
        .rsplit_once(':')
        .map_or("0.0.0.0", |(host, _)| host)
        .to_string();
    config.server.bind_address = format!("{host}:{port}");

    if let Err(e) = knowledge_extractor::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed");
    }

    println!("Starting Topic Modelling API");
    println!("============================");
    println!("  Bind Address: {}", config.server.bind_address);
    println!("  Documents: {}", config.storage.documents_dir.display());
    println!("  Work Dir: {}", config.storage.work_dir.display());
    println!("  Topics: {}", config.model.num_topics);
    println!("  CORS Origins: {}", config.server.cors_origins.join(", "));
    println!();
    println!("API Endpoints:");
    println!("  POST /topic_model        - Submit a search or fetch its topics");
    println!("  POST /topic_model_status - Get the model state of a search");
    println!("  GET  /api/health         - Health check");
    println!("  GET  /metrics            - Prometheus metrics endpoint");
    println!();
    println!("Press Ctrl+C to stop.\n");

    let server = TopicServer::new(config).context("Failed to create topic server")?;

    // Start with graceful shutdown
    server
        .start_with_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                }
                Err(e) => {
                    tracing::error!("Failed to wait for Ctrl+C: {}", e);
                }
            }
        })
        .await?;

    println!("Topic modelling API stopped.");
    Ok(())
}
