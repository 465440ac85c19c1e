use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Console logging filtered by RUST_LOG (default "info"). When the crate is
// built with the `loki` feature and LOKI_URL is set, the same stream also
// ships to Loki, labeled from SERVICE_NAME and ENVIRONMENT.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    #[cfg(feature = "loki")]
    if let Ok(endpoint) = std::env::var("LOKI_URL") {
        let (layer, task) = loki_layer(&endpoint)?;
        tokio::spawn(task);
        registry.with(layer).init();
        tracing::info!("Shipping logs to Loki at {}", endpoint);
        return Ok(());
    }

    registry.init();
    Ok(())
}

#[cfg(feature = "loki")]
fn loki_layer(
    endpoint: &str,
) -> Result<(tracing_loki::Layer, tracing_loki::BackgroundTask), Box<dyn std::error::Error>> {
    let mut builder = tracing_loki::builder();
    for (label, var, default) in [
        ("service", "SERVICE_NAME", "foliodiff"),
        ("environment", "ENVIRONMENT", "development"),
    ] {
        let value = std::env::var(var).unwrap_or_else(|_| default.to_string());
        builder = builder.label(label, value)?;
    }
    let (layer, task) = builder.build_url(url::Url::parse(endpoint)?)?;
    Ok((layer, task))
}
