use fusion_core::{ChatApi, FusionClient, FusionConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = FusionConfig::from_env()?
        .with_retries(5)
        .with_backoff(0.5, 10.0, true)
        .with_cache_limits(600, 100);
    let client = FusionClient::new(config)?;

    let health = client.health_check().await?;
    println!("Service health: {health}");

    let agents = client.list_agents().await?;
    println!("{} agents available:", agents.len());
    for agent in &agents {
        println!("  {} [{}] {}", agent, agent.id, agent.description);
    }

    // Served from the cache
    let again = client.list_agents().await?;
    assert_eq!(agents.len(), again.len());

    if let Some(stats) = client.cache_stats() {
        println!(
            "\nCache: {}/{} entries, hit ratio {:.0}%",
            stats.valid_items,
            stats.max_size,
            stats.hit_ratio * 100.0
        );
    }
    Ok(())
}
