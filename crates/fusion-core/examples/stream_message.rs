use fusion_core::{ChatApi, FusionClient, FusionError, SendMessageRequest};
use futures::StreamExt;
use std::io::Write;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("Fusion Streaming Example");
    println!("========================\n");

    // Set FUSION_API_KEY (and optionally FUSION_BASE_URL) before running
    let client = FusionClient::from_env()?;
    let agent_id = std::env::args()
        .nth(1)
        .ok_or("usage: stream_message <agent-id> [message]")?;
    let message = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "Tell me a short joke about programming.".to_string());

    let request = SendMessageRequest::new(agent_id, message);

    let mut stream = match client.stream_message(&request).await {
        Ok(stream) => stream,
        Err(FusionError::NotFound { resource, id }) => {
            eprintln!("{resource} {id} does not exist");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    print!("Agent: ");
    while let Some(token) = stream.next().await {
        match token {
            Ok(token) => {
                print!("{token}");
                std::io::stdout().flush()?;
            }
            Err(e) => {
                println!("\nStream error: {e}");
                break;
            }
        }
    }
    println!();

    if let Some(stats) = client.cache_stats() {
        println!("\nCache: {} hits, {} misses", stats.hits, stats.misses);
    }
    Ok(())
}
