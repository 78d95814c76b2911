use market_snapshot_sdk::{ClientConfig, RateLimitedFetcher};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // MARKET_API_KEY, MARKET_API_BASE_URL, MARKET_MIN_INTERVAL_MS, ...
    let config = ClientConfig::from_env()?;
    println!("Market Snapshot Example ({:?})", config);
    println!("==================================");

    let fetcher = RateLimitedFetcher::new(config)?;

    for round in 1..=3 {
        let result = fetcher.fetch_coins(10).await;

        println!("\nRound {} {:-<40}", round, "");
        if let Some(error) = &result.error {
            println!("No data: {}", error);
            continue;
        }
        for coin in &result.coins {
            match coin.price {
                Some(price) => println!("{:<10} ${:<12.4}", coin.label(), price),
                None => println!("{:<10} (no price)", coin.label()),
            }
        }
    }

    let stats = fetcher.stats();
    let metrics = fetcher.metrics().await;
    println!("\n{:-<50}", "");
    println!("Requests issued:  {}", stats.request_count);
    println!("Min interval:     {:?}", stats.min_interval);
    println!("p50 latency:      {:.1}ms", metrics.latency_p50_ms);
    println!("Success rate:     {:.1}%", metrics.success_rate * 100.0);
    println!("Health:           {:?}", fetcher.health_check().await.status);

    Ok(())
}
