use cryptoinfo_sdk::{CryptoInfoHub, TrackerConfig};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings_path = std::env::temp_dir().join("cryptoinfo_demo.json");
    let hub = CryptoInfoHub::open(&settings_path).await?;
    println!(
        "Shared spacing: {} min (settings at {})",
        hub.settings().min_time_between_requests(),
        settings_path.display()
    );

    // Two trackers with different periods share one request budget
    let majors = TrackerConfig {
        id: "Majors".to_string(),
        cryptocurrency_ids: "bitcoin,ethereum".to_string(),
        currency_name: "usd".to_string(),
        multipliers: "1,1".to_string(),
        unit_of_measurement: "$".to_string(),
        update_frequency: 0.25,
        min_time_between_requests: Some(0.25),
    };
    let wallet = TrackerConfig {
        id: "Wallet".to_string(),
        cryptocurrency_ids: "solana,doge-delisted".to_string(),
        currency_name: "eur".to_string(),
        multipliers: "12.5,1000".to_string(),
        unit_of_measurement: "€".to_string(),
        update_frequency: 0.5,
        min_time_between_requests: None,
    };

    hub.add_tracker(&majors).await?;
    hub.add_tracker(&wallet).await?;

    for round in 1..=4 {
        println!("-------------------------------------------");
        println!("Round {}", round);
        for snapshot in hub.snapshots() {
            match snapshot.state {
                Some(price) => println!(
                    "  {:<45} {:>14.2} {}",
                    snapshot.entity_id, price, snapshot.unit_of_measurement
                ),
                None => println!("  {:<45} {:>14}", snapshot.entity_id, "no data"),
            }
        }
        tokio::time::sleep(Duration::from_secs(20)).await;
    }

    hub.shutdown().await?;
    Ok(())
}
