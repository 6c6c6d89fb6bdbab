//! # Cryptoinfo SDK
//!
//! Polls the CoinGecko markets API for any number of independently configured
//! trackers while keeping the combined request rate under one shared budget.
//!
//! ## How trackers share the API
//!
//! Every tracker ticks on its own interval, but all of them go through one
//! [`CoordinationRegistry`]:
//!
//! - the **rate gate** enforces a minimum time between any two upstream
//!   requests (with a one second grace), shared by all trackers
//! - the **fairness sequencer** hands the next request to the tracker after the
//!   last one to fetch, in ascending id order, wrapping around
//! - a single **fetch permit** makes sure only one request is in flight
//!
//! A tracker that is throttled or not yet due keeps serving its cached data.
//! A failed request changes nothing, so the same tracker can retry without
//! losing its turn.
//!
//! ```text
//! TrackerConfig ──► PollCoordinator (one per tracker, own interval)
//!                        │ tick
//!                        ▼
//!                 CoordinationRegistry ──► RateGate + FairnessSequencer
//!                        │ permit
//!                        ▼
//!                 CoinGeckoClient (/coins/markets)
//!                        │
//!                        ▼
//!                 CachedDataset ──► ValueView (coin × multiplier)
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use cryptoinfo_sdk::{CryptoInfoHub, TrackerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hub = CryptoInfoHub::open("cryptoinfo.json").await?;
//!
//! let config = TrackerConfig {
//!     id: "Wallet".to_string(),
//!     cryptocurrency_ids: "bitcoin,ethereum".to_string(),
//!     currency_name: "eur".to_string(),
//!     multipliers: "0.5,2".to_string(),
//!     unit_of_measurement: "€".to_string(),
//!     update_frequency: 1.0,
//!     min_time_between_requests: Some(0.25),
//! };
//! let tracker = hub.add_tracker(&config).await?;
//!
//! for view in hub.views(tracker)? {
//!     match view.price() {
//!         Some(price) => println!("{} = {:.2}", view.entity_id(), price),
//!         None => println!("{} has no data yet", view.entity_id()),
//!     }
//! }
//!
//! hub.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod hub;
pub mod provider;
pub mod providers;
pub mod rate_gate;
pub mod registry;
pub mod sequencer;
pub mod store;
pub mod types;
pub mod view;

// Re-export commonly used types
pub use config::{TrackerConfig, TrackerSpec, ViewSpec};
pub use coordinator::{PollCoordinator, TickOutcome, TickReport};
pub use error::{ConfigError, Error, SettingsError, UpstreamError};
pub use hub::CryptoInfoHub;
pub use provider::MarketDataSource;
pub use providers::CoinGeckoClient;
pub use rate_gate::RateGate;
pub use registry::{CoordinationRegistry, FetchPermit, RegistrySnapshot, TickDecision};
pub use sequencer::{is_my_turn, next_turn_holder, FairnessSequencer};
pub use store::{SettingsStore, SharedSettings};
pub use types::{CachedDataset, MarketData, PollEvent, PriceHorizon, PricedEntry, TrackerId};
pub use view::{ValueAttributes, ValueSnapshot, ValueView};
