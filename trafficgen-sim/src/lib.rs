//! Trafficgen Simulation - an in-memory account service for dry runs.
//!
//! Lets a full campaign run without a live service: accounts are created and
//! verified in memory, with optional latency and failure injection driven by
//! a seeded RNG so runs are reproducible.
//!
//! # Example
//!
//! ```rust,no_run
//! use trafficgen_sim::{NetworkConditions, SimulatedAccountService, SimulatedClientFactory};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let network = NetworkConditions::builder()
//!     .latency(5..20)
//!     .failure_rate(0.05)
//!     .seed(12345)
//!     .build();
//! let service = SimulatedAccountService::new("admin", "12345678")?.with_network(network);
//! let factory = SimulatedClientFactory::new(service.clone());
//! # let _ = factory;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod network;
pub mod service;

pub use client::{SimulatedAdminClient, SimulatedClientFactory, SimulatedUserClient};
pub use network::{NetworkConditions, NetworkConditionsBuilder, RoundTrip};
pub use service::{Account, ServiceStats, SimulatedAccountService};
