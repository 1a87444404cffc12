// # cfddns-core
//
// Core library for the cfddns Cloudflare dynamic DNS updater.
//
// ## Architecture Overview
//
// - **IpSource**: Trait for observing the current public IP
// - **DnsProvider**: Trait for the two-phase record lookup/update
// - **StateStore**: Trait for the per-record IP cache (idempotency)
// - **UpdateEngine**: Compares, decides, retries, persists
// - **ConfigFile**: The JSON document of managed domains
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Decision logic lives in the engine only
// 2. **Single-shot collaborators**: Providers and IP sources never retry
// 3. **Library-First**: The binary is a thin CLI over this crate
// 4. **Idempotency**: The cache is written only after a successful update

pub mod traits;
pub mod engine;
pub mod config;
pub mod error;
pub mod state;

mod atomic;

// Re-export core types for convenience
pub use traits::{DnsProvider, DnsProviderFactory, IpSource, IpVersion, RecordUpdate, StateStore};
pub use engine::{RunReport, UpdateEngine, UpdateOutcome};
pub use config::{ConfigFile, DomainConfig, EngineConfig, RecordType};
pub use error::{Error, Result};
pub use state::{FileStateStore, MemoryStateStore};
