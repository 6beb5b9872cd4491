pub mod authorization; // Access Policy
pub mod clock;
pub mod config;
pub mod core_state; // Synchronous entry point
pub mod db;
pub mod models;
pub mod scheduling; // Conflicts, workflow, shifts, records, reminders
pub mod service; // Async facade

pub use authorization::Caller;
pub use core_state::CoreState;
pub use scheduling::SchedulingError;
pub use service::{ClinicService, ServiceError};

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` wins over the built-in filter.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();

    tracing::info!("Carebook v{}", config::APP_VERSION);
}
