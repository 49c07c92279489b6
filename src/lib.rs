//! ALARM-CORE - Alarm event engine for industrial control applications
//!
//! Turns process condition crossings into alarm events, tracks each event
//! through its acknowledgment lifecycle and keeps a bounded alarm list with
//! aggregate status flags for operator interfaces.
//!
//! # Lifecycle
//!
//! An event starts Active. Acknowledging it and the condition going away may
//! happen in either order; once both have happened the event is Normal.
//!
//! ```text
//! Active ──ack──> Acknowledge ──off──> Inactive ──> Normal
//! Active ──off──> Inactive ──ack──> Normal
//! ```
//!
//! # Examples
//!
//! ```rust
//! use alarm_core::{AlarmServer, ServerConfig, Value};
//!
//! alarm_core::init()?;
//!
//! let config = ServerConfig::from_yaml(r#"
//! max_number_of_alarms: 500
//! groups:
//!   - name: Boiler
//!     items:
//!       - name: PT-200
//!         trigger: 12.5
//!         comparer: ">"
//!         message: Steam pressure high
//! "#)?;
//! let server = AlarmServer::new(config)?;
//!
//! server.set_item_value("Boiler", "PT-200", Value::Float(13.1))?;
//! assert!(server.is_any_active());
//! assert_eq!(server.event_count(), 1);
//! # Ok::<(), alarm_core::AlarmError>(())
//! ```

// ============================================================================
// CORE MODULES
// ============================================================================

/// Error type and result alias
pub mod error;

/// Process values fed to alarm items
pub mod value;

/// Configuration with YAML support and validation
pub mod config;

/// Trigger comparison
pub mod comparer;

// ============================================================================
// ALARM MODEL
// ============================================================================

/// Event states and the transition table
pub mod state;

/// Alarm events
pub mod event;

/// Per-state event counters
pub mod state_service;

/// Alarm items
pub mod item;

/// Alarm groups
pub mod group;

// ============================================================================
// SERVER
// ============================================================================

/// Observer lists and the notification channel
pub mod notify;

/// Bounded alarm list
pub mod server;

// ============================================================================
// PUBLIC API EXPORTS
// ============================================================================

pub use comparer::ComparerType;
pub use config::{GroupConfig, ItemConfig, ServerConfig, StoreType};
pub use error::{AlarmError, Result};
pub use event::{AlarmEvent, EventSource, StateStep, SYSTEM_USER};
pub use group::AlarmGroup;
pub use item::AlarmItem;
pub use notify::{AlarmNotification, NotificationHandler, SubscriptionId};
pub use server::AlarmServer;
pub use state::{AlarmEventState, AlarmInput};
pub use state_service::{AlarmServerStateService, StateCounts};
pub use value::Value;

// ============================================================================
// VERSION INFORMATION
// ============================================================================

/// Current crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the tracing subscriber.
///
/// Honors `RUST_LOG` and falls back to `alarm_core=info`. Calling it when a
/// subscriber is already installed is harmless.
pub fn init() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("alarm_core=info"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false));

    if subscriber.try_init().is_err() {
        // Already initialized
        return Ok(());
    }

    tracing::info!("alarm-core {} initialized", VERSION);
    Ok(())
}
