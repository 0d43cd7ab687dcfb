//! Focus Core Library
//!
//! Interception decision engine and session state machine for focuswall:
//! host blocking rules, the substitute page, the rolling activity log, and the
//! controller that arms the local HTTP/HTTPS proxy for a bounded focus session.

pub mod activity;
pub mod ca;
pub mod context;
pub mod controller;
pub mod filter;
pub mod handlers;
pub mod interceptor;
pub mod page;
/// Hudsucker transport
pub mod proxy;
pub mod store;
pub mod system_proxy;

/// Configuration types and utilities
pub mod config;

/// Error types for focus operations
pub mod error;

/// Tracing subscriber setup
pub mod logging;

pub use activity::{ActivityLog, FocusStats, RequestLogEntry, RequestStatus};
pub use ca::CertificateAuthority;
pub use config::{ActivityConfig, CertificateConfig, FocusConfig};
pub use context::SessionContext;
pub use controller::{
    ActiveSession, SessionController, SessionEvent, SessionStatus, StartOutcome, StopOutcome,
};
pub use error::FocusError;
pub use filter::{is_blocked, BlockEntry, BlockList};
pub use handlers::FocusHandler;
pub use interceptor::{Decision, InterceptionHandler};
pub use logging::{init_logging, LoggingConfig};
pub use page::{render, Countdown, MessageSet, SubstitutePage};
pub use proxy::{HudsuckerTransport, Transport};
pub use store::FocusStore;
pub use system_proxy::{NoopSystemProxy, PlatformSystemProxy, SystemProxy};

/// Result type alias for focus operations
pub type Result<T> = std::result::Result<T, FocusError>;
