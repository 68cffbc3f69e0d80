pub mod connection_manager;
pub mod doh;
pub mod dot;
pub mod handler;
pub mod metrics_recorder;
pub mod permit_manager;
pub mod query_processor;
pub mod rate_limiter;
pub mod tcp;
pub mod udp;

pub use connection_manager::{ConnectionManager, ConnectionState};
pub use doh::DohProtocolHandler;
pub use dot::DotProtocolHandler;
pub use handler::ProtocolHandler;
pub use metrics_recorder::{MetricEvent, MetricsRecorder, ResponseStatus, StandardMetricsRecorder};
pub use permit_manager::PermitManager;
pub use query_processor::QueryProcessor;
pub use rate_limiter::RateLimiter;
pub use tcp::TcpProtocolHandler;
pub use udp::UdpProtocolHandler;
