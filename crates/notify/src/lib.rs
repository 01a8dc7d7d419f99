//! WeCom group-robot notifications for alert batches.
//!
//! This crate provides:
//! - `Notifier` trait with an explicit retryable/permanent failure contract
//! - `WeComRobotNotifier`, the robot webhook integration
//! - Minijinja template rendering for notification messages
//! - HTTP transport construction (timeouts, proxy, TLS, auth)
//! - Dispatcher that routes alert batches to a receiver's channels

pub mod config;
pub mod dispatcher;
pub mod http;
pub mod templating;
pub mod traits;
pub mod truncate;
pub mod wecom_robot;

pub use config::{NotifierConfig, SecretUrl};
pub use dispatcher::Dispatcher;
pub use templating::TemplateRenderer;
pub use traits::{DeliveryFailure, DispatchResult, NotifyContext, Notifier, NotifyError};
pub use wecom_robot::WeComRobotNotifier;
