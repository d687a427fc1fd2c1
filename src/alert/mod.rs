pub mod engine;
pub mod rules;
pub mod sink;

pub use engine::{build_notifications, Notification};
pub use rules::{AlertRules, NotificationKind};
pub use sink::{AlertSink, StdoutSink, WebhookSink};
