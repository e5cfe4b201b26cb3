pub mod engine;
pub mod rules;
pub mod sink;

pub use engine::{event_for_assignment, events_for_recommendation, NotificationEvent};
pub use rules::NotificationKind;
pub use sink::{build_sinks, dispatch, NotificationSink, StdoutSink, WebhookSink};
