mod humanizer;
mod lifecycle;

pub use humanizer::{clean_response, Humanizer};
pub use lifecycle::{AnnouncementKind, LifecycleAnnouncement, TopicLifecycle, TopicPhase, TopicSession};
