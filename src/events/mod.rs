//! Domain event bus behind the `/api/v1/events` push channel.
//!
//! Handlers publish after a successful write; every connected client holds
//! its own broadcast receiver.

use std::sync::Arc;

use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::web::AuthenticatedUser;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum LmsEvent {
    CourseChanged {
        course_id: Uuid,
        action: String,
    },
    EnrollmentChanged {
        course_id: Uuid,
        user_id: Uuid,
        status: String,
    },
    LessonProgressSaved {
        lesson_id: Uuid,
        user_id: Uuid,
        is_completed: bool,
    },
    TestSubmitted {
        test_id: Uuid,
        user_id: Uuid,
        score: f64,
        is_passed: bool,
    },
    FeedbackSubmitted {
        course_id: Uuid,
        user_id: Uuid,
        rating: i16,
    },
    CertificateIssued {
        course_id: Uuid,
        user_id: Uuid,
        certificate_id: Uuid,
    },
}

impl LmsEvent {
    /// Learner the event is about, `None` for catalog-wide events.
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::CourseChanged { .. } => None,
            Self::EnrollmentChanged { user_id, .. }
            | Self::LessonProgressSaved { user_id, .. }
            | Self::TestSubmitted { user_id, .. }
            | Self::FeedbackSubmitted { user_id, .. }
            | Self::CertificateIssued { user_id, .. } => Some(*user_id),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CourseChanged { .. } => "course_changed",
            Self::EnrollmentChanged { .. } => "enrollment_changed",
            Self::LessonProgressSaved { .. } => "lesson_progress_saved",
            Self::TestSubmitted { .. } => "test_submitted",
            Self::FeedbackSubmitted { .. } => "feedback_submitted",
            Self::CertificateIssued { .. } => "certificate_issued",
        }
    }

    /// Staff see everything, learners their own events and catalog changes.
    pub fn visible_to(&self, user: &AuthenticatedUser) -> bool {
        if user.is_staff() {
            return true;
        }
        self.user_id().is_none_or(|id| id == user.user_id())
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LmsEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LmsEvent> {
        self.sender.subscribe()
    }

    /// Sending without subscribers is not an error.
    pub fn publish(&self, event: LmsEvent) {
        tracing::debug!(event = event.name(), "publishing event");
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Events visible to `user`, ending when the bus is dropped.
    /// A lagging subscriber skips what it missed.
    pub fn stream_for(
        &self,
        user: AuthenticatedUser,
    ) -> impl Stream<Item = LmsEvent> + Send + use<> {
        futures::stream::unfold((self.subscribe(), user), |(mut rx, user)| async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.visible_to(&user) => return Some((event, (rx, user))),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("event subscriber lagged, skipped {n} events");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }
}

pub type SharedEventBus = Arc<EventBus>;

pub fn create_shared_event_bus(capacity: usize) -> SharedEventBus {
    Arc::new(EventBus::new(capacity))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::web::UserRole;
    use futures::StreamExt;

    fn progress(user_id: Uuid) -> LmsEvent {
        LmsEvent::LessonProgressSaved {
            lesson_id: Uuid::new_v4(),
            user_id,
            is_completed: false,
        }
    }

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let event = progress(Uuid::new_v4());
        bus.publish(event.clone());
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn publish_without_subscribers() {
        let bus = EventBus::new(8);
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(progress(Uuid::new_v4()));
    }

    #[test]
    fn students_only_see_their_own_events() {
        let me = Uuid::new_v4();
        let student = AuthenticatedUser::new(me, UserRole::Student);
        let hr = AuthenticatedUser::new(Uuid::new_v4(), UserRole::Hr);
        let catalog = LmsEvent::CourseChanged {
            course_id: Uuid::new_v4(),
            action: "update".into(),
        };

        assert!(progress(me).visible_to(&student));
        assert!(!progress(Uuid::new_v4()).visible_to(&student));
        assert!(catalog.visible_to(&student));
        assert!(progress(me).visible_to(&hr));
    }

    #[tokio::test]
    async fn stream_filters_by_viewer() {
        let bus = EventBus::new(8);
        let me = Uuid::new_v4();
        let mut stream = Box::pin(bus.stream_for(AuthenticatedUser::new(me, UserRole::Student)));

        bus.publish(progress(Uuid::new_v4()));
        bus.publish(progress(me));

        let first = stream.next().await.unwrap();
        assert_eq!(first.user_id(), Some(me));
    }

    #[test]
    fn serialized_with_type_tag() {
        let event = LmsEvent::FeedbackSubmitted {
            course_id: Uuid::nil(),
            user_id: Uuid::nil(),
            rating: 4,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "FeedbackSubmitted");
        assert_eq!(json["data"]["rating"], 4);
    }
}
