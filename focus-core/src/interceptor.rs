use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::activity::RequestLogEntry;
use crate::context::SessionContext;
use crate::page::{self, SubstitutePage};

/// What the transport should do with an intercepted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Forward the request unmodified
    Allow,
    /// Answer with the substitute page instead of forwarding
    Block(SubstitutePage),
}

impl Decision {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Decision::Block(_))
    }
}

/// Per-request callback registered with the transport for one focus session.
///
/// Cheap to clone; every clone shares the same [`SessionContext`]. The deadline is
/// fixed when the session starts and handed over by the controller.
#[derive(Debug, Clone)]
pub struct InterceptionHandler {
    context: Arc<SessionContext>,
    deadline: DateTime<Utc>,
}

impl InterceptionHandler {
    pub fn new(context: Arc<SessionContext>, deadline: DateTime<Utc>) -> Self {
        Self { context, deadline }
    }

    pub fn on_request(&self, host: &str) -> Decision {
        self.on_request_at(host, Utc::now())
    }

    /// Classify `host` and record the outcome. Does not check whether a session is
    /// active; the transport only runs while one is.
    pub fn on_request_at(&self, host: &str, now: DateTime<Utc>) -> Decision {
        let blocklist = self.context.blocklist();

        match blocklist.matching(host) {
            Some(rule) => {
                let message = self.context.messages().choose();
                let page = page::render(message, now, self.deadline);
                info!(
                    "Blocked {} (rule '{}'), {} left",
                    host, rule.name, page.countdown
                );
                self.context
                    .record(RequestLogEntry::blocked(now, host, message));
                Decision::Block(page)
            }
            None => {
                debug!("Allowed {}", host);
                self.context.record(RequestLogEntry::allowed(now, host));
                Decision::Allow
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::RequestStatus;
    use crate::filter::{BlockEntry, BlockList};
    use crate::page::MessageSet;
    use chrono::Duration;

    fn handler(deadline: DateTime<Utc>) -> (InterceptionHandler, Arc<SessionContext>) {
        let blocklist = BlockList::from_entries(vec![
            BlockEntry::new("Facebook", "facebook.com").unwrap(),
        ]);
        let messages = MessageSet::new(vec!["Back to work.".to_string()]).unwrap();
        let ctx = Arc::new(SessionContext::new(blocklist, messages, 100));
        (InterceptionHandler::new(ctx.clone(), deadline), ctx)
    }

    #[test]
    fn test_blocked_request_renders_page_and_counts() {
        let now = Utc::now();
        let (h, ctx) = handler(now + Duration::seconds(90));

        match h.on_request_at("www.facebook.com", now) {
            Decision::Block(page) => {
                assert_eq!(page.message, "Back to work.");
                assert_eq!(page.countdown.to_string(), "01:30");
            }
            Decision::Allow => panic!("facebook should be blocked"),
        }
        assert_eq!(ctx.block_count(), 1);

        let entry = &ctx.recent(1)[0];
        assert_eq!(entry.status, RequestStatus::Blocked);
        assert_eq!(entry.message, "Back to work.");
        assert_eq!(entry.host, "www.facebook.com");
    }

    #[test]
    fn test_allowed_request_logs_empty_message() {
        let now = Utc::now();
        let (h, ctx) = handler(now + Duration::minutes(1));

        assert_eq!(h.on_request_at("notfacebook.com", now), Decision::Allow);
        assert_eq!(ctx.block_count(), 0);

        let entry = &ctx.recent(1)[0];
        assert_eq!(entry.status, RequestStatus::Allowed);
        assert!(entry.message.is_empty());
    }

    #[test]
    fn test_request_after_deadline_shows_zero() {
        let now = Utc::now();
        let (h, _) = handler(now - Duration::seconds(5));
        match h.on_request_at("facebook.com", now) {
            Decision::Block(page) => assert_eq!(page.countdown.to_string(), "00:00"),
            Decision::Allow => panic!("expected block"),
        }
    }

    #[test]
    fn test_blocklist_changes_apply_to_running_handler() {
        let now = Utc::now();
        let (h, ctx) = handler(now + Duration::minutes(5));
        assert!(!h.on_request_at("x.com", now).is_blocked());

        ctx.add_entry(BlockEntry::new("X", "x.com").unwrap()).unwrap();
        assert!(h.on_request_at("x.com", now).is_blocked());
    }
}
