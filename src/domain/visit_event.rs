//! Events flowing through the in-process visit pipeline.
//!
//! A recorded visit emits [`VisitOccurred`]. The location stage consumes it and
//! emits [`VisitLocated`], which the notification stage consumes.

use async_trait::async_trait;

/// A visit was recorded and still needs to be located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitOccurred {
    pub visit_id: i64,
    /// Address seen by the request, before anonymization.
    ///
    /// Takes precedence over the stored address when locating the visit.
    pub original_ip_address: Option<String>,
}

impl VisitOccurred {
    pub fn new(visit_id: i64, original_ip_address: Option<String>) -> Self {
        Self {
            visit_id,
            original_ip_address,
        }
    }
}

/// The location stage finished with a visit, whatever the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitLocated {
    pub visit_id: i64,
}

impl VisitLocated {
    pub fn new(visit_id: i64) -> Self {
        Self { visit_id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitEvent {
    Occurred(VisitOccurred),
    Located(VisitLocated),
}

impl VisitEvent {
    pub fn visit_id(&self) -> i64 {
        match self {
            VisitEvent::Occurred(event) => event.visit_id,
            VisitEvent::Located(event) => event.visit_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VisitEvent::Occurred(_) => "visit_occurred",
            VisitEvent::Located(_) => "visit_located",
        }
    }
}

impl From<VisitOccurred> for VisitEvent {
    fn from(event: VisitOccurred) -> Self {
        VisitEvent::Occurred(event)
    }
}

impl From<VisitLocated> for VisitEvent {
    fn from(event: VisitLocated) -> Self {
        VisitEvent::Located(event)
    }
}

/// Publishes events onto the pipeline.
///
/// Dispatching never fails from the caller's point of view and never waits for
/// handlers to run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn dispatch(&self, event: VisitEvent);
}

/// Consumer of [`VisitOccurred`] events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisitOccurredListener: Send + Sync {
    async fn on_visit_occurred(&self, event: VisitOccurred);
}

/// Consumer of [`VisitLocated`] events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisitLocatedListener: Send + Sync {
    async fn on_visit_located(&self, event: VisitLocated);
}
