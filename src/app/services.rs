//! What a widget gets when it is bound to a screen.
//!
//! A detached set (no loop behind it) is what widgets see in unit tests and
//! before the screen is attached to an [`App`](super::App); posting then
//! fails with `Closed` and invalidation is a no-op.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::handle::{AppHandle, TaskContext};
use super::message::Message;
use super::timer::TimerId;
use crate::error::{Error, PostError, Result};
use crate::reactive::Scheduler;
use crate::style::Stylesheet;

/// Loop services handed to `Widget::bind`.
#[derive(Clone, Default)]
pub struct Services {
    handle: Option<AppHandle>,
    stylesheet: Option<Arc<Stylesheet>>,
    reduced_motion: bool,
}

impl Services {
    pub(crate) fn new(
        handle: Option<AppHandle>,
        stylesheet: Option<Arc<Stylesheet>>,
        reduced_motion: bool,
    ) -> Self {
        Self {
            handle,
            stylesheet,
            reduced_motion,
        }
    }

    /// Services with no loop behind them.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Option<&AppHandle> {
        self.handle.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.handle.is_some()
    }

    pub fn stylesheet(&self) -> Option<&Arc<Stylesheet>> {
        self.stylesheet.as_ref()
    }

    pub fn reduced_motion(&self) -> bool {
        self.reduced_motion
    }

    /// Queue a message without blocking. Widgets run on the loop thread, so
    /// a blocking post could wait on itself.
    pub fn post(&self, msg: Message) -> std::result::Result<(), PostError> {
        match &self.handle {
            Some(handle) => handle.try_post(msg),
            None => Err(PostError::Closed),
        }
    }

    pub fn after(&self, delay: Duration, msg: Message) -> std::result::Result<TimerId, PostError> {
        self.handle
            .as_ref()
            .map(|h| h.after(delay, msg))
            .ok_or(PostError::Closed)
    }

    pub fn every<F>(&self, interval: Duration, tick: F) -> Result<TimerId>
    where
        F: FnMut(Instant) -> Option<Message> + Send + 'static,
    {
        let handle = self.handle.as_ref().ok_or(PostError::Closed)?;
        Ok(handle.every(interval, tick)?)
    }

    pub fn cancel_timer(&self, id: TimerId) -> bool {
        self.handle.as_ref().is_some_and(|h| h.cancel_timer(id))
    }

    /// Run `task` on a background thread.
    pub fn spawn<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce(TaskContext) + Send + 'static,
    {
        let handle = self.handle.as_ref().ok_or(PostError::Closed)?;
        handle.spawn(task).map_err(Error::Io)?;
        Ok(())
    }

    pub fn invalidate(&self) {
        if let Some(handle) = &self.handle {
            handle.invalidate();
        }
    }

    pub fn relayout(&self) {
        if let Some(handle) = &self.handle {
            handle.relayout();
        }
    }

    /// Scheduler that runs reactive callbacks on the loop thread.
    pub fn scheduler(&self) -> Option<Arc<dyn Scheduler>> {
        self.handle.as_ref().map(AppHandle::scheduler)
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("attached", &self.is_attached())
            .field("reduced_motion", &self.reduced_motion)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_services_refuse_work() {
        let services = Services::detached();
        assert!(!services.is_attached());
        assert_eq!(services.post(Message::Invalidate), Err(PostError::Closed));
        assert!(services.after(Duration::from_millis(5), Message::Invalidate).is_err());
        assert!(services.spawn(|_| {}).is_err());
        assert!(services.scheduler().is_none());
        services.invalidate();
        services.relayout();
    }
}
