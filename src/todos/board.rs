use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Todo, TodoService};
use crate::controller::QueryController;
use crate::error::{PollingError, QueryError};
use crate::polling::{Countdown, PollingTimer};
use crate::query::QueryCache;

/// State of the todo list view.
///
/// The list is fetched on creation and polled every
/// [`refetch_interval`](super::TodoConfig::refetch_interval). Hovering a row
/// opens a detail popover backed by its own controller; leaving the row
/// drops it.
///
/// Dropping the board stops polling and the countdown.
pub struct TodoBoard {
    service: TodoService,
    cache: QueryCache,
    list: QueryController<()>,
    timer: PollingTimer,
    countdown: watch::Receiver<u32>,
    countdown_token: CancellationToken,
    detail: Option<QueryController<u32>>,
}

impl TodoBoard {
    /// Opens the board.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PollingError::ZeroInterval`] if the configured refetch
    /// interval is zero.
    pub fn new(service: TodoService, cache: QueryCache) -> Result<Self, PollingError> {
        let period = service.config().refetch_interval;
        let list = service.todo_list(&cache);

        let mut timer = list.polling_timer();
        timer.start(period, |tick| debug!(tick, "todo list refreshed"))?;

        let countdown = Countdown::for_period(period);
        let (tx, rx) = watch::channel(countdown.value());
        let countdown_token = CancellationToken::new();
        let cancelled = countdown_token.clone();
        tokio::spawn(async move {
            let mut values = countdown.stream();
            loop {
                tokio::select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    value = values.next() => match value {
                        Some(value) if tx.send(value).is_ok() => {}
                        _ => break,
                    },
                }
            }
        });

        Ok(Self {
            service,
            cache,
            list,
            timer,
            countdown: rx,
            countdown_token,
            detail: None,
        })
    }

    pub const fn list(&self) -> &QueryController<()> {
        &self.list
    }

    /// The todos currently held, if any.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Decode`] if the cached data is not a todo list.
    pub fn todos(&self) -> Result<Option<Vec<Todo>>, QueryError> {
        self.list.data_as()
    }

    /// Seconds until the next refresh, for display.
    pub fn countdown(&self) -> u32 {
        *self.countdown.borrow()
    }

    pub fn is_polling(&self) -> bool {
        self.timer.is_running()
    }

    /// Opens the popover for todo `id`.
    ///
    /// Details fetched within the detail stale time are reused without a
    /// request.
    pub fn hover(&mut self, id: u32) {
        if self.hovered() == Some(id) {
            return;
        }
        self.detail = Some(self.service.todo_detail(&self.cache, id));
    }

    /// Closes the popover.
    pub fn leave(&mut self) {
        self.detail = None;
    }

    pub fn hovered(&self) -> Option<u32> {
        self.detail.as_ref().map(|detail| *detail.inputs())
    }

    pub const fn detail(&self) -> Option<&QueryController<u32>> {
        self.detail.as_ref()
    }

    /// Stops polling and the countdown. The popover stays usable.
    pub fn stop(&mut self) {
        self.timer.stop();
        self.countdown_token.cancel();
    }
}

impl Drop for TodoBoard {
    fn drop(&mut self) {
        self.countdown_token.cancel();
    }
}

impl std::fmt::Debug for TodoBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoBoard")
            .field("list", &self.list)
            .field("polling", &self.is_polling())
            .field("countdown", &self.countdown())
            .field("hovered", &self.hovered())
            .finish_non_exhaustive()
    }
}
