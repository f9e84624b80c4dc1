use crate::database::{ConnectionError, Pool};
use parking_lot::FairMutex;
use rusqlite::{Connection, InterruptHandle};
use std::{
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

/// Outcome of racing a query against its deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Raced<T> {
    Completed(T),
    TimedOut,
}

/// State shared between the guard and the thread running the query
enum Interrupt {
    Pending,
    Running(InterruptHandle),
    Cancelled,
    Finished,
}

/// Runs each query on its own thread with its own pooled connection and waits for it
/// no longer than the deadline.
///
/// Unless `cancel_on_timeout` is set, a query that loses the race is left running: it
/// keeps its connection checked out until it finishes and its result is discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutGuard {
    cancel_on_timeout: bool,
}

impl TimeoutGuard {
    pub fn new(cancel_on_timeout: bool) -> Self {
        Self { cancel_on_timeout }
    }

    /// A result that only arrives once the deadline has passed still counts as timed out.
    pub fn race<T, F>(&self, pool: &Pool, deadline: Duration, query: F) -> Result<Raced<T>, ConnectionError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, ConnectionError> + Send + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel(1);
        let interrupt = Arc::new(FairMutex::new(Interrupt::Pending));
        let slot = interrupt.clone();
        let pool = pool.clone();
        let start = Instant::now();

        thread::Builder::new()
            .name("tagbench-query".to_owned())
            .spawn(move || {
                let result = pool.get().map_err(ConnectionError::from).and_then(|connection| {
                    {
                        let mut slot = slot.lock();
                        if let Interrupt::Cancelled = *slot {
                            return Err(ConnectionError::Cancelled);
                        }
                        *slot = Interrupt::Running(connection.get_interrupt_handle());
                    }

                    let result = query(&connection);
                    *slot.lock() = Interrupt::Finished;

                    result
                });

                // the guard stops listening once the deadline has passed
                if sender.send(result).is_err() {
                    debug!("Discarded result of a query that lost its race");
                }
            })?;

        let outcome = match receiver.recv_timeout(deadline) {
            Ok(result) if start.elapsed() < deadline => return result.map(Raced::Completed),
            Ok(_) | Err(RecvTimeoutError::Timeout) => Raced::TimedOut,
            Err(RecvTimeoutError::Disconnected) => return Err(ConnectionError::Disconnected),
        };

        if self.cancel_on_timeout {
            let mut slot = interrupt.lock();
            if let Interrupt::Running(handle) = &*slot {
                handle.interrupt();
            }
            if !matches!(*slot, Interrupt::Finished) {
                *slot = Interrupt::Cancelled;
            }
        } else {
            warn!(
                deadline_ms = deadline.as_millis() as u64,
                "Query timed out and keeps running in the background"
            );
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use r2d2_sqlite::SqliteConnectionManager;

    const ENDLESS: &str = "with recursive counter(x) as (select 1 union all select x + 1 from counter)
         select count(*) from counter";

    fn pool(size: u32) -> Pool {
        r2d2::Pool::builder()
            .max_size(size)
            .build(SqliteConnectionManager::memory())
            .unwrap()
    }

    #[test]
    fn fast_query_completes() {
        let raced = TimeoutGuard::default()
            .race(&pool(2), Duration::from_secs(10), |connection| {
                Ok(connection.query_row("select 40 + 2", [], |row| row.get::<_, i64>(0))?)
            })
            .unwrap();

        assert_eq!(raced, Raced::Completed(42));
    }

    #[test]
    fn slow_query_times_out() {
        let raced = TimeoutGuard::default()
            .race(&pool(2), Duration::from_millis(20), |_| {
                thread::sleep(Duration::from_millis(500));
                Ok(())
            })
            .unwrap();

        assert_eq!(raced, Raced::TimedOut);
    }

    #[test]
    fn zero_deadline_always_times_out() {
        let raced = TimeoutGuard::default()
            .race(&pool(2), Duration::ZERO, |_| Ok(()))
            .unwrap();

        assert_eq!(raced, Raced::TimedOut);
    }

    #[test]
    fn errors_are_propagated() {
        let raced = TimeoutGuard::default().race(&pool(2), Duration::from_secs(10), |connection| {
            Ok(connection.execute("select * from missing", [])?)
        });

        assert!(matches!(raced, Err(ConnectionError::SQLite(_))));
    }

    #[test]
    fn losing_query_keeps_its_connection() {
        let pool = pool(1);
        let raced = TimeoutGuard::new(false)
            .race(&pool, Duration::from_millis(50), |_| {
                thread::sleep(Duration::from_millis(500));
                Ok(())
            })
            .unwrap();

        assert_eq!(raced, Raced::TimedOut);
        assert!(pool.try_get().is_none());
        assert!(pool.get_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn cancellation_releases_the_connection() {
        let pool = pool(1);
        let guard = TimeoutGuard::new(true);
        let raced = guard
            .race(&pool, Duration::from_millis(100), |connection| {
                Ok(connection.query_row(ENDLESS, [], |row| row.get::<_, i64>(0))?)
            })
            .unwrap();

        assert_eq!(raced, Raced::TimedOut);
        assert!(pool.get_timeout(Duration::from_secs(10)).is_ok());
    }
}
