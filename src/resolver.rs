//! Timed resolution of locator sets and affordance clicks.
//!
//! Resolution polls the page: on every tick the strategies of a
//! [`LocatorSet`] are tried in declared order and the first one yielding a
//! displayed element wins. Later strategies are never queried on a tick where
//! an earlier one matched.

use std::future::Future;
use std::time::Duration;

use log::debug;
use thiserror::Error;
use tokio::time::{Instant, sleep};

use crate::locator::{Locator, LocatorSet};
use crate::session::{ElementHandle, SessionDriver, SessionError};

/// Pause between resolution ticks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Stand-in deadline distance for budgets too large to add to a clock reading.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `budget` from now, saturating at a far-future instant instead of overflowing.
fn deadline_after(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget).unwrap_or_else(|| now + FAR_FUTURE)
}

/// A resolved element together with the index of the strategy that found it.
#[derive(Debug)]
pub struct Resolved<E> {
    pub element: E,
    pub strategy: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("no strategy located a visible {field} element within {timeout:?}")]
pub struct NotFound {
    pub field: &'static str,
    pub timeout: Duration,
}

/// Result of [`poll_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Satisfied,
    Exhausted,
}

/// Evaluate `predicate` every `interval` until it holds or `budget` elapses.
///
/// The predicate always runs at least once.
pub async fn poll_until<F, Fut>(mut predicate: F, interval: Duration, budget: Duration) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = deadline_after(budget);
    loop {
        if predicate().await {
            return PollOutcome::Satisfied;
        }
        let now = Instant::now();
        if now >= deadline {
            return PollOutcome::Exhausted;
        }
        sleep(interval.min(deadline - now)).await;
    }
}

/// Query `locator` once and keep the match only if it is displayed.
pub async fn find_visible<S: SessionDriver>(
    session: &S,
    locator: &Locator,
) -> Result<Option<S::Element>, SessionError> {
    let Some(element) = session.find(locator).await? else {
        return Ok(None);
    };
    if element.is_displayed().await? {
        Ok(Some(element))
    } else {
        Ok(None)
    }
}

/// Resolve `set` to a visible element, polling until `timeout`.
///
/// Query failures count as a miss for that strategy on that tick.
pub async fn resolve<S: SessionDriver>(
    session: &S,
    set: &LocatorSet,
    timeout: Duration,
) -> Result<Resolved<S::Element>, NotFound> {
    let deadline = deadline_after(timeout);
    loop {
        for (strategy, locator) in set.iter().enumerate() {
            match find_visible(session, locator).await {
                Ok(Some(element)) => {
                    debug!("{} resolved via strategy {strategy} ({locator})", set.field());
                    return Ok(Resolved { element, strategy });
                }
                Ok(None) => {}
                Err(err) => debug!("{} strategy {strategy} failed: {err}", set.field()),
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(NotFound {
                field: set.field(),
                timeout,
            });
        }
        sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}

/// Click the first affordance in `candidates` that can be found and clicked.
///
/// Each candidate is queried once. When `require_visible` is set, matches
/// that are not displayed are skipped. Returns the index of the clicked
/// candidate.
pub async fn click_first<S: SessionDriver>(
    session: &S,
    candidates: &[Locator],
    require_visible: bool,
) -> Option<usize> {
    for (index, locator) in candidates.iter().enumerate() {
        let found = if require_visible {
            find_visible(session, locator).await
        } else {
            session.find(locator).await
        };
        let element = match found {
            Ok(Some(element)) => element,
            Ok(None) => continue,
            Err(err) => {
                debug!("affordance {locator} lookup failed: {err}");
                continue;
            }
        };
        match element.click().await {
            Ok(()) => return Some(index),
            Err(err) => debug!("affordance {locator} click failed: {err}"),
        }
    }
    None
}
