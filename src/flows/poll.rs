// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Deadline-bounded event polling.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::snippet::SnippetError;

const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Wall-clock budget shared by one or more poll loops.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `budget` from now. Budgets past what `Instant` can hold are
    /// capped at roughly thirty years.
    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        Self {
            at: now.checked_add(budget).unwrap_or_else(|| now + FAR_FUTURE),
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}

/// How a poll loop ended.
#[derive(Debug)]
pub enum PollOutcome<T> {
    /// The awaited event arrived.
    Matched(T),
    /// The deadline passed first.
    Exhausted,
}

impl<T> PollOutcome<T> {
    pub fn matched(self) -> Option<T> {
        match self {
            Self::Matched(value) => Some(value),
            Self::Exhausted => None,
        }
    }
}

/// Repeatedly `wait` until `select` picks a value out of an event or the
/// deadline passes.
///
/// `wait` yields `Ok(None)` when its own timeout elapsed without an event;
/// the loop then goes round again. Any error ends the loop.
pub async fn poll_until<E, T, W, Fut, S>(
    deadline: Deadline,
    mut wait: W,
    mut select: S,
) -> Result<PollOutcome<T>, SnippetError>
where
    W: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<E>, SnippetError>>,
    S: FnMut(&E) -> Option<T>,
{
    while !deadline.is_expired() {
        if let Some(event) = wait().await? {
            if let Some(value) = select(&event) {
                return Ok(PollOutcome::Matched(value));
            }
        }
    }
    Ok(PollOutcome::Exhausted)
}

/// Repeatedly `wait` until the deadline passes, keeping every event.
pub async fn collect_until<E, W, Fut, F>(
    deadline: Deadline,
    mut wait: W,
    mut on_event: F,
) -> Result<Vec<E>, SnippetError>
where
    W: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<E>, SnippetError>>,
    F: FnMut(&E),
{
    let mut events = Vec::new();
    while !deadline.is_expired() {
        if let Some(event) = wait().await? {
            on_event(&event);
            events.push(event);
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::pin::Pin;

    type WaitFuture = Pin<Box<dyn Future<Output = Result<Option<&'static str>, SnippetError>>>>;

    /// Wait function that sleeps `per_wait` per call and then hands out the
    /// next scripted item; `None` items behave like a wait timeout.
    fn scripted<'a>(
        per_wait: Duration,
        script: Vec<Option<&'static str>>,
        calls: &'a Cell<usize>,
    ) -> impl FnMut() -> WaitFuture + 'a {
        let mut script: VecDeque<_> = script.into();
        move || -> WaitFuture {
            calls.set(calls.get() + 1);
            let next = script.pop_front().flatten();
            Box::pin(async move {
                tokio::time::sleep(per_wait).await;
                Ok(next)
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_budget_does_not_overflow() {
        let deadline = Deadline::after(Duration::MAX);
        assert!(!deadline.is_expired());
        assert!(deadline.remaining() >= Duration::from_secs(86400 * 365));
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_exits_immediately() {
        let calls = Cell::new(0);
        let start = Instant::now();
        let deadline = Deadline::after(Duration::from_secs(10));

        let outcome = poll_until(
            deadline,
            scripted(
                Duration::from_secs(1),
                vec![Some("a"), Some("b"), Some("Mathers-C1"), Some("d")],
                &calls,
            ),
            |name| (*name == "Mathers-C1").then_some(name.len()),
        )
        .await
        .unwrap();

        assert_eq!(outcome.matched(), Some(10));
        assert_eq!(calls.get(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert!(!deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_at_budget() {
        let calls = Cell::new(0);
        let start = Instant::now();
        let deadline = Deadline::after(Duration::from_secs(10));

        let outcome = poll_until(
            deadline,
            scripted(Duration::from_secs(2), vec![Some("x"); 100], &calls),
            |name| (*name == "Mathers-C1").then_some(()),
        )
        .await
        .unwrap();

        assert!(outcome.matched().is_none());
        assert_eq!(calls.get(), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_bounded_by_one_wait() {
        let calls = Cell::new(0);
        let start = Instant::now();
        let budget = Duration::from_secs(10);
        let per_wait = Duration::from_secs(3);

        let outcome = poll_until(
            Deadline::after(budget),
            scripted(per_wait, vec![None; 100], &calls),
            |_: &&str| Some(()),
        )
        .await
        .unwrap();

        assert!(outcome.matched().is_none());
        assert_eq!(calls.get(), 4);
        assert!(start.elapsed() <= budget + per_wait);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeouts_keep_polling() {
        let calls = Cell::new(0);

        let outcome = poll_until(
            Deadline::after(Duration::from_secs(10)),
            scripted(Duration::from_secs(1), vec![None, None, Some("hit")], &calls),
            |name| (*name == "hit").then_some(()),
        )
        .await
        .unwrap();

        assert!(outcome.matched().is_some());
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_end_the_loop() {
        let mut calls = 0;
        let result = poll_until(
            Deadline::after(Duration::from_secs(10)),
            || {
                calls += 1;
                async { Err::<Option<()>, _>(SnippetError::Closed) }
            },
            |_| Some(()),
        )
        .await;

        assert!(matches!(result, Err(SnippetError::Closed)));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_deadline_never_waits() {
        let calls = Cell::new(0);
        let outcome = poll_until(
            Deadline::after(Duration::ZERO),
            scripted(Duration::from_secs(1), vec![Some("hit")], &calls),
            |_| Some(()),
        )
        .await
        .unwrap();

        assert!(outcome.matched().is_none());
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_keeps_every_event() {
        let calls = Cell::new(0);
        let mut seen = 0;

        let events = collect_until(
            Deadline::after(Duration::from_secs(5)),
            scripted(Duration::from_secs(1), vec![Some("a"), None, Some("b"), Some("c")], &calls),
            |_| seen += 1,
        )
        .await
        .unwrap();

        assert_eq!(events, vec!["a", "b", "c"]);
        assert_eq!(seen, 3);
        assert_eq!(calls.get(), 5);
    }
}
