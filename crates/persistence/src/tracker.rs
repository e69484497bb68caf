//! Commit protocol shared by every unit of work implementation.

use std::collections::HashSet;

use domain::AggregateRoot;
use outbox::OutboxMessage;

use crate::Result;

/// Aggregates registered with a unit of work since its last commit.
#[derive(Debug, Default)]
pub struct Tracker {
    tracked: Vec<Box<dyn AggregateRoot>>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, aggregate: Box<dyn AggregateRoot>) {
        self.tracked.push(aggregate);
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Encodes every pending event of every tracked aggregate, in tracking
    /// then raise order. An event tracked twice is encoded once.
    ///
    /// Events are only read here; they stay buffered until
    /// [`Tracker::commit_succeeded`].
    pub fn pending_messages(&self) -> Result<Vec<OutboxMessage>> {
        let mut seen = HashSet::new();
        let mut messages = Vec::new();
        for aggregate in &self.tracked {
            for event in aggregate.domain_events() {
                if seen.insert(event.event_id()) {
                    messages.push(OutboxMessage::from_event(event)?);
                }
            }
        }
        Ok(messages)
    }

    /// Clears the events of every tracked aggregate and forgets them.
    pub fn commit_succeeded(&mut self) {
        for aggregate in &mut self.tracked {
            tracing::trace!(
                aggregate_type = aggregate.aggregate_type(),
                aggregate_id = %aggregate.aggregate_id(),
                "clearing committed events"
            );
            aggregate.clear_domain_events();
        }
        self.tracked.clear();
    }

    /// Forgets tracked aggregates without touching their events.
    pub fn discard(&mut self) {
        self.tracked.clear();
    }
}
