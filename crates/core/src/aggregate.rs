//! Aggregate root contract for the state-stored domain models.

/// Aggregate root marker + minimal interface.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state.
    ///
    /// Stores persist this value and use it as the optimistic concurrency token
    /// when writing the aggregate back.
    fn version(&self) -> u64;
}

/// Aggregate execution semantics (pure, deterministic).
///
/// - **Decision logic**: `handle(&self, cmd)` returns events.
/// - **State mutation**: `apply(&mut self, event)` evolves state.
///
/// Aggregates never perform IO. The events they return describe both the state
/// change and the side effects infrastructure must carry out in the same unit of
/// work (e.g. receiving delivered goods into stock).
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Evolve in-memory state from a single event (+1 version per event).
    fn apply(&mut self, event: &Self::Event);

    /// Decide which events to emit given the current state and a command.
    ///
    /// This must not mutate state. State evolution is done through `apply`.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}

/// Decide and evolve in one step: `handle` the command, then `apply` every
/// resulting event to the aggregate.
///
/// The aggregate is left untouched when `handle` fails.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: Aggregate,
{
    let events = aggregate.handle(command)?;
    for ev in &events {
        aggregate.apply(ev);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Counter {
        id: u8,
        total: u32,
        version: u64,
    }

    impl AggregateRoot for Counter {
        type Id = u8;

        fn id(&self) -> &u8 {
            &self.id
        }

        fn version(&self) -> u64 {
            self.version
        }
    }

    impl Aggregate for Counter {
        type Command = u32;
        type Event = u32;
        type Error = &'static str;

        fn apply(&mut self, event: &u32) {
            self.total += event;
            self.version += 1;
        }

        fn handle(&self, command: &u32) -> Result<Vec<u32>, &'static str> {
            if *command == 0 {
                return Err("nothing to add");
            }
            Ok(vec![*command, *command])
        }
    }

    #[test]
    fn execute_applies_every_event() {
        let mut counter = Counter::default();
        let events = execute(&mut counter, &3).unwrap();
        assert_eq!(events, vec![3, 3]);
        assert_eq!(counter.total, 6);
        assert_eq!(counter.version(), 2);
    }

    #[test]
    fn failed_command_leaves_state_alone() {
        let mut counter = Counter::default();
        assert_eq!(execute(&mut counter, &0), Err("nothing to add"));
        assert_eq!(counter.total, 0);
        assert_eq!(counter.version(), 0);
    }
}
