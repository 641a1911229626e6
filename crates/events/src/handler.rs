//! Deterministic command execution helper.

/// Execute an aggregate command deterministically (no IO, no async).
///
/// The canonical event-sourced lifecycle in one step:
///
/// 1. **Decide**: `aggregate.handle(command)` returns events (pure, no mutation)
/// 2. **Evolve**: each event is applied via `aggregate.apply(event)`
///
/// Mutates the aggregate in place. The workflow engine uses this when a single
/// command decision has to account for the effect of earlier entries in the
/// same batch (e.g. several ledger entries against one product); unit tests use
/// it to drive aggregates without a store or bus. Version tracking is the
/// aggregate's responsibility (+1 per applied event).
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: storeflow_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
