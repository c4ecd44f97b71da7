//! State graph arena and transition plumbing.
//!
//! States live in a flat arena and point at each other through
//! [`StateId`] handles, so cycles and converging edges are plain
//! indices instead of shared ownership.

use std::fmt;

use crate::state::State;

/// Handle to a state in a [`StateGraph`].
///
/// Ids are only meaningful for the graph that minted them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId(pub(crate) usize);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Transition requested by a state during its check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Goto(StateId),
    Finish,
}

/// Handed to every check call; the state uses it to request a
/// transition, which the runner applies after the check returns.
#[derive(Debug, Default)]
pub struct Context {
    next: Option<Transition>,
}

impl Context {
    pub(crate) fn new() -> Self {
        Self { next: None }
    }

    /// Move to `next` once this check returns, or finish the ramp
    /// successfully when `None`. A later call replaces an earlier one.
    pub fn advance(&mut self, next: Option<StateId>) {
        self.next = Some(match next {
            Some(id) => Transition::Goto(id),
            None => Transition::Finish,
        });
    }

    pub(crate) fn take(&mut self) -> Option<Transition> {
        self.next.take()
    }
}

/// Arena of states wired into a graph by [`StateId`] links.
#[derive(Default)]
pub struct StateGraph {
    states: Vec<State>,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a state, returning its handle.
    pub fn add(&mut self, state: impl Into<State>) -> StateId {
        self.states.push(state.into());
        StateId(self.states.len() - 1)
    }

    /// Point the follow-up edge of `from` at `to`.
    ///
    /// `ScaleUp`, `Wait` and `Simple` have a single follow-up edge;
    /// leaving it unlinked makes the state finish the ramp instead.
    /// `WaitForStable` takes both of its edges at construction, so
    /// linking it is a wiring bug.
    ///
    /// # Panics
    ///
    /// Panics when `from` is a `WaitForStable` state.
    pub fn link(&mut self, from: StateId, to: StateId) {
        match &mut self.states[from.0] {
            State::ScaleUp(s) => s.next = Some(to),
            State::Wait(s) => s.next = Some(to),
            State::Simple(s) => s.next = Some(to),
            State::WaitForStable(_) => {
                panic!("wait-for-stable edges are fixed at construction")
            }
        }
    }

    pub(crate) fn get_mut(&mut self, id: StateId) -> &mut State {
        &mut self.states[id.0]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{SimpleState, Wait};
    use std::time::Duration;

    fn noop_simple() -> SimpleState {
        SimpleState::new(Box::new(|| Box::pin(async { Ok(()) })))
    }

    #[test]
    fn add_hands_out_sequential_ids() {
        let mut graph = StateGraph::new();
        let a = graph.add(Wait::new(Duration::ZERO));
        let b = graph.add(noop_simple());
        assert_ne!(a, b);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn advance_records_goto() {
        let mut ctx = Context::new();
        ctx.advance(Some(StateId(3)));
        assert_eq!(ctx.take(), Some(Transition::Goto(StateId(3))));
        // Taking clears the request.
        assert_eq!(ctx.take(), None);
    }

    #[test]
    fn advance_none_records_finish() {
        let mut ctx = Context::new();
        ctx.advance(None);
        assert_eq!(ctx.take(), Some(Transition::Finish));
    }

    #[test]
    fn later_advance_replaces_earlier() {
        let mut ctx = Context::new();
        ctx.advance(Some(StateId(1)));
        ctx.advance(None);
        assert_eq!(ctx.take(), Some(Transition::Finish));
    }

    #[test]
    fn link_sets_follow_up_edge() {
        let mut graph = StateGraph::new();
        let wait = graph.add(Wait::new(Duration::ZERO));
        let simple = graph.add(noop_simple());
        graph.link(wait, simple);
        match graph.get_mut(wait) {
            crate::state::State::Wait(w) => assert_eq!(w.next, Some(simple)),
            _ => unreachable!(),
        }
    }
}
