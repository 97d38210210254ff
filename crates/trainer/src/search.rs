//! Weak-learner search
//!
//! Candidate expressions are built in postfix order: a state is a stack of
//! partial sub-expressions plus the number of actions still allowed. Actions
//! either push an input or apply a primitive function to the top of the stack.
//! Exploration is exhaustive and depth-first; every branch is undone in place
//! after it has been explored, so the state is never copied.

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use symboost_graph::{
    GraphError, NodeFactory, NodeId, Operator, PrimitiveSet, Result, SharedUniverse,
};
use tracing::debug;

/// Search budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Primitive function names, e.g. `["and", "or", "not"]`
    pub primitives: Vec<String>,
    /// Maximum number of nested function applications in a candidate
    pub max_depth: usize,
    /// Action budget; derived from `max_depth` when unset
    pub max_steps: Option<usize>,
    /// Fan out top-level branches over the rayon pool
    pub parallel: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            primitives: PrimitiveSet::default()
                .names()
                .into_iter()
                .map(String::from)
                .collect(),
            max_depth: 2,
            max_steps: None,
            parallel: false,
        }
    }
}

/// Number of actions needed to build a full tree of the given depth and arity.
pub fn full_tree_steps(max_depth: usize, max_arity: usize) -> usize {
    let arity = max_arity.max(1);
    let mut level = 1usize;
    let mut total = 0usize;
    for _ in 0..=max_depth {
        total = total.saturating_add(level);
        level = level.saturating_mul(arity);
    }
    total
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PushInput(NodeId),
    Apply(Operator),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchState {
    pub stack: Vec<NodeId>,
    pub remaining: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    /// More actions are possible and the stack does not hold a single expression
    Exploring,
    /// The stack holds exactly one complete expression
    Final,
    /// No legal action and no usable expression
    Dead,
}

/// Record of one performed action, consumed by [`SearchSpace::undo_transition`].
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub action: Action,
    popped: SmallVec<[NodeId; 2]>,
    pushed: NodeId,
    /// 1.0 when the transition reached a final state, 0.0 otherwise
    pub reward: f64,
}

pub struct SearchSpace<'a> {
    inputs: &'a [NodeId],
    primitives: &'a PrimitiveSet,
    max_depth: u32,
    max_steps: usize,
    max_arity: usize,
}

impl<'a> SearchSpace<'a> {
    pub fn new(inputs: &'a [NodeId], primitives: &'a PrimitiveSet, config: &SearchConfig) -> Self {
        let max_arity = primitives.max_arity();
        let max_steps = config
            .max_steps
            .unwrap_or_else(|| full_tree_steps(config.max_depth, max_arity));
        Self {
            inputs,
            primitives,
            max_depth: config.max_depth as u32,
            max_steps,
            max_arity,
        }
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn initial_state(&self) -> SearchState {
        SearchState {
            stack: Vec::new(),
            remaining: self.max_steps,
        }
    }

    /// Applications needed to fold a stack of `len` items into one.
    fn reductions_needed(&self, len: usize) -> usize {
        if len <= 1 {
            0
        } else if self.max_arity >= 2 {
            (len - 1).div_ceil(self.max_arity - 1)
        } else {
            usize::MAX
        }
    }

    pub fn legal_actions<F: NodeFactory>(&self, factory: &F, state: &SearchState) -> Vec<Action> {
        let mut actions = Vec::new();
        if state.remaining == 0 {
            return actions;
        }
        let after = state.remaining - 1;

        if self.reductions_needed(state.stack.len() + 1) <= after {
            actions.extend(self.inputs.iter().map(|&input| Action::PushInput(input)));
        }

        for &op in self.primitives.functions() {
            if self.can_apply(factory, state, op, after) {
                actions.push(Action::Apply(op));
            }
        }
        actions
    }

    fn can_apply<F: NodeFactory>(
        &self,
        factory: &F,
        state: &SearchState,
        op: Operator,
        after: usize,
    ) -> bool {
        let signature = op.signature();
        let arity = signature.args.len();
        if arity == 0 || state.stack.len() < arity {
            return false;
        }
        let args = &state.stack[state.stack.len() - arity..];

        let mut depth = 0;
        for (&arg, &expected) in args.iter().zip(signature.args) {
            match factory.header(arg) {
                Some(header) if header.ty == expected => depth = depth.max(header.depth + 1),
                _ => return false,
            }
        }
        if depth > self.max_depth {
            return false;
        }

        if arity == 2 {
            let ordered = if op.is_commutative() {
                args[0] < args[1]
            } else {
                args[0] != args[1]
            };
            if !ordered {
                return false;
            }
        }

        self.reductions_needed(state.stack.len() - arity + 1) <= after
    }

    pub fn classify<F: NodeFactory>(&self, factory: &F, state: &SearchState) -> StateKind {
        if state.stack.len() == 1 {
            StateKind::Final
        } else if self.legal_actions(factory, state).is_empty() {
            StateKind::Dead
        } else {
            StateKind::Exploring
        }
    }

    pub fn perform_transition<F: NodeFactory>(
        &self,
        factory: &mut F,
        state: &mut SearchState,
        action: Action,
    ) -> Result<Transition> {
        if state.remaining == 0 {
            return Err(GraphError::StructuralViolation(
                "search action budget exhausted".to_string(),
            ));
        }

        let (popped, pushed) = match action {
            Action::PushInput(input) => (SmallVec::new(), input),
            Action::Apply(op) => {
                let arity = op.arity();
                if state.stack.len() < arity {
                    return Err(GraphError::StructuralViolation(format!(
                        "{} needs {} stacked arguments, found {}",
                        op.name(),
                        arity,
                        state.stack.len()
                    )));
                }
                let args: SmallVec<[NodeId; 2]> =
                    SmallVec::from_slice(&state.stack[state.stack.len() - arity..]);
                let node = factory.canonicalize(op, &args)?;
                (args, node)
            }
        };

        state.stack.truncate(state.stack.len() - popped.len());
        state.stack.push(pushed);
        state.remaining -= 1;

        let reward = if state.stack.len() == 1 { 1.0 } else { 0.0 };
        Ok(Transition {
            action,
            popped,
            pushed,
            reward,
        })
    }

    pub fn undo_transition(&self, state: &mut SearchState, transition: Transition) {
        let top = state.stack.pop();
        debug_assert_eq!(top, Some(transition.pushed));
        state.stack.extend(transition.popped);
        state.remaining += 1;
    }

    /// Lazy exhaustive enumeration of distinct candidates from the initial state.
    pub fn candidates<'f, F: NodeFactory>(&'a self, factory: &'f mut F) -> Candidates<'a, 'f, F> {
        Candidates::starting_at(self, factory, self.initial_state())
    }

    /// Enumerate with one rayon task per top-level action.
    ///
    /// Branches share the universe through its lock; the merged result is sorted
    /// by id, so it does not depend on scheduling.
    pub fn enumerate_parallel(&self, universe: &SharedUniverse) -> Result<Vec<NodeId>> {
        let root = self.initial_state();
        let root_actions = self.legal_actions(&universe, &root);

        let branches = root_actions
            .par_iter()
            .map(|&action| {
                let mut factory = universe;
                let mut state = self.initial_state();
                self.perform_transition(&mut factory, &mut state, action)?;
                let mut found = Vec::new();
                if state.stack.len() == 1 {
                    found.push(state.stack[0]);
                }
                for candidate in Candidates::starting_at(self, &mut factory, state) {
                    found.push(candidate?);
                }
                Ok(found)
            })
            .collect::<Result<Vec<Vec<NodeId>>>>()?;

        let mut merged: Vec<NodeId> = branches.into_iter().flatten().collect();
        merged.sort_unstable();
        merged.dedup();
        debug!(
            branches = root_actions.len(),
            candidates = merged.len(),
            "parallel search finished"
        );
        Ok(merged)
    }
}

struct Frame {
    actions: Vec<Action>,
    next: usize,
    /// Transition that led into this frame; `None` for the starting frame
    entered_by: Option<Transition>,
}

/// Depth-first candidate stream. Finite and single-pass.
pub struct Candidates<'a, 'f, F: NodeFactory> {
    space: &'a SearchSpace<'a>,
    factory: &'f mut F,
    state: SearchState,
    frames: Vec<Frame>,
    seen: FxHashSet<NodeId>,
    transitions: usize,
}

impl<'a, 'f, F: NodeFactory> Candidates<'a, 'f, F> {
    pub fn starting_at(space: &'a SearchSpace<'a>, factory: &'f mut F, state: SearchState) -> Self {
        let actions = space.legal_actions(&*factory, &state);
        Self {
            space,
            factory,
            state,
            frames: vec![Frame {
                actions,
                next: 0,
                entered_by: None,
            }],
            seen: FxHashSet::default(),
            transitions: 0,
        }
    }

    /// Current search state; equals the starting state once exhausted.
    pub fn state(&self) -> &SearchState {
        &self.state
    }

    /// Number of transitions performed so far.
    pub fn transitions(&self) -> usize {
        self.transitions
    }
}

impl<F: NodeFactory> Iterator for Candidates<'_, '_, F> {
    type Item = Result<NodeId>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.frames.last_mut()?;
            if frame.next < frame.actions.len() {
                let action = frame.actions[frame.next];
                frame.next += 1;

                let transition =
                    match self
                        .space
                        .perform_transition(self.factory, &mut self.state, action)
                    {
                        Ok(transition) => transition,
                        Err(err) => {
                            self.frames.clear();
                            return Some(Err(err));
                        }
                    };
                self.transitions += 1;

                let actions = self.space.legal_actions(&*self.factory, &self.state);
                self.frames.push(Frame {
                    actions,
                    next: 0,
                    entered_by: Some(transition),
                });

                if let [candidate] = self.state.stack[..] {
                    if self.seen.insert(candidate) {
                        return Some(Ok(candidate));
                    }
                }
            } else {
                let frame = self.frames.pop()?;
                if let Some(transition) = frame.entered_by {
                    self.space.undo_transition(&mut self.state, transition);
                }
            }
        }
    }
}
