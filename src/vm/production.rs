//! Productions: suspendable rule procedures as explicit step functions
//!
//! Every grammar rule is a [`Rule`], a factory invoked once per frame with the frame's
//! [`RuleProps`]. It returns a [`Production`], which the evaluator drives one step at a
//! time: each step receives the value of the previous instruction (a [`MatchRange`] or
//! null) and either yields the next instruction or returns, optionally handing back one
//! final instruction whose result becomes the production's own result.
//!
//! When a frame is popped its production is finalized. Cleanup instructions returned by
//! [`Production::finalize`] run while the frame is a zombie, where only `write` is legal.

use super::instruction::Instruction;
use super::language::Language;
use super::source::{MatchRange, SourceState};
use super::tag::Attributes;
use std::fmt;
use std::sync::Arc;

pub type Rule = Arc<dyn Fn(RuleProps) -> Box<dyn Production> + Send + Sync>;

/// Wrap a closure as a grammar rule.
pub fn rule<F>(factory: F) -> Rule
where
    F: Fn(RuleProps) -> Box<dyn Production> + Send + Sync + 'static,
{
    Arc::new(factory)
}

/// The capability handle a rule invocation receives.
#[derive(Clone)]
pub struct RuleProps {
    /// Payload attached to the invoking instruction.
    pub value: Option<serde_json::Value>,
    /// Cursor state when the frame was created.
    pub state: SourceState,
    pub language: Arc<Language>,
    pub node_type: String,
    pub attributes: Attributes,
    /// Text recognized by an intrinsic matcher before the production started.
    pub intrinsic: Option<String>,
    /// Attributes the production is expected to bind.
    pub unbound_attributes: Vec<String>,
}

impl fmt::Debug for RuleProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleProps")
            .field("value", &self.value)
            .field("state", &self.state)
            .field("language", &self.language.canonical_url)
            .field("node_type", &self.node_type)
            .field("intrinsic", &self.intrinsic)
            .finish()
    }
}

/// Read-only view of the evaluator handed to every step.
#[derive(Debug, Clone)]
pub struct StepContext {
    /// Source cursor at the moment the step runs.
    pub state: SourceState,
}

impl StepContext {
    /// True once the cursor has consumed all input, gaps included.
    pub fn at_end(&self) -> bool {
        self.state.done
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Yield(Instruction),
    Return(Option<Instruction>),
}

pub trait Production {
    fn step(&mut self, cx: &StepContext, input: Option<MatchRange>) -> Step;

    /// Force the production to unwind. Returned instructions run in the zombie state.
    fn finalize(&mut self) -> Vec<Instruction> {
        Vec::new()
    }
}

/// A fixed sequence of instructions, optionally returning a final one.
#[derive(Debug, Clone, Default)]
pub struct Script {
    body: Vec<Instruction>,
    tail: Option<Instruction>,
    cursor: usize,
}

impl Script {
    pub fn new(body: Vec<Instruction>) -> Self {
        Self {
            body,
            tail: None,
            cursor: 0,
        }
    }

    pub fn returning(body: Vec<Instruction>, tail: Instruction) -> Self {
        Self {
            body,
            tail: Some(tail),
            cursor: 0,
        }
    }

    pub fn rule(body: Vec<Instruction>) -> Rule {
        rule(move |_| Box::new(Script::new(body.clone())) as Box<dyn Production>)
    }

    pub fn returning_rule(body: Vec<Instruction>, tail: Instruction) -> Rule {
        rule(move |_| {
            Box::new(Script::returning(body.clone(), tail.clone())) as Box<dyn Production>
        })
    }
}

impl Production for Script {
    fn step(&mut self, _cx: &StepContext, _input: Option<MatchRange>) -> Step {
        match self.body.get(self.cursor) {
            Some(instruction) => {
                self.cursor += 1;
                Step::Yield(instruction.clone())
            }
            None => Step::Return(self.tail.take()),
        }
    }
}

/// A closure-driven state machine.
pub struct Steps<S, F> {
    state: S,
    step: F,
    cleanup: Vec<Instruction>,
}

impl<S, F> Steps<S, F>
where
    F: FnMut(&mut S, &StepContext, Option<MatchRange>) -> Step,
{
    pub fn new(state: S, step: F) -> Self {
        Self {
            state,
            step,
            cleanup: Vec::new(),
        }
    }

    /// Instructions to run when the production is finalized.
    pub fn with_cleanup(mut self, cleanup: Vec<Instruction>) -> Self {
        self.cleanup = cleanup;
        self
    }
}

impl<S, F> Production for Steps<S, F>
where
    F: FnMut(&mut S, &StepContext, Option<MatchRange>) -> Step,
{
    fn step(&mut self, cx: &StepContext, input: Option<MatchRange>) -> Step {
        (self.step)(&mut self.state, cx, input)
    }

    fn finalize(&mut self) -> Vec<Instruction> {
        std::mem::take(&mut self.cleanup)
    }
}

/// Box a closure-driven production.
pub fn steps<S, F>(state: S, step: F) -> Box<dyn Production>
where
    S: 'static,
    F: FnMut(&mut S, &StepContext, Option<MatchRange>) -> Step + 'static,
{
    Box::new(Steps::new(state, step))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::matcher::Matcher;
    use crate::vm::source::SourcePosition;

    fn cx_at(done: bool) -> StepContext {
        StepContext {
            state: SourceState {
                position: SourcePosition::default(),
                at_gap: false,
                done,
            },
        }
    }

    fn cx() -> StepContext {
        cx_at(false)
    }

    #[test]
    fn script_yields_then_returns_tail() {
        let mut script = Script::returning(
            vec![Instruction::eat(Matcher::literal("a"))],
            Instruction::eat(Matcher::literal("b")),
        );
        assert_eq!(
            script.step(&cx(), None),
            Step::Yield(Instruction::eat(Matcher::literal("a")))
        );
        assert_eq!(
            script.step(&cx(), None),
            Step::Return(Some(Instruction::eat(Matcher::literal("b"))))
        );
    }

    #[test]
    fn steps_thread_state_between_calls() {
        let mut production = steps(0usize, |count, _cx, _input| {
            *count += 1;
            if *count < 3 {
                Step::Yield(Instruction::write(format!("{}", count)))
            } else {
                Step::Return(None)
            }
        });
        assert_eq!(production.step(&cx(), None), Step::Yield(Instruction::write("1")));
        assert_eq!(production.step(&cx(), None), Step::Yield(Instruction::write("2")));
        assert_eq!(production.step(&cx(), None), Step::Return(None));
        assert!(production.finalize().is_empty());
    }

    #[test]
    fn steps_can_stop_at_end_of_input() {
        let mut production = steps((), |_, cx, _input| {
            if cx.at_end() {
                Step::Return(None)
            } else {
                Step::Yield(Instruction::eat(Matcher::literal("a")))
            }
        });
        assert_eq!(
            production.step(&cx(), None),
            Step::Yield(Instruction::eat(Matcher::literal("a")))
        );
        assert_eq!(production.step(&cx_at(true), None), Step::Return(None));
    }

    #[test]
    fn cleanup_runs_once() {
        let mut production = Steps::new((), |_, _, _| Step::Return(None))
            .with_cleanup(vec![Instruction::write("bye")]);
        assert_eq!(production.finalize(), vec![Instruction::write("bye")]);
        assert!(production.finalize().is_empty());
    }
}
