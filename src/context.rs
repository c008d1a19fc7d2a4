use crate::evaluation::Evaluation;
use crate::request::EvaluatorKey;

const PREALLOCATED_STACK_SIZE: usize = 8;

/// State shared by every evaluation made for one top-level call.
///
/// The context remembers which entities are currently being evaluated, so that a targeting
/// condition referencing an entity higher up in the call is reported as a circular evaluation
/// instead of recursing forever. It also remembers the evaluation of every entity already decided
/// within the call, so that an experiment consulted both directly and as a targeting condition is
/// only decided once.
///
/// Create a fresh context for every top-level call and drop it afterwards; it is neither shared
/// between calls nor between threads.
#[derive(Debug)]
pub struct EvaluatorContext {
    stack: Vec<EvaluatorKey>,
    evaluations: Vec<Evaluation>,
}

impl EvaluatorContext {
    pub fn new() -> Self {
        EvaluatorContext {
            stack: Vec::with_capacity(PREALLOCATED_STACK_SIZE),
            evaluations: Vec::new(),
        }
    }

    /// Entities currently being evaluated, outermost first.
    pub fn stack(&self) -> &[EvaluatorKey] {
        &self.stack
    }

    pub fn contains(&self, key: &EvaluatorKey) -> bool {
        self.stack.contains(key)
    }

    pub(crate) fn push(&mut self, key: EvaluatorKey) {
        self.stack.push(key);
    }

    pub(crate) fn pop(&mut self) -> Option<EvaluatorKey> {
        self.stack.pop()
    }

    /// Every evaluation decided so far in this call, in the order they completed.
    pub fn evaluations(&self) -> &[Evaluation] {
        &self.evaluations
    }

    pub fn evaluation(&self, key: &EvaluatorKey) -> Option<&Evaluation> {
        self.evaluations.iter().find(|e| e.key() == *key)
    }

    /// Remember `evaluation`, replacing any earlier evaluation of the same entity.
    pub(crate) fn add_evaluation(&mut self, evaluation: Evaluation) {
        let key = evaluation.key();
        match self.evaluations.iter_mut().find(|e| e.key() == key) {
            Some(existing) => *existing = evaluation,
            None => self.evaluations.push(evaluation),
        }
    }
}

impl Default for EvaluatorContext {
    fn default() -> Self {
        Self::new()
    }
}
