//! Scheduler-less stages: filter, splitter and transformer.
//!
//! A stage runs synchronously on the delivering thread and forwards its
//! results through its own output wire, so stages compose with each other
//! and with schedulers through ordinary solder edges.

use super::{OutputWire, Sink};
use crate::error::WiringError;
use std::marker::PhantomData;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Filter,
    Splitter,
    Transformer,
}

/// Reshapes one input into zero or more outputs.
pub trait Stage<In, Out>: Send + Sync + 'static {
    fn kind(&self) -> StageKind;

    fn apply(&self, input: In, emit: &mut dyn FnMut(Out));
}

/// Passes items matching a predicate.
pub struct Filter<T> {
    predicate: Box<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T> Filter<T> {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Box::new(predicate),
        }
    }
}

impl<T: 'static> Stage<T, T> for Filter<T> {
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }

    fn apply(&self, input: T, emit: &mut dyn FnMut(T)) {
        if (self.predicate)(&input) {
            emit(input);
        }
    }
}

/// Emits each element of a list, in order.
pub struct Splitter<T> {
    _marker: PhantomData<fn(Vec<T>) -> T>,
}

impl<T> Default for Splitter<T> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: 'static> Stage<Vec<T>, T> for Splitter<T> {
    fn kind(&self) -> StageKind {
        StageKind::Splitter
    }

    fn apply(&self, input: Vec<T>, emit: &mut dyn FnMut(T)) {
        for element in input {
            emit(element);
        }
    }
}

/// Maps every item through a pure function.
pub struct Transformer<A, B> {
    transform: Box<dyn Fn(A) -> B + Send + Sync>,
}

impl<A, B> Transformer<A, B> {
    pub fn new<F>(transform: F) -> Self
    where
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        Self {
            transform: Box::new(transform),
        }
    }
}

impl<A: 'static, B: 'static> Stage<A, B> for Transformer<A, B> {
    fn kind(&self) -> StageKind {
        StageKind::Transformer
    }

    fn apply(&self, input: A, emit: &mut dyn FnMut(B)) {
        emit((self.transform)(input));
    }
}

/// A stage exposed as a sink with its own output wire.
pub struct StageWire<In, Out> {
    name: String,
    stage: Arc<dyn Stage<In, Out>>,
    output: OutputWire<Out>,
}

impl<In, Out> Clone for StageWire<In, Out> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            stage: Arc::clone(&self.stage),
            output: self.output.clone(),
        }
    }
}

impl<In: 'static, Out: Clone + Send + 'static> StageWire<In, Out> {
    pub fn new<S: Stage<In, Out>>(name: &str, stage: S) -> Self {
        Self::with_output(name, stage, OutputWire::new(name))
    }

    pub(crate) fn with_output<S: Stage<In, Out>>(
        name: &str,
        stage: S,
        output: OutputWire<Out>,
    ) -> Self {
        Self {
            name: name.to_string(),
            stage: Arc::new(stage),
            output,
        }
    }

    #[must_use]
    pub fn kind(&self) -> StageKind {
        self.stage.kind()
    }

    #[must_use]
    pub fn output_wire(&self) -> &OutputWire<Out> {
        &self.output
    }

    fn push(&self, input: In) {
        self.stage.apply(input, &mut |out| self.output.forward(out));
    }
}

impl<In: 'static, Out: Clone + Send + 'static> Sink<In> for StageWire<In, Out> {
    fn name(&self) -> &str {
        &self.name
    }

    fn put(&self, item: In) -> Result<(), WiringError> {
        self.push(item);
        Ok(())
    }

    /// Stages never refuse; rejection happens at the downstream edges.
    fn offer(&self, item: In) -> Result<(), In> {
        self.push(item);
        Ok(())
    }

    fn inject(&self, item: In) -> Result<(), WiringError> {
        self.push(item);
        Ok(())
    }
}
