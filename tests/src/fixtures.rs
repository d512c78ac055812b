//! Shared builders for events and collectors.

use std::sync::Arc;

use parking_lot::Mutex;
use shared_types::{EventDescriptor, NodeId, PlatformEvent};
use shared_wiring::{DispatchModel, InputWire, TaskScheduler, WiringModel};

/// Event with a hash derived from `generation` and `creator`.
pub fn event(creator: u64, generation: u64, signature: u8) -> PlatformEvent {
    let mut hash = [0u8; 32];
    hash[..8].copy_from_slice(&generation.to_be_bytes());
    hash[8..16].copy_from_slice(&creator.to_be_bytes());
    let descriptor = EventDescriptor::new(hash, NodeId(creator), generation, generation);
    PlatformEvent::new(descriptor, vec![signature; 64])
}

/// A direct scheduler that records everything put into its input wire.
pub fn collector<T: Clone + Send + 'static>(
    model: &WiringModel,
    name: &str,
) -> (InputWire<T, ()>, Arc<Mutex<Vec<T>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let scheduler: TaskScheduler<()> = model
        .scheduler_builder(name)
        .with_dispatch(DispatchModel::Direct)
        .build()
        .expect("collector scheduler");
    let input = scheduler.build_input_wire::<T>("collected");
    let sink = Arc::clone(&seen);
    input
        .bind_consumer(move |item| sink.lock().push(item))
        .expect("collector bind");
    (input, seen)
}
