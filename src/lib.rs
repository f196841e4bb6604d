//! # desim
//!
//! A deterministic, single-threaded discrete-event simulation engine.
//!
//! The engine executes a user-defined network of simulation objects that
//! communicate by timestamped messages, advancing a single global logical
//! clock in non-decreasing order and invoking registered handler methods on
//! the destination object. Given the same inputs, two runs produce an
//! identical event-dispatch sequence regardless of the insertion order of
//! same-time events.
//!
//! ## Architecture
//!
//! - [`message`] — the typed payload carried by an event (C1)
//! - [`event`] — the immutable scheduled-delivery record and its order key (C2)
//! - [`queue`] — the min-heap of pending events and the superposition protocol (C3)
//! - [`object`] — the `SimObject` trait and the `SendGate` dispatch capability (C4)
//! - [`registry`] — per-class handler/priority/sent-message metadata (C5)
//! - [`simulator`] — the object table, event queue ownership, and main loop (C6)
//! - [`config`] — the validated parameter bundle consumed by the simulator (C7)
//! - [`collaborators`] — contracts for progress reporting, metadata, checkpoints, and plot logging

pub mod collaborators;
pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod object;
pub mod queue;
pub mod registry;
pub mod simulator;

pub mod prelude {
    pub use crate::collaborators::{CheckpointStore, MetadataCollector, PlotLog, ProgressReporter};
    pub use crate::config::SimulationConfig;
    pub use crate::error::DesimError;
    pub use crate::event::Event;
    pub use crate::message::{compare_messages, EventMessage, FieldValue};
    pub use crate::object::{ObjectId, SendGate, SimObject};
    pub use crate::queue::EventQueue;
    pub use crate::registry::{ClassDescriptor, ClassDescriptorBuilder, ClassPriority};
    pub use crate::simulator::{SimulationReturn, Simulator, TerminationReason};
}
