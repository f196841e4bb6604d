use rustc_hash::{FxHashMap, FxHashSet};

use crate::collaborators::{
    CheckpointStore, MetadataCollector, NoopCheckpoints, NoopMetadata, NoopPlotLog, NoopProgress,
    PlotLog, ProgressReporter, RunMetadata,
};
use crate::config::SimulationConfig;
use crate::error::{DesimError, Result};
use crate::event::Event;
use crate::message::EventMessage;
use crate::object::{ObjectId, SendGate, SimObject};
use crate::queue::EventQueue;

/// Why the main loop stopped; mirrors `de_sim.simulator.Simulator`'s
/// termination-reason constants (spec.md §4.6 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    StopCondition,
    NoEventsRemain,
    MaxTimeExceeded,
}

impl TerminationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminationReason::StopCondition => "stop condition satisfied",
            TerminationReason::NoEventsRemain => "no events remain",
            TerminationReason::MaxTimeExceeded => "end time exceeded",
        }
    }
}

/// Returned by [`Simulator::simulate`]: the number of batches dispatched
/// (spec.md §4.6 step 4 — "may be smaller than the number of events sent,
/// because simultaneous events at one object are handled together") plus
/// why the run ended.
#[derive(Debug, Clone, Copy)]
pub struct SimulationReturn {
    pub num_handlers_called: u64,
    pub termination_reason: TerminationReason,
}

struct Slot {
    object: Box<dyn SimObject>,
    deleted: bool,
}

/// A cheap-to-clone snapshot of one object's dispatch-relevant metadata,
/// built fresh before each batch so [`SendGate`] closures never need to
/// borrow the live object table while a handler also holds `&mut` access
/// to its own slot (spec.md §5: objects reach the queue only through their
/// own `SendGate`, never the table directly).
struct ObjectMeta {
    name: String,
    class_priority: u8,
    tiebreaker: String,
    handled: FxHashSet<&'static str>,
    sent: FxHashSet<&'static str>,
}

/// Owns the object table and event queue; runs the main loop (C6,
/// spec.md §4.6). One `Simulator` per run — objects may not be shared
/// between simulators (spec.md §5).
pub struct Simulator {
    time: Option<f64>,
    time_at_prior_dispatch: f64,
    slots: Vec<Slot>,
    names: FxHashMap<String, ObjectId>,
    queue: EventQueue,
    initialized: bool,
    event_counts: FxHashMap<(&'static str, String, &'static str), u64>,
    num_handlers_called: u64,
}

impl Simulator {
    pub fn new() -> Self {
        Self {
            time: None,
            time_at_prior_dispatch: f64::NEG_INFINITY,
            slots: Vec::new(),
            names: FxHashMap::default(),
            queue: EventQueue::new(),
            initialized: false,
            event_counts: FxHashMap::default(),
            num_handlers_called: 0,
        }
    }

    /// Current simulation time; `None` until a run has started.
    pub fn time(&self) -> Option<f64> {
        self.time
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Add a simulation object, failing with `DuplicateObjectName` if the
    /// name is already in use (I1). Fails with `AlreadyInitialized` while
    /// the simulator is initialized (I3).
    pub fn add(&mut self, object: Box<dyn SimObject>) -> Result<ObjectId> {
        if self.initialized {
            return Err(DesimError::AlreadyInitialized);
        }
        let name = object.name().to_string();
        if self.names.contains_key(&name) {
            return Err(DesimError::DuplicateObjectName(name));
        }
        let id = ObjectId::new(self.slots.len() as u32);
        self.slots.push(Slot {
            object,
            deleted: false,
        });
        self.names.insert(name, id);
        Ok(id)
    }

    pub fn add_many<I>(&mut self, objects: I) -> Result<Vec<ObjectId>>
    where
        I: IntoIterator<Item = Box<dyn SimObject>>,
    {
        objects.into_iter().map(|o| self.add(o)).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn SimObject> {
        let id = *self.names.get(name)?;
        let slot = &self.slots[id.index()];
        (!slot.deleted).then(|| slot.object.as_ref())
    }

    pub fn get_id(&self, name: &str) -> Option<ObjectId> {
        self.names.get(name).copied()
    }

    /// Deterministic-order iterator over live objects, by name (spec.md §3).
    pub fn objects(&self) -> impl Iterator<Item = &'_ dyn SimObject> + '_ {
        let mut names: Vec<&String> = self.names.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(move |name| self.slots[self.names[name].index()].object.as_ref())
    }

    /// Remove an object; only legal while uninitialized (I3).
    pub fn delete(&mut self, name: &str) -> Result<()> {
        if self.initialized {
            return Err(DesimError::DeleteWhileRunning);
        }
        let id = self
            .names
            .remove(name)
            .ok_or_else(|| DesimError::UnknownObjectName(name.to_string()))?;
        self.slots[id.index()].deleted = true;
        Ok(())
    }

    /// Build a fresh metadata snapshot of every live object. Cloned strings
    /// and handler/sent-class sets are cheap relative to a batch dispatch
    /// and let `SendGate` closures avoid borrowing `self` at all.
    fn build_snapshot(&self) -> Vec<Option<ObjectMeta>> {
        self.slots
            .iter()
            .map(|slot| {
                if slot.deleted {
                    return None;
                }
                Some(ObjectMeta {
                    name: slot.object.name().to_string(),
                    class_priority: slot.object.class_priority(),
                    tiebreaker: slot.object.tiebreaker().to_string(),
                    handled: slot.object.handled_message_classes().into_iter().collect(),
                    sent: slot.object.sent_message_classes().into_iter().collect(),
                })
            })
            .collect()
    }

    /// Run each live object's `init_before_run` hook, in name-sorted order,
    /// then mark the simulator initialized and clear `event_counts`
    /// (spec.md §4.6).
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(DesimError::AlreadyInitialized);
        }
        let mut ids: Vec<ObjectId> = self.names.values().copied().collect();
        ids.sort_by_key(|id| self.slots[id.index()].object.name().to_string());

        for id in ids {
            self.init_object(id)?;
        }
        self.event_counts.clear();
        self.initialized = true;
        Ok(())
    }

    /// Detach all objects, empty the queue, clear `time`/`initialized`
    /// (spec.md §4.6).
    pub fn reset(&mut self) {
        self.slots.clear();
        self.names.clear();
        self.queue.reset();
        self.time = None;
        self.time_at_prior_dispatch = f64::NEG_INFINITY;
        self.initialized = false;
        self.event_counts.clear();
        self.num_handlers_called = 0;
    }

    /// Run `id`'s `init_before_run` hook behind a `SendGate` whose sender
    /// is `id` itself.
    fn init_object(&mut self, id: ObjectId) -> Result<()> {
        let snapshot = self.build_snapshot();
        let sender_name = snapshot[id.index()]
            .as_ref()
            .expect("sender must be live")
            .name
            .clone();
        let sender_sent_messages = snapshot[id.index()].as_ref().unwrap().sent.clone();
        let sender_time = self.slots[id.index()].object.time();

        let receiver_meta = |rid: ObjectId| -> Option<(String, u8, String)> {
            snapshot
                .get(rid.index())
                .and_then(|m| m.as_ref())
                .map(|m| (m.name.clone(), m.class_priority, m.tiebreaker.clone()))
        };
        let receiver_can_handle = |rid: ObjectId, class: &str| -> bool {
            snapshot
                .get(rid.index())
                .and_then(|m| m.as_ref())
                .map(|m| m.handled.contains(class))
                .unwrap_or(false)
        };

        let queue = &mut self.queue;
        let mut gate = SendGate {
            sender: id,
            sender_name: &sender_name,
            sender_time,
            sender_sent_messages: &sender_sent_messages,
            receiver_meta: &receiver_meta,
            receiver_can_handle: &receiver_can_handle,
            queue,
        };
        self.slots[id.index()].object.init_before_run(&mut gate)
    }

    /// Deliver one message to `receiver` behind a `SendGate` whose sender
    /// is `receiver` itself — any further sends the handler makes
    /// originate from the object currently running, not from the
    /// delivered event's original sender (spec.md §4.4).
    fn dispatch_one(&mut self, receiver: ObjectId, message: &dyn EventMessage) -> Result<()> {
        let snapshot = self.build_snapshot();
        let sender_name = snapshot[receiver.index()]
            .as_ref()
            .expect("receiver must be live")
            .name
            .clone();
        let sender_sent_messages = snapshot[receiver.index()].as_ref().unwrap().sent.clone();
        let sender_time = self.slots[receiver.index()].object.time();

        let receiver_meta = |rid: ObjectId| -> Option<(String, u8, String)> {
            snapshot
                .get(rid.index())
                .and_then(|m| m.as_ref())
                .map(|m| (m.name.clone(), m.class_priority, m.tiebreaker.clone()))
        };
        let receiver_can_handle = |rid: ObjectId, class: &str| -> bool {
            snapshot
                .get(rid.index())
                .and_then(|m| m.as_ref())
                .map(|m| m.handled.contains(class))
                .unwrap_or(false)
        };

        let queue = &mut self.queue;
        let mut gate = SendGate {
            sender: receiver,
            sender_name: &sender_name,
            sender_time,
            sender_sent_messages: &sender_sent_messages,
            receiver_meta: &receiver_meta,
            receiver_can_handle: &receiver_can_handle,
            queue,
        };
        self.slots[receiver.index()].object.dispatch(message, &mut gate)
    }

    /// Run the main loop per spec.md §4.6: repeatedly pull the next
    /// co-receiver co-timed batch from the queue, advance `time`, dispatch.
    /// Terminates on an exhausted queue, `max_time` exceeded, or the
    /// config's `stop_condition`.
    pub fn simulate(&mut self, config: &SimulationConfig) -> Result<SimulationReturn> {
        self.simulate_with(
            config,
            &mut NoopProgress,
            &mut NoopMetadata,
            &NoopCheckpoints,
            &mut NoopPlotLog,
        )
    }

    /// Alias for [`Simulator::simulate`] (spec.md §4.6 `run(...)`).
    pub fn run(&mut self, config: &SimulationConfig) -> Result<SimulationReturn> {
        self.simulate(config)
    }

    /// Full-collaborator entry point: same main loop, but drives the
    /// progress/metadata/checkpoint/plot-log collaborators spec.md §4.6
    /// names at their documented call points.
    pub fn simulate_with(
        &mut self,
        config: &SimulationConfig,
        progress: &mut dyn ProgressReporter,
        metadata: &mut dyn MetadataCollector,
        _checkpoints: &dyn CheckpointStore,
        plot_log: &mut dyn PlotLog,
    ) -> Result<SimulationReturn> {
        config.validate()?;
        if !self.initialized {
            return Err(DesimError::NotInitialized);
        }
        if self.names.is_empty() {
            return Err(DesimError::NoObjects);
        }
        if self.queue.is_empty() {
            return Err(DesimError::NoInitialEvents);
        }

        let first_time = self.queue.peek_time();
        if first_time < config.time_init {
            return Err(DesimError::SimulationAborted(format!(
                "time of first event ({first_time}) is earlier than time_init ({})",
                config.time_init
            )));
        }

        self.time = Some(config.time_init);
        self.time_at_prior_dispatch = config.time_init;
        self.num_handlers_called = 0;

        progress.start(config.max_time);
        let mut run_metadata = RunMetadata::default();
        metadata.record_start(&mut run_metadata);
        plot_log.log_line(&format!("# simulation to {}", config.max_time));

        log::debug!("simulation to {} starting", config.max_time);

        let reason = loop {
            let now = self.time.expect("time set above");

            if let Some(stop) = &config.stop_condition {
                if stop(now) {
                    break TerminationReason::StopCondition;
                }
            }

            let next_time = self.queue.peek_time();
            if next_time.is_infinite() {
                break TerminationReason::NoEventsRemain;
            }
            if next_time > config.max_time {
                break TerminationReason::MaxTimeExceeded;
            }

            let receiver = self
                .queue
                .peek_receiver()
                .expect("peek_time finite implies a root event");

            if next_time < self.time_at_prior_dispatch {
                return Err(DesimError::RetroactiveDispatch {
                    current: self.time_at_prior_dispatch,
                    requested: next_time,
                });
            }
            self.time = Some(next_time);

            let receiver_time = self.slots[receiver.index()].object.time();
            if next_time < receiver_time {
                return Err(DesimError::SimulationAborted(format!(
                    "dispatching '{}': event time ({next_time}) < object time ({receiver_time})",
                    self.slots[receiver.index()].object.name()
                )));
            }
            self.slots[receiver.index()].object.set_time(next_time);

            log::debug!(
                "running '{}' at {next_time}",
                self.slots[receiver.index()].object.name()
            );

            let batch = {
                let slots = &self.slots;
                self.queue
                    .next_batch(|message_class| {
                        slots[receiver.index()]
                            .object
                            .handler_priority(message_class)
                            .unwrap_or(u32::MAX)
                    })
                    .expect("peek_time finite implies a non-empty batch")
            };

            let receiver_class = self.slots[receiver.index()].object.class_name();
            let receiver_name = self.slots[receiver.index()].object.name().to_string();
            for event in &batch {
                *self
                    .event_counts
                    .entry((
                        receiver_class,
                        receiver_name.clone(),
                        event.message.class_name(),
                    ))
                    .or_insert(0) += 1;
            }

            self.dispatch_batch(receiver, &batch)?;
            self.time_at_prior_dispatch = next_time;
            self.num_handlers_called += 1;
            progress.update(next_time);
        };

        progress.end();
        metadata.record_run_time(&mut run_metadata, 0.0);
        log::debug!("simulation ended: {}", reason.as_str());

        Ok(SimulationReturn {
            num_handlers_called: self.num_handlers_called,
            termination_reason: reason,
        })
    }

    /// Dispatch one co-receiver batch (spec.md §4.4: "for each event in
    /// order looks up the registered handler ... and invokes it"). Every
    /// event in the batch is delivered through a `SendGate` whose sender is
    /// `receiver` itself — any further sends a handler makes originate from
    /// the object currently running, not from the delivered event's
    /// original sender (which is retained on `Event` only for rendering).
    fn dispatch_batch(&mut self, receiver: ObjectId, batch: &[Event]) -> Result<()> {
        for event in batch {
            self.dispatch_one(receiver, event.message.as_ref())?;
        }
        self.slots[receiver.index()].object.record_batch();
        Ok(())
    }

    /// Human-readable per-object queue rendering (spec.md §4.6
    /// `message_queues`).
    pub fn message_queues(&self) -> String {
        let now = match self.time {
            Some(t) => format!("{t:.3}"),
            None => "'uninitialized'".to_string(),
        };
        let mut lines = vec![format!("Event queues at {now}")];
        let mut names: Vec<&String> = self.names.keys().collect();
        names.sort();
        for name in names {
            let id = self.names[name];
            lines.push(format!("{name}:"));
            let rendered = self
                .queue
                .render(Some(id), Some(3), |oid| self.slots[oid.index()].object.name().to_string());
            lines.push(rendered);
            lines.push(String::new());
        }
        lines.join("\n")
    }

    /// `(receiver class, receiver name, message class) -> count`, sorted by
    /// count descending (spec.md §4.6 `provide_event_counts`).
    pub fn provide_event_counts(&self) -> Vec<(&'static str, String, &'static str, u64)> {
        let mut rows: Vec<(&'static str, String, &'static str, u64)> = self
            .event_counts
            .iter()
            .map(|((class, name, msg), count)| (*class, name.clone(), *msg, *count))
            .collect();
        rows.sort_by(|a, b| b.3.cmp(&a.3));
        rows
    }

    /// Seed an initial event directly, bypassing `send_event`'s sender/
    /// receiver registration checks. Intended for tests and for host code
    /// that wants to inject the very first event(s) before `initialize()`
    /// runs `init_before_run` hooks.
    pub fn schedule_initial(
        &mut self,
        event_time: f64,
        sender: &str,
        receiver: &str,
        message: Box<dyn EventMessage>,
    ) -> Result<()> {
        let sender_id = self
            .get_id(sender)
            .ok_or_else(|| DesimError::UnknownObjectName(sender.to_string()))?;
        let receiver_id = self
            .get_id(receiver)
            .ok_or_else(|| DesimError::UnknownObjectName(receiver.to_string()))?;
        let receiver_slot = &self.slots[receiver_id.index()];
        let priority = receiver_slot.object.class_priority();
        let tiebreaker = receiver_slot.object.tiebreaker().to_string();
        self.queue
            .schedule(0.0, event_time, sender_id, receiver_id, priority, tiebreaker, message)
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}
