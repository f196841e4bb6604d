use downcast_rs::{impl_downcast, Downcast};
use rustc_hash::FxHashSet;

use crate::error::{DesimError, Result};
use crate::event::Event;
use crate::message::EventMessage;
use crate::queue::EventQueue;

/// An arena index into the simulator's object table. Events store this
/// instead of an owning reference, per spec.md §9: it keeps the heap
/// comparator cheap and sidesteps cyclic ownership between objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A user-subclassable unit of simulation state. `name`/`tiebreaker`/
/// `class_priority` and the handler/sent-message tables are per-class
/// metadata (see [`crate::registry::ClassDescriptor`]); `time` and
/// `get_state` are per-instance.
///
/// Implementations typically hold a `'static` [`crate::registry::ClassDescriptor`]
/// behind a `OnceLock` and delegate `dispatch`/`handler_priority`/`sends`/
/// `handled_message_classes`/`sent_message_classes` to the
/// `*_via_descriptor` helpers in [`crate::registry`].
pub trait SimObject: Downcast {
    /// Unique instance name (I1).
    fn name(&self) -> &str;

    /// Per-instance tiebreaker; defaults to `name()` (spec.md §3).
    fn tiebreaker(&self) -> &str {
        self.name()
    }

    /// The Rust type name standing in for `de_sim`'s "class name" in the
    /// `(class, object, message)` event-count key (spec.md §4.6).
    fn class_name(&self) -> &'static str;

    /// Smaller sorts first; default LOW = 9, valid range 1..=9.
    fn class_priority(&self) -> u8;

    /// Override the class priority read by [`SimObject::class_priority`]
    /// (spec.md §4.4 `set_class_priority`). Implementations that want this
    /// to take effect must store the override in an instance field and
    /// return it from `class_priority()`; the default here is a no-op for
    /// objects that don't support runtime overrides.
    fn set_class_priority(&mut self, _priority: u8) {}

    /// Current local simulated time, set only by the simulator during
    /// dispatch (spec.md §3, §4.4).
    fn time(&self) -> f64;
    fn set_time(&mut self, time: f64);

    /// Handler priority (lower runs first within a batch) for a message
    /// class this object can receive, or `None` if it has no handler.
    fn handler_priority(&self, message_class: &str) -> Option<u32>;

    /// Message classes this object has a registered handler for.
    fn handled_message_classes(&self) -> Vec<&'static str>;

    /// Message classes this object is registered to send.
    fn sent_message_classes(&self) -> Vec<&'static str>;

    /// Does this object have a handler for `message_class`?
    fn sends(&self, message_class: &str) -> bool {
        self.sent_message_classes().contains(&message_class)
    }

    /// One-shot hook invoked by `Simulator::initialize` in name-sorted
    /// order; typically schedules the object's first self-event.
    fn init_before_run(&mut self, _gate: &mut SendGate) -> Result<()> {
        Ok(())
    }

    /// Invoked once per event in a batch, in priority order. Implementations
    /// look up the concrete handler for `message.class_name()` and run it.
    fn dispatch(&mut self, message: &dyn EventMessage, gate: &mut SendGate) -> Result<()>;

    /// Called once per dispatched batch, after all events in it have run.
    /// Implementations that track `num_events_handled` (spec.md §3, §4.4)
    /// should increment their counter here.
    fn record_batch(&mut self) {}

    /// Number of batches dispatched to this object so far (spec.md §3's
    /// `num_events_handled` attribute). Defaults to 0 for implementations
    /// that don't track it; implementations that care should hold a counter
    /// field, increment it in `record_batch`, and return it here.
    fn num_events_handled(&self) -> u64 {
        0
    }

    /// Optional opaque snapshot consumed only by an external checkpoint
    /// collaborator; the core never interprets it (spec.md §4.4).
    fn get_state(&self) -> String {
        String::new()
    }
}
impl_downcast!(SimObject);

/// The only way a [`SimObject`] may enqueue new events: a capability handle
/// constructed by the simulator for the duration of one dispatch, exposing
/// `send_event`/`send_event_absolute` without direct queue access
/// (spec.md §5: "Objects see the queue only through send_event on
/// themselves").
pub struct SendGate<'a> {
    pub(crate) sender: ObjectId,
    pub(crate) sender_name: &'a str,
    pub(crate) sender_time: f64,
    pub(crate) sender_sent_messages: &'a FxHashSet<&'static str>,
    pub(crate) receiver_meta: &'a dyn Fn(ObjectId) -> Option<(String, u8, String)>,
    pub(crate) receiver_can_handle: &'a dyn Fn(ObjectId, &str) -> bool,
    pub(crate) queue: &'a mut EventQueue,
}

impl<'a> SendGate<'a> {
    /// Schedule `message` for delivery `delay` time units from now
    /// (spec.md §4.4).
    pub fn send_event(
        &mut self,
        delay: f64,
        receiver: ObjectId,
        message: Box<dyn EventMessage>,
        copy: bool,
    ) -> Result<()> {
        if delay.is_nan() {
            return Err(DesimError::NaNDelay);
        }
        if delay < 0.0 {
            return Err(DesimError::NegativeDelay(delay));
        }
        self.send_event_absolute(self.sender_time + delay, receiver, message, copy)
    }

    /// As [`SendGate::send_event`] but with an absolute event time; fails
    /// with `RetroactiveSend` if it precedes the sender's current time
    /// (spec.md §4.4).
    pub fn send_event_absolute(
        &mut self,
        event_time: f64,
        receiver: ObjectId,
        message: Box<dyn EventMessage>,
        copy: bool,
    ) -> Result<()> {
        if event_time.is_nan() {
            return Err(DesimError::NaNTime);
        }
        if event_time < self.sender_time {
            let (receiver_name, _, _) = (self.receiver_meta)(receiver).unwrap_or_default();
            return Err(DesimError::RetroactiveSend {
                sender: self.sender_name.to_string(),
                receiver: receiver_name,
                current: self.sender_time,
                requested: event_time,
            });
        }

        let class = message.class_name();
        if !self.sender_sent_messages.contains(class) {
            return Err(DesimError::NotRegisteredSender {
                sender: self.sender_name.to_string(),
                message: class,
            });
        }

        let (receiver_name, receiver_priority, receiver_tiebreaker) = (self.receiver_meta)(receiver)
            .ok_or_else(|| DesimError::UnknownObjectName(format!("<object #{}>", receiver.0)))?;

        if !(self.receiver_can_handle)(receiver, class) {
            return Err(DesimError::NotRegisteredReceiver {
                receiver: receiver_name,
                message: class,
            });
        }

        let payload = if copy {
            dyn_clone::clone_box(message.as_ref())
        } else {
            message
        };

        self.queue.schedule(
            self.sender_time,
            event_time,
            self.sender,
            receiver,
            receiver_priority,
            receiver_tiebreaker,
            payload,
        )
    }

    pub fn sender(&self) -> ObjectId {
        self.sender
    }

    pub fn sender_time(&self) -> f64 {
        self.sender_time
    }
}

/// Pops a non-empty batch's events into the receiver's view; exposed so
/// simulator code can build and hand over `&[Event]` without re-exporting
/// queue internals.
pub type Batch = Vec<Event>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::FieldValue;
    use rustc_hash::FxHashSet;

    #[derive(Debug, Clone)]
    struct Ping;
    impl EventMessage for Ping {
        fn class_name(&self) -> &'static str {
            "Ping"
        }
        fn header(&self) -> &'static [&'static str] {
            &[]
        }
        fn field_values(&self) -> Vec<FieldValue> {
            Vec::new()
        }
    }

    fn known_receiver(_: ObjectId) -> Option<(String, u8, String)> {
        Some(("other".to_string(), 9, "other".to_string()))
    }

    fn can_handle_true(_: ObjectId, _: &str) -> bool {
        true
    }

    fn can_handle_false(_: ObjectId, _: &str) -> bool {
        false
    }

    #[test]
    fn rejects_nan_delay() {
        let mut queue = EventQueue::new();
        let mut sent = FxHashSet::default();
        sent.insert("Ping");
        let mut gate = SendGate {
            sender: ObjectId::new(0),
            sender_name: "self",
            sender_time: 3.0,
            sender_sent_messages: &sent,
            receiver_meta: &known_receiver,
            receiver_can_handle: &can_handle_true,
            queue: &mut queue,
        };
        let result = gate.send_event(f64::NAN, ObjectId::new(1), Box::new(Ping), false);
        assert!(matches!(result, Err(DesimError::NaNDelay)));
        assert!(gate.queue.is_empty());
    }

    #[test]
    fn rejects_negative_delay() {
        let mut queue = EventQueue::new();
        let mut sent = FxHashSet::default();
        sent.insert("Ping");
        let mut gate = SendGate {
            sender: ObjectId::new(0),
            sender_name: "self",
            sender_time: 3.0,
            sender_sent_messages: &sent,
            receiver_meta: &known_receiver,
            receiver_can_handle: &can_handle_true,
            queue: &mut queue,
        };
        let result = gate.send_event(-1.0, ObjectId::new(1), Box::new(Ping), false);
        assert!(matches!(result, Err(DesimError::NegativeDelay(_))));
    }

    #[test]
    fn rejects_retroactive_absolute_send() {
        let mut queue = EventQueue::new();
        let mut sent = FxHashSet::default();
        sent.insert("Ping");
        let mut gate = SendGate {
            sender: ObjectId::new(0),
            sender_name: "self",
            sender_time: 3.0,
            sender_sent_messages: &sent,
            receiver_meta: &known_receiver,
            receiver_can_handle: &can_handle_true,
            queue: &mut queue,
        };
        let result = gate.send_event_absolute(2.5, ObjectId::new(1), Box::new(Ping), false);
        assert!(matches!(result, Err(DesimError::RetroactiveSend { .. })));
        assert!(gate.queue.is_empty());
    }

    #[test]
    fn rejects_unregistered_sender() {
        let mut queue = EventQueue::new();
        let sent = FxHashSet::default();
        let mut gate = SendGate {
            sender: ObjectId::new(0),
            sender_name: "self",
            sender_time: 0.0,
            sender_sent_messages: &sent,
            receiver_meta: &known_receiver,
            receiver_can_handle: &can_handle_true,
            queue: &mut queue,
        };
        let result = gate.send_event(1.0, ObjectId::new(1), Box::new(Ping), false);
        assert!(matches!(result, Err(DesimError::NotRegisteredSender { .. })));
    }

    #[test]
    fn rejects_unregistered_receiver() {
        let mut queue = EventQueue::new();
        let mut sent = FxHashSet::default();
        sent.insert("Ping");
        let mut gate = SendGate {
            sender: ObjectId::new(0),
            sender_name: "self",
            sender_time: 0.0,
            sender_sent_messages: &sent,
            receiver_meta: &known_receiver,
            receiver_can_handle: &can_handle_false,
            queue: &mut queue,
        };
        let result = gate.send_event(1.0, ObjectId::new(1), Box::new(Ping), false);
        assert!(matches!(result, Err(DesimError::NotRegisteredReceiver { .. })));
    }

    #[test]
    fn accepts_valid_send_and_schedules() {
        let mut queue = EventQueue::new();
        let mut sent = FxHashSet::default();
        sent.insert("Ping");
        let mut gate = SendGate {
            sender: ObjectId::new(0),
            sender_name: "self",
            sender_time: 1.0,
            sender_sent_messages: &sent,
            receiver_meta: &known_receiver,
            receiver_can_handle: &can_handle_true,
            queue: &mut queue,
        };
        gate.send_event(2.0, ObjectId::new(1), Box::new(Ping), false).unwrap();
        assert_eq!(gate.queue.len(), 1);
    }
}
