use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::{DesimError, Result};
use crate::event::Event;
use crate::message::{compare_messages, EventMessage};
use crate::object::ObjectId;

/// A binary min-heap of pending events, ordered by the composite key in
/// spec.md §3/§4.2. `next_batch` is the "superposition protocol" (spec.md
/// §1, §4.3): it hands back every event simultaneously bound for one
/// receiver as a single sorted list, rather than dispatching them one at a
/// time.
pub struct EventQueue {
    heap: BinaryHeap<Reverse<Event>>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Push a new event. `O(log n)`. Fails with `NaNTime` or `InvalidTime`
    /// before touching the heap (spec.md §4.3).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn schedule(
        &mut self,
        send_time: f64,
        event_time: f64,
        sender: ObjectId,
        receiver: ObjectId,
        receiver_class_priority: u8,
        receiver_tiebreaker: String,
        message: Box<dyn EventMessage>,
    ) -> Result<()> {
        if send_time.is_nan() || event_time.is_nan() {
            return Err(DesimError::NaNTime);
        }
        if event_time < send_time {
            return Err(DesimError::InvalidTime {
                send_time,
                event_time,
            });
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Event::new(
            send_time,
            event_time,
            sender,
            receiver,
            message,
            receiver_class_priority,
            receiver_tiebreaker,
            seq,
        )));
        Ok(())
    }

    /// The minimum order key's `event_time`, or `+inf` when empty.
    pub fn peek_time(&self) -> f64 {
        self.heap.peek().map(|Reverse(e)| e.event_time).unwrap_or(f64::INFINITY)
    }

    /// The receiver of the root event, if any.
    pub fn peek_receiver(&self) -> Option<ObjectId> {
        self.heap.peek().map(|Reverse(e)| e.receiver)
    }

    /// Pop every event sharing the root's `(receiver, event_time)`. When the
    /// batch has more than one event, sorts it by
    /// `(handler_priority(message.class_name()), message)` — the handler
    /// priority lookup is supplied by the caller (the simulator, which owns
    /// the object table) so the queue itself never needs to know about
    /// [`crate::object::SimObject`] (spec.md §4.3's "peek does not sort by
    /// message" rationale — sorting happens only after popping).
    pub fn next_batch<F>(&mut self, handler_priority: F) -> Option<Vec<Event>>
    where
        F: Fn(&str) -> u32,
    {
        let Reverse(first) = self.heap.pop()?;
        let receiver = first.receiver;
        let event_time = first.event_time;
        let mut batch = vec![first];

        while let Some(Reverse(top)) = self.heap.peek() {
            if top.receiver == receiver && top.event_time == event_time {
                let Reverse(next) = self.heap.pop().expect("just peeked");
                batch.push(next);
            } else {
                break;
            }
        }

        if batch.len() > 1 {
            batch.sort_by(|a, b| {
                let pa = handler_priority(a.message.class_name());
                let pb = handler_priority(b.message.class_name());
                pa.cmp(&pb).then_with(|| compare_messages(a.message.as_ref(), b.message.as_ref()))
            });
        }

        Some(batch)
    }

    pub fn reset(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Human-readable table of pending events sorted by order key, optionally
    /// filtered to one receiver (spec.md §4.3). `round_to` is forwarded to
    /// [`Event::render`].
    pub fn render<F>(&self, filter_receiver: Option<ObjectId>, round_to: Option<usize>, name_of: F) -> String
    where
        F: Fn(ObjectId) -> String,
    {
        let mut events: Vec<&Event> = self
            .heap
            .iter()
            .map(|Reverse(e)| e)
            .filter(|e| filter_receiver.map(|r| r == e.receiver).unwrap_or(true))
            .collect();
        events.sort();

        const GENERIC_HEADER: &str = "t(send)\tt(event)\tSender\tReceiver\tEvent type\tfields";
        let header = match events.first() {
            None => GENERIC_HEADER.to_string(),
            Some(first) => {
                let class = first.message.class_name();
                let single_type = events.iter().all(|e| e.message.class_name() == class);
                if single_type {
                    let fields = first.message.header();
                    if fields.is_empty() {
                        "t(send)\tt(event)\tSender\tReceiver\tEvent type".to_string()
                    } else {
                        format!("t(send)\tt(event)\tSender\tReceiver\tEvent type\t{}", fields.join("\t"))
                    }
                } else {
                    GENERIC_HEADER.to_string()
                }
            }
        };

        let mut lines = vec![header];
        for event in events {
            lines.push(event.render(&name_of(event.sender), &name_of(event.receiver), round_to));
        }
        lines.join("\n")
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
