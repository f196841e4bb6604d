use std::cmp::Ordering;

use crate::message::EventMessage;
use crate::object::ObjectId;

/// An immutable scheduled delivery. Comparison uses only the order key
/// `(event_time, receiver.class_priority, receiver.tiebreaker, insertion_seq)`
/// — never the message — so the queue's comparator stays payload-independent
/// (spec.md §4.2, §9).
#[derive(Debug)]
pub struct Event {
    pub send_time: f64,
    pub event_time: f64,
    pub sender: ObjectId,
    pub receiver: ObjectId,
    pub message: Box<dyn EventMessage>,
    pub(crate) receiver_class_priority: u8,
    pub(crate) receiver_tiebreaker: String,
    pub(crate) insertion_seq: u64,
}

impl Event {
    pub(crate) fn new(
        send_time: f64,
        event_time: f64,
        sender: ObjectId,
        receiver: ObjectId,
        message: Box<dyn EventMessage>,
        receiver_class_priority: u8,
        receiver_tiebreaker: String,
        insertion_seq: u64,
    ) -> Self {
        Self {
            send_time,
            event_time,
            sender,
            receiver,
            message,
            receiver_class_priority,
            receiver_tiebreaker,
            insertion_seq,
        }
    }

    /// Render one row for a human-readable queue table. `round_to`, if set,
    /// rounds both times to that many decimal places (spec.md §4.2 "render
    /// ... with optional rounding"); omitted, times print at full precision.
    pub fn render(&self, sender_name: &str, receiver_name: &str, round_to: Option<usize>) -> String {
        let fields: Vec<String> = self
            .message
            .field_values()
            .iter()
            .map(|v| format!("{v:?}"))
            .collect();
        let precision = round_to.unwrap_or(6);
        format!(
            "{:.precision$}\t{:.precision$}\t{}\t{}\t{}\t{}",
            self.send_time,
            self.event_time,
            sender_name,
            receiver_name,
            self.message.class_name(),
            fields.join("\t"),
        )
    }
}

impl Clone for Event {
    fn clone(&self) -> Self {
        Self {
            send_time: self.send_time,
            event_time: self.event_time,
            sender: self.sender,
            receiver: self.receiver,
            message: dyn_clone::clone_box(self.message.as_ref()),
            receiver_class_priority: self.receiver_class_priority,
            receiver_tiebreaker: self.receiver_tiebreaker.clone(),
            insertion_seq: self.insertion_seq,
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        self.event_time
            .total_cmp(&other.event_time)
            .then_with(|| self.receiver_class_priority.cmp(&other.receiver_class_priority))
            .then_with(|| self.receiver_tiebreaker.cmp(&other.receiver_tiebreaker))
            .then_with(|| self.insertion_seq.cmp(&other.insertion_seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::FieldValue;

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

    fn event(event_time: f64, priority: u8, tiebreaker: &str, seq: u64) -> Event {
        Event::new(
            0.0,
            event_time,
            ObjectId::new(0),
            ObjectId::new(1),
            Box::new(Ping),
            priority,
            tiebreaker.to_string(),
            seq,
        )
    }

    #[test]
    fn orders_by_event_time_first() {
        let earlier = event(1.0, 9, "z", 5);
        let later = event(2.0, 1, "a", 0);
        assert!(earlier < later);
    }

    #[test]
    fn ties_on_time_broken_by_class_priority() {
        let high = event(1.0, 1, "z", 5);
        let low = event(1.0, 9, "a", 0);
        assert!(high < low);
    }

    #[test]
    fn ties_on_priority_broken_by_tiebreaker() {
        let alpha = event(1.0, 5, "alpha", 9);
        let beta = event(1.0, 5, "beta", 0);
        assert!(alpha < beta);
    }

    #[test]
    fn full_ties_broken_by_insertion_sequence() {
        let first = event(1.0, 5, "alpha", 0);
        let second = event(1.0, 5, "alpha", 1);
        assert!(first < second);
    }

    #[test]
    fn render_honors_optional_rounding() {
        let e = event(1.23456789, 5, "a", 0);
        assert!(e.render("sender", "receiver", None).starts_with("0.000000\t1.234568"));
        assert!(e.render("sender", "receiver", Some(2)).starts_with("0.00\t1.23"));
    }
}
