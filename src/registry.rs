use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{DesimError, Result};
use crate::message::EventMessage;
use crate::object::SendGate;

/// Named class-priority constants mirroring `de_sim`'s `SimObjClassPriority`
/// IntEnum (smaller sorts first; default LOW/NINTH if a class declares
/// none).
pub struct ClassPriority;

impl ClassPriority {
    pub const HIGH: u8 = 1;
    pub const MEDIUM: u8 = 5;
    pub const LOW: u8 = 9;

    pub const FIRST: u8 = 1;
    pub const SECOND: u8 = 2;
    pub const THIRD: u8 = 3;
    pub const FOURTH: u8 = 4;
    pub const FIFTH: u8 = 5;
    pub const SIXTH: u8 = 6;
    pub const SEVENTH: u8 = 7;
    pub const EIGHTH: u8 = 8;
    pub const NINTH: u8 = 9;

    /// Assign `n` classes strictly decreasing priority, highest first.
    /// Fails if `n` does not fit in the 1..=9 range.
    pub fn assign_decreasing(n: usize) -> Result<Vec<u8>> {
        if n == 0 || n > 9 {
            return Err(DesimError::BadPriorityType(n as i64));
        }
        Ok((1..=n as u8).collect())
    }
}

/// A handler registered for one message class: its position-assigned
/// priority (spec.md §4.5 step 2) and the function to invoke.
pub type HandlerFn<O> = fn(&mut O, &dyn EventMessage, &mut SendGate) -> Result<()>;

/// Per-type resolved metadata, the Rust stand-in for the class-construction
/// metaclass hook in `de_sim` (spec.md §9): built once via
/// [`ClassDescriptorBuilder`] and stored behind a `static OnceLock` in each
/// concrete [`crate::object::SimObject`] implementation.
pub struct ClassDescriptor<O> {
    handlers: FxHashMap<&'static str, (u32, HandlerFn<O>)>,
    sent_messages: FxHashSet<&'static str>,
    class_priority: u8,
}

impl<O> ClassDescriptor<O> {
    pub fn class_priority(&self) -> u8 {
        self.class_priority
    }

    pub fn handler_priority(&self, message_class: &str) -> Option<u32> {
        self.handlers.get(message_class).map(|(priority, _)| *priority)
    }

    pub fn handled_message_classes(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }

    pub fn sent_message_classes(&self) -> Vec<&'static str> {
        self.sent_messages.iter().copied().collect()
    }

    pub fn handler_for(&self, message_class: &str) -> Option<HandlerFn<O>> {
        self.handlers.get(message_class).map(|(_, f)| *f)
    }
}

/// Builds a [`ClassDescriptor`], validating it the way `de_sim`'s
/// `ApplicationSimulationObjMeta.__new__` validates `event_handlers` /
/// `messages_sent` / `class_priority` at class-construction time
/// (spec.md §4.5).
pub struct ClassDescriptorBuilder<O> {
    handlers: Vec<(&'static str, HandlerFn<O>)>,
    sent_messages: FxHashSet<&'static str>,
    class_priority: u8,
    abstract_class: bool,
}

impl<O> ClassDescriptorBuilder<O> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            sent_messages: FxHashSet::default(),
            class_priority: ClassPriority::LOW,
            abstract_class: false,
        }
    }

    /// Register a handler for `message_class`. Position determines handler
    /// priority: the first call is priority 0, the second is 1, and so on.
    pub fn handler(mut self, message_class: &'static str, f: HandlerFn<O>) -> Self {
        self.handlers.push((message_class, f));
        self
    }

    pub fn sends(mut self, message_class: &'static str) -> Self {
        self.sent_messages.insert(message_class);
        self
    }

    pub fn class_priority(mut self, priority: u8) -> Self {
        self.class_priority = priority;
        self
    }

    /// Skip the "at least one of handlers/sent_messages" validation — for
    /// base classes meant only to be inherited from (spec.md §4.5 step 5).
    pub fn abstract_class(mut self) -> Self {
        self.abstract_class = true;
        self
    }

    pub fn build(self) -> Result<ClassDescriptor<O>> {
        if !(1..=9).contains(&self.class_priority) {
            return Err(DesimError::BadPriorityType(self.class_priority as i64));
        }

        let mut handlers = FxHashMap::default();
        for (index, (message_class, f)) in self.handlers.into_iter().enumerate() {
            if handlers.contains_key(message_class) {
                return Err(DesimError::DuplicateHandler(message_class));
            }
            handlers.insert(message_class, (index as u32, f));
        }

        if !self.abstract_class && handlers.is_empty() && self.sent_messages.is_empty() {
            return Err(DesimError::MissingClassMetadata);
        }

        Ok(ClassDescriptor {
            handlers,
            sent_messages: self.sent_messages,
            class_priority: self.class_priority,
        })
    }
}

impl<O> Default for ClassDescriptorBuilder<O> {
    fn default() -> Self {
        Self::new()
    }
}

/// Look up and invoke the registered handler for `message`'s class on
/// `object`. Concrete [`crate::object::SimObject`] implementations call this
/// from their `dispatch` method with their own static descriptor — the
/// trait can't provide a default body because the descriptor lives outside
/// `self` (a `static`, not an instance field).
pub fn dispatch_via_descriptor<O>(
    object: &mut O,
    descriptor: &ClassDescriptor<O>,
    object_name: &str,
    message: &dyn EventMessage,
    gate: &mut SendGate,
) -> Result<()> {
    let class = message.class_name();
    match descriptor.handler_for(class) {
        Some(handler) => handler(object, message, gate),
        None => Err(DesimError::NotRegisteredReceiver {
            receiver: object_name.to_string(),
            message: class,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        total: i64,
    }

    fn handle_increment(obj: &mut Counter, _msg: &dyn EventMessage, _gate: &mut SendGate) -> Result<()> {
        obj.total += 1;
        Ok(())
    }

    fn handle_double(obj: &mut Counter, _msg: &dyn EventMessage, _gate: &mut SendGate) -> Result<()> {
        obj.total *= 2;
        Ok(())
    }

    #[test]
    fn assigns_priority_by_declaration_order() {
        let descriptor: ClassDescriptor<Counter> = ClassDescriptorBuilder::new()
            .handler("Increment", handle_increment)
            .handler("Double", handle_double)
            .sends("Increment")
            .build()
            .unwrap();
        assert_eq!(descriptor.handler_priority("Increment"), Some(0));
        assert_eq!(descriptor.handler_priority("Double"), Some(1));
    }

    #[test]
    fn rejects_duplicate_handler_registration() {
        let result: Result<ClassDescriptor<Counter>> = ClassDescriptorBuilder::new()
            .handler("Increment", handle_increment)
            .handler("Increment", handle_increment)
            .build();
        assert!(matches!(result, Err(DesimError::DuplicateHandler("Increment"))));
    }

    #[test]
    fn rejects_out_of_range_class_priority() {
        let result: Result<ClassDescriptor<Counter>> = ClassDescriptorBuilder::new()
            .handler("Increment", handle_increment)
            .class_priority(0)
            .build();
        assert!(matches!(result, Err(DesimError::BadPriorityType(0))));
    }

    #[test]
    fn requires_handlers_or_sent_messages_unless_abstract() {
        let result: Result<ClassDescriptor<Counter>> = ClassDescriptorBuilder::new().build();
        assert!(matches!(result, Err(DesimError::MissingClassMetadata)));

        let abstract_ok: Result<ClassDescriptor<Counter>> =
            ClassDescriptorBuilder::new().abstract_class().build();
        assert!(abstract_ok.is_ok());
    }

    #[test]
    fn assign_decreasing_rejects_out_of_range_counts() {
        assert!(ClassPriority::assign_decreasing(0).is_err());
        assert!(ClassPriority::assign_decreasing(10).is_err());
        assert_eq!(ClassPriority::assign_decreasing(3).unwrap(), vec![1, 2, 3]);
    }
}
