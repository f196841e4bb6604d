use thiserror::Error;

/// Every failure mode the engine can surface, from message construction
/// through class registration to the simulator's main loop.
#[derive(Debug, Error)]
pub enum DesimError {
    #[error("event time {event_time} is before send time {send_time}")]
    InvalidTime { send_time: f64, event_time: f64 },
    #[error("NaN is not a valid simulation time")]
    NaNTime,
    #[error("delay must be non-negative, got {0}")]
    NegativeDelay(f64),
    #[error("NaN is not a valid delay")]
    NaNDelay,
    #[error("'{receiver}' is at time {current} but '{sender}' sent an event for time {requested}")]
    RetroactiveSend {
        sender: String,
        receiver: String,
        current: f64,
        requested: f64,
    },
    #[error("dispatch at time {requested} is before the simulator's prior dispatch time {current}")]
    RetroactiveDispatch { current: f64, requested: f64 },
    #[error("'{sender}' does not declare '{message}' in its sent-message set")]
    NotRegisteredSender { sender: String, message: &'static str },
    #[error("'{receiver}' has no registered handler for '{message}'")]
    NotRegisteredReceiver {
        receiver: String,
        message: &'static str,
    },
    #[error("value is not a registered event message type")]
    BadMessage,
    #[error("message '{class}' expects {expected} field(s), got {actual}")]
    BadArity {
        class: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("message class '{0}' is registered as a handler more than once")]
    DuplicateHandler(&'static str),
    #[error("handler for '{0}' is not callable")]
    HandlerNotCallable(&'static str),
    #[error("'{0}' is not an event message type")]
    NotAMessage(&'static str),
    #[error("class priority must be an integer in 1..=9, got {0}")]
    BadPriorityType(i64),
    #[error("message '{class}' declares field '{field}' more than once")]
    DuplicateField {
        class: &'static str,
        field: &'static str,
    },
    #[error("an object named '{0}' is already registered")]
    DuplicateObjectName(String),
    #[error("no object named '{0}' is registered")]
    UnknownObjectName(String),
    #[error("neither event_handlers nor messages_sent is declared, and none is inherited")]
    MissingClassMetadata,
    #[error("simulator has not been initialized")]
    NotInitialized,
    #[error("simulator is already initialized")]
    AlreadyInitialized,
    #[error("simulator has no registered objects")]
    NoObjects,
    #[error("simulator has no initial events scheduled")]
    NoInitialEvents,
    #[error("cannot delete an object while the simulator is initialized")]
    DeleteWhileRunning,
    #[error("simulation aborted: {0}")]
    SimulationAborted(String),
    #[error("configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, DesimError>;
