use thiserror::Error;

#[derive(Debug, Error)]
pub enum TbError {
    #[error("no simulator installed on this thread")]
    NoSimulator,
    #[error("could not get object with name '{0}'")]
    UnknownObject(String),
    #[error("object '{0}' has no value")]
    NoValue(String),
    #[error("object '{0}' is driven by the design and can't be set")]
    NotDrivable(String),
    #[error("unknown time unit '{0}'")]
    TimeUnit(String),
    #[error("can't convert time {time} {unit} to sim steps without rounding (sim precision: 1e{precision} s)")]
    TimeRounding { time: u64, unit: String, precision: i8 },
    #[error("time {0} overflows the simulator's step counter")]
    TimeOverflow(String),
    #[error("unknown callback handle {0}")]
    UnknownCallback(usize),

    #[error("variable '{0}' declared twice")]
    DuplicateVariable(String),
    #[error("constraint references undeclared variable '{0}'")]
    UndeclaredVariable(String),
    #[error("solution has no variable '{0}'")]
    MissingVariable(String),
    #[error("constraint problem has no solutions")]
    NoSolutions,

    #[error("coverage item '{0}' is not registered")]
    UnknownCoverItem(String),
    #[error("coverage item '{0}' registered twice")]
    DuplicateCoverItem(String),

    #[error("task was cancelled")]
    Cancelled,
    #[error("simulation ran out of events before test '{0}' completed")]
    Stalled(String),
    #[error("test '{name}' exceeded the timeout of {timeout_ns} ns")]
    Timeout { name: String, timeout_ns: u64 },
    #[error("{0}")]
    Failed(String),

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write JUnit report: {0}")]
    Junit(String),
    #[error("failed to serialize coverage: {0}")]
    Json(#[from] serde_json::Error),
}
