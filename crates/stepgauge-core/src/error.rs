use thiserror::Error;

/// Caller-contract violations. Messy input alone never produces one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepgaugeError {
    #[error("level {requested} not found; the document has {available} level(s)")]
    LevelOutOfRange { requested: usize, available: usize },
    #[error("chart text contains no playable section")]
    EmptyDocument,
    #[error("replay text contains no valid event")]
    EmptyReplay,
    #[error("section span of level {0} does not match the source text")]
    SectionSpanMissing(usize),
}
