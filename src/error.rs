use thiserror::Error;

/// Top-level error type for the effective topology engine.
#[derive(Debug, Error)]
pub enum EffectError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Tessellation(#[from] TessellationError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Errors raised while evaluating real geometry.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("parameter {parameter} = {value} is out of range [{min}, {max}]")]
    ParameterOutOfRange {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("zero-length vector")]
    ZeroVector,
}

/// Topological inconsistencies in the real body or the effective overlay.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("tessellation is incomplete: {0}")]
    IncompleteTessellation(String),

    #[error("face {0} is not connected to the rest of the composite set")]
    NotConnected(usize),

    #[error("face {0} already belongs to a composite")]
    AlreadyClaimed(usize),

    #[error("composite faces do not lie in a single shell")]
    MultipleShells,

    #[error("no shared edges can be removed between the composite faces")]
    NothingRemoved,

    #[error("node {node} has {count} open loop ends")]
    NodeCount { node: usize, count: usize },

    #[error("re-threaded loop does not close")]
    LoopNotClosed,
}

/// Out-of-bounds indices and arguments.
#[derive(Debug, Error)]
pub enum RangeError {
    #[error("merge angle {0} is outside [0, 90] degrees")]
    Angle(f64),

    #[error("{kind} index {index} is out of range (count {count})")]
    Index {
        kind: &'static str,
        index: usize,
        count: usize,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Lifecycle and ownership violations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("effective body is finalized")]
    Finalized,

    #[error("effective body is not finalized")]
    NotFinalized,

    #[error("effective body was mutated from a thread other than its owner")]
    WrongThread,
}

/// Errors related to tessellation.
#[derive(Debug, Error)]
pub enum TessellationError {
    #[error("invalid tessellation parameters: {0}")]
    InvalidParameters(String),

    #[error("tessellation failed: {0}")]
    Failed(String),
}

/// Errors from building or querying a uv parametrization.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("parametrization failed: {0}")]
    Failed(String),

    #[error("point ({u}, {v}) could not be located in the parametrization")]
    NotLocated { u: f64, v: f64 },
}

/// Errors while reading or writing the persisted format.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("unexpected end of stream")]
    UnexpectedEof,

    #[error("line {line}: cannot parse {token:?}")]
    Parse { line: usize, token: String },

    #[error("invalid stream content: {0}")]
    Invalid(String),
}

/// Convenience type alias for results using [`EffectError`].
pub type Result<T> = std::result::Result<T, EffectError>;
