use thiserror::Error;

/// Errors that stop the engine from reaching the ready state.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to start maintenance worker {worker}: {source}")]
    WorkerSpawn {
        worker: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Maintenance worker {0} panicked")]
    WorkerPanicked(String),
}

/// Status returned by a maintenance collaborator.
///
/// Every variant carries a stable numeric code so loop logs can report the
/// failure the way the storage layer numbers it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaintenanceError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Tablet {0} is busy")]
    TabletBusy(String),

    #[error("No candidate tablet for compaction")]
    NoCandidate,

    #[error("Resource group error: {0}")]
    ResourceGroup(String),

    #[error("Invalid usage ratio reported: {0}")]
    InvalidUsage(f64),

    #[error("Maintenance pass failed with code {code}: {message}")]
    Failed { code: i32, message: String },
}

impl MaintenanceError {
    pub fn failed(code: i32, message: impl Into<String>) -> Self {
        Self::Failed {
            code,
            message: message.into(),
        }
    }

    /// Numeric failure code used in loop logs.
    pub fn code(&self) -> i32 {
        match self {
            Self::Io(_) => -101,
            Self::TabletBusy(_) => -102,
            Self::NoCandidate => -103,
            Self::ResourceGroup(_) => -104,
            Self::InvalidUsage(_) => -105,
            Self::Failed { code, .. } => *code,
        }
    }
}

impl From<std::io::Error> for MaintenanceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

pub type MaintenanceResult<T> = std::result::Result<T, MaintenanceError>;
