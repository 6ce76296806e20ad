use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum OracleError {
    #[error("Oracle: failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Oracle: timed out after {0:?}")]
    Timeout(Duration),

    #[error("Oracle: cannot parse report {0:?}")]
    MalformedReport(String),

    #[error("Oracle: unknown verdict code {0}")]
    UnknownVerdict(i64),

    #[error("Oracle: build `{command}` failed: {reason}")]
    Build { command: String, reason: String },

    #[error("Oracle: IO error: {0}")]
    Io(#[from] std::io::Error),
}
