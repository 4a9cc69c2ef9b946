use std::fmt;

#[derive(Debug)]
pub enum SyncError {
    MissingEnv(Vec<&'static str>),
    Csv { path: String, detail: String },
    EmptyHeader(String),
    Http { status: u16, body: String },
    Request(String),
    ProjectNotFound(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::MissingEnv(names) => {
                write!(f, "missing environment variables: {}", names.join(", "))
            }
            SyncError::Csv { path, detail } => write!(f, "cannot read csv {path}: {detail}"),
            SyncError::EmptyHeader(path) => write!(f, "csv {path} has an empty header line"),
            SyncError::Http { status, body } => write!(f, "tracker API error {status}: {body}"),
            SyncError::Request(msg) => write!(f, "request failed: {msg}"),
            SyncError::ProjectNotFound(key) => write!(f, "project not found: {key}"),
        }
    }
}

impl SyncError {
    /// Authentication failures abort the whole run; anything else that
    /// happens mid-batch is handled at the row level.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Http { status: 401 | 403, .. })
    }
}
