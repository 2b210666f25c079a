//! Warehouse error type

/// Failure talking to the destination warehouse.
#[derive(Debug)]
pub enum WarehouseError {
    /// Credentials could not be loaded or the client could not be built
    Connection(String),
    /// Referenced table does not exist
    TableNotFound(String),
    /// Table creation raced with another creator
    AlreadyExists(String),
    /// Rows could not be serialized into a request
    Serialization(String),
    /// The warehouse rejected or failed the request
    Request(String),
}

impl std::fmt::Display for WarehouseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(m) => write!(f, "warehouse connection: {m}"),
            Self::TableNotFound(t) => write!(f, "table not found: {t}"),
            Self::AlreadyExists(t) => write!(f, "table already exists: {t}"),
            Self::Serialization(m) => write!(f, "row serialization: {m}"),
            Self::Request(m) => write!(f, "warehouse request failed: {m}"),
        }
    }
}

impl std::error::Error for WarehouseError {}
