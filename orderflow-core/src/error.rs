//! Error types for orderflow operations

use thiserror::Error;

/// Relational store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Duplicate key: order {order_uid} already exists")]
    DuplicateKey { order_uid: String },

    #[error("Constraint violation: {reason}")]
    ConstraintViolation { reason: String },

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Query failed: {reason}")]
    Query { reason: String },

    #[error("Order not found: {order_uid}")]
    NotFound { order_uid: String },
}

impl StoreError {
    /// Whether repeating the same operation later may succeed.
    ///
    /// Constraint violations and duplicates are properties of the data and
    /// will fail identically on every replay.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. } | StoreError::Query { .. })
    }
}

/// Key-value cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Corrupt cache entry for {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },
}

/// A single field-level violation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Field {field} exceeds {max} characters")]
    TooLong { field: String, max: usize },
}

/// Every violation found in one aggregate, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: ValidationError) {
        self.0.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Configuration errors. Always fatal at boot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration: {field}")]
    MissingRequired { field: String },

    #[error("Invalid configuration value for {field}: {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Domain-level error taxonomy for the save and get use cases.
///
/// Callers decide by variant: the ingestion worker picks commit or retry, the
/// HTTP layer picks a status code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("Invalid order: {0}")]
    InvalidOrder(ValidationErrors),

    #[error("Order {order_uid} already exists")]
    DuplicateOrder { order_uid: String },

    #[error("Order {order_uid} not found")]
    NotFound { order_uid: String },

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Decode error: {reason}")]
    Decode { reason: String },
}

impl OrderError {
    /// Whether an ingestion worker should leave the offset uncommitted and
    /// redeliver the message.
    pub fn is_retryable(&self) -> bool {
        match self {
            OrderError::Store(e) => e.is_retryable(),
            OrderError::Cache(_) => true,
            OrderError::InvalidOrder(_)
            | OrderError::DuplicateOrder { .. }
            | OrderError::NotFound { .. }
            | OrderError::Decode { .. } => false,
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { order_uid } => OrderError::DuplicateOrder { order_uid },
            StoreError::NotFound { order_uid } => OrderError::NotFound { order_uid },
            other => OrderError::Store(other),
        }
    }
}

impl From<ValidationErrors> for OrderError {
    fn from(errs: ValidationErrors) -> Self {
        OrderError::InvalidOrder(errs)
    }
}

impl From<serde_json::Error> for OrderError {
    fn from(err: serde_json::Error) -> Self {
        OrderError::Decode {
            reason: err.to_string(),
        }
    }
}

pub type OrderResult<T> = Result<T, OrderError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type CacheResult<T> = Result<T, CacheError>;
