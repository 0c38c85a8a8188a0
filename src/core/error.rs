//! Typed error handling for repository operations
//!
//! Errors are layered the same way a request travels:
//!
//! - [`QueryError`]: the caller's query specification is malformed (never reaches the store)
//! - [`StoreError`]: the document store boundary failed (timeout, outage, duplicate key, cancellation)
//! - [`Cause`]: everything an operation can fail with, before operation context is attached
//! - [`RepositoryError`]: a [`Cause`] wrapped with repository/operation/identifier context
//!
//! Every variant is classified into exactly one [`ErrorKind`], which is what callers
//! should match on.
//!
//! # Example
//!
//! ```rust,ignore
//! match repo.create(&ctx, product).await {
//!     Ok(created) => println!("created {}", created.id),
//!     Err(e) if e.kind() == ErrorKind::Conflict => println!("{} already exists", e.id().unwrap_or("?")),
//!     Err(e) if e.is_transient() => retry_later(e),
//!     Err(e) => return Err(e.into()),
//! }
//! ```

use std::fmt;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classification shared by every error crossing a repository boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or out-of-range query specification
    InvalidQuery,
    /// The addressed document does not exist
    NotFound,
    /// Identifier collision on create
    Conflict,
    /// The store did not answer before the deadline
    StoreTimeout,
    /// The store could not be reached or rejected the operation
    StoreUnavailable,
    /// A stored document does not map to the entity shape
    DecodeError,
    /// The caller cancelled the operation
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidQuery => "invalid_query",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::StoreTimeout => "store_timeout",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::DecodeError => "decode_error",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// Whether the caller can fix the failure by changing its input
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidQuery | ErrorKind::NotFound | ErrorKind::Conflict
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repository operation names, used for span names and error context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListAll,
    Search,
    GetById,
    GetByField,
    Create,
    Update,
    DeleteById,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ListAll => "list_all",
            Operation::Search => "search",
            Operation::GetById => "get_by_id",
            Operation::GetByField => "get_by_field",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::DeleteById => "delete_by_id",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Query Errors
// =============================================================================

/// The query specification cannot be executed as given
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("page must be at least 1")]
    ZeroPage,

    #[error("page size must be at least 1")]
    ZeroPageSize,

    #[error("page {page} with page size {page_size} is out of range")]
    PageOutOfRange { page: u64, page_size: u64 },

    #[error("unknown field '{field}'")]
    UnknownField { field: String },

    #[error("operator '{operator}' is not supported on field '{field}'")]
    UnsupportedOperator {
        field: String,
        operator: &'static str,
    },

    #[error("free-text search is not supported: no searchable fields declared")]
    SearchUnsupported,

    #[error("invalid value for field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("malformed query parameter '{param}': {reason}")]
    MalformedParam { param: &'static str, reason: String },
}

// =============================================================================
// Store Errors
// =============================================================================

/// Failures reported by a document store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("document store operation timed out")]
    Timeout,

    #[error("document store operation cancelled")]
    Cancelled,

    #[error("a document with id '{id}' already exists")]
    DuplicateKey { id: String },

    /// A value the backend's document model cannot hold, such as an
    /// integer beyond its numeric range
    #[error("value not representable in the document store: {message}")]
    Unrepresentable {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    pub fn unavailable_with(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        StoreError::Unavailable {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn unrepresentable(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        StoreError::Unrepresentable {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Unavailable { .. } => ErrorKind::StoreUnavailable,
            StoreError::Unrepresentable { .. } => ErrorKind::InvalidQuery,
            StoreError::Timeout => ErrorKind::StoreTimeout,
            StoreError::Cancelled => ErrorKind::Cancelled,
            StoreError::DuplicateKey { .. } => ErrorKind::Conflict,
        }
    }
}

// =============================================================================
// Operation Causes
// =============================================================================

/// Everything a repository operation can fail with
#[derive(Debug, Error)]
pub enum Cause {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to decode document{}: {source}", display_id(.id))]
    Decode {
        id: Option<String>,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode entity: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("entity must serialize to an object, got {found}")]
    NotAnObject { found: &'static str },

    #[error("no document with id '{id}'")]
    NotFound { id: String },
}

fn display_id(id: &Option<String>) -> String {
    match id {
        Some(id) => format!(" '{}'", id),
        None => String::new(),
    }
}

impl Cause {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Cause::Query(_) => ErrorKind::InvalidQuery,
            Cause::Store(e) => e.kind(),
            Cause::Decode { .. } | Cause::Encode(_) | Cause::NotAnObject { .. } => {
                ErrorKind::DecodeError
            }
            Cause::NotFound { .. } => ErrorKind::NotFound,
        }
    }
}

// =============================================================================
// Repository Errors
// =============================================================================

/// A failed repository operation, with enough context to log or display it
/// without re-deriving which repository, operation or identifier was involved
#[derive(Debug)]
pub struct RepositoryError {
    repository: &'static str,
    operation: Operation,
    id: Option<String>,
    lookup: Option<(String, String)>,
    search_text: Option<String>,
    cause: Cause,
}

impl RepositoryError {
    pub fn new(repository: &'static str, operation: Operation, cause: impl Into<Cause>) -> Self {
        Self {
            repository,
            operation,
            id: None,
            lookup: None,
            search_text: None,
            cause: cause.into(),
        }
    }

    /// Create a "not found" error for callers that treat absence as a failure
    pub fn not_found(repository: &'static str, operation: Operation, id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(repository, operation, Cause::NotFound { id: id.clone() }).with_id(id)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Record the secondary key a lookup was made by (e.g., `order_id = ORD-1001`)
    pub fn with_lookup(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.lookup = Some((field.into(), value.into()));
        self
    }

    pub fn with_search_text(mut self, text: impl Into<String>) -> Self {
        self.search_text = Some(text.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.cause.kind()
    }

    pub fn repository(&self) -> &'static str {
        self.repository
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Field and rendered value of a secondary-key lookup
    pub fn lookup(&self) -> Option<(&str, &str)> {
        self.lookup
            .as_ref()
            .map(|(field, value)| (field.as_str(), value.as_str()))
    }

    pub fn search_text(&self) -> Option<&str> {
        self.search_text.as_deref()
    }

    pub fn cause(&self) -> &Cause {
        &self.cause
    }

    pub fn into_cause(self) -> Cause {
        self.cause
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Infrastructure faults a higher layer may choose to retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::StoreTimeout | ErrorKind::StoreUnavailable
        )
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}.{}]", self.repository, self.operation)?;
        if let Some(id) = &self.id {
            write!(f, " id '{}'", id)?;
        }
        if let Some((field, value)) = &self.lookup {
            write!(f, " {} '{}'", field, value)?;
        }
        if let Some(text) = &self.search_text {
            write!(f, " search '{}'", text)?;
        }
        write!(f, " {}: {}", self.kind(), self.cause)
    }
}

impl std::error::Error for RepositoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}
