use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::ErrorKind;

/// A runtime error value produced by an [`ErrorKind`] constructor.
///
/// `ErrorValue` is deliberately small and cheap to clone: details and the
/// cause are stored behind `Arc`, so `with_detail`/`with_cause` copy the map
/// once and hand back a new value rather than mutating shared state.
///
/// Equality for control flow is never structural. Callers branch on an
/// `ErrorValue` with [`ErrorValue::is`], which walks the cause chain looking
/// for a value that originated from the same `'static` [`ErrorKind`].
#[derive(Clone)]
pub struct ErrorValue {
    kind: &'static ErrorKind,
    details: Arc<BTreeMap<&'static str, String>>,
    cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl ErrorValue {
    #[must_use]
    pub(crate) fn new(kind: &'static ErrorKind) -> Self {
        Self {
            kind,
            details: Arc::new(BTreeMap::new()),
            cause: None,
        }
    }

    /// The stable `PREFIX_NNN` code of the originating [`ErrorKind`].
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.kind.code
    }

    /// Attach (or overwrite) a named detail, returning a new value.
    ///
    /// `key` is expected to match a `{{.key}}` placeholder in the owning
    /// kind's template, but unknown keys are accepted silently: they simply
    /// never appear in the rendered message.
    #[must_use]
    pub fn with_detail(&self, key: &'static str, value: impl fmt::Display) -> Self {
        let mut details = (*self.details).clone();
        details.insert(key, value.to_string());
        Self {
            kind: self.kind,
            details: Arc::new(details),
            cause: self.cause.clone(),
        }
    }

    /// Attach an underlying cause, returning a new value.
    ///
    /// The cause may be another `ErrorValue` (preserving sentinel matching
    /// across module boundaries) or any other `std::error::Error`.
    #[must_use]
    pub fn with_cause(&self, cause: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            kind: self.kind,
            details: Arc::clone(&self.details),
            cause: Some(Arc::new(cause)),
        }
    }

    /// Render the kind's template against the current detail map.
    #[must_use]
    pub fn message(&self) -> String {
        let mut rendered = self.kind.template.to_string();
        for (key, value) in self.details.iter() {
            let placeholder = format!("{{{{.{key}}}}}");
            rendered = rendered.replace(&placeholder, value);
        }
        rendered
    }

    /// The directly attached cause, if it is itself an `ErrorValue`.
    ///
    /// Returns `None` both when there is no cause and when the cause is some
    /// other `std::error::Error` implementation; use [`ErrorValue::is`] to
    /// search the full chain regardless of intermediate cause types.
    #[must_use]
    pub fn unwrap(&self) -> Option<&ErrorValue> {
        self.cause
            .as_deref()
            .and_then(|c| (c as &(dyn StdError + 'static)).downcast_ref::<ErrorValue>())
    }

    /// True if `target` originated this value, or any value in its cause
    /// chain, via pointer identity on the `'static` `ErrorKind`.
    #[must_use]
    pub fn is(&self, target: &'static ErrorKind) -> bool {
        if std::ptr::eq(self.kind, target) {
            return true;
        }
        let mut next: Option<&(dyn StdError + 'static)> =
            self.cause.as_deref().map(|c| c as &(dyn StdError + 'static));
        while let Some(err) = next {
            if let Some(value) = err.downcast_ref::<ErrorValue>() {
                if std::ptr::eq(value.kind, target) {
                    return true;
                }
            }
            next = err.source();
        }
        false
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.code, self.message())
    }
}

impl fmt::Debug for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorValue")
            .field("code", &self.kind.code)
            .field("message", &self.message())
            .field("details", &self.details)
            .field("has_cause", &self.cause.is_some())
            .finish()
    }
}

impl StdError for ErrorValue {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn StdError + 'static))
    }
}
