use crate::ErrorValue;

/// A stable, statically-registered error identity.
///
/// `ErrorKind` values are declared as `'static` constants, one per distinct
/// failure condition a crate wants callers to be able to recognize. The
/// `code` is a human-readable, stable identifier of the form `PREFIX_NNN`
/// (prefix names the owning subsystem, NNN is a zero-padded sequence number
/// within that prefix). `template` is rendered against the detail map of an
/// `ErrorValue` produced from this kind: occurrences of `{{.key}}` are
/// replaced with the string value stored under `key`.
///
/// Identity for sentinel matching (see [`ErrorValue::is`]) is the address of
/// the `ErrorKind` itself, not the code string, so two kinds must never share
/// a `'static` allocation.
#[derive(Debug)]
pub struct ErrorKind {
    pub code: &'static str,
    pub template: &'static str,
}

impl ErrorKind {
    #[must_use]
    pub const fn new(code: &'static str, template: &'static str) -> Self {
        Self { code, template }
    }

    /// Build a fresh, detail-free [`ErrorValue`] originating from this kind.
    #[must_use]
    pub fn value(&'static self) -> ErrorValue {
        ErrorValue::new(self)
    }
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for ErrorKind {}
