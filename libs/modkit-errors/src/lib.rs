//! Stable error identities and cause-chain error values shared across the
//! runtime's crates.
//!
//! Every failure condition a crate wants callers to recognize is declared as
//! a `'static` [`ErrorKind`] constant with a stable `PREFIX_NNN` code and a
//! message template. Calling [`ErrorKind::value`] produces an [`ErrorValue`]:
//! a small, cheaply-cloneable error carrying optional named details and an
//! optional cause. Callers branch on *what went wrong* with [`ErrorValue::is`],
//! which matches by the originating kind's identity rather than by message
//! text, so wording can change without breaking callers.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod kind;
mod value;

pub use kind::ErrorKind;
pub use value::ErrorValue;

#[cfg(test)]
mod tests {
    use super::*;

    static NOT_FOUND: ErrorKind = ErrorKind::new("TEST_001", "no value for key {{.key}}");
    static WRAPPED: ErrorKind = ErrorKind::new("TEST_002", "operation failed");

    #[test]
    fn renders_template_with_details() {
        let err = NOT_FOUND.value().with_detail("key", "widgets");
        assert_eq!(err.message(), "no value for key widgets");
        assert_eq!(err.code(), "TEST_001");
    }

    #[test]
    fn is_matches_through_cause_chain() {
        let root = NOT_FOUND.value().with_detail("key", "a");
        let wrapped = WRAPPED.value().with_cause(root);

        assert!(wrapped.is(&WRAPPED));
        assert!(wrapped.is(&NOT_FOUND));
    }

    #[test]
    fn is_does_not_match_unrelated_kind() {
        let err = NOT_FOUND.value();
        assert!(!err.is(&WRAPPED));
    }

    #[test]
    fn unwrap_returns_error_value_cause_only() {
        let io_err = std::io::Error::other("boom");
        let wrapped = WRAPPED.value().with_cause(io_err);
        assert!(wrapped.unwrap().is_none());
        // but `is` still walks through std::error::Error::source()
        assert!(wrapped.is(&WRAPPED));
    }

    #[test]
    fn distinct_kinds_with_identical_code_strings_do_not_collide() {
        static A: ErrorKind = ErrorKind::new("TEST_001", "first");
        static B: ErrorKind = ErrorKind::new("TEST_001", "first");
        let a = A.value();
        assert!(a.is(&A));
        assert!(!a.is(&B));
    }
}
