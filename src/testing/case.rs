//! Table-driven test cases
//!
//! A [`Case`] is one row of a table: a name, the input, the expected
//! output, whether an error is expected and which one. Inputs and outputs
//! default to `serde_json::Value` so rows of different shapes can share a
//! table; typed tables pick concrete types instead.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Error a case expects the code under test to produce
pub type ExpectedError = Arc<dyn StdError + Send + Sync + 'static>;

/// One row of a table-driven test
///
/// Built once, either with [`Case::new`] or [`Case::builder`], and only
/// read afterwards. No combination of fields is rejected: a case may want
/// an error without naming one.
#[derive(Clone)]
pub struct Case<I = Value, W = Value> {
    name: String,
    input: I,
    want: W,
    want_err: bool,
    err: Option<ExpectedError>,
}

impl<I, W> Case<I, W> {
    /// Create a case from all of its fields
    pub fn new(
        name: impl Into<String>,
        input: I,
        want: W,
        want_err: bool,
        err: Option<ExpectedError>,
    ) -> Self {
        Self {
            name: name.into(),
            input,
            want,
            want_err,
            err,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn want(&self) -> &W {
        &self.want
    }

    pub fn want_err(&self) -> bool {
        self.want_err
    }

    pub fn err(&self) -> Option<&ExpectedError> {
        self.err.as_ref()
    }

    /// Whether `actual` is the expected error
    ///
    /// Compares messages against `actual` and every error in its source
    /// chain, so an error wrapped with extra context still matches. A case
    /// with no expected error matches nothing.
    pub fn err_matches(&self, actual: &(dyn StdError + 'static)) -> bool {
        let Some(expected) = &self.err else {
            return false;
        };
        let expected = expected.to_string();

        let mut current: Option<&(dyn StdError + 'static)> = Some(actual);
        while let Some(err) = current {
            if err.to_string() == expected {
                return true;
            }
            current = err.source();
        }
        false
    }
}

impl<I: Default, W: Default> Case<I, W> {
    /// Start building a case with the given name
    pub fn builder(name: impl Into<String>) -> CaseBuilder<I, W> {
        CaseBuilder::new(name)
    }
}

impl<I: fmt::Debug, W: fmt::Debug> fmt::Debug for Case<I, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Case")
            .field("name", &self.name)
            .field("input", &self.input)
            .field("want", &self.want)
            .field("want_err", &self.want_err)
            .field("err", &self.err.as_ref().map(|e| e.to_string()))
            .finish()
    }
}

/// Fluent construction of a [`Case`]
///
/// Setters may be called in any order and any number of times; the last
/// write wins.
pub struct CaseBuilder<I = Value, W = Value> {
    case: Case<I, W>,
}

impl<I: Default, W: Default> CaseBuilder<I, W> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            case: Case::new(name, I::default(), W::default(), false, None),
        }
    }
}

impl<I, W> CaseBuilder<I, W> {
    /// Rename the case
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.case.name = name.into();
        self
    }

    pub fn input(mut self, input: impl Into<I>) -> Self {
        self.case.input = input.into();
        self
    }

    pub fn want(mut self, want: impl Into<W>) -> Self {
        self.case.want = want.into();
        self
    }

    pub fn want_err(mut self, want_err: bool) -> Self {
        self.case.want_err = want_err;
        self
    }

    /// Set the expected error
    pub fn err(mut self, err: impl StdError + Send + Sync + 'static) -> Self {
        self.case.err = Some(Arc::new(err));
        self
    }

    /// Set an already shared expected error, or clear it with `None`
    pub fn expected_err(mut self, err: Option<ExpectedError>) -> Self {
        self.case.err = err;
        self
    }

    /// Clear the expected error
    pub fn no_err(self) -> Self {
        self.expected_err(None)
    }

    pub fn build(self) -> Case<I, W> {
        self.case
    }
}

/// An expected error known only by its message
///
/// Used for cases loaded from table files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageError(pub String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for MessageError {}

impl MessageError {
    /// Shared expected error with the given message
    pub fn expected(message: impl Into<String>) -> ExpectedError {
        Arc::new(Self(message.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Wrapped {
        inner: MessageError,
    }

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}, b is zero", self.inner)
        }
    }

    impl StdError for Wrapped {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.inner)
        }
    }

    #[test]
    fn test_builder_sets_all_fields() {
        let c: Case = Case::builder("test case")
            .input(123)
            .want(456)
            .want_err(true)
            .no_err()
            .build();

        assert_eq!(c.name(), "test case");
        assert_eq!(c.input(), &json!(123));
        assert_eq!(c.want(), &json!(456));
        assert!(c.want_err());
        assert!(c.err().is_none());
    }

    #[test]
    fn test_builder_defaults() {
        let c: Case = Case::builder("default case").build();
        assert_eq!(c.name(), "default case");
        assert!(c.input().is_null());
        assert!(c.want().is_null());
        assert!(!c.want_err());
        assert!(c.err().is_none());
    }

    #[test]
    fn test_builder_last_write_wins() {
        let c: Case = Case::builder("change case")
            .input(1)
            .want(2)
            .input(10)
            .want(20)
            .want_err(true)
            .name("renamed")
            .build();
        assert_eq!(c.input(), &json!(10));
        assert_eq!(c.want(), &json!(20));
        assert!(c.want_err());
        assert_eq!(c.name(), "renamed");
    }

    #[test]
    fn test_builder_matches_constructor() {
        let built: Case<&str, usize> = Case::builder("len").input("hello").want(5usize).build();
        let direct = Case::new("len", "hello", 5usize, false, None);
        assert_eq!(built.name(), direct.name());
        assert_eq!(built.input(), direct.input());
        assert_eq!(built.want(), direct.want());
        assert_eq!(built.want_err(), direct.want_err());
        assert_eq!(built.err().is_none(), direct.err().is_none());
    }

    #[test]
    fn test_builder_keeps_error() {
        let c: Case = Case::builder("error case")
            .err(MessageError("div by zero".to_string()))
            .build();
        assert_eq!(c.err().map(|e| e.to_string()).as_deref(), Some("div by zero"));
    }

    #[test]
    fn test_want_err_without_err_is_allowed() {
        let c: Case = Case::new("odd", Value::Null, Value::Null, true, None);
        assert!(c.want_err());
        assert!(c.err().is_none());
        assert!(!c.err_matches(&MessageError("anything".to_string())));
    }

    #[test]
    fn test_err_matches_source_chain() {
        let c: Case = Case::new(
            "div",
            json!([1, 0]),
            json!(0),
            true,
            Some(MessageError::expected("div by zero")),
        );
        let wrapped = Wrapped {
            inner: MessageError("div by zero".to_string()),
        };
        assert!(c.err_matches(&wrapped));
        assert!(!c.err_matches(&MessageError("overflow".to_string())));
    }
}
