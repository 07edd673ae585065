//! Input validators.

use core::fmt;
use std::sync::Arc;

use crate::{Error, Result};

type CheckFn<T> = dyn Fn(&T) -> core::result::Result<(), String> + Send + Sync;

/// Rejects keys, values or elements before any mutation starts.
///
/// Validation runs while an attach processor initializes, before any
/// trigger record is written, so a rejected input leaves no trace.
///
/// # Example
///
/// ```
/// use nexus_txcollections::Validator;
///
/// let positive = Validator::new(|v: &i32| {
///     if *v > 0 { Ok(()) } else { Err(format!("{v} is not positive")) }
/// });
/// assert!(positive.validate(&3).is_ok());
/// assert!(positive.validate(&-1).is_err());
/// ```
pub struct Validator<T> {
    check: Arc<CheckFn<T>>,
}

impl<T> Clone for Validator<T> {
    fn clone(&self) -> Self {
        Self {
            check: Arc::clone(&self.check),
        }
    }
}

impl<T> fmt::Debug for Validator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator")
    }
}

impl<T: 'static> Validator<T> {
    /// Wraps a check that returns an error message on rejection.
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&T) -> core::result::Result<(), String> + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(check),
        }
    }

    /// Returns a validator that runs `self`, then `other`.
    pub fn and(self, other: Validator<T>) -> Self {
        Self::new(move |v| {
            (self.check)(v)?;
            (other.check)(v)
        })
    }
}

impl<T> Validator<T> {
    /// Validates `value`.
    #[inline]
    pub fn validate(&self, value: &T) -> Result<()> {
        (self.check)(value).map_err(Error::Validation)
    }
}

/// Validates against an optional validator.
#[inline]
pub(crate) fn validate<T>(validator: Option<&Validator<T>>, value: &T) -> Result<()> {
    match validator {
        Some(v) => v.validate(value),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_validators_short_circuit() {
        let non_empty = Validator::new(|s: &String| {
            if s.is_empty() { Err("empty".into()) } else { Ok(()) }
        });
        let short = Validator::new(|s: &String| {
            if s.len() > 3 { Err(format!("{s} is too long")) } else { Ok(()) }
        });
        let both = non_empty.and(short);

        assert!(both.validate(&"abc".into()).is_ok());
        assert_eq!(
            both.validate(&String::new()).unwrap_err().to_string(),
            "validation failed: empty"
        );
        assert!(matches!(
            both.validate(&"abcd".into()),
            Err(Error::Validation(msg)) if msg == "abcd is too long"
        ));
    }

    #[test]
    fn missing_validator_accepts() {
        assert!(validate::<u8>(None, &0).is_ok());
    }
}
