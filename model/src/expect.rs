//! Assertions for use inside [`wait_until`](crate::wait_until). Each returns an
//! [`ErrorKind::ExpectationMismatch`](crate::ErrorKind::ExpectationMismatch) describing what was
//! observed, so a timed-out wait reports the last unmet condition.

use crate::error::{self, Result};
use regex::Regex;
use snafu::ensure;
use std::fmt::Debug;

/// `actual` must equal `expected`.
pub fn expect_eq<A, E>(what: &str, actual: A, expected: E) -> Result<()>
where
    A: PartialEq<E> + Debug,
    E: Debug,
{
    ensure!(
        actual == expected,
        error::ExpectationSnafu {
            message: format!(
                "expected {} to eq {:?}, got {:?}",
                what, expected, actual
            ),
        }
    );
    Ok(())
}

/// `condition` must hold.
pub fn expect_true(what: &str, condition: bool) -> Result<()> {
    ensure!(
        condition,
        error::ExpectationSnafu {
            message: format!("expected {}", what),
        }
    );
    Ok(())
}

/// `items` must contain `expected`.
pub fn expect_contains<I, T, E>(what: &str, items: I, expected: &E) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: PartialEq<E> + Debug,
    E: Debug + ?Sized,
{
    let items: Vec<T> = items.into_iter().collect();
    ensure!(
        items.iter().any(|item| item == expected),
        error::ExpectationSnafu {
            message: format!(
                "expected {} to include {:?}, got {:?}",
                what, expected, items
            ),
        }
    );
    Ok(())
}

/// `items` must not contain `unexpected`.
pub fn expect_excludes<I, T, E>(what: &str, items: I, unexpected: &E) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: PartialEq<E> + Debug,
    E: Debug + ?Sized,
{
    let items: Vec<T> = items.into_iter().collect();
    ensure!(
        !items.iter().any(|item| item == unexpected),
        error::ExpectationSnafu {
            message: format!(
                "expected {} not to include {:?}, got {:?}",
                what, unexpected, items
            ),
        }
    );
    Ok(())
}

/// `actual` must be at least `minimum`.
pub fn expect_at_least<T>(what: &str, actual: T, minimum: T) -> Result<()>
where
    T: PartialOrd + Debug,
{
    ensure!(
        actual >= minimum,
        error::ExpectationSnafu {
            message: format!(
                "expected {} to be >= {:?}, got {:?}",
                what, minimum, actual
            ),
        }
    );
    Ok(())
}

/// `actual` must match `pattern`.
pub fn expect_match(what: &str, actual: &str, pattern: &Regex) -> Result<()> {
    ensure!(
        pattern.is_match(actual),
        error::ExpectationSnafu {
            message: format!(
                "expected {} {:?} to match /{}/",
                what,
                actual,
                pattern.as_str()
            ),
        }
    );
    Ok(())
}
