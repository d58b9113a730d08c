//! Closed numeric intervals with clamping.
//!
//! A [`Range`] is used everywhere a value has hard bounds: latitude and
//! longitude limits of a projection, the supported scale span of a provider,
//! the valid tile indices at a scale and the pixel extent of the world.
//!
//! Clamping through [`Range::conform`] never fails. When the value had to be
//! moved onto a bound the caller receives a [`ClampWarning`] describing what
//! happened, and the same information is logged at `warn` level.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Closed interval `[minimum, maximum]`.
///
/// Construction with reversed bounds swaps them, so `minimum <= maximum`
/// holds for every instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range<T> {
    minimum: T,
    maximum: T,
}

/// Structured record of a value that was clamped onto a range bound.
#[derive(Debug, Clone, PartialEq)]
pub struct ClampWarning {
    /// What the value represents (e.g. `"latitude"`, `"scale"`).
    pub label: &'static str,
    /// The value as supplied.
    pub value: f64,
    /// The bound it was clamped to.
    pub bound: f64,
}

impl fmt::Display for ClampWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} out of range, clamped to {}",
            self.label, self.value, self.bound
        )
    }
}

/// A value after conforming it to a range.
#[derive(Debug, Clone, PartialEq)]
pub struct Conformed<T> {
    /// The value, guaranteed to lie inside the range.
    pub value: T,
    /// Present when the original value was outside the range.
    pub warning: Option<ClampWarning>,
}

impl<T> Conformed<T> {
    /// Returns the value and pushes any warning onto `warnings`.
    pub fn collect_into(self, warnings: &mut Vec<ClampWarning>) -> T {
        if let Some(w) = self.warning {
            warnings.push(w);
        }
        self.value
    }
}

impl<T: PartialOrd + Copy> Range<T> {
    /// Creates a range, swapping the bounds if they are reversed.
    pub fn new(a: T, b: T) -> Self {
        if b < a {
            Self {
                minimum: b,
                maximum: a,
            }
        } else {
            Self {
                minimum: a,
                maximum: b,
            }
        }
    }

    #[inline]
    pub fn minimum(&self) -> T {
        self.minimum
    }

    #[inline]
    pub fn maximum(&self) -> T {
        self.maximum
    }

    /// Returns true when `value` lies inside the closed interval.
    #[inline]
    pub fn contains(&self, value: T) -> bool {
        value >= self.minimum && value <= self.maximum
    }

    /// Position of `value` relative to the interval.
    ///
    /// `Less` below the minimum, `Greater` above the maximum, `Equal` inside.
    /// Incomparable values (NaN) compare as `Equal`; [`Range::clamp`] maps
    /// them to the minimum.
    pub fn compare(&self, value: T) -> Ordering {
        if value < self.minimum {
            Ordering::Less
        } else if value > self.maximum {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    /// Clamps `value` into the range without reporting.
    pub fn clamp(&self, value: T) -> T {
        match self.compare(value) {
            Ordering::Less => self.minimum,
            Ordering::Greater => self.maximum,
            Ordering::Equal if self.contains(value) => value,
            Ordering::Equal => self.minimum,
        }
    }
}

impl<T: PartialOrd + Copy + Into<f64>> Range<T> {
    /// Clamps `value` into the range, reporting when it had to move.
    pub fn conform(&self, value: T, label: &'static str) -> Conformed<T> {
        let clamped = self.clamp(value);
        if clamped == value {
            return Conformed {
                value,
                warning: None,
            };
        }

        let warning = ClampWarning {
            label,
            value: value.into(),
            bound: clamped.into(),
        };
        warn!(
            label = label,
            value = warning.value,
            bound = warning.bound,
            "Value out of range, clamped"
        );

        Conformed {
            value: clamped,
            warning: Some(warning),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Range<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.minimum, self.maximum)
    }
}
