//! Scalar key/value type with strict total ordering
//!
//! Index keys and values are `Scalar`s: 64-bit integers, 64-bit floats, or
//! strings. All tree search, sort, and split operations use a single strict
//! total order over `Scalar`:
//!
//! - Two numeric scalars compare by mathematical value, exactly. `Long(1)`
//!   and `Double(1.0)` are the *same key*; no lossy cast is involved in
//!   the comparison.
//! - Same-variant scalars compare naturally.
//! - Across classes the order is by type rank: numbers sort before text.
//!
//! `PartialEq`/`Eq` are derived from the ordering, so equality is
//! consistent with `cmp` (required for sorted-vec binary search).
//!
//! ## Non-finite floats
//!
//! `NaN` has no place in a total order over keys and is rejected at every
//! public entry point with [`Error::InvalidKey`]. Infinities are accepted
//! as *search bounds* (they compare fine) but rejected as *stored* keys or
//! values, because the JSON fragment encoding cannot represent them.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single index key or value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// 64-bit signed integer
    Long(i64),
    /// 64-bit floating point
    Double(f64),
    /// UTF-8 string
    Text(String),
}

impl Scalar {
    /// Whether this scalar is numeric (`Long` or `Double`)
    pub fn is_numeric(&self) -> bool {
        matches!(self, Scalar::Long(_) | Scalar::Double(_))
    }

    /// Check that this scalar can participate in ordered search.
    ///
    /// Only `Double(NaN)` is rejected; infinities are usable as bounds.
    pub fn ensure_searchable(&self) -> Result<()> {
        if let Scalar::Double(d) = self {
            if d.is_nan() {
                return Err(Error::invalid_key("NaN cannot be ordered against index keys"));
            }
        }
        Ok(())
    }

    /// Check that this scalar can be stored in a fragment.
    ///
    /// Non-finite doubles have no JSON representation and are rejected.
    pub fn ensure_storable(&self) -> Result<()> {
        if let Scalar::Double(d) = self {
            if !d.is_finite() {
                return Err(Error::invalid_key(format!(
                    "non-finite double {d} cannot be stored in an index fragment"
                )));
            }
        }
        Ok(())
    }

    /// Rank used when comparing across type classes
    fn type_rank(&self) -> u8 {
        match self {
            Scalar::Long(_) | Scalar::Double(_) => 0,
            Scalar::Text(_) => 1,
        }
    }
}

/// Exact comparison of an integer against a double, without casting the
/// integer through `f64` (which silently loses precision above 2^53).
fn cmp_long_double(a: i64, b: f64) -> Ordering {
    if b.is_nan() {
        // NaN sorts after every number; keeps the order total even if a
        // NaN slips past the entry-point guards.
        return Ordering::Less;
    }
    const TWO_63: f64 = 9_223_372_036_854_775_808.0; // 2^63
    if b >= TWO_63 {
        return Ordering::Less;
    }
    if b < -TWO_63 {
        return Ordering::Greater;
    }
    // b's integer part now fits in i64 exactly.
    let trunc = b.trunc();
    let ti = trunc as i64;
    match a.cmp(&ti) {
        Ordering::Equal => {
            if b > trunc {
                Ordering::Less
            } else if b < trunc {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
        ord => ord,
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        use Scalar::*;
        match (self, other) {
            (Long(a), Long(b)) => a.cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            (Double(a), Double(b)) => match a.partial_cmp(b) {
                Some(ord) => ord,
                // At least one NaN: NaN sorts last, two NaN are equal.
                None => a.is_nan().cmp(&b.is_nan()),
            },
            (Long(a), Double(b)) => cmp_long_double(*a, *b),
            (Double(a), Long(b)) => cmp_long_double(*b, *a).reverse(),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scalar {}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Long(v) => write!(f, "{v}"),
            Scalar::Double(v) => write!(f, "{v}"),
            Scalar::Text(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Long(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Double(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_type_ordering() {
        assert!(Scalar::Long(1) < Scalar::Long(2));
        assert!(Scalar::Double(1.5) < Scalar::Double(2.5));
        assert!(Scalar::from("apple") < Scalar::from("banana"));
    }

    #[test]
    fn test_mixed_numeric_ordering() {
        assert_eq!(Scalar::Long(1), Scalar::Double(1.0));
        assert!(Scalar::Long(1) < Scalar::Double(1.5));
        assert!(Scalar::Double(0.5) < Scalar::Long(1));
        assert!(Scalar::Double(-0.5) > Scalar::Long(-1));
        // negative zero equals integer zero
        assert_eq!(Scalar::Long(0), Scalar::Double(-0.0));
        assert_eq!(Scalar::Double(-0.0), Scalar::Double(0.0));
    }

    #[test]
    fn test_large_magnitude_exactness() {
        // 2^53 + 1 is not representable as f64; a cast-based comparison
        // would call these equal.
        let big = (1i64 << 53) + 1;
        assert!(Scalar::Long(big) > Scalar::Double((1i64 << 53) as f64));
        assert!(Scalar::Long(i64::MAX) < Scalar::Double(f64::INFINITY));
        assert!(Scalar::Long(i64::MIN) > Scalar::Double(f64::NEG_INFINITY));
    }

    #[test]
    fn test_cross_class_ordering() {
        assert!(Scalar::Long(999) < Scalar::from("0"));
        assert!(Scalar::Double(1e300) < Scalar::from(""));
    }

    #[test]
    fn test_nan_guards() {
        assert!(Scalar::Double(f64::NAN).ensure_searchable().is_err());
        assert!(Scalar::Double(f64::NAN).ensure_storable().is_err());
        assert!(Scalar::Double(f64::INFINITY).ensure_searchable().is_ok());
        assert!(Scalar::Double(f64::INFINITY).ensure_storable().is_err());
        assert!(Scalar::Long(0).ensure_storable().is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        for v in [
            Scalar::Long(42),
            Scalar::Double(1.25),
            Scalar::Double(-0.0),
            Scalar::from("hello"),
        ] {
            let bytes = serde_json::to_vec(&v).unwrap();
            let back: Scalar = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(v, back);
        }
        // integral JSON numbers stay Long, decimal notation stays Double
        let l: Scalar = serde_json::from_str("7").unwrap();
        assert!(matches!(l, Scalar::Long(7)));
        let d: Scalar = serde_json::from_str("7.0").unwrap();
        assert!(matches!(d, Scalar::Double(_)));
    }
}
