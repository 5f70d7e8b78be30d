//! Per-round divisor table.
//!
//! Round `r` of a reduction reads `values[r]`. A divisor of `0` is the
//! hard-stop sentinel: no further merge round may follow it.

use serde::Serialize;

use crate::errors::DivisorError;

/// A divisor value read for one round.
pub type Divisor = u32;

/// Zero-based round index into a [`DivisorTable`].
pub type Round = usize;

/// Divisors used by the Checks registry, one per composite level.
pub const CHECKS_DIVISORS: [Divisor; 8] = [80, 40, 20, 10, 5, 4, 1, 0];

/// Immutable, 0-indexed sequence of divisors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DivisorTable {
    values: Vec<Divisor>,
}

impl DivisorTable {
    pub fn new(values: Vec<Divisor>) -> Result<Self, DivisorError> {
        if values.is_empty() {
            return Err(DivisorError::Empty);
        }
        Ok(Self { values })
    }

    /// The table shipped with the Checks registry.
    pub fn checks() -> Self {
        Self {
            values: CHECKS_DIVISORS.to_vec(),
        }
    }

    /// Divisor for `round`. Reading past the end is a configuration error.
    pub fn value_at(&self, round: Round) -> Result<Divisor, DivisorError> {
        self.values
            .get(round)
            .copied()
            .ok_or(DivisorError::OutOfRange {
                round,
                len: self.values.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Divisor] {
        &self.values
    }

    /// Position of the first `0` sentinel, if the table has one.
    pub fn sentinel_round(&self) -> Option<Round> {
        self.values.iter().position(|d| *d == 0)
    }
}

impl Default for DivisorTable {
    fn default() -> Self {
        Self::checks()
    }
}

impl std::fmt::Display for DivisorTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|d| d.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl std::str::FromStr for DivisorTable {
    type Err = DivisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_divisors(s)
    }
}

/// Parse a comma-separated divisor list such as `"80,40,20,0"`.
pub fn parse_divisors(s: &str) -> Result<DivisorTable, DivisorError> {
    let values = s
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<Divisor>().map_err(|e| DivisorError::Invalid {
                value: part.to_string(),
                message: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    DivisorTable::new(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_at_in_range() {
        let table = DivisorTable::new(vec![100, 50, 25, 0]).unwrap();
        assert_eq!(table.value_at(0), Ok(100));
        assert_eq!(table.value_at(3), Ok(0));
    }

    #[test]
    fn test_value_at_out_of_range() {
        let table = DivisorTable::new(vec![100, 50]).unwrap();
        assert_eq!(
            table.value_at(2),
            Err(DivisorError::OutOfRange { round: 2, len: 2 })
        );
    }

    #[test]
    fn test_empty_table_rejected() {
        assert_eq!(DivisorTable::new(vec![]), Err(DivisorError::Empty));
    }

    #[test]
    fn test_checks_table() {
        let table = DivisorTable::checks();
        assert_eq!(table.values(), &[80, 40, 20, 10, 5, 4, 1, 0]);
        assert_eq!(table.sentinel_round(), Some(7));
        assert_eq!(table, DivisorTable::default());
    }

    #[test]
    fn test_parse_divisors() {
        let table = parse_divisors("100, 50,25,0").unwrap();
        assert_eq!(table.values(), &[100, 50, 25, 0]);
        assert_eq!(table.to_string(), "100,50,25,0");
    }

    #[test]
    fn test_parse_divisors_invalid() {
        let err = parse_divisors("80,forty").unwrap_err();
        assert!(matches!(err, DivisorError::Invalid { ref value, .. } if value == "forty"));
        assert_eq!(parse_divisors(" , "), Err(DivisorError::Empty));
    }

    #[test]
    fn test_sentinel_round_absent() {
        let table = DivisorTable::new(vec![3, 2, 1]).unwrap();
        assert_eq!(table.sentinel_round(), None);
    }
}
