//! True-value filter parsing.

use std::str::FromStr;

use super::builder::MetricBuildError;

/// A specification narrowing which raw answer values count toward a metric.
///
/// Two textual forms are accepted:
/// - `"lo>hi"` - an inclusive integer range, e.g. `"-10>20"` for [-10, 20]
/// - `"v1|v2|v3"` - a pipe-delimited discrete set, e.g. `"1|2|3"`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrueValueFilter {
    /// Inclusive integer range `[min, max]`.
    Range {
        /// Lower bound, inclusive.
        min: i64,
        /// Upper bound, inclusive.
        max: i64,
    },
    /// Discrete set of accepted values.
    Discrete(Vec<i64>),
}

impl FromStr for TrueValueFilter {
    type Err = MetricBuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MetricBuildError::InvalidTrueValueFilter(s.to_string());

        if s.trim().is_empty() {
            return Err(invalid());
        }

        // The range separator is checked first: a filter is either a range
        // or a discrete set, never a mixture.
        if s.contains('>') {
            let mut parts = s.splitn(2, '>');
            let min = parts
                .next()
                .and_then(|p| p.trim().parse::<i64>().ok())
                .ok_or_else(invalid)?;
            let max = parts
                .next()
                .and_then(|p| p.trim().parse::<i64>().ok())
                .ok_or_else(invalid)?;
            return Ok(TrueValueFilter::Range { min, max });
        }

        let values = s
            .split('|')
            .map(|p| p.trim().parse::<i64>().map_err(|_| invalid()))
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(TrueValueFilter::Discrete(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_discrete_set() {
        let filter: TrueValueFilter = "1|2|3".parse().unwrap();
        assert_eq!(filter, TrueValueFilter::Discrete(vec![1, 2, 3]));
    }

    #[test]
    fn test_parse_single_value_is_discrete() {
        let filter: TrueValueFilter = "8".parse().unwrap();
        assert_eq!(filter, TrueValueFilter::Discrete(vec![8]));
    }

    #[test]
    fn test_parse_range() {
        let filter: TrueValueFilter = "-10>20".parse().unwrap();
        assert_eq!(filter, TrueValueFilter::Range { min: -10, max: 20 });
    }

    #[test]
    fn test_parse_range_with_spaces() {
        let filter: TrueValueFilter = " 0 > 10 ".parse().unwrap();
        assert_eq!(filter, TrueValueFilter::Range { min: 0, max: 10 });
    }

    #[test]
    fn test_reject_non_integer_range() {
        let err = "a>10".parse::<TrueValueFilter>().unwrap_err();
        assert!(matches!(err, MetricBuildError::InvalidTrueValueFilter(s) if s == "a>10"));
        assert!("1.5>10".parse::<TrueValueFilter>().is_err());
        assert!("1>2>3".parse::<TrueValueFilter>().is_err());
    }

    #[test]
    fn test_reject_non_integer_discrete_set() {
        assert!("1|x|3".parse::<TrueValueFilter>().is_err());
        assert!("1||3".parse::<TrueValueFilter>().is_err());
        assert!("".parse::<TrueValueFilter>().is_err());
    }
}
