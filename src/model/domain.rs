//! # Finite Integer Domains

use std::{fmt, ops::RangeInclusive};

use super::Error;

/// An immutable, strictly increasing, non-empty set of integers
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Domain {
    values: Vec<i64>,
}

impl Domain {
    /// Builds a domain from arbitrary values. Values are sorted and duplicates dropped.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyDomain`] if no value is given.
    pub fn new<I: IntoIterator<Item = i64>>(values: I) -> Result<Self, Error> {
        let mut values: Vec<i64> = values.into_iter().collect();
        if values.is_empty() {
            return Err(Error::EmptyDomain);
        }
        values.sort_unstable();
        values.dedup();
        Ok(Domain { values })
    }

    /// Builds the contiguous domain `lb..=ub`
    ///
    /// # Errors
    ///
    /// [`Error::EmptyDomain`] if the range is empty.
    pub fn range(range: RangeInclusive<i64>) -> Result<Self, Error> {
        Self::new(range)
    }

    /// The smallest value
    #[must_use]
    pub fn lb(&self) -> i64 {
        self.values[0]
    }

    /// The largest value
    #[must_use]
    pub fn ub(&self) -> i64 {
        self.values[self.values.len() - 1]
    }

    /// Checks whether `value` is in the domain
    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        self.values.binary_search(&value).is_ok()
    }

    /// The number of values
    #[must_use]
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// Position of `value` among the sorted values
    #[must_use]
    pub fn index_of(&self, value: i64) -> Option<usize> {
        self.values.binary_search(&value).ok()
    }

    /// The sorted values
    #[must_use]
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Iterates over the values in increasing order
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.values.iter().copied()
    }
}

impl<'a> IntoIterator for &'a Domain {
    type Item = i64;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, i64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter().copied()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, val) in self.values.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{val}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::{Domain, Error};

    #[test]
    fn sorted_and_deduplicated() {
        let dom = Domain::new([5, 1, 3, 1, 5]).unwrap();
        assert_eq!(dom.values(), &[1, 3, 5]);
        assert_eq!(dom.lb(), 1);
        assert_eq!(dom.ub(), 5);
        assert_eq!(dom.size(), 3);
        assert!(dom.values().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn membership() {
        let dom = Domain::new([-2, 0, 7]).unwrap();
        for v in -5..10 {
            assert_eq!(dom.contains(v), [-2, 0, 7].contains(&v));
        }
        assert_eq!(dom.index_of(7), Some(2));
        assert_eq!(dom.index_of(1), None);
    }

    #[test]
    fn empty_rejected() {
        assert_eq!(Domain::new(Vec::new()), Err(Error::EmptyDomain));
        #[allow(clippy::reversed_empty_ranges)]
        let res = Domain::range(3..=1);
        assert_eq!(res, Err(Error::EmptyDomain));
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", Domain::range(1..=3).unwrap()), "{1, 2, 3}");
    }
}
