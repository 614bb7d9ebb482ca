// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

use std::fmt::{Debug, Display, Formatter};
use crate::escape_byte;

// ---------------------------------------------------------------------------------------------
// ByteSet

/// Set of byte values, used for the transitions of the NFA and DFA.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ByteSet([u64; 4]);

impl ByteSet {
    #[inline]
    pub const fn empty() -> Self {
        ByteSet([0; 4])
    }

    #[inline]
    pub const fn full() -> Self {
        ByteSet([u64::MAX; 4])
    }

    pub fn from_byte(b: u8) -> Self {
        let mut set = ByteSet::empty();
        set.insert(b);
        set
    }

    /// Creates the set `[first-last]`, which is empty if `first > last`.
    pub fn from_range(first: u8, last: u8) -> Self {
        let mut set = ByteSet::empty();
        set.insert_range(first, last);
        set
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut set = ByteSet::empty();
        for &b in bytes {
            set.insert(b);
        }
        set
    }

    #[inline]
    pub fn insert(&mut self, b: u8) {
        self.0[(b >> 6) as usize] |= 1 << (b & 63);
    }

    pub fn insert_range(&mut self, first: u8, last: u8) {
        if first <= last {
            for b in first..=last {
                self.insert(b);
            }
        }
    }

    #[inline]
    pub fn remove(&mut self, b: u8) {
        self.0[(b >> 6) as usize] &= !(1 << (b & 63));
    }

    #[inline]
    pub fn contains(&self, b: u8) -> bool {
        self.0[(b >> 6) as usize] & (1 << (b & 63)) != 0
    }

    pub fn union(&mut self, other: &ByteSet) {
        for (a, b) in self.0.iter_mut().zip(other.0) {
            *a |= b;
        }
    }

    pub fn intersects(&self, other: &ByteSet) -> bool {
        self.0.iter().zip(other.0).any(|(a, b)| a & b != 0)
    }

    pub fn not(&self) -> Self {
        ByteSet(self.0.map(|w| !w))
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&w| w == 0)
    }

    pub fn len(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn first(&self) -> Option<u8> {
        self.iter().next()
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=255_u8).filter(|&b| self.contains(b))
    }

    /// Adds the other case of all the ASCII letters in the set.
    pub fn add_ascii_case(&mut self) {
        for b in b'a'..=b'z' {
            let upper = b.to_ascii_uppercase();
            if self.contains(b) || self.contains(upper) {
                self.insert(b);
                self.insert(upper);
            }
        }
    }

    /// Returns the set as a sorted list of non-overlapping, non-adjacent ranges.
    pub fn ranges(&self) -> Vec<(u8, u8)> {
        let mut ranges = Vec::<(u8, u8)>::new();
        for b in self.iter() {
            match ranges.last_mut() {
                Some((_, last)) if *last as u16 + 1 == b as u16 => *last = b,
                _ => ranges.push((b, b)),
            }
        }
        ranges
    }
}

impl Debug for ByteSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ByteSet({})", self.ranges().iter().map(|(a, b)| format!("0x{a:02x}-0x{b:02x}")).collect::<Vec<_>>().join(", "))
    }
}

impl Display for ByteSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if *self == ByteSet::full() {
            write!(f, "DOT")
        } else {
            write!(f, "{}", self.ranges().into_iter()
                .map(|(a, b)| if a == b {
                    format!("'{}'", escape_byte(a))
                } else {
                    format!("'{}'-'{}'", escape_byte(a), escape_byte(b))
                })
                .collect::<Vec<_>>()
                .join(", ")
            )
        }
    }
}

// ---------------------------------------------------------------------------------------------
// Byte groups

pub type GroupId = u16;

/// Partition of the 256 byte values into equivalence classes: two bytes are in the same
/// group if and only if every set given to [ByteGroups::new] contains both or neither.
///
/// ```
/// use lexalr::byteset::{ByteGroups, ByteSet};
/// let digits = ByteSet::from_range(b'0', b'9');
/// let hex = ByteSet::from_bytes(b"0123456789abcdef");
/// let groups = ByteGroups::new([&digits, &hex]);
/// assert_eq!(groups.nbr_groups(), 3);
/// assert_eq!(groups.group(b'1'), groups.group(b'7'));
/// assert_ne!(groups.group(b'1'), groups.group(b'a'));
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct ByteGroups {
    byte_to_group: Vec<GroupId>,
    nbr_groups: usize,
}

impl ByteGroups {
    pub fn new<'a, I: IntoIterator<Item = &'a ByteSet>>(sets: I) -> Self {
        let mut byte_to_group = vec![0 as GroupId; 256];
        let mut nbr_groups = 1;
        for set in sets {
            // splits each group into its bytes inside and outside `set`
            let mut split = vec![[None::<GroupId>; 2]; nbr_groups];
            let mut new_nbr = 0;
            for b in 0..=255_u8 {
                let g = &mut byte_to_group[b as usize];
                let side = &mut split[*g as usize][set.contains(b) as usize];
                *g = *side.get_or_insert_with(|| {
                    new_nbr += 1;
                    (new_nbr - 1) as GroupId
                });
            }
            nbr_groups = new_nbr;
        }
        ByteGroups { byte_to_group, nbr_groups }
    }

    #[inline]
    pub fn group(&self, b: u8) -> GroupId {
        self.byte_to_group[b as usize]
    }

    #[inline]
    pub fn nbr_groups(&self) -> usize {
        self.nbr_groups
    }

    /// Returns the bytes of each group.
    pub fn group_sets(&self) -> Vec<ByteSet> {
        let mut sets = vec![ByteSet::empty(); self.nbr_groups];
        for b in 0..=255_u8 {
            sets[self.group(b) as usize].insert(b);
        }
        sets
    }

    pub fn into_table(self) -> Vec<GroupId> {
        self.byte_to_group
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_basics() {
        let mut s = ByteSet::from_range(b'a', b'f');
        s.insert(b'0');
        s.remove(b'c');
        assert_eq!(s.len(), 6);
        assert!(s.contains(b'a') && !s.contains(b'c'));
        assert_eq!(s.ranges(), vec![(b'0', b'0'), (b'a', b'b'), (b'd', b'f')]);
        assert_eq!(s.to_string(), "'0', 'a'-'b', 'd'-'f'");
        assert_eq!(ByteSet::from_range(b'z', b'a'), ByteSet::empty());
        assert_eq!(ByteSet::full().to_string(), "DOT");
        assert_eq!(ByteSet::full().ranges(), vec![(0, 255)]);
        assert_eq!(s.not().not(), s);
        assert_eq!(s.not().len(), 250);
    }

    #[test]
    fn ascii_case() {
        let tests = vec![
            (ByteSet::from_bytes(b"a"), ByteSet::from_bytes(b"aA")),
            (ByteSet::from_bytes(b"Zz1"), ByteSet::from_bytes(b"Zz1")),
            (ByteSet::from_range(b'0', b'9'), ByteSet::from_range(b'0', b'9')),
            (ByteSet::from_bytes(b"Q_"), ByteSet::from_bytes(b"qQ_")),
        ];
        for (test_id, (mut set, expected)) in tests.into_iter().enumerate() {
            set.add_ascii_case();
            assert_eq!(set, expected, "test {test_id} failed");
        }
    }

    #[test]
    fn groups() {
        let tests: Vec<(Vec<ByteSet>, usize, Vec<&str>)> = vec![
            (vec![], 1, vec!["\x00a~"]),
            (vec![ByteSet::full()], 1, vec!["\x00a~"]),
            (vec![ByteSet::from_range(b'a', b'z')], 2, vec!["az", "\x00A"]),
            (vec![ByteSet::from_range(b'a', b'z'), ByteSet::from_bytes(b"if")], 3, vec!["if", "az", "09"]),
            (vec![ByteSet::from_range(b'a', b'm'), ByteSet::from_range(b'h', b'z')], 4, vec!["ag", "hm", "nz", "+-"]),
        ];
        for (test_id, (sets, nbr, classes)) in tests.into_iter().enumerate() {
            let groups = ByteGroups::new(&sets);
            assert_eq!(groups.nbr_groups(), nbr, "test {test_id} failed");
            let classes = classes.into_iter().map(|c| c.as_bytes()).collect::<Vec<_>>();
            for class in &classes {
                assert!(class.iter().all(|&b| groups.group(b) == groups.group(class[0])), "test {test_id} failed");
            }
            for (i, a) in classes.iter().enumerate() {
                for b in classes.iter().skip(i + 1) {
                    assert_ne!(groups.group(a[0]), groups.group(b[0]), "test {test_id} failed");
                }
            }
            let sets = groups.group_sets();
            assert_eq!(sets.iter().map(|s| s.len()).sum::<usize>(), 256, "test {test_id} failed");
        }
    }
}
