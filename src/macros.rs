// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

// Rust lacks the BTreeMap and BTreeSet equivalents of vec!

/// Generates the code to initialize a [BTreeMap](std::collections::BTreeMap).
///
/// The macro can be followed by parentheses or square brackets.
///
/// # Example
/// ```
/// # #[macro_use] fn main() {
/// # use std::collections::BTreeMap;
/// # use lexalr::btreemap;
/// let days = btreemap![0 => "Monday", 1 => "Tuesday", 2 => "Wednesday"];
/// assert_eq!(days, BTreeMap::from([(0, "Monday"), (1, "Tuesday"), (2, "Wednesday")]));
/// # }
/// ```
#[macro_export(local_inner_macros)]
macro_rules! btreemap {
    () => { std::collections::BTreeMap::new() };
    ($($key:expr => $value:expr,)+) => { btreemap!($($key => $value),+) };
    ($($key:expr => $value:expr),*) => {
        std::collections::BTreeMap::from([ $(($key, $value),)* ])
    };
}

/// Generates the code to initialize a [BTreeSet](std::collections::BTreeSet).
///
/// The macro can be followed by parentheses or square brackets.
///
/// # Example
/// ```
/// # #[macro_use] fn main() {
/// # use std::collections::BTreeSet;
/// # use lexalr::btreeset;
/// let days = btreeset!["Monday", "Tuesday", "Wednesday"];
/// assert_eq!(days, BTreeSet::from(["Monday", "Tuesday", "Wednesday"]));
/// # }
/// ```
#[macro_export(local_inner_macros)]
macro_rules! btreeset {
    () => { std::collections::BTreeSet::new() };
    ($($key:expr,)+) => { btreeset!($($key),+) };
    ($($key:expr),*) => { std::collections::BTreeSet::from([ $($key,)* ]) };
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    #[test]
    fn btreemap() {
        let h = btreemap!(
            'a' => btreemap!('1' => 'a', '2' => 'A'),
            'b' => btreemap!['1' => 'b',],
            'c' => btreemap!()
        );
        assert_eq!(h, BTreeMap::from([
            ('a', BTreeMap::from([('1', 'a'), ('2', 'A')])),
            ('b', BTreeMap::from([('1', 'b')])),
            ('c', BTreeMap::new())]))
    }

    #[test]
    fn btreeset() {
        let s: BTreeSet<u32> = btreeset![3, 1, 2, 1];
        assert_eq!(s, BTreeSet::from([1, 2, 3]));
        let e: BTreeSet<u32> = btreeset![];
        assert!(e.is_empty());
    }
}
