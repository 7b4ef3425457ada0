//! Cost records and the accumulator used to sum them.
//!
//! A [`Complexity`] maps a cost category (`"flops"`, `"params"`, ...) to an
//! accumulated count. Categories missing from a record read as zero, so
//! records produced by different layers can always be merged. Counts
//! saturate at `u64::MAX` instead of wrapping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Multiply-accumulate operations.
pub const FLOPS: &str = "flops";
/// Weight count, trainable and non-trainable.
pub const PARAMS: &str = "params";

/// Accumulated cost of a layer, block or stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Complexity(BTreeMap<String, u64>);

impl Complexity {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record holding `flops` and `params`.
    pub fn with_cost(flops: u64, params: u64) -> Self {
        let mut cx = Self::new();
        cx.0.insert(FLOPS.to_string(), flops);
        cx.0.insert(PARAMS.to_string(), params);
        cx
    }

    /// Value of `key`, zero when absent.
    pub fn get(&self, key: &str) -> u64 {
        self.0.get(key).copied().unwrap_or(0)
    }

    pub fn flops(&self) -> u64 {
        self.get(FLOPS)
    }

    pub fn params(&self) -> u64 {
        self.get(PARAMS)
    }

    /// Adds `value` to the category `key`.
    pub fn add_to(&mut self, key: &str, value: u64) {
        let count = self.0.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(value);
    }

    /// Returns the key-wise sum of `self` and `other` without touching either.
    pub fn merge(&self, other: &Complexity) -> Complexity {
        let mut merged = self.clone();
        merged += other;
        merged
    }

    /// Scales every category by `factor`.
    pub fn scaled(&self, factor: u64) -> Complexity {
        Complexity(self.0.iter().map(|(k, v)| (k.clone(), v.saturating_mul(factor))).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Key-wise sum of two cost records.
pub fn dict_add(a: &Complexity, b: &Complexity) -> Complexity {
    a.merge(b)
}

impl AddAssign<&Complexity> for Complexity {
    fn add_assign(&mut self, rhs: &Complexity) {
        for (key, value) in &rhs.0 {
            self.add_to(key, *value);
        }
    }
}

impl Add<&Complexity> for &Complexity {
    type Output = Complexity;
    fn add(self, rhs: &Complexity) -> Self::Output {
        self.merge(rhs)
    }
}

impl Add for Complexity {
    type Output = Complexity;
    fn add(mut self, rhs: Complexity) -> Self::Output {
        self += &rhs;
        self
    }
}

impl Sum for Complexity {
    fn sum<I: Iterator<Item = Complexity>>(iter: I) -> Self {
        iter.fold(Complexity::new(), |acc, cx| acc + cx)
    }
}

impl<'a> Sum<&'a Complexity> for Complexity {
    fn sum<I: Iterator<Item = &'a Complexity>>(iter: I) -> Self {
        iter.fold(Complexity::new(), |mut acc, cx| {
            acc += cx;
            acc
        })
    }
}
