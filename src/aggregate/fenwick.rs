//! Binary indexed tree over `i128` sums.

#[derive(Clone, Debug)]
pub struct Fenwick {
    tree: Vec<i128>,
}

impl Fenwick {
    pub fn new(len: usize) -> Self {
        Self {
            tree: vec![0; len + 1],
        }
    }

    /// Build in O(n) from initial values.
    pub fn from_values(values: &[i64]) -> Self {
        let n = values.len();
        let mut tree = vec![0i128; n + 1];
        for (i, v) in values.iter().enumerate() {
            tree[i + 1] += i128::from(*v);
            let parent = (i + 1) + lowbit(i + 1);
            if parent <= n {
                tree[parent] += tree[i + 1];
            }
        }
        Self { tree }
    }

    pub fn len(&self) -> usize {
        self.tree.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `values[idx] += delta`.
    pub fn add(&mut self, idx: usize, delta: i128) {
        let mut i = idx + 1;
        while i < self.tree.len() {
            self.tree[i] += delta;
            i += lowbit(i);
        }
    }

    /// Sum of `values[0..=idx]`.
    pub fn prefix(&self, idx: usize) -> i128 {
        let mut i = (idx + 1).min(self.len());
        let mut sum = 0;
        while i > 0 {
            sum += self.tree[i];
            i -= lowbit(i);
        }
        sum
    }

    /// Sum of `values[lo..=hi]`, i.e. `prefix(hi) - prefix(lo - 1)`.
    pub fn range(&self, lo: usize, hi: usize) -> i128 {
        if lo > hi {
            return 0;
        }
        let below = if lo == 0 { 0 } else { self.prefix(lo - 1) };
        self.prefix(hi) - below
    }

    pub fn point(&self, idx: usize) -> i128 {
        self.range(idx, idx)
    }
}

fn lowbit(i: usize) -> usize {
    i & i.wrapping_neg()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_values_matches_incremental_build() {
        let values = [5i64, -3, 7, 0, 2, 9, -1, 4, 8];
        let built = Fenwick::from_values(&values);
        let mut incremental = Fenwick::new(values.len());
        for (i, v) in values.iter().enumerate() {
            incremental.add(i, i128::from(*v));
        }
        for i in 0..values.len() {
            let naive: i64 = values[..=i].iter().sum();
            assert_eq!(built.prefix(i), i128::from(naive));
            assert_eq!(incremental.prefix(i), i128::from(naive));
        }
    }

    #[test]
    fn test_range_and_point() {
        let mut bit = Fenwick::from_values(&[1, 2, 3, 4, 5]);
        assert_eq!(bit.range(0, 0), 1);
        assert_eq!(bit.range(1, 3), 9);
        assert_eq!(bit.range(0, 4), 15);
        assert_eq!(bit.range(3, 1), 0);
        bit.add(2, 10);
        assert_eq!(bit.point(2), 13);
        assert_eq!(bit.range(2, 4), 22);
    }

    #[test]
    fn test_empty_tree() {
        let bit = Fenwick::from_values(&[]);
        assert!(bit.is_empty());
        assert_eq!(bit.prefix(0), 0);
    }
}
