use std::fmt::{Display, Formatter};

use derive_more::{BitAnd, BitOr};

/// Maximum number of vertices a join graph can have.
pub const MAX_VERTEX_COUNT: usize = 64;

/// Set of join graph vertices, bit `i` stands for the vertex at position `i`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, BitOr, BitAnd)]
pub struct VertexSet(u64);

impl VertexSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn single(vertex: usize) -> Self {
        debug_assert!(vertex < MAX_VERTEX_COUNT);
        Self(1 << vertex)
    }

    /// Set of the vertices `0..count`.
    pub fn first_n(count: usize) -> Self {
        if count >= MAX_VERTEX_COUNT {
            Self(u64::MAX)
        } else {
            Self((1u64 << count) - 1)
        }
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn contains(&self, vertex: usize) -> bool {
        vertex < MAX_VERTEX_COUNT && self.0 & (1 << vertex) != 0
    }

    pub fn insert(&mut self, vertex: usize) {
        self.0 |= 1 << vertex;
    }

    pub fn remove(&mut self, vertex: usize) {
        self.0 &= !(1 << vertex);
    }

    pub fn is_subset_of(&self, other: VertexSet) -> bool {
        self.0 & other.0 == self.0
    }

    pub fn intersects(&self, other: VertexSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn difference(&self, other: VertexSet) -> VertexSet {
        Self(self.0 & !other.0)
    }

    /// Lowest vertex index in the set.
    pub fn min_vertex(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }

    /// Vertex indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> {
        let bits = self.0;
        (0..MAX_VERTEX_COUNT).filter(move |i| bits & (1 << i) != 0)
    }

    /// All non-empty subsets, in increasing order of their bit pattern.
    pub fn subsets(&self) -> impl Iterator<Item = VertexSet> {
        let mask = self.0;
        let mut sub = 0u64;
        std::iter::from_fn(move || {
            sub = sub.wrapping_sub(mask) & mask;
            if sub == 0 {
                None
            } else {
                Some(VertexSet(sub))
            }
        })
    }
}

impl Display for VertexSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let vertices: Vec<String> = self.iter().map(|v| v.to_string()).collect();
        write!(f, "{{{}}}", vertices.join(", "))
    }
}

impl FromIterator<usize> for VertexSet {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let mut set = VertexSet::empty();
        for vertex in iter {
            set.insert(vertex);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_operations() {
        let a: VertexSet = [0, 2].into_iter().collect();
        let b = VertexSet::single(1);
        assert_eq!(VertexSet::from_bits(0b111), a | b);
        assert!((a & b).is_empty());
        assert!(a.is_subset_of(VertexSet::first_n(3)));
        assert_eq!(Some(0), a.min_vertex());
        assert_eq!(vec![0, 2], a.iter().collect::<Vec<_>>());
        assert_eq!("{0, 2}", a.to_string());
        assert_eq!(VertexSet::single(2), a.difference(VertexSet::single(0)));
        assert_eq!(u64::MAX, VertexSet::first_n(64).bits());
    }

    #[test]
    fn test_subsets() {
        let set = VertexSet::from_bits(0b1010);
        let subsets: Vec<u64> = set.subsets().map(|s| s.bits()).collect();
        assert_eq!(vec![0b0010, 0b1000, 0b1010], subsets);
        assert_eq!(0, VertexSet::empty().subsets().count());
    }
}
