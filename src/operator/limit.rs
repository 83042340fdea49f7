use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Limit {
    row_count: usize,
}

impl Limit {
    pub fn new(row_count: usize) -> Self {
        Self { row_count }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }
}

impl Display for Limit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[Limit] {}", self.row_count)
    }
}
