use std::fmt::{Display, Formatter};

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum UnionMode {
    /// Union of row positions of two inputs that share the same underlying table.
    Positions,
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Union {
    mode: UnionMode,
}

impl Union {
    pub fn positions() -> Self {
        Self {
            mode: UnionMode::Positions,
        }
    }

    pub fn mode(&self) -> UnionMode {
        self.mode
    }
}

impl Display for Union {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[Union] {:?}", self.mode)
    }
}
