use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::expr::DataType;
use crate::stat::TableStatistics;

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ColumnDefinition {
    name: String,
    data_type: DataType,
}

impl ColumnDefinition {
    pub fn new<S: Into<String>>(name: S, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }
}

/// Scan of a stored table, the usual join graph vertex.
#[derive(Clone, Debug, PartialEq)]
pub struct TableScan {
    table_name: String,
    columns: Vec<ColumnDefinition>,
    statistics: Option<Rc<TableStatistics>>,
}

impl TableScan {
    pub fn new<S: Into<String>>(table_name: S, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
            statistics: None,
        }
    }

    pub fn with_statistics(mut self, statistics: TableStatistics) -> Self {
        self.statistics = Some(Rc::new(statistics));
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn statistics(&self) -> Option<&Rc<TableStatistics>> {
        self.statistics.as_ref()
    }
}

impl Display for TableScan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[StoredTable] Name: '{}'", self.table_name)
    }
}
