use std::fmt;

/// Tables of the local store. Observers re-run their queries when a table
/// they read from is invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Messages,
    Groups,
    Users,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Groups => "groups",
            Self::Users => "users",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Broadcast by the store after a write transaction commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// Rows of the table were inserted, updated or deleted
    Invalidated { table: Table },
}

impl StoreEvent {
    pub fn table(&self) -> Table {
        match self {
            Self::Invalidated { table } => *table,
        }
    }

    /// Whether an observer reading from `tables` has to re-run its query.
    pub fn affects(&self, tables: &[Table]) -> bool {
        tables.contains(&self.table())
    }
}
