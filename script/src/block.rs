/// Commands whose final argument is a multi-line body delimited by a
/// `@start<Block>` / `@end<Block>` directive pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Input,
    Replace,
    MemoryWrite,
}

impl BlockKind {
    pub const ALL: [BlockKind; 3] = [BlockKind::Input, BlockKind::Replace, BlockKind::MemoryWrite];

    /// Look up the block opened by a directive name such as `startInput`.
    pub fn from_opener(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.opener() == name)
    }

    /// Look up the block closed by a directive name such as `endInput`.
    pub fn from_closer(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.closer() == name)
    }

    pub fn opener(self) -> &'static str {
        match self {
            BlockKind::Input => "startInput",
            BlockKind::Replace => "startReplace",
            BlockKind::MemoryWrite => "startMemoryWrite",
        }
    }

    pub fn closer(self) -> &'static str {
        match self {
            BlockKind::Input => "endInput",
            BlockKind::Replace => "endReplace",
            BlockKind::MemoryWrite => "endMemoryWrite",
        }
    }

    /// The logical command name emitted once the block is closed.
    pub fn command_name(self) -> &'static str {
        match self {
            BlockKind::Input => "input",
            BlockKind::Replace => "replace",
            BlockKind::MemoryWrite => "memoryWrite",
        }
    }
}
