use std::ops::AddAssign;

/// Row counters owned by one stage copy and handed back when its worker ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounters {
    /// Rows taken from input channels
    pub lines_read: u64,
    /// Rows delivered to output channels
    pub lines_written: u64,
    /// Rows read from an external source (file, table)
    pub lines_input: u64,
    /// Rows written to an external sink
    pub lines_output: u64,
    pub lines_updated: u64,
    /// Rows sent to the error hop
    pub lines_rejected: u64,
    pub errors: u64,
}

impl AddAssign<&StageCounters> for StageCounters {
    fn add_assign(&mut self, other: &StageCounters) {
        self.lines_read += other.lines_read;
        self.lines_written += other.lines_written;
        self.lines_input += other.lines_input;
        self.lines_output += other.lines_output;
        self.lines_updated += other.lines_updated;
        self.lines_rejected += other.lines_rejected;
        self.errors += other.errors;
    }
}
