//! Call journal shared by the in-memory backends.

/// One call made against a backend, in the order it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: &'static str,
    pub target: String,
}

impl RecordedCall {
    pub fn is_write(&self) -> bool {
        !self.operation.starts_with("get_")
    }
}
