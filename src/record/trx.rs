//! Transaction handles.

use std::fmt;

/// An opaque transaction handle.
///
/// The handle is passed to every scan and record mutation; its lifecycle
/// (begin, commit, rollback) is driven by the session layer through the
/// record manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Trx {
    /// Engine-assigned transaction id.
    pub id: u64,
}

impl fmt::Display for Trx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trx#{}", self.id)
    }
}
