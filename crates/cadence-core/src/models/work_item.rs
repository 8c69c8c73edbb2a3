use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// One track claimed from the onboarding queue.
///
/// The original upload sits in the local tier under the item's id until the
/// worker moves it to the remote tier or compensation removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
}

impl WorkItem {
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }
}

impl From<Uuid> for WorkItem {
    fn from(id: Uuid) -> Self {
        Self { id }
    }
}

impl Display for WorkItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.id)
    }
}
