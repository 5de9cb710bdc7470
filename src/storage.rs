//! Filesystem storage of processed documents and their requirements.

mod lock;

pub mod queue;
pub use queue::{QueuePage, QueueQuery};

mod record;
pub use record::{DocumentRecord, RecordError};

pub mod report;
pub use report::{ComplianceMatrix, DocumentStats, SearchQuery, WorkspaceStats};

mod workspace;
pub use workspace::{Conflict, Outcome, ReembedSummary, Workspace, WorkspaceError};
