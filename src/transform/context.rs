//! Workspace context and the approximate process hierarchy.
//!
//! Transcripts record neither the editor process nor the window they came
//! from. The hierarchy built here is a stable approximation:
//!
//! | level          | id                       | derived from                   |
//! |----------------|--------------------------|--------------------------------|
//! | instance       | `instance-YYYYMMDDHH`    | session creation hour (UTC)    |
//! | window         | `window-<8 hex>`         | workspace storage hash         |
//! | extension host | `exthost-<8 chars>`      | session id prefix              |
//!
//! Two sessions created in the same hour count as one editor instance, and
//! every session counts as its own extension host.

use std::path::{Component, Path};

use chrono::{DateTime, Utc};

use crate::model::SessionHierarchy;
use crate::util::short_id;
use crate::WORKSPACE_STORAGE_DIR_NAME;

/// Placeholder workspace id when the path does not reveal one.
pub const UNKNOWN_WORKSPACE: &str = "unknown";

/// The workspace a transcript belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceContext {
    /// Workspace storage hash, or [`UNKNOWN_WORKSPACE`].
    pub workspace_id: String,
}

impl WorkspaceContext {
    /// Context for an explicit workspace id.
    pub fn new(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
        }
    }

    /// Context for transcripts whose workspace is not known.
    #[must_use]
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_WORKSPACE)
    }

    /// Take the path segment right after `workspaceStorage`.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let mut components = path.components().skip_while(|c| match c {
            Component::Normal(name) => name.to_str() != Some(WORKSPACE_STORAGE_DIR_NAME),
            _ => true,
        });
        // Skip the `workspaceStorage` segment itself
        components.next();

        match components.next() {
            Some(Component::Normal(hash)) => match hash.to_str() {
                Some(hash) if !hash.trim().is_empty() && !hash.ends_with(".json") => Self::new(hash),
                _ => Self::unknown(),
            },
            _ => Self::unknown(),
        }
    }

    /// Whether a workspace hash was found.
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.workspace_id != UNKNOWN_WORKSPACE
    }

    /// Window id, absent for unknown workspaces.
    #[must_use]
    pub fn window_id(&self) -> Option<String> {
        self.is_known()
            .then(|| format!("window-{}", short_id(&self.workspace_id, 8)))
    }
}

/// `instance-YYYYMMDDHH` for the hour the session was created.
#[must_use]
pub fn instance_id(created: DateTime<Utc>) -> String {
    format!("instance-{}", created.format("%Y%m%d%H"))
}

/// `exthost-<first 8 chars of the session id>`.
#[must_use]
pub fn host_process_id(session_id: &str) -> String {
    format!("exthost-{}", short_id(session_id, 8))
}

/// Build the approximate hierarchy of a session.
#[must_use]
pub fn session_hierarchy(
    session_id: &str,
    created: DateTime<Utc>,
    workspace: &WorkspaceContext,
) -> SessionHierarchy {
    SessionHierarchy {
        instance_id: instance_id(created),
        window_id: workspace.window_id(),
        host_process_id: host_process_id(session_id),
    }
}
