//! Hexagonal ports for the external collaborators.

use async_trait::async_trait;

use crate::{
    domain::{AnswerEntry, AnswerSet, Identifier},
    Result,
};

/// Port for the remote answers service.
///
/// One outbound request per load action. Implementations should bound the
/// request themselves; the session additionally races the call against its
/// own deadline, so a hung transport can never wedge a load.
#[async_trait]
pub trait AnswerFetcher: Send + Sync {
    async fn fetch(&self, identifier: &Identifier) -> Result<AnswerSet>;
}

/// Port for the externally-owned display surface (status slot + answer slot).
///
/// The core only ever writes; nothing is read back. Panel layout and styling
/// are the adapter's business.
#[async_trait]
pub trait DisplayPort: Send + Sync {
    async fn set_status(&self, text: &str) -> Result<()>;

    /// Show one answer: a single string, or an ordered bullet list.
    async fn show_answer(&self, entry: &AnswerEntry) -> Result<()>;

    /// Indicate that the current question has no cached answer.
    async fn show_no_answer(&self) -> Result<()>;

    /// Enable or disable the manual entry controls (disabled while a load is
    /// in flight, re-enabled on failure so the user can retry).
    async fn set_controls_enabled(&self, enabled: bool) -> Result<()>;
}
