//! One organize run: fetch, classify, move.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::classify::{
    Classification, Classifier, ClassifyExample, CohereClassifier, batch_inputs,
    validate_examples,
};
use crate::config::AppConfig;
use crate::error::{ClassifyError, MailboxError, PipelineError};
use crate::mailbox::{
    ImapConnector, MailConnector, MailSession, ParsedMessage, RawMessage, parse_raw,
};

/// An open session and the messages fetched through it.
type Fetched = (Box<dyn MailSession>, Vec<RawMessage>);

/// A move the server refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedMove {
    pub uid: u32,
    pub folder: String,
    pub reason: String,
}

/// Counts from a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub classified: usize,
    pub moved: usize,
    /// Messages whose batch failed to classify. They stay where they are.
    pub unclassified: usize,
    pub failed_moves: Vec<FailedMove>,
}

/// Sorts a mailbox into folders named by the classifier's predictions.
pub struct MailOrganizer {
    connector: Arc<dyn MailConnector>,
    classifier: Arc<dyn Classifier>,
    search: String,
}

impl MailOrganizer {
    pub fn new(
        connector: Arc<dyn MailConnector>,
        classifier: Arc<dyn Classifier>,
        search: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            classifier,
            search: search.into(),
        }
    }

    /// Wire up the IMAP connector and the Cohere classifier from config.
    pub fn from_config(
        config: &AppConfig,
        examples: Vec<ClassifyExample>,
    ) -> crate::error::Result<Self> {
        validate_examples(&examples)?;
        let connector = ImapConnector::new(config.imap.clone())?;
        let classifier = CohereClassifier::new(&config.classifier, examples)?;
        Ok(Self::new(
            Arc::new(connector),
            Arc::new(classifier),
            config.organizer.search.clone(),
        ))
    }

    /// Run once against `mailbox`.
    ///
    /// Connect, search and fetch failures abort the run. A failed batch or a
    /// failed move is logged and counted, and the run carries on. The session
    /// is logged out on every path once it has been opened.
    pub async fn organize(&self, mailbox: &str) -> Result<RunSummary, PipelineError> {
        let Some((session, raw)) = self.fetch(mailbox).await? else {
            info!(mailbox, "No messages found");
            return Ok(RunSummary::default());
        };

        let mut summary = RunSummary {
            fetched: raw.len(),
            ..Default::default()
        };
        info!(mailbox, count = raw.len(), "Fetched messages");

        let parsed: Vec<ParsedMessage> = raw.iter().map(parse_raw).collect();
        let assignments = self.classify_all(&parsed, &mut summary).await;
        summary.classified = assignments.len();

        let (moved, failed_moves) = tokio::task::spawn_blocking(move || {
            let mut session = session;
            let outcome = move_all(session.as_mut(), &assignments);
            if let Err(e) = session.logout() {
                warn!(error = %e, "Logout failed");
            }
            outcome
        })
        .await
        .map_err(|e| PipelineError::Join(e.to_string()))?;

        summary.moved = moved;
        summary.failed_moves = failed_moves;

        info!(
            fetched = summary.fetched,
            classified = summary.classified,
            moved = summary.moved,
            unclassified = summary.unclassified,
            failed_moves = summary.failed_moves.len(),
            "Organize run finished"
        );
        Ok(summary)
    }

    /// Open the mailbox, search and fetch. `None` when the search is empty,
    /// in which case the session has already been logged out.
    async fn fetch(&self, mailbox: &str) -> Result<Option<Fetched>, PipelineError> {
        let connector = Arc::clone(&self.connector);
        let mailbox = mailbox.to_string();
        let search = self.search.clone();

        let result = tokio::task::spawn_blocking(move || -> Result<Option<Fetched>, MailboxError> {
            let mut session = connector.open(&mailbox)?;
            match search_and_fetch(session.as_mut(), &search) {
                Ok(raw) if raw.is_empty() => {
                    logout_quietly(session.as_mut());
                    Ok(None)
                }
                Ok(raw) => Ok(Some((session, raw))),
                Err(e) => {
                    logout_quietly(session.as_mut());
                    Err(e)
                }
            }
        })
        .await
        .map_err(|e| PipelineError::Join(e.to_string()))?;

        Ok(result?)
    }

    /// Classify every message, batch by batch, all batches concurrently.
    async fn classify_all(
        &self,
        parsed: &[ParsedMessage],
        summary: &mut RunSummary,
    ) -> Vec<(u32, String)> {
        let batches = batch_inputs(self.classifier.max_inputs(), parsed);
        debug!(
            batches = batches.len(),
            classifier = self.classifier.name(),
            "Classifying"
        );

        let results = join_all(batches.iter().map(|batch| {
            let inputs: Vec<String> = batch
                .iter()
                .map(|m| m.classification_input.clone())
                .collect();
            let classifier = Arc::clone(&self.classifier);
            async move { classifier.classify(&inputs).await }
        }))
        .await;

        let mut assignments = Vec::with_capacity(parsed.len());
        for (batch, result) in batches.iter().zip(results) {
            match pair_with_uids(self.classifier.name(), batch, result) {
                Ok(pairs) => assignments.extend(pairs),
                Err(e) => {
                    warn!(
                        batch_size = batch.len(),
                        first_uid = batch.first().map(|m| m.uid),
                        error = %e,
                        "Classification failed, leaving batch in place"
                    );
                    summary.unclassified += batch.len();
                }
            }
        }
        assignments
    }
}

fn search_and_fetch(
    session: &mut dyn MailSession,
    search: &str,
) -> Result<Vec<RawMessage>, MailboxError> {
    let uids = session.search(search)?;
    if uids.is_empty() {
        return Ok(Vec::new());
    }
    debug!(count = uids.len(), "Search matched");
    session.fetch(&uids)
}

/// Pair each classification with the UID of the message it was made for.
fn pair_with_uids(
    provider: &str,
    batch: &[ParsedMessage],
    result: Result<Vec<Classification>, ClassifyError>,
) -> Result<Vec<(u32, String)>, ClassifyError> {
    let classifications = result?;
    if classifications.len() != batch.len() {
        return Err(ClassifyError::CountMismatch {
            provider: provider.to_string(),
            expected: batch.len(),
            got: classifications.len(),
        });
    }
    Ok(batch
        .iter()
        .zip(classifications)
        .map(|(message, c)| (message.uid, c.prediction.trim().to_string()))
        .collect())
}

fn move_all(
    session: &mut dyn MailSession,
    assignments: &[(u32, String)],
) -> (usize, Vec<FailedMove>) {
    let mut moved = 0;
    let mut failed = Vec::new();
    for (uid, folder) in assignments {
        match session.move_message(*uid, folder) {
            Ok(()) => {
                debug!(uid, folder = %folder, "Moved message");
                moved += 1;
            }
            Err(e) => {
                warn!(uid, folder = %folder, error = %e, "Move failed");
                failed.push(FailedMove {
                    uid: *uid,
                    folder: folder.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    (moved, failed)
}

fn logout_quietly(session: &mut dyn MailSession) {
    if let Err(e) = session.logout() {
        warn!(error = %e, "Logout failed");
    }
}
