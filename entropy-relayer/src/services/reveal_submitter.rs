//! Single writer for the operator's transactions.
//!
//! All reveals go through one task that owns the operator's next nonce. It
//! loads the nonce from the ledger once, increments it locally for every
//! transaction that used it up and reloads it after any other failure. Callers
//! talk to the task through a mailbox and get their result on a oneshot channel.

use entropy_types::RevealRequest;
use tokio::sync::{mpsc, oneshot};
use tracing::instrument;

use crate::services::ledger_client::{LedgerClientService, RevealReceipt, SubmissionError};

type SubmitResult = Result<RevealReceipt, SubmissionError>;

struct SubmitJob {
    request: RevealRequest,
    reply: oneshot::Sender<SubmitResult>,
}

/// Handle to the submitter task. Cheap to clone.
///
/// The task stops once every handle is dropped.
#[derive(Clone)]
pub(crate) struct RevealSubmitter {
    sender: mpsc::Sender<SubmitJob>,
}

impl RevealSubmitter {
    /// Spawns the submitter task.
    pub(crate) fn spawn(ledger: LedgerClientService, mailbox: usize) -> Self {
        let (sender, receiver) = mpsc::channel(mailbox.max(1));
        tokio::spawn(run(ledger, receiver));
        Self { sender }
    }

    /// Submits `request` and waits until it is included or failed.
    pub(crate) async fn submit(&self, request: RevealRequest) -> SubmitResult {
        let (reply, result) = oneshot::channel();
        self.sender
            .send(SubmitJob { request, reply })
            .await
            .map_err(|_| SubmissionError::Transport(eyre::eyre!("reveal submitter stopped")))?;
        result.await.map_err(|_| {
            SubmissionError::Transport(eyre::eyre!("reveal submitter dropped the request"))
        })?
    }
}

async fn run(ledger: LedgerClientService, mut receiver: mpsc::Receiver<SubmitJob>) {
    let mut next_nonce = None;
    while let Some(SubmitJob { request, reply }) = receiver.recv().await {
        let result = submit(&ledger, &mut next_nonce, request).await;
        if reply.send(result).is_err() {
            tracing::debug!("caller of reveal for {} went away", request.commit_id);
        }
    }
    tracing::debug!("all submitter handles dropped - shutting down");
}

#[instrument(
    level = "debug",
    skip(ledger, next_nonce, request),
    fields(commit_id = %request.commit_id)
)]
async fn submit(
    ledger: &LedgerClientService,
    next_nonce: &mut Option<u64>,
    request: RevealRequest,
) -> SubmitResult {
    let nonce = match *next_nonce {
        Some(nonce) => nonce,
        None => {
            let nonce = ledger
                .transaction_count()
                .await
                .map_err(|err| SubmissionError::Transport(err.wrap_err("while loading nonce")))?;
            tracing::debug!("loaded nonce {nonce} from ledger");
            nonce
        }
    };
    let result = ledger.send_reveal(nonce, request).await;
    *next_nonce = match &result {
        Ok(_) | Err(SubmissionError::Reverted { .. }) => Some(nonce + 1),
        Err(SubmissionError::NonceConflict(reason)) => {
            tracing::warn!("nonce {nonce} conflicts ({reason}) - resyncing");
            None
        }
        Err(_) => None,
    };
    result
}
