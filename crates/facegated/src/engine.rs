//! Engine thread bridging async handlers to the inference pipeline.
//!
//! ONNX sessions are not `Sync`, so a dedicated OS thread owns the
//! pipeline and serializes inference; handlers talk to it over an mpsc
//! channel with oneshot replies.

use facegate_core::{ImagePayload, VerificationPipeline, VerificationReport, VerifyConfig};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("verification engine unavailable")]
    ChannelClosed,
}

struct VerifyJob {
    profile: ImagePayload,
    id: ImagePayload,
    config: VerifyConfig,
    reply: oneshot::Sender<VerificationReport>,
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<VerifyJob>,
}

impl EngineHandle {
    /// Run the pipeline against a payload pair with the given config
    /// snapshot, awaiting the report.
    pub async fn verify(
        &self,
        profile: ImagePayload,
        id: ImagePayload,
        config: VerifyConfig,
    ) -> Result<VerificationReport, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(VerifyJob {
                profile,
                id,
                config,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Move the pipeline onto a dedicated thread and return its handle.
pub fn spawn(mut pipeline: VerificationPipeline) -> EngineHandle {
    let (tx, mut rx) = mpsc::channel::<VerifyJob>(16);

    std::thread::Builder::new()
        .name("facegate-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(job) = rx.blocking_recv() {
                let report = pipeline.verify(&job.profile, &job.id, &job.config);
                // A dropped receiver just means the client went away.
                let _ = job.reply.send(report);
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    EngineHandle { tx }
}
