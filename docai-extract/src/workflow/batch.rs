//! Batch runner
//!
//! Documents are independent, so a batch runs up to `workers` of them at a
//! time. Results come back in input order. The first fatal error (a
//! collaborator crash) aborts the batch; documents still in flight are
//! dropped.

use super::Pipeline;
use crate::error::ExtractResult;
use crate::extractors::DocumentImage;
use crate::types::DocumentResult;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::time::Instant;
use tracing::info;

/// Process `images` with bounded parallelism
pub async fn run_batch(
    pipeline: &Pipeline,
    images: Vec<DocumentImage>,
    workers: usize,
) -> ExtractResult<Vec<DocumentResult>> {
    let workers = workers.max(1);
    let total = images.len();
    let started = Instant::now();
    info!(documents = total, workers, "Starting batch");

    // buffered (not buffer_unordered) keeps output in input order
    let results: Vec<DocumentResult> = stream::iter(images)
        .map(|image| async move { pipeline.process_document(&image).await })
        .buffered(workers)
        .try_collect()
        .await?;

    info!(
        documents = results.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Batch complete"
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconcileConfig;
    use crate::error::ExtractError;
    use crate::extractors::CaptureStore;
    use crate::fusion::{ReferenceList, ReferenceStore};
    use crate::workflow::{Collaborators, Reconciler};
    use std::sync::Arc;

    fn pipeline(store: CaptureStore) -> Pipeline {
        let references = ReferenceStore::new(
            ReferenceList::new("dealer", vec![]),
            ReferenceList::new("model", vec![]),
        );
        let reconciler =
            Reconciler::new(Arc::new(ReconcileConfig::default()), Arc::new(references)).unwrap();
        Pipeline::new(Collaborators::from_capture(Arc::new(store)), reconciler)
    }

    #[tokio::test]
    async fn test_results_in_input_order() {
        let docs = CaptureStore::parse(
            r#"[{"document_id": "c"}, {"document_id": "a"}, {"document_id": "b"}]"#,
        )
        .unwrap();
        let store = CaptureStore::from_documents(docs).unwrap();
        let images = store.images();
        let pipeline = pipeline(store);

        let results = run_batch(&pipeline, images, 2).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.document_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_crash_aborts_batch() {
        let store = CaptureStore::from_documents(
            CaptureStore::parse(r#"[{"document_id": "known"}]"#).unwrap(),
        )
        .unwrap();
        let pipeline = pipeline(store);

        let images = vec![DocumentImage::new("known"), DocumentImage::new("unknown")];
        let err = run_batch(&pipeline, images, 4).await.unwrap_err();
        assert!(matches!(err, ExtractError::Extraction { .. }));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let pipeline = pipeline(CaptureStore::default());
        assert!(run_batch(&pipeline, Vec::new(), 0).await.unwrap().is_empty());
    }
}
