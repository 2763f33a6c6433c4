//! Document Pipeline
//!
//! Runs the collaborators for one document, harvests their output into raw
//! candidates and hands them to the `Reconciler`.
//!
//! # Architecture
//! - **Phase 1**: Extraction (Tier 1 - OCR, VLM and detector run concurrently)
//! - **Phase 2**: Fusion (Tier 2 - normalization and per-field policies)
//! - **Phase 3**: Validation (Tier 3 - confidence gate)
//!
//! # Error Handling
//! - A collaborator that is not configured, or that reports `NotAvailable` /
//!   `Timeout`, is an absent source: recorded as unavailable, processing continues
//! - Any other collaborator error aborts the document with
//!   `ExtractError::Extraction`
//!
//! # Example
//! ```rust,ignore
//! let pipeline = Pipeline::new(Collaborators::from_capture(store), reconciler);
//! let result = pipeline.process_document(&DocumentImage::new("inv-1")).await?;
//! ```

use super::{DocumentCandidates, Reconciler, WorkflowEvent};
use crate::error::{ExtractError, ExtractResult};
use crate::extractors::{
    detector_candidates, ocr_candidates, vlm_candidates, CaptureStore, DocumentImage, FieldReader,
    ObjectDetector, TextExtractor,
};
use crate::types::{DocumentResult, ExtractionError, RawCandidate, SourceId};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Extraction collaborators; `None` means the source is not deployed
#[derive(Clone, Default)]
pub struct Collaborators {
    pub ocr: Option<Arc<dyn TextExtractor>>,
    pub vlm: Option<Arc<dyn FieldReader>>,
    pub detector: Option<Arc<dyn ObjectDetector>>,
}

impl Collaborators {
    /// All three sources replayed from one capture set
    pub fn from_capture(store: Arc<CaptureStore>) -> Self {
        Self {
            ocr: Some(store.clone()),
            vlm: Some(store.clone()),
            detector: Some(store),
        }
    }
}

/// Per-document orchestrator
pub struct Pipeline {
    collaborators: Collaborators,
    reconciler: Reconciler,
    event_tx: Option<mpsc::Sender<WorkflowEvent>>,
}

impl Pipeline {
    pub fn new(collaborators: Collaborators, reconciler: Reconciler) -> Self {
        Self {
            collaborators,
            reconciler,
            event_tx: None,
        }
    }

    /// Pipeline that reports progress on `event_tx`
    pub fn with_events(
        collaborators: Collaborators,
        reconciler: Reconciler,
        event_tx: mpsc::Sender<WorkflowEvent>,
    ) -> Self {
        Self {
            collaborators,
            reconciler,
            event_tx: Some(event_tx),
        }
    }

    /// Process one document end to end and record its latency
    pub async fn process_document(&self, image: &DocumentImage) -> ExtractResult<DocumentResult> {
        let started = Instant::now();
        self.emit(WorkflowEvent::DocumentStarted {
            document_id: image.document_id.clone(),
        })
        .await;

        let candidates = self.collect_candidates(image).await?;
        let mut result = self.reconciler.reconcile_document(&candidates);

        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        result.processing_metadata.latency_ms = Some(latency_ms);

        info!(
            document_id = %result.document_id,
            status = %result.overall_status,
            flagged = result.processing_metadata.flagged_fields.len(),
            latency_ms,
            "Document reconciled"
        );

        self.emit(WorkflowEvent::DocumentCompleted {
            document_id: result.document_id.clone(),
            status: result.overall_status,
            latency_ms,
        })
        .await;

        Ok(result)
    }

    /// Phase 1: query collaborators concurrently and harvest raw candidates
    pub async fn collect_candidates(&self, image: &DocumentImage) -> ExtractResult<DocumentCandidates> {
        let config = self.reconciler.config();
        let document_id = image.document_id.as_str();

        let ocr = async {
            match &self.collaborators.ocr {
                Some(ocr) => settle(document_id, SourceId::Ocr, ocr.extract_text(image).await)
                    .map(|lines| lines.map(|lines| ocr_candidates::harvest(&lines, config))),
                None => Ok(None),
            }
        };

        let vlm = async {
            match &self.collaborators.vlm {
                Some(vlm) => settle(
                    document_id,
                    SourceId::Vlm,
                    vlm.extract_fields(image, &config.fields).await,
                )
                .map(|fields| fields.map(|fields| vlm_candidates::from_fields(&fields))),
                None => Ok(None),
            }
        };

        let mark_fields = config.mark_fields();
        let detector = async {
            match &self.collaborators.detector {
                Some(detector) if !mark_fields.is_empty() => settle(
                    document_id,
                    SourceId::Detector,
                    detector.detect(image, &mark_fields).await,
                )
                .map(|detections| {
                    detections.map(|detections| {
                        detector_candidates::from_detections(
                            &detections,
                            &mark_fields,
                            config.detector_min_confidence,
                        )
                    })
                }),
                _ => Ok(None),
            }
        };

        let (ocr, vlm, detector) = tokio::join!(ocr, vlm, detector);

        let mut candidates: Vec<RawCandidate> = Vec::new();
        let mut source_availability = BTreeMap::new();
        for (source_id, harvested) in [
            (SourceId::Ocr, ocr?),
            (SourceId::Vlm, vlm?),
            (SourceId::Detector, detector?),
        ] {
            source_availability.insert(source_id, harvested.is_some());
            candidates.extend(harvested.into_iter().flatten());
        }

        debug!(
            document_id,
            candidates = candidates.len(),
            ?source_availability,
            "Collected candidates"
        );

        Ok(DocumentCandidates {
            document_id: image.document_id.clone(),
            candidates,
            source_availability,
        })
    }

    async fn emit(&self, event: WorkflowEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}

/// Absent-source errors become `None`; anything else is fatal
fn settle<T>(
    document_id: &str,
    source_id: SourceId,
    result: Result<T, ExtractionError>,
) -> ExtractResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_absence() => {
            warn!(document_id, source = %source_id, error = %e, "Source unavailable");
            Ok(None)
        }
        Err(e) => Err(ExtractError::Extraction {
            document_id: document_id.to_string(),
            source_id,
            error: e,
        }),
    }
}
