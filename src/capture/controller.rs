use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

use super::{
    BarcodeOutcome, BarcodeTicket, CaptureSession, ManualStep, PhotoBatchReport, PhotoTicket,
    WizardAdvance,
};
use crate::catalog_matcher::{AutoSelect, CatalogMatcher};
use crate::config::{CaptureConfig, MatcherConfig};
use crate::errors::{error_logging, AppError, AppResult};
use crate::model::{
    CatalogCandidate, CategoryDetection, DetectedItem, NewInventoryItem, BARCODE_CONFIDENCE,
    MANUAL_CONFIDENCE, PHOTO_CONFIDENCE,
};
use crate::observability::{
    capture_span, record_collaborator_failure, record_commit_metrics, record_photo_batch_metrics,
};
use crate::services::{
    CategoryDetector, ExpiryEstimator, ImageInventoryScanner, InventoryStore, ProductCatalog,
};
use crate::validation::validate_item_name;

/// Collaborators a capture controller talks to
#[derive(Clone)]
pub struct CaptureServices {
    pub catalog: Arc<dyn ProductCatalog>,
    pub inventory: Arc<dyn InventoryStore>,
    pub expiry: Arc<dyn ExpiryEstimator>,
    pub scanner: Arc<dyn ImageInventoryScanner>,
    pub detector: Arc<dyn CategoryDetector>,
}

/// Runs the remote half of every capture transition.
///
/// Every collaborator call is bounded by the capture timeout and aborted as
/// soon as the owning session is cancelled.
pub struct CaptureController {
    services: CaptureServices,
    matcher: CatalogMatcher,
    config: CaptureConfig,
    next_session_id: AtomicU64,
}

impl CaptureController {
    pub fn new(
        services: CaptureServices,
        matcher_config: MatcherConfig,
        config: CaptureConfig,
    ) -> Self {
        let matcher = CatalogMatcher::new(Arc::clone(&services.catalog), matcher_config);
        Self {
            services,
            matcher,
            config,
            next_session_id: AtomicU64::new(0),
        }
    }

    pub fn new_session(&self) -> CaptureSession {
        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst) + 1;
        CaptureSession::new(id, self.config.clone())
    }

    pub fn matcher(&self) -> &CatalogMatcher {
        &self.matcher
    }

    async fn bounded<T, F>(&self, token: &CancellationToken, call: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        tokio::select! {
            _ = token.cancelled() => Err(AppError::Cancelled("capture session cancelled".to_string())),
            result = tokio::time::timeout(self.config.remote_timeout(), call) => result?,
        }
    }

    // Barcode mode

    /// Look up the ticket's barcode. Returns `Cancelled` as soon as the session is cancelled.
    pub async fn lookup_barcode(&self, ticket: &BarcodeTicket) -> AppResult<Option<CatalogCandidate>> {
        let result = self
            .bounded(&ticket.token, self.services.catalog.lookup_by_barcode(ticket.code()))
            .instrument(capture_span("lookup_barcode", ticket.session_id()))
            .await;

        if let Err(e) = &result {
            if !matches!(e, AppError::Cancelled(_)) {
                error_logging::log_collaborator_error(
                    e,
                    "product_catalog",
                    "lookup_by_barcode",
                    Some(ticket.code()),
                );
                record_collaborator_failure("product_catalog");
            }
        }
        result
    }

    /// Handle one scan event end to end
    pub async fn handle_barcode(&self, session: &mut CaptureSession, raw_code: &str) -> BarcodeOutcome {
        let Some(ticket) = session.begin_barcode_scan(raw_code) else {
            return BarcodeOutcome::Ignored;
        };
        let result = self.lookup_barcode(&ticket).await;
        session.apply_barcode_result(&ticket, result)
    }

    // Photo mode

    async fn detect_category(&self, item_name: &str, token: &CancellationToken) -> CategoryDetection {
        match self
            .bounded(token, self.services.detector.detect(item_name))
            .await
        {
            Ok(detection) => detection,
            Err(e) => {
                if !matches!(e, AppError::Cancelled(_)) {
                    error_logging::log_collaborator_error(
                        &e,
                        "category_detector",
                        "detect",
                        Some(item_name),
                    );
                    record_collaborator_failure("category_detector");
                }
                CategoryDetection {
                    category: self.config.default_category.clone(),
                    is_food: true,
                }
            }
        }
    }

    fn photo_item(&self, name: String, detected: DetectedItem, detection: CategoryDetection) -> NewInventoryItem {
        let expires_at = detected
            .days_until_expiry
            .filter(|days| *days > 0)
            .and_then(|days| {
                let expires_at = days_from_now(days);
                if expires_at.is_none() {
                    warn!(name = %name, days, "Detected shelf life out of range, leaving expiry unset");
                }
                expires_at
            });
        NewInventoryItem {
            name,
            category: detection.category,
            quantity_label: detected
                .quantity_estimate
                .filter(|estimate| !estimate.trim().is_empty()),
            expires_at,
            confidence_score: PHOTO_CONFIDENCE,
            is_food: detection.is_food,
            catalog_product_id: None,
            catalog_price: None,
            catalog_image_url: None,
        }
    }

    /// Scan the ticket's photos and insert every detection without confirmation.
    ///
    /// A failed detection or insert is counted and skipped; the batch goes on.
    /// Once the session is cancelled no further items are inserted.
    pub async fn run_photo_batch(&self, ticket: &PhotoTicket) -> PhotoBatchReport {
        let span = capture_span("photo_batch", ticket.session_id());
        self.run_photo_batch_inner(ticket).instrument(span).await
    }

    async fn run_photo_batch_inner(&self, ticket: &PhotoTicket) -> PhotoBatchReport {
        let mut report = PhotoBatchReport::default();

        let detections = match self
            .bounded(&ticket.token, self.services.scanner.scan_photos(ticket.image_urls()))
            .await
        {
            Ok(detections) => detections,
            Err(AppError::Cancelled(_)) => {
                report.cancelled = true;
                return report;
            }
            Err(e) => {
                error_logging::log_collaborator_error(&e, "image_scanner", "scan_photos", None);
                record_collaborator_failure("image_scanner");
                report.scanner_unavailable = true;
                return report;
            }
        };
        report.detected = detections.len();

        for detected in detections {
            if ticket.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let name = match validate_item_name(&detected.name) {
                Ok(name) => name.to_string(),
                Err(key) => {
                    warn!(name = %detected.name, reason = %key, "Skipping unusable detection");
                    report.failed += 1;
                    continue;
                }
            };

            let detection = self.detect_category(&name, &ticket.token).await;
            if ticket.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let item = self.photo_item(name, detected, detection);
            let item_name = item.name.clone();
            match self
                .bounded(&ticket.token, self.services.inventory.insert(item))
                .await
            {
                Ok(id) => {
                    report.inserted += 1;
                    report.item_ids.push(id);
                }
                Err(AppError::Cancelled(_)) => {
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    error_logging::log_commit_error(&e, ticket.session_id(), Some(&item_name), "photo");
                    report.failed += 1;
                }
            }
        }

        record_photo_batch_metrics(report.detected, report.inserted, report.failed);
        info!(
            detected = report.detected,
            inserted = report.inserted,
            failed = report.failed,
            cancelled = report.cancelled,
            "Photo batch finished"
        );
        report
    }

    /// Start, run and finish a photo batch on `session`
    pub async fn capture_photos(
        &self,
        session: &mut CaptureSession,
        image_urls: Vec<String>,
    ) -> AppResult<PhotoBatchReport> {
        let ticket = session.begin_photo_batch(image_urls)?;
        let report = self.run_photo_batch(&ticket).await;
        session.finish_photo_batch(&ticket, &report);
        Ok(report)
    }

    // Manual wizard

    /// Set the typed name and refresh catalog suggestions for it.
    ///
    /// The session stays borrowed across the debounce window and the catalog
    /// call, so a second keystroke cannot reach the session until this one
    /// returns. Keystroke handlers should use the split path instead:
    /// [`CaptureSession::set_name`], then [`CatalogMatcher::issue`] and
    /// [`CatalogMatcher::run`] on [`CaptureController::matcher`] without
    /// holding the session, then [`CaptureSession::apply_suggestions`], which
    /// drops the outcome of any superseded term.
    pub async fn search_name(
        &self,
        session: &mut CaptureSession,
        name: &str,
    ) -> AppResult<Option<AutoSelect>> {
        session.set_name(name)?;
        let request = self.matcher.issue(session.name_term());
        let outcome = self.matcher.run(&request).await;
        Ok(session.apply_suggestions(&request, outcome))
    }

    /// Advance the wizard; leaving the name step without a catalog match asks
    /// the category detector for a suggestion.
    pub async fn advance(&self, session: &mut CaptureSession) -> AppResult<WizardAdvance> {
        let advance = session.advance()?;
        if advance == WizardAdvance::Next(ManualStep::Category) && session.needs_category_detection() {
            let name = session.name_term().to_string();
            let detection = self
                .detect_category(&name, &session.cancellation_token())
                .await;
            session.apply_category_detection(&detection);
        }
        Ok(advance)
    }

    // Commit

    /// Expiry for a catalog-backed commit. "No estimate" leaves it unset; a
    /// failed or timed-out estimator falls back to `expiry_fallback_days`.
    async fn estimate_expiry(&self, category: &str, token: &CancellationToken) -> Option<DateTime<Utc>> {
        match self
            .bounded(token, self.services.expiry.estimate(category))
            .await
        {
            Ok(expires_at) => expires_at,
            Err(e) => {
                error_logging::log_collaborator_error(&e, "expiry_estimator", "estimate", Some(category));
                record_collaborator_failure("expiry_estimator");
                days_from_now(self.config.expiry_fallback_days)
            }
        }
    }

    /// Insert the pending item and move the session to `Committed`.
    ///
    /// On failure the session keeps its state and every captured field, and
    /// the error is returned for a retry.
    pub async fn commit(&self, session: &mut CaptureSession) -> AppResult<String> {
        let (item, mode) = session.commit_candidate()?;
        let epoch = session.epoch();
        let token = session.cancellation_token();
        let session_id = session.id();
        let start = Instant::now();

        let result = async {
            let expires_at = match (&item.selected_candidate, item.expires_at) {
                (Some(_), None) => self.estimate_expiry(&item.category, &token).await,
                (_, expires_at) => expires_at,
            };
            let candidate = item.selected_candidate.as_ref();
            let record = NewInventoryItem {
                name: item.display_name().to_string(),
                category: item.category.clone(),
                quantity_label: Some(item.quantity_label.clone())
                    .filter(|label| !label.trim().is_empty()),
                expires_at,
                confidence_score: if mode == "barcode" {
                    BARCODE_CONFIDENCE
                } else {
                    MANUAL_CONFIDENCE
                },
                is_food: item.is_food,
                catalog_product_id: candidate.map(|c| c.id.clone()),
                catalog_price: candidate.and_then(|c| c.price),
                catalog_image_url: candidate.and_then(|c| c.image_url.clone()),
            };
            self.bounded(&token, self.services.inventory.insert(record))
                .await
        }
        .instrument(capture_span("commit", session_id))
        .await;

        match result {
            Ok(id) => {
                record_commit_metrics(mode, true, start.elapsed());
                if !session.finish_commit(epoch, id.clone()) {
                    warn!(session_id = %session_id, item_id = %id, "Session moved on before commit finished");
                }
                info!(session_id = %session_id, item_id = %id, mode = %mode, "Inventory item committed");
                Ok(id)
            }
            Err(e) => {
                record_commit_metrics(mode, false, start.elapsed());
                error_logging::log_commit_error(&e, session_id, Some(item.display_name()), mode);
                session.set_last_error(&e);
                Err(e)
            }
        }
    }
}

/// `now + days`, or `None` when the result is not a representable timestamp
fn days_from_now(days: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_days(days).and_then(|delta| Utc::now().checked_add_signed(delta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{
        CategoryTableEstimator, InMemoryCatalog, InMemoryInventory, KeywordCategoryDetector,
        StaticImageScanner,
    };

    fn controller(inventory: Arc<InMemoryInventory>) -> CaptureController {
        let services = CaptureServices {
            catalog: Arc::new(InMemoryCatalog::default()),
            inventory,
            expiry: Arc::new(CategoryTableEstimator::default()),
            scanner: Arc::new(StaticImageScanner::default()),
            detector: Arc::new(KeywordCategoryDetector::default()),
        };
        let matcher_config = MatcherConfig {
            debounce_ms: 0,
            ..Default::default()
        };
        CaptureController::new(services, matcher_config, CaptureConfig::default())
    }

    #[test]
    fn test_days_from_now_rejects_overflow() {
        assert!(days_from_now(7).is_some_and(|at| at > Utc::now()));
        assert!(days_from_now(i64::MAX / 2).is_none());
        assert!(days_from_now(i64::MAX).is_none());
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let controller = controller(Arc::new(InMemoryInventory::new()));
        assert_ne!(controller.new_session().id(), controller.new_session().id());
    }

    #[tokio::test]
    async fn test_manual_commit_uses_manual_confidence() {
        let inventory = Arc::new(InMemoryInventory::new());
        let controller = controller(Arc::clone(&inventory));
        let mut session = controller.new_session();

        session.start_manual().unwrap();
        controller.search_name(&mut session, "Halfvolle melk").await.unwrap();
        assert_eq!(
            controller.advance(&mut session).await.unwrap(),
            WizardAdvance::Next(ManualStep::Category)
        );
        // Detector suggestion applied on leaving the name step
        assert_eq!(session.pending().unwrap().category, "dairy_eggs");

        controller.advance(&mut session).await.unwrap();
        controller.advance(&mut session).await.unwrap();
        session.skip_expiry().unwrap();
        controller.advance(&mut session).await.unwrap();

        let id = controller.commit(&mut session).await.unwrap();
        assert!(session.state().is_terminal());
        assert!(session.pending().is_none());

        let items = inventory.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].confidence_score, MANUAL_CONFIDENCE);
        assert_eq!(items[0].quantity_label.as_deref(), Some("pieces"));
        assert!(items[0].expires_at.is_none());
        assert!(id.starts_with("inv-"));
    }

    #[tokio::test]
    async fn test_commit_refused_before_ready() {
        let controller = controller(Arc::new(InMemoryInventory::new()));
        let mut session = controller.new_session();
        session.start_manual().unwrap();
        assert!(matches!(
            controller.commit(&mut session).await,
            Err(AppError::Validation(_))
        ));
    }
}
