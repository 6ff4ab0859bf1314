use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{
    BarcodeOutcome, BarcodeTicket, CancelReason, CaptureState, ManualStep, PhotoBatchReport,
    PhotoTicket, ScanMode, WizardAdvance,
};
use crate::catalog_matcher::{auto_select, AutoSelect, SearchOutcome, SearchRequest};
use crate::config::CaptureConfig;
use crate::errors::{error_logging, AppError, AppResult};
use crate::model::{CatalogCandidate, CategoryDetection, PendingCaptureItem};
use crate::observability::record_barcode_metrics;
use crate::validation::{
    format_quantity_label, normalize_barcode, validate_category, validate_item_name,
    validate_quantity_label,
};

/// State of one capture attempt.
///
/// Holds at most one [`PendingCaptureItem`]; it is dropped on commit and on cancel.
#[derive(Debug)]
pub struct CaptureSession {
    id: u64,
    config: CaptureConfig,
    state: CaptureState,
    pending: Option<PendingCaptureItem>,
    suggestions: Vec<CatalogCandidate>,
    search_unavailable: bool,
    in_flight_code: Option<String>,
    last_code: Option<String>,
    expiry_skipped: bool,
    ready_to_commit: bool,
    epoch: u64,
    token: CancellationToken,
    last_error: Option<String>,
}

impl CaptureSession {
    pub fn new(id: u64, config: CaptureConfig) -> Self {
        Self {
            id,
            config,
            state: CaptureState::Idle,
            pending: None,
            suggestions: Vec::new(),
            search_unavailable: false,
            in_flight_code: None,
            last_code: None,
            expiry_skipped: false,
            ready_to_commit: false,
            epoch: 0,
            token: CancellationToken::new(),
            last_error: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingCaptureItem> {
        self.pending.as_ref()
    }

    /// Catalog candidates offered on the name step
    pub fn suggestions(&self) -> &[CatalogCandidate] {
        &self.suggestions
    }

    /// The last name search failed; show "search unavailable"
    pub fn search_unavailable(&self) -> bool {
        self.search_unavailable
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_lookup_in_flight(&self) -> bool {
        self.in_flight_code.is_some()
    }

    pub fn is_ready_to_commit(&self) -> bool {
        match self.state {
            CaptureState::Confirming => self.pending.is_some(),
            CaptureState::Manual { .. } => self.ready_to_commit && self.pending.is_some(),
            _ => false,
        }
    }

    pub(crate) fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub(crate) fn set_last_error(&mut self, error: &AppError) {
        self.last_error = Some(error.to_string());
    }

    /// Start a fresh attempt: invalidate outstanding tickets and clear all fields
    fn restart(&mut self, state: CaptureState) {
        self.token.cancel();
        self.token = CancellationToken::new();
        self.epoch += 1;
        self.pending = None;
        self.suggestions.clear();
        self.search_unavailable = false;
        self.in_flight_code = None;
        self.last_code = None;
        self.expiry_skipped = false;
        self.ready_to_commit = false;
        self.last_error = None;
        self.transition(state);
    }

    fn transition(&mut self, state: CaptureState) {
        debug!(
            session_id = %self.id,
            from = %self.state.name(),
            to = %state.name(),
            "Capture state transition"
        );
        self.state = state;
    }

    fn ensure_startable(&self, operation: &str) -> AppResult<()> {
        if self.state.is_startable() {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "cannot {} while session is {}",
                operation,
                self.state.name()
            )))
        }
    }

    fn pending_mut(&mut self) -> AppResult<&mut PendingCaptureItem> {
        self.pending
            .as_mut()
            .ok_or_else(|| AppError::Internal("no pending capture item".to_string()))
    }

    fn ensure_step(&self, step: ManualStep) -> AppResult<()> {
        match self.state {
            CaptureState::Manual { step: current } if current == step => Ok(()),
            _ => Err(AppError::Validation(format!(
                "{} can only be edited on the {} step",
                step.field(),
                step.field()
            ))),
        }
    }

    fn invalid(&self, operation: &str, field: &str, input: Option<&str>, key: &str) -> AppError {
        let error = AppError::Validation(format!("{}: {}", field, key));
        error_logging::log_validation_error(&error, operation, Some(self.id), field, input);
        error
    }

    // Barcode mode

    pub fn start_barcode_scan(&mut self) -> AppResult<()> {
        self.ensure_startable("start barcode scan")?;
        self.restart(CaptureState::Scanning {
            mode: ScanMode::Barcode,
        });
        Ok(())
    }

    /// Return to the camera from a confirmation or a not-found result
    pub fn resume_scanning(&mut self) -> AppResult<()> {
        match self.state {
            CaptureState::Confirming | CaptureState::Cancelled { .. } => {
                self.restart(CaptureState::Scanning {
                    mode: ScanMode::Barcode,
                });
                Ok(())
            }
            _ => Err(AppError::Validation(format!(
                "cannot resume scanning while session is {}",
                self.state.name()
            ))),
        }
    }

    /// Accept a scan event. Returns a ticket when a lookup should run.
    ///
    /// Duplicate codes and any event arriving while a lookup is in flight are
    /// dropped, so a continuously scanning camera produces one lookup.
    pub fn begin_barcode_scan(&mut self, raw_code: &str) -> Option<BarcodeTicket> {
        if self.in_flight_code.is_some() {
            record_barcode_metrics("duplicate");
            return None;
        }
        if self.state
            != (CaptureState::Scanning {
                mode: ScanMode::Barcode,
            })
        {
            record_barcode_metrics("ignored");
            return None;
        }

        let code = normalize_barcode(raw_code);
        if code.is_empty() {
            record_barcode_metrics("ignored");
            return None;
        }
        if self.last_code.as_deref() == Some(code.as_str()) {
            record_barcode_metrics("duplicate");
            return None;
        }

        self.in_flight_code = Some(code.clone());
        self.last_code = Some(code.clone());
        self.transition(CaptureState::Resolving { code: code.clone() });
        record_barcode_metrics("started");
        info!(session_id = %self.id, code = %code, "Barcode lookup started");

        Some(BarcodeTicket {
            session_id: self.id,
            epoch: self.epoch,
            code,
            token: self.token.clone(),
        })
    }

    fn barcode_ticket_is_current(&self, ticket: &BarcodeTicket) -> bool {
        ticket.session_id == self.id
            && ticket.epoch == self.epoch
            && self.in_flight_code.as_deref() == Some(ticket.code.as_str())
    }

    /// Apply a barcode lookup result. Stale tickets are discarded.
    pub fn apply_barcode_result(
        &mut self,
        ticket: &BarcodeTicket,
        result: AppResult<Option<CatalogCandidate>>,
    ) -> BarcodeOutcome {
        if !self.barcode_ticket_is_current(ticket) {
            debug!(session_id = %self.id, code = %ticket.code, "Discarding stale barcode result");
            return BarcodeOutcome::Discarded;
        }
        self.in_flight_code = None;

        match result {
            Ok(Some(candidate)) => {
                let mut item = PendingCaptureItem::new(&self.config.default_category);
                item.raw_name = candidate.product_name.clone();
                item.quantity_label = candidate
                    .unit_size
                    .clone()
                    .unwrap_or_else(|| self.config.catalog_default_quantity.clone());
                item.apply_candidate(candidate);
                self.pending = Some(item);
                self.transition(CaptureState::Confirming);
                record_barcode_metrics("found");
                BarcodeOutcome::Found
            }
            Ok(None) => {
                self.pending = None;
                self.transition(CaptureState::Cancelled {
                    reason: CancelReason::NotFound {
                        code: ticket.code.clone(),
                    },
                });
                record_barcode_metrics("not_found");
                BarcodeOutcome::NotFound
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                self.pending = None;
                self.transition(CaptureState::Cancelled {
                    reason: CancelReason::LookupUnavailable {
                        code: ticket.code.clone(),
                    },
                });
                record_barcode_metrics("unavailable");
                BarcodeOutcome::Unavailable
            }
        }
    }

    /// Open the manual wizard after a barcode could not be resolved
    pub fn enter_manual_from_not_found(&mut self) -> AppResult<()> {
        match self.state {
            CaptureState::Cancelled {
                reason: CancelReason::NotFound { .. } | CancelReason::LookupUnavailable { .. },
            } => {
                self.open_wizard();
                Ok(())
            }
            _ => Err(AppError::Validation(format!(
                "no unresolved barcode to enter manually (session is {})",
                self.state.name()
            ))),
        }
    }

    // Photo mode

    pub fn begin_photo_batch(&mut self, image_urls: Vec<String>) -> AppResult<PhotoTicket> {
        let photo_mode = CaptureState::Scanning {
            mode: ScanMode::Photo,
        };
        if self.state != photo_mode {
            self.ensure_startable("start photo batch")?;
        }
        if image_urls.is_empty() {
            return Err(self.invalid("begin_photo_batch", "photos", None, "empty"));
        }
        if image_urls.len() > self.config.max_photos_per_batch {
            return Err(self.invalid(
                "begin_photo_batch",
                "photos",
                Some(&image_urls.len().to_string()),
                "too_many",
            ));
        }

        self.restart(photo_mode);
        info!(session_id = %self.id, photos = image_urls.len(), "Photo batch started");
        Ok(PhotoTicket {
            session_id: self.id,
            epoch: self.epoch,
            image_urls,
            token: self.token.clone(),
        })
    }

    /// Record the end of a photo batch. Returns false for a stale ticket.
    pub fn finish_photo_batch(&mut self, ticket: &PhotoTicket, report: &PhotoBatchReport) -> bool {
        if ticket.session_id != self.id || ticket.epoch != self.epoch {
            return false;
        }

        if report.scanner_unavailable {
            self.last_error = Some("photo scan unavailable".to_string());
        }
        if report.inserted > 0 {
            self.transition(CaptureState::Committed {
                item_ids: report.item_ids.clone(),
            });
        } else {
            self.transition(CaptureState::Idle);
        }
        true
    }

    // Manual wizard

    pub fn start_manual(&mut self) -> AppResult<()> {
        self.ensure_startable("start manual entry")?;
        self.open_wizard();
        Ok(())
    }

    fn open_wizard(&mut self) {
        self.restart(CaptureState::Manual {
            step: ManualStep::Name,
        });
        let mut item = PendingCaptureItem::new(&self.config.default_category);
        item.quantity_label = format_quantity_label("", &self.config.default_unit);
        self.pending = Some(item);
    }

    /// Update the typed name. Search it with the matcher, then feed the outcome
    /// to [`apply_suggestions`](Self::apply_suggestions).
    pub fn set_name(&mut self, name: &str) -> AppResult<()> {
        self.ensure_step(ManualStep::Name)?;
        self.ready_to_commit = false;
        self.pending_mut()?.raw_name = name.to_string();
        Ok(())
    }

    /// Current name, trimmed as the matcher sees it
    pub fn name_term(&self) -> &str {
        self.pending
            .as_ref()
            .map(|item| item.raw_name.trim())
            .unwrap_or("")
    }

    /// Apply a name search. Returns `None` when the outcome no longer matches
    /// the typed name or the wizard has left the name step.
    pub fn apply_suggestions(
        &mut self,
        request: &SearchRequest,
        outcome: SearchOutcome,
    ) -> Option<AutoSelect> {
        if outcome.is_superseded() || self.ensure_step(ManualStep::Name).is_err() {
            return None;
        }
        if request.term() != self.name_term() {
            debug!(session_id = %self.id, term = %request.term(), "Ignoring suggestions for stale name");
            return None;
        }

        self.search_unavailable = matches!(outcome, SearchOutcome::Unavailable);
        self.suggestions = match outcome {
            SearchOutcome::Results(candidates) => candidates,
            _ => Vec::new(),
        };

        let item = self.pending.as_mut()?;
        let decision = auto_select(
            &self.suggestions,
            item.selected_candidate.as_ref(),
            request.term(),
        );
        match &decision {
            AutoSelect::Keep => {}
            AutoSelect::Select(candidate) => item.apply_candidate(candidate.clone()),
            AutoSelect::Clear => item.selected_candidate = None,
        }
        Some(decision)
    }

    /// Pick one of the offered suggestions
    pub fn select_candidate(&mut self, candidate_id: &str) -> AppResult<()> {
        self.ensure_step(ManualStep::Name)?;
        let candidate = self
            .suggestions
            .iter()
            .find(|candidate| candidate.id == candidate_id)
            .cloned()
            .ok_or_else(|| self.invalid("select_candidate", "candidate", Some(candidate_id), "unknown"))?;
        self.pending_mut()?.apply_candidate(candidate);
        Ok(())
    }

    /// Reject the offered candidate; the wizard falls through to manual steps
    pub fn clear_selection(&mut self) -> AppResult<()> {
        self.ensure_step(ManualStep::Name)?;
        self.ready_to_commit = false;
        self.pending_mut()?.selected_candidate = None;
        Ok(())
    }

    /// Manual category choice. Locks the category against later suggestions.
    pub fn set_category(&mut self, category: &str) -> AppResult<()> {
        self.ensure_step(ManualStep::Category)?;
        let slug = match validate_category(category) {
            Ok(slug) => slug.to_string(),
            Err(key) => return Err(self.invalid("set_category", "category", Some(category), key)),
        };
        self.pending_mut()?.lock_category(&slug);
        Ok(())
    }

    /// Apply a detector result unless the user already chose a category
    pub fn apply_category_detection(&mut self, detection: &CategoryDetection) -> bool {
        match self.pending.as_mut() {
            Some(item) => {
                item.is_food = detection.is_food;
                item.suggest_category(&detection.category)
            }
            None => false,
        }
    }

    pub fn set_quantity(&mut self, value: &str, unit: &str) -> AppResult<()> {
        if !matches!(self.state, CaptureState::Confirming) {
            self.ensure_step(ManualStep::Quantity)?;
        }
        let unit = if unit.trim().is_empty() {
            self.config.default_unit.as_str()
        } else {
            unit
        };
        let label = format_quantity_label(value, unit);
        if let Err(key) = validate_quantity_label(&label) {
            return Err(self.invalid("set_quantity", "quantity", Some(&label), key));
        }
        self.pending_mut()?.quantity_label = label;
        Ok(())
    }

    pub fn set_expiry(&mut self, expires_at: DateTime<Utc>) -> AppResult<()> {
        if !matches!(self.state, CaptureState::Confirming) {
            self.ensure_step(ManualStep::Expiry)?;
        }
        self.expiry_skipped = false;
        self.pending_mut()?.expires_at = Some(expires_at);
        Ok(())
    }

    /// Explicitly leave the expiry unset
    pub fn skip_expiry(&mut self) -> AppResult<()> {
        self.ensure_step(ManualStep::Expiry)?;
        self.expiry_skipped = true;
        self.pending_mut()?.expires_at = None;
        Ok(())
    }

    /// Whether leaving the name step should ask the category detector
    pub(crate) fn needs_category_detection(&self) -> bool {
        matches!(
            self.state,
            CaptureState::Manual {
                step: ManualStep::Category
            }
        ) && self
            .pending
            .as_ref()
            .is_some_and(|item| !item.category_locked && item.selected_candidate.is_none())
    }

    /// Validate the current step's field and move on.
    ///
    /// On the name step an accepted catalog candidate short-circuits the rest:
    /// category and quantity come from the catalog and expiry is left for the
    /// expiry estimator.
    pub fn advance(&mut self) -> AppResult<WizardAdvance> {
        let step = match self.state {
            CaptureState::Manual { step } => step,
            _ => {
                return Err(AppError::Validation(format!(
                    "wizard is not open (session is {})",
                    self.state.name()
                )))
            }
        };
        let item = self
            .pending
            .clone()
            .ok_or_else(|| AppError::Internal("no pending capture item".to_string()))?;

        match step {
            ManualStep::Name => {
                if let Err(key) = validate_item_name(&item.raw_name) {
                    return Err(self.invalid("advance", "name", Some(&item.raw_name), key));
                }
                if let Some(candidate) = item.selected_candidate {
                    let quantity = candidate
                        .unit_size
                        .clone()
                        .filter(|size| !size.trim().is_empty())
                        .unwrap_or_else(|| self.config.catalog_default_quantity.clone());
                    let pending = self.pending_mut()?;
                    pending.suggest_category(&candidate.category);
                    pending.quantity_label = quantity;
                    pending.expires_at = None;
                    self.ready_to_commit = true;
                    info!(session_id = %self.id, product = %candidate.product_name, "Catalog match accepted");
                    return Ok(WizardAdvance::ShortCircuit);
                }
            }
            ManualStep::Category => {
                if let Err(key) = validate_category(&item.category) {
                    return Err(self.invalid("advance", "category", Some(&item.category), key));
                }
            }
            ManualStep::Quantity => {
                if let Err(key) = validate_quantity_label(&item.quantity_label) {
                    return Err(self.invalid(
                        "advance",
                        "quantity",
                        Some(&item.quantity_label),
                        key,
                    ));
                }
            }
            ManualStep::Expiry => {
                if item.expires_at.is_none() && !self.expiry_skipped {
                    return Err(self.invalid("advance", "expiry", None, "empty"));
                }
                self.ready_to_commit = true;
                return Ok(WizardAdvance::ReadyToCommit);
            }
        }

        match step.next() {
            Some(next) => {
                self.transition(CaptureState::Manual { step: next });
                Ok(WizardAdvance::Next(next))
            }
            None => Err(AppError::Internal("wizard has no step after expiry".to_string())),
        }
    }

    /// Go back one step. Returns false on the first step.
    pub fn back(&mut self) -> bool {
        let CaptureState::Manual { step } = self.state else {
            return false;
        };
        self.ready_to_commit = false;
        match step.previous() {
            Some(previous) => {
                self.transition(CaptureState::Manual { step: previous });
                true
            }
            None => false,
        }
    }

    // Commit and cancel

    /// Snapshot of what a commit would write, if the session may commit now
    pub(crate) fn commit_candidate(&self) -> AppResult<(PendingCaptureItem, &'static str)> {
        if !self.is_ready_to_commit() {
            return Err(AppError::Validation(format!(
                "nothing ready to commit (session is {})",
                self.state.name()
            )));
        }
        let mode = match self.state {
            CaptureState::Confirming => "barcode",
            _ => "manual",
        };
        self.pending
            .clone()
            .map(|item| (item, mode))
            .ok_or_else(|| AppError::Internal("no pending capture item".to_string()))
    }

    /// Record a successful insert. Returns false if the session moved on meanwhile.
    pub(crate) fn finish_commit(&mut self, epoch: u64, item_id: String) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.pending = None;
        self.suggestions.clear();
        self.ready_to_commit = false;
        self.last_error = None;
        self.transition(CaptureState::Committed {
            item_ids: vec![item_id],
        });
        true
    }

    /// Abandon the capture. Safe in every state; a committed session is left as is.
    ///
    /// Outstanding tickets go stale, so results arriving afterwards are dropped.
    /// Returns whether anything was cancelled.
    pub fn cancel(&mut self) -> bool {
        match self.state {
            CaptureState::Committed { .. } => false,
            CaptureState::Cancelled {
                reason: CancelReason::UserCancelled,
            } => false,
            _ => {
                info!(session_id = %self.id, from = %self.state.name(), "Capture cancelled");
                self.restart(CaptureState::Cancelled {
                    reason: CancelReason::UserCancelled,
                });
                true
            }
        }
    }
}
