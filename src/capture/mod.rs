//! # Capture Session State Machine
//!
//! One [`CaptureSession`] per capture attempt, owned by the UI controller and
//! passed by `&mut` into each transition. Remote work goes through
//! [`CaptureController`], which holds the collaborators.
//!
//! ```text
//! Idle ──start_barcode_scan──► Scanning(Barcode) ──scan──► Resolving ──found──► Confirming ──commit──► Committed
//!   │                                                         └──not found──► Cancelled(NotFound) ──► Manual
//!   ├──begin_photo_batch──► Scanning(Photo) ──batch done──► Committed | Idle
//!   └──start_manual──► Manual(Name → Category → Quantity → Expiry) ──commit──► Committed
//!
//! cancel(): any state except Committed ──► Cancelled(UserCancelled)
//! ```
//!
//! Async steps are split into a synchronous `begin_*` that hands out a ticket,
//! the remote call on the controller, and a synchronous `apply_*`/`finish_*`
//! that drops the result when the ticket is stale. A ticket goes stale when
//! the session is cancelled or restarted, so late results never touch a reset
//! session.

mod controller;
mod session;

pub use controller::{CaptureController, CaptureServices};
pub use session::CaptureSession;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Barcode,
    Photo,
}

/// Steps of the manual wizard, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManualStep {
    Name,
    Category,
    Quantity,
    Expiry,
}

impl ManualStep {
    /// Zero-based position in the wizard
    pub fn index(self) -> u8 {
        match self {
            ManualStep::Name => 0,
            ManualStep::Category => 1,
            ManualStep::Quantity => 2,
            ManualStep::Expiry => 3,
        }
    }

    pub fn next(self) -> Option<Self> {
        match self {
            ManualStep::Name => Some(ManualStep::Category),
            ManualStep::Category => Some(ManualStep::Quantity),
            ManualStep::Quantity => Some(ManualStep::Expiry),
            ManualStep::Expiry => None,
        }
    }

    pub fn previous(self) -> Option<Self> {
        match self {
            ManualStep::Name => None,
            ManualStep::Category => Some(ManualStep::Name),
            ManualStep::Quantity => Some(ManualStep::Category),
            ManualStep::Expiry => Some(ManualStep::Quantity),
        }
    }

    /// Field validated by this step
    pub fn field(self) -> &'static str {
        match self {
            ManualStep::Name => "name",
            ManualStep::Category => "category",
            ManualStep::Quantity => "quantity",
            ManualStep::Expiry => "expiry",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CancelReason {
    UserCancelled,
    /// The catalog has no product for this barcode
    NotFound { code: String },
    /// The barcode lookup failed or timed out; handled like not found
    LookupUnavailable { code: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CaptureState {
    #[default]
    Idle,
    Scanning {
        mode: ScanMode,
    },
    /// Barcode lookup in flight
    Resolving {
        code: String,
    },
    /// A catalog product is waiting for the user to confirm
    Confirming,
    Manual {
        step: ManualStep,
    },
    Committed {
        item_ids: Vec<String>,
    },
    Cancelled {
        reason: CancelReason,
    },
}

impl CaptureState {
    /// States a new capture may start from
    pub fn is_startable(&self) -> bool {
        matches!(
            self,
            CaptureState::Idle | CaptureState::Committed { .. } | CaptureState::Cancelled { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CaptureState::Committed { .. } | CaptureState::Cancelled { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::Scanning { .. } => "scanning",
            CaptureState::Resolving { .. } => "resolving",
            CaptureState::Confirming => "confirming",
            CaptureState::Manual { .. } => "manual",
            CaptureState::Committed { .. } => "committed",
            CaptureState::Cancelled { .. } => "cancelled",
        }
    }
}

/// Result of advancing the manual wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardAdvance {
    /// Moved on to this step
    Next(ManualStep),
    /// All four fields are filled; the item can be committed
    ReadyToCommit,
    /// A catalog candidate was accepted on the name step and supplied the
    /// remaining fields
    ShortCircuit,
}

/// How a barcode event ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarcodeOutcome {
    /// Duplicate, replay, empty code or not scanning: nothing happened
    Ignored,
    Found,
    NotFound,
    Unavailable,
    /// The session moved on before the lookup returned; the result was dropped
    Discarded,
}

/// Proof that a barcode lookup was started for the current session epoch
#[derive(Debug, Clone)]
pub struct BarcodeTicket {
    session_id: u64,
    epoch: u64,
    code: String,
    token: CancellationToken,
}

impl BarcodeTicket {
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Normalized barcode being looked up
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Proof that a photo batch was started for the current session epoch
#[derive(Debug, Clone)]
pub struct PhotoTicket {
    session_id: u64,
    epoch: u64,
    image_urls: Vec<String>,
    token: CancellationToken,
}

impl PhotoTicket {
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn image_urls(&self) -> &[String] {
        &self.image_urls
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Outcome of one photo batch, reported to the caller at the end ("12 items added")
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoBatchReport {
    pub detected: usize,
    pub inserted: usize,
    pub failed: usize,
    pub item_ids: Vec<String>,
    /// The image scan itself failed; nothing was detected
    pub scanner_unavailable: bool,
    /// The session was cancelled before every detection was inserted
    pub cancelled: bool,
}

impl PhotoBatchReport {
    pub fn summary(&self) -> String {
        if self.scanner_unavailable {
            return "Photo scan unavailable".to_string();
        }
        match self.inserted {
            1 => "1 item added".to_string(),
            n => format!("{} items added", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_step_order() {
        assert_eq!(ManualStep::Name.next(), Some(ManualStep::Category));
        assert_eq!(ManualStep::Expiry.next(), None);
        assert_eq!(ManualStep::Name.previous(), None);
        assert_eq!(ManualStep::Expiry.previous(), Some(ManualStep::Quantity));
        assert_eq!(ManualStep::Quantity.index(), 2);
    }

    #[test]
    fn test_state_serializes_tagged() {
        let state = CaptureState::Cancelled {
            reason: CancelReason::NotFound {
                code: "123".to_string(),
            },
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "cancelled");
        assert_eq!(json["reason"]["reason"], "not_found");
        assert_eq!(json["reason"]["code"], "123");
    }

    #[test]
    fn test_batch_summary() {
        let report = PhotoBatchReport {
            detected: 14,
            inserted: 12,
            failed: 2,
            ..Default::default()
        };
        assert_eq!(report.summary(), "12 items added");
    }
}
