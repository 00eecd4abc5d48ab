//! External services the stores depend on.
//!
//! There is no real payment gateway or pharmacist back office. The stores talk to these
//! traits instead, so the simulated implementations (fixed latency, random outcome) can be
//! swapped for real ones, and tests can use the scripted doubles for deterministic runs.

use crate::config::CoreConfig;
use crate::models::booking::PaymentMethod;
use crate::models::pharmacy::{PharmacistApproval, Prescription};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Payments
// ============================================================================

#[derive(Clone, Debug)]
pub struct PaymentRequest {
    pub reference_id: String,
    pub amount: f64,
    pub method: PaymentMethod,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    Approved { transaction_ref: String },
    Declined { reason: String },
}

impl PaymentOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, PaymentOutcome::Approved { .. })
    }
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn charge(&self, request: &PaymentRequest) -> PaymentOutcome;
}

/// Stand-in gateway: waits a fixed delay, then approves with a fixed probability.
#[derive(Clone, Debug)]
pub struct SimulatedPaymentProcessor {
    delay: Duration,
    success_rate: f64,
}

impl SimulatedPaymentProcessor {
    pub fn new(delay: Duration, success_rate: f64) -> Self {
        Self {
            delay,
            success_rate: success_rate.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(cfg: &CoreConfig) -> Self {
        Self::new(cfg.simulated_delay(), cfg.payment_success_rate())
    }
}

#[async_trait]
impl PaymentProcessor for SimulatedPaymentProcessor {
    async fn charge(&self, request: &PaymentRequest) -> PaymentOutcome {
        tokio::time::sleep(self.delay).await;

        let approved = rand::thread_rng().gen_bool(self.success_rate);
        if approved {
            tracing::info!(
                "simulated payment approved: {} ({:.2} LYD)",
                request.reference_id,
                request.amount
            );
            PaymentOutcome::Approved {
                transaction_ref: format!("sim-{}", Utc::now().timestamp_millis()),
            }
        } else {
            tracing::info!("simulated payment declined: {}", request.reference_id);
            PaymentOutcome::Declined {
                reason: "تم رفض عملية الدفع، يرجى المحاولة مرة أخرى".into(),
            }
        }
    }
}

/// Deterministic gateway: replays queued outcomes, then falls back to a fixed answer.
#[derive(Debug)]
pub struct ScriptedPaymentProcessor {
    queued: Mutex<VecDeque<bool>>,
    fallback: bool,
}

impl ScriptedPaymentProcessor {
    pub fn always(approve: bool) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: approve,
        }
    }

    /// Answers with `outcomes` in order, then approves.
    pub fn sequence(outcomes: impl IntoIterator<Item = bool>) -> Self {
        Self {
            queued: Mutex::new(outcomes.into_iter().collect()),
            fallback: true,
        }
    }
}

#[async_trait]
impl PaymentProcessor for ScriptedPaymentProcessor {
    async fn charge(&self, request: &PaymentRequest) -> PaymentOutcome {
        let approve = {
            let mut queued = self.queued.lock().unwrap_or_else(|p| p.into_inner());
            queued.pop_front().unwrap_or(self.fallback)
        };

        if approve {
            PaymentOutcome::Approved {
                transaction_ref: format!("scripted-{}", request.reference_id),
            }
        } else {
            PaymentOutcome::Declined {
                reason: "declined by script".into(),
            }
        }
    }
}

// ============================================================================
// Prescription review
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum ReviewDecision {
    Approved(PharmacistApproval),
    Rejected { reason: String },
}

#[async_trait]
pub trait PrescriptionReviewer: Send + Sync {
    async fn review(&self, prescription: &Prescription) -> ReviewDecision;
}

/// Stand-in pharmacist: approves every uploaded prescription after a fixed delay.
#[derive(Clone, Debug)]
pub struct SimulatedPharmacistReview {
    delay: Duration,
}

impl SimulatedPharmacistReview {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_config(cfg: &CoreConfig) -> Self {
        Self::new(cfg.simulated_delay())
    }
}

#[async_trait]
impl PrescriptionReviewer for SimulatedPharmacistReview {
    async fn review(&self, prescription: &Prescription) -> ReviewDecision {
        tokio::time::sleep(self.delay).await;

        tracing::info!("simulated pharmacist approved prescription {}", prescription.id);
        ReviewDecision::Approved(PharmacistApproval {
            pharmacist_id: "ph-001".into(),
            pharmacist_name: "د. سارة الورفلي".into(),
            approved_at: Utc::now(),
            notes: Some("تمت مراجعة الوصفة والتحقق من الجرعات".into()),
        })
    }
}

/// Deterministic reviewer for tests and offline runs.
#[derive(Clone, Debug)]
pub struct ScriptedReviewer {
    reject_with: Option<String>,
}

impl ScriptedReviewer {
    pub fn approving() -> Self {
        Self { reject_with: None }
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            reject_with: Some(reason.to_owned()),
        }
    }
}

#[async_trait]
impl PrescriptionReviewer for ScriptedReviewer {
    async fn review(&self, _prescription: &Prescription) -> ReviewDecision {
        match &self.reject_with {
            Some(reason) => ReviewDecision::Rejected {
                reason: reason.clone(),
            },
            None => ReviewDecision::Approved(PharmacistApproval {
                pharmacist_id: "ph-test".into(),
                pharmacist_name: "Test Pharmacist".into(),
                approved_at: Utc::now(),
                notes: None,
            }),
        }
    }
}
