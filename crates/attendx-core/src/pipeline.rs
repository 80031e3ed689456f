use std::sync::Arc;

use chrono::Local;
use serde::Serialize;
use tracing::{debug, info};

use crate::embedding::validate_student_id;
use crate::errors::{AppError, AppResult};
use crate::executor::BoundedExecutor;
use crate::extractor::EmbeddingExtractor;
use crate::ledger::AttemptLedger;
use crate::matcher::{MatchDecision, MatchPolicy};
use crate::store::{AttendanceRecord, StoreError, StoreGateway};
use crate::window::LectureWindow;

/// Caller identity as resolved by the external auth collaborator. Token
/// parsing and expiry checks happen outside the core; by the time a
/// request reaches the pipeline it is either anonymous or carries an
/// authenticated caller id.
#[derive(Debug, Clone)]
pub enum Caller {
    Anonymous,
    Authenticated { caller_id: String },
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub matcher: MatchPolicy,
    pub executor: BoundedExecutor,
    pub rate_limit_attempts: usize,
    pub rate_limit_window: std::time::Duration,
    pub lecture_window: LectureWindow,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            matcher: MatchPolicy::default(),
            executor: BoundedExecutor::default(),
            rate_limit_attempts: crate::ledger::DEFAULT_RATE_LIMIT_ATTEMPTS,
            rate_limit_window: crate::ledger::DEFAULT_RATE_LIMIT_WINDOW,
            lecture_window: LectureWindow::unrestricted(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyReason {
    Match,
    Mismatch,
    NoFaceDetected,
    MultipleFaces,
    NotEnrolled,
}

/// Transient per-call verification result. Never persisted.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VerificationOutcome {
    pub matched: bool,
    pub confidence: f64,
    pub reason: VerifyReason,
}

#[derive(Debug, Serialize)]
pub struct RegistrationOutcome {
    pub student: String,
    pub embedding_len: usize,
    pub replaced: bool,
}

#[derive(Debug, Serialize)]
pub struct MarkOutcome {
    pub confidence: f64,
    pub record: AttendanceRecord,
}

#[derive(Debug, Serialize)]
pub struct DeletionOutcome {
    pub student: String,
}

/// One pipeline instance serves concurrent requests. The attempt ledger is
/// the only cross-request mutable state; everything else is per-call.
pub struct AdmissionPipeline<S, E> {
    store: Arc<S>,
    extractor: Arc<E>,
    matcher: MatchPolicy,
    executor: BoundedExecutor,
    ledger: AttemptLedger,
    window: LectureWindow,
}

impl<S, E> AdmissionPipeline<S, E>
where
    S: StoreGateway + 'static,
    E: EmbeddingExtractor + 'static,
{
    pub fn new(store: Arc<S>, extractor: Arc<E>, config: PipelineConfig) -> Self {
        Self {
            store,
            extractor,
            matcher: config.matcher,
            executor: config.executor,
            ledger: AttemptLedger::new(config.rate_limit_attempts, config.rate_limit_window),
            window: config.lecture_window,
        }
    }

    /// Enrolls (or replaces) the active embedding for a student. Caller
    /// must administer the student's tenant; the extractor never runs
    /// before that check passes.
    pub fn register_face(
        &self,
        caller: &Caller,
        student: &str,
        sample: &[u8],
    ) -> AppResult<RegistrationOutcome> {
        validate_request(student, sample)?;
        self.authorize_tenant_owner(caller, student)?;

        let probe = self.run_extraction("register", sample)?;
        let embedding_len = probe.len();
        let replaced = self.store.get_embedding(student).is_ok();
        self.store.upsert_embedding(student, probe)?;

        info!(target: "pipeline", student, replaced, "embedding registered");
        Ok(RegistrationOutcome {
            student: student.to_string(),
            embedding_len,
            replaced,
        })
    }

    /// Pre-check verification: no authorization, no attendance commit.
    /// Extraction-level failures come back as soft outcomes so a client
    /// can retry framing; rate limiting and the deadline still apply, and
    /// every attempt feeds the ledger.
    pub fn verify_face(&self, student: &str, sample: &[u8]) -> AppResult<VerificationOutcome> {
        validate_request(student, sample)?;
        self.ledger.check_and_record(student)?;

        match self.run_verification(student, sample) {
            Ok(decision) => Ok(outcome_from_decision(decision)),
            Err(AppError::NoFaceDetected) => Ok(soft_outcome(VerifyReason::NoFaceDetected)),
            Err(AppError::MultipleFaces { .. }) => Ok(soft_outcome(VerifyReason::MultipleFaces)),
            Err(AppError::FaceNotEnrolled { .. }) => Ok(soft_outcome(VerifyReason::NotEnrolled)),
            Err(other) => Err(other),
        }
    }

    /// The full admission pipeline. Stage order is load-bearing: the
    /// tenant check precedes all biometric work, and a failure at any
    /// stage is terminal for the request.
    pub fn mark_attendance(
        &self,
        caller: &Caller,
        student: &str,
        sample: &[u8],
        subject: Option<&str>,
    ) -> AppResult<MarkOutcome> {
        validate_request(student, sample)?;
        if let Some(subject) = subject {
            if subject.trim().is_empty() {
                return Err(AppError::InvalidPayload {
                    message: "subject must not be blank".into(),
                });
            }
        }

        let tenant = self.resolve_marking_tenant(caller, student)?;
        self.ledger.check_and_record(student)?;
        self.window.check_now()?;

        let decision = self.run_verification(student, sample)?;
        if !decision.is_match {
            debug!(
                target: "pipeline",
                student,
                distance = decision.distance,
                confidence = decision.confidence,
                "verification below match policy"
            );
            return Err(AppError::FaceMismatch {
                confidence: decision.confidence,
            });
        }

        let today = Local::now().date_naive();
        if self.store.has_attendance_on(student, today, subject)? {
            return Err(AppError::DuplicateAttendance);
        }

        let record = AttendanceRecord::new(student, &tenant, today, subject, decision.confidence);
        // The store's uniqueness guarantee is the real defense: a
        // concurrent request can pass the check above and lose here.
        self.store.insert_attendance(record.clone())?;

        info!(
            target: "pipeline",
            student,
            confidence = decision.confidence,
            subject = subject.unwrap_or("-"),
            "attendance recorded"
        );
        Ok(MarkOutcome {
            confidence: decision.confidence,
            record,
        })
    }

    /// Removes the student's enrolled embedding. Same authorization rule
    /// as registration.
    pub fn delete_face(&self, caller: &Caller, student: &str) -> AppResult<DeletionOutcome> {
        validate_student_id(student)?;
        self.authorize_tenant_owner(caller, student)?;
        self.store.delete_embedding(student)?;

        info!(target: "pipeline", student, "embedding deleted");
        Ok(DeletionOutcome {
            student: student.to_string(),
        })
    }

    pub fn attendance_history(&self, student: &str) -> AppResult<Vec<AttendanceRecord>> {
        validate_student_id(student)?;
        Ok(self.store.attendance_history(student)?)
    }

    /// Authorization for registration and deletion: the caller must be an
    /// authenticated admin of the student's tenant. An identity that does
    /// not resolve is reported exactly like a foreign-tenant identity, so
    /// the response never reveals whether it exists elsewhere.
    fn authorize_tenant_owner(&self, caller: &Caller, student: &str) -> AppResult<String> {
        let caller_id = match caller {
            Caller::Authenticated { caller_id } => caller_id,
            Caller::Anonymous => return Err(AppError::AuthRequired),
        };

        let caller_tenant = match self.store.resolve_tenant_of_caller(caller_id) {
            Ok(tenant) => tenant,
            Err(StoreError::Forbidden) => return Err(AppError::AccessDenied),
            Err(other) => return Err(other.into()),
        };

        match self.store.resolve_tenant_of(student) {
            Ok(tenant) if tenant == caller_tenant => Ok(tenant),
            Ok(_) | Err(StoreError::NotFound { .. }) => Err(AppError::TenantIsolation),
            Err(other) => Err(other.into()),
        }
    }

    /// Tenant scoping for the marking path. Anonymous callers are allowed
    /// (kiosk flow), but the owning tenant is still resolved before any
    /// biometric work and stamped on the committed record.
    fn resolve_marking_tenant(&self, caller: &Caller, student: &str) -> AppResult<String> {
        let student_tenant = match self.store.resolve_tenant_of(student) {
            Ok(tenant) => tenant,
            Err(StoreError::NotFound { .. }) => match caller {
                Caller::Authenticated { .. } => return Err(AppError::TenantIsolation),
                Caller::Anonymous => return Err(AppError::StudentNotFound),
            },
            Err(other) => return Err(other.into()),
        };

        if let Caller::Authenticated { caller_id } = caller {
            let caller_tenant = match self.store.resolve_tenant_of_caller(caller_id) {
                Ok(tenant) => tenant,
                Err(StoreError::Forbidden) => return Err(AppError::AccessDenied),
                Err(other) => return Err(other.into()),
            };
            if caller_tenant != student_tenant {
                return Err(AppError::TenantIsolation);
            }
        }

        Ok(student_tenant)
    }

    fn run_extraction(&self, label: &str, sample: &[u8]) -> AppResult<crate::embedding::Embedding> {
        let extractor = Arc::clone(&self.extractor);
        let sample = sample.to_vec();
        self.executor
            .run(label, move |_token| extractor.extract(&sample))?
            .map_err(AppError::from)
    }

    /// Extraction, stored-embedding read, and comparison all run inside
    /// the worker so the deadline covers the whole slow path.
    fn run_verification(&self, student: &str, sample: &[u8]) -> AppResult<MatchDecision> {
        let extractor = Arc::clone(&self.extractor);
        let store = Arc::clone(&self.store);
        let matcher = self.matcher;
        let student_owned = student.to_string();
        let sample = sample.to_vec();

        self.executor.run("verify", move |token| {
            let probe = extractor.extract(&sample).map_err(AppError::from)?;
            if token.is_cancelled() {
                // Caller is gone; skip the store round-trip. The result
                // is discarded either way.
                return Err(AppError::Internal("verification abandoned".into()));
            }
            let stored = match store.get_embedding(&student_owned) {
                Ok(embedding) => embedding,
                Err(StoreError::NotFound { .. }) => {
                    return Err(AppError::FaceNotEnrolled {
                        student: student_owned,
                    })
                }
                Err(other) => return Err(other.into()),
            };
            matcher.compare(&stored, &probe)
        })?
    }
}

fn validate_request(student: &str, sample: &[u8]) -> AppResult<()> {
    if student.is_empty() || sample.is_empty() {
        return Err(AppError::InvalidPayload {
            message: "student id and sample are required".into(),
        });
    }
    validate_student_id(student)
}

fn outcome_from_decision(decision: MatchDecision) -> VerificationOutcome {
    VerificationOutcome {
        matched: decision.is_match,
        confidence: decision.confidence,
        reason: if decision.is_match {
            VerifyReason::Match
        } else {
            VerifyReason::Mismatch
        },
    }
}

fn soft_outcome(reason: VerifyReason) -> VerificationOutcome {
    VerificationOutcome {
        matched: false,
        confidence: 0.0,
        reason,
    }
}
