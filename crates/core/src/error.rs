#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("an active reminder for '{medication}' already exists")]
    DuplicateActiveReminder { medication: String },
    #[error("cannot move {kind} from '{from}' to '{to}'")]
    InvalidTransition {
        kind: &'static str,
        from: String,
        to: String,
    },
    #[error("prescription {0} is not approved")]
    PrescriptionNotApproved(String),
    #[error("no medications are selected on prescription {0}")]
    NoMedicationsSelected(String),
    #[error("family member {0} has a confirmed appointment")]
    FamilyMemberHasConfirmedAppointment(String),
    #[error("insufficient wallet balance: need {required:.2} LYD, have {available:.2} LYD")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("failed to create data directory: {0}")]
    DataDirCreation(std::io::Error),

    #[error("invalid text: {0}")]
    Text(#[from] sehati_types::TextError),
    #[error("invalid identifier: {0}")]
    Id(#[from] sehati_ids::IdError),
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Money amounts must be finite and non-negative before they reach a persisted slice.
    pub(crate) fn check_amount(what: &str, value: f64) -> StoreResult<()> {
        if value.is_finite() && value >= 0.0 {
            return Ok(());
        }
        Err(StoreError::InvalidInput(format!(
            "{what} must be a finite, non-negative amount, got {value}"
        )))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
