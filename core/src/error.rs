use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Insufficient wallet balance for user '{user_id}': have {balance:.2}, need {required:.2}")]
    InsufficientBalance {
        user_id:  String,
        balance:  f64,
        required: f64,
    },

    #[error("Minimum {kind} amount is {minimum}, got {amount}")]
    BelowMinimum {
        kind:    &'static str,
        amount:  f64,
        minimum: f64,
    },

    #[error("Invalid transaction '{tx_id}': {reason}")]
    InvalidTransaction { tx_id: String, reason: String },

    #[error("Plans already seeded")]
    PlansAlreadySeeded,

    #[error("Mobile '{mobile}' already registered")]
    DuplicateMobile { mobile: String },

    #[error("Invalid referral code '{code}'")]
    InvalidReferralCode { code: String },

    #[error("Plan '{plan_id}' is not available")]
    InactivePlan { plan_id: String },

    #[error("User '{user_id}' is blocked")]
    UserBlocked { user_id: String },

    #[error("No wallet for user '{user_id}'")]
    MissingWallet { user_id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
