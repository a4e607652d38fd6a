//! Book copy (physical inventory unit) model and related types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::text_enum;
use crate::error::{AppError, AppResult};

/// Copy circulation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CopyStatus {
    Available,
    Borrowed,
    Lost,
    Damaged,
    Retired,
}

text_enum!(CopyStatus {
    Available => "available",
    Borrowed => "borrowed",
    Lost => "lost",
    Damaged => "damaged",
    Retired => "retired",
});

impl CopyStatus {
    pub const ALL: [CopyStatus; 5] = [
        CopyStatus::Available,
        CopyStatus::Borrowed,
        CopyStatus::Lost,
        CopyStatus::Damaged,
        CopyStatus::Retired,
    ];

    /// Check a status change requested through the copy endpoints.
    ///
    /// `borrowed` is owned by the loan ledger: it can neither be set nor left
    /// by hand.
    pub fn check_manual_transition(self, to: CopyStatus) -> AppResult<()> {
        if self == to {
            return Ok(());
        }
        if to == CopyStatus::Borrowed {
            return Err(AppError::Validation(
                "Copies become borrowed only through a loan".to_string(),
            ));
        }
        if self == CopyStatus::Borrowed {
            return Err(AppError::Conflict(
                "Copy is on loan; return the loan before changing its status".to_string(),
            ));
        }
        Ok(())
    }
}

/// Book copy from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookCopy {
    pub id: i32,
    pub book_id: i32,
    pub barcode: String,
    pub status: CopyStatus,
    pub location: Option<String>,
    pub acquisition_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create copy request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCopy {
    /// Barcode, unique across copies
    #[validate(length(min = 1, max = 64, message = "Barcode must be 1-64 characters"))]
    pub barcode: String,
    /// Initial status (default available; borrowed is rejected)
    pub status: Option<CopyStatus>,
    pub location: Option<String>,
    pub acquisition_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
}

/// Update copy request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCopy {
    #[validate(length(min = 1, max = 64, message = "Barcode must be 1-64 characters"))]
    pub barcode: Option<String>,
    pub status: Option<CopyStatus>,
    pub location: Option<String>,
    pub acquisition_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn borrowed_cannot_be_set_by_hand() {
        let err = CopyStatus::Available
            .check_manual_transition(CopyStatus::Borrowed)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn borrowed_copy_status_is_frozen() {
        let err = CopyStatus::Borrowed
            .check_manual_transition(CopyStatus::Damaged)
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(CopyStatus::Borrowed
            .check_manual_transition(CopyStatus::Borrowed)
            .is_ok());
    }

    #[test]
    fn shelf_statuses_move_freely() {
        assert!(CopyStatus::Available.check_manual_transition(CopyStatus::Damaged).is_ok());
        assert!(CopyStatus::Lost.check_manual_transition(CopyStatus::Available).is_ok());
        assert!(CopyStatus::Damaged.check_manual_transition(CopyStatus::Retired).is_ok());
    }

    #[test]
    fn status_text_round_trip() {
        for status in CopyStatus::ALL {
            assert_eq!(status.as_str().parse::<CopyStatus>().unwrap(), status);
        }
        assert!("shelved".parse::<CopyStatus>().is_err());
    }
}
