//! Dashboard rollups

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::{copy::CopyStatus, loan::LoanDetails};

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct LoanCounts {
    pub total: i64,
    /// Open and not past due
    pub active: i64,
    /// Open and past due
    pub overdue: i64,
    pub returned: i64,
    pub lost: i64,
}

/// Copies per status. `total` is the sum of the per-status counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct CopyCounts {
    pub total: i64,
    pub available: i64,
    pub borrowed: i64,
    pub lost: i64,
    pub damaged: i64,
    pub retired: i64,
}

impl CopyCounts {
    /// Fold `GROUP BY status` rows into counts
    pub fn from_grouped(rows: impl IntoIterator<Item = (CopyStatus, i64)>) -> Self {
        let mut counts = CopyCounts::default();
        for (status, n) in rows {
            let slot = match status {
                CopyStatus::Available => &mut counts.available,
                CopyStatus::Borrowed => &mut counts.borrowed,
                CopyStatus::Lost => &mut counts.lost,
                CopyStatus::Damaged => &mut counts.damaged,
                CopyStatus::Retired => &mut counts.retired,
            };
            *slot += n;
            counts.total += n;
        }
        counts
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CategoryCount {
    pub category_id: i32,
    pub name: String,
    pub book_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowedBook {
    pub book_id: i32,
    pub title: String,
    pub loan_count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardStats {
    pub loans: LoanCounts,
    pub copies: CopyCounts,
    pub total_books: i64,
    pub total_members: i64,
    pub total_staff: i64,
    pub top_categories: Vec<CategoryCount>,
    pub most_borrowed_books: Vec<BorrowedBook>,
    pub recent_loans: Vec<LoanDetails>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DashboardQuery {
    /// Length of top-N lists (1-50)
    pub limit: Option<i64>,
}

impl DashboardQuery {
    pub fn limit(&self, default: i64) -> i64 {
        self.limit.unwrap_or(default).clamp(1, 50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouped_counts_sum_to_total() {
        let counts = CopyCounts::from_grouped(vec![
            (CopyStatus::Available, 7),
            (CopyStatus::Borrowed, 3),
            (CopyStatus::Damaged, 1),
            (CopyStatus::Retired, 2),
        ]);
        assert_eq!(counts.available, 7);
        assert_eq!(counts.borrowed, 3);
        assert_eq!(counts.lost, 0);
        assert_eq!(
            counts.available + counts.borrowed + counts.lost + counts.damaged + counts.retired,
            counts.total
        );
        assert_eq!(counts.total, 13);
    }

    #[test]
    fn empty_inventory() {
        assert_eq!(CopyCounts::from_grouped(Vec::new()), CopyCounts::default());
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(DashboardQuery::default().limit(5), 5);
        assert_eq!(DashboardQuery { limit: Some(0) }.limit(5), 1);
        assert_eq!(DashboardQuery { limit: Some(500) }.limit(5), 50);
    }
}
