//! Loan ledger tests against a live PostgreSQL database.
//!
//! Run with: DATABASE_URL=postgres://... cargo test -- --ignored

use chrono::{Duration, Utc};
use sqlx::postgres::PgPoolOptions;

use stacks_server::{
    error::AppError,
    models::{
        account::Role,
        book::CreateBook,
        copy::{CopyStatus, CreateCopy},
        loan::{LoanStatus, NewLoan},
        member::{CreateMember, MemberStatus, UpdateMember},
        staff::CreateStaff,
    },
    repository::{loans::LoanLedger, Repository},
};

struct Fixture {
    repo: Repository,
    staff_id: i32,
    member_ids: Vec<i32>,
    book_id: i32,
    copy_id: i32,
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

async fn fixture(members: usize) -> Fixture {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new().max_connections(5).connect(&url).await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let repo = Repository::new(pool);

    let staff_id = repo
        .staff
        .create(
            &CreateStaff {
                email: format!("{}@example.org", unique("desk")),
                password: "unused-hash".to_string(),
                role: Role::Librarian,
                full_name: "Desk Librarian".to_string(),
                phone: None,
                position: None,
                hire_date: None,
            },
            "unused-hash",
        )
        .await
        .unwrap();

    let mut member_ids = Vec::new();
    for i in 0..members {
        let id = repo
            .members
            .create(
                &CreateMember {
                    email: format!("{}@example.org", unique(&format!("reader{}", i))),
                    password: "unused-hash".to_string(),
                    full_name: format!("Reader {}", i),
                    phone: None,
                    address: None,
                    date_of_birth: None,
                },
                "unused-hash",
            )
            .await
            .unwrap();
        member_ids.push(id);
    }

    let book_id = repo
        .books
        .create(&CreateBook {
            title: "The Dispossessed".to_string(),
            isbn: None,
            publisher_id: None,
            publication_year: Some(1974),
            language: Some("en".to_string()),
            page_count: None,
            description: None,
            cover_url: None,
            author_ids: Vec::new(),
            category_ids: Vec::new(),
        })
        .await
        .unwrap();

    let copy_id = add_copy(&repo, book_id, None).await;

    Fixture {
        repo,
        staff_id,
        member_ids,
        book_id,
        copy_id,
    }
}

async fn add_copy(repo: &Repository, book_id: i32, status: Option<CopyStatus>) -> i32 {
    repo.copies
        .create(
            book_id,
            &CreateCopy {
                barcode: unique("BC"),
                status,
                location: Some("Stacks A".to_string()),
                acquisition_date: None,
                price: None,
            },
        )
        .await
        .unwrap()
        .id
}

/// Loan rows touching the member or the copy, plus the copy's status
async fn footprint(f: &Fixture, member_id: i32, copy_id: i32) -> (i64, CopyStatus) {
    let loans: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE member_id = $1 OR copy_id = $2")
            .bind(member_id)
            .bind(copy_id)
            .fetch_one(&f.repo.pool)
            .await
            .unwrap();
    let status = f.repo.copies.get_by_id(copy_id).await.unwrap().status;
    (loans, status)
}

async fn assert_rejected_without_mutation(f: &Fixture, loan: NewLoan) {
    let before = footprint(f, loan.member_id, loan.copy_id).await;
    let (member_id, copy_id) = (loan.member_id, loan.copy_id);

    let result = f.repo.loans.open_loan(loan).await;
    assert!(matches!(result, Err(AppError::Conflict(_))), "{:?}", result);

    assert_eq!(footprint(f, member_id, copy_id).await, before);
}

fn new_loan(f: &Fixture, member_id: i32) -> NewLoan {
    loan_of(f, member_id, f.copy_id)
}

fn loan_of(f: &Fixture, member_id: i32, copy_id: i32) -> NewLoan {
    let now = Utc::now();
    NewLoan {
        member_id,
        copy_id,
        staff_id: Some(f.staff_id),
        loan_date: now,
        due_date: now + Duration::days(14),
        notes: None,
        max_open_per_member: 5,
    }
}

#[tokio::test]
#[ignore]
async fn loan_round_trip() {
    let f = fixture(1).await;
    let loans = &f.repo.loans;

    let id = loans.open_loan(new_loan(&f, f.member_ids[0])).await.unwrap();
    let loan = loans.get(id).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Active);
    assert!(loan.return_date.is_none());
    assert_eq!(f.repo.copies.get_by_id(f.copy_id).await.unwrap().status, CopyStatus::Borrowed);

    // The copy cannot go out twice.
    let again = loans.open_loan(new_loan(&f, f.member_ids[0])).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    let returned_at = loan.loan_date + Duration::days(5);
    loans.close_loan(id, returned_at).await.unwrap();

    let loan = loans.get(id).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Returned);
    assert_eq!(loan.return_date, Some(returned_at));
    assert_eq!(f.repo.copies.get_by_id(f.copy_id).await.unwrap().status, CopyStatus::Available);

    let second_close = loans.close_loan(id, returned_at).await;
    assert!(matches!(second_close, Err(AppError::Conflict(_))));
}

#[tokio::test]
#[ignore]
async fn concurrent_checkouts_of_one_copy_admit_exactly_one() {
    let f = fixture(2).await;
    let loans = &f.repo.loans;

    let (a, b) = tokio::join!(
        loans.open_loan(new_loan(&f, f.member_ids[0])),
        loans.open_loan(new_loan(&f, f.member_ids[1])),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(AppError::Conflict(_)))));

    let open: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM loans WHERE copy_id = $1 AND status IN ('active', 'overdue')",
    )
    .bind(f.copy_id)
    .fetch_one(&f.repo.pool)
    .await
    .unwrap();
    assert_eq!(open, 1);
}

#[tokio::test]
#[ignore]
async fn lost_loan_closes_and_marks_copy_lost() {
    let f = fixture(1).await;
    let loans = &f.repo.loans;

    let id = loans.open_loan(new_loan(&f, f.member_ids[0])).await.unwrap();
    loans.mark_lost(id, Some("Left on a train".to_string())).await.unwrap();

    let loan = loans.get(id).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Lost);
    assert!(loan.return_date.is_none());
    assert_eq!(f.repo.copies.get_by_id(f.copy_id).await.unwrap().status, CopyStatus::Lost);

    assert!(matches!(
        loans.close_loan(id, Utc::now()).await,
        Err(AppError::Conflict(_))
    ));
}

#[tokio::test]
#[ignore]
async fn past_due_loans_read_as_overdue() {
    let f = fixture(1).await;
    let loans = &f.repo.loans;

    let now = Utc::now();
    let id = loans
        .open_loan(NewLoan {
            loan_date: now - Duration::days(20),
            due_date: now - Duration::days(6),
            ..new_loan(&f, f.member_ids[0])
        })
        .await
        .unwrap();

    assert_eq!(loans.get(id).await.unwrap().status, LoanStatus::Active);
    assert_eq!(loans.details(id).await.unwrap().status, LoanStatus::Overdue);

    let stats = f.repo.dashboard.stats(5).await.unwrap();
    assert!(stats.loans.overdue >= 1);
    let c = &stats.copies;
    assert_eq!(c.available + c.borrowed + c.lost + c.damaged + c.retired, c.total);
}

#[tokio::test]
#[ignore]
async fn copies_off_the_shelf_cannot_be_borrowed() {
    let f = fixture(2).await;

    for status in [CopyStatus::Lost, CopyStatus::Damaged, CopyStatus::Retired] {
        let copy_id = add_copy(&f.repo, f.book_id, Some(status)).await;
        assert_rejected_without_mutation(&f, loan_of(&f, f.member_ids[0], copy_id)).await;
        assert_eq!(f.repo.copies.get_by_id(copy_id).await.unwrap().status, status);
    }

    // A borrowed copy stays with its current borrower
    f.repo.loans.open_loan(new_loan(&f, f.member_ids[0])).await.unwrap();
    assert_rejected_without_mutation(&f, new_loan(&f, f.member_ids[1])).await;
}

#[tokio::test]
#[ignore]
async fn members_not_in_good_standing_cannot_borrow() {
    let f = fixture(2).await;
    let (suspended, inactive) = (f.member_ids[0], f.member_ids[1]);

    f.repo
        .members
        .update(
            suspended,
            &UpdateMember {
                email: None,
                full_name: None,
                phone: None,
                address: None,
                date_of_birth: None,
                status: Some(MemberStatus::Suspended),
            },
        )
        .await
        .unwrap();
    f.repo.members.deactivate(inactive).await.unwrap();

    assert_rejected_without_mutation(&f, new_loan(&f, suspended)).await;
    assert_rejected_without_mutation(&f, new_loan(&f, inactive)).await;
    assert_eq!(
        f.repo.copies.get_by_id(f.copy_id).await.unwrap().status,
        CopyStatus::Available
    );
}

#[tokio::test]
#[ignore]
async fn loan_quota_is_enforced() {
    let f = fixture(1).await;
    let member = f.member_ids[0];

    let first = loan_of(&f, member, f.copy_id);
    f.repo
        .loans
        .open_loan(NewLoan {
            max_open_per_member: 1,
            ..first
        })
        .await
        .unwrap();

    let second_copy = add_copy(&f.repo, f.book_id, None).await;
    assert_rejected_without_mutation(
        &f,
        NewLoan {
            max_open_per_member: 1,
            ..loan_of(&f, member, second_copy)
        },
    )
    .await;
    assert_eq!(
        f.repo.copies.get_by_id(second_copy).await.unwrap().status,
        CopyStatus::Available
    );
}
