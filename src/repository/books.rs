//! Books repository for database operations.
//!
//! Authors and categories of a page of books are fetched in one batch query
//! each (`book_id = ANY($1)`), never per book.

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use super::{violation, Violation};
use crate::{
    error::{AppError, AppResult},
    models::{
        author::AuthorRef,
        book::{group_links, Book, BookDetails, BookLink, BookQuery, BookShort, BookShortRow, CreateBook, UpdateBook},
        category::CategoryRef,
        like_pattern,
        publisher::Publisher,
        PageQuery,
    },
};

const BOOK_SHORT_COLUMNS: &str = r#"
    SELECT b.id, b.title, b.isbn, b.publication_year, b.cover_url,
           p.name AS publisher_name,
           (SELECT COUNT(*) FROM book_copies c WHERE c.book_id = b.id) AS total_copies,
           (SELECT COUNT(*) FROM book_copies c
             WHERE c.book_id = b.id AND c.status = 'available') AS available_copies
    FROM books b
    LEFT JOIN publishers p ON p.id = b.publisher_id
"#;

fn write_error(e: sqlx::Error) -> AppError {
    match violation(&e) {
        Some(Violation::Unique) => AppError::Conflict("A book with this ISBN already exists".to_string()),
        Some(Violation::ForeignKey) => {
            AppError::NotFound("Referenced publisher, author or category not found".to_string())
        }
        _ => e.into(),
    }
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // =========================================================================
    // READ
    // =========================================================================

    fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, query: &BookQuery) {
        qb.push(" WHERE TRUE");
        if let Some(ref search) = query.search {
            let pattern = like_pattern(search);
            qb.push(" AND (b.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR b.isbn ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(author_id) = query.author_id {
            qb.push(" AND EXISTS (SELECT 1 FROM book_authors ba WHERE ba.book_id = b.id AND ba.author_id = ")
                .push_bind(author_id)
                .push(")");
        }
        if let Some(category_id) = query.category_id {
            qb.push(" AND EXISTS (SELECT 1 FROM book_categories bc WHERE bc.book_id = b.id AND bc.category_id = ")
                .push_bind(category_id)
                .push(")");
        }
        if let Some(publisher_id) = query.publisher_id {
            qb.push(" AND b.publisher_id = ").push_bind(publisher_id);
        }
    }

    /// Search books with filters and pagination
    pub async fn list(&self, query: &BookQuery, page: &PageQuery) -> AppResult<(Vec<BookShort>, i64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM books b");
        Self::push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::new(BOOK_SHORT_COLUMNS);
        Self::push_filters(&mut select, query);
        select
            .push(" ORDER BY b.title, b.id LIMIT ")
            .push_bind(page.per_page())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select.build_query_as::<BookShortRow>().fetch_all(&self.pool).await?;

        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let mut authors = group_links(self.authors_for(&ids).await?);
        let mut categories = group_links(self.categories_for(&ids).await?);

        let books = rows
            .into_iter()
            .map(|row| {
                let a = authors
                    .remove(&row.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(id, name)| AuthorRef { id, name })
                    .collect();
                let c = categories
                    .remove(&row.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(id, name)| CategoryRef { id, name })
                    .collect();
                row.into_short(a, c)
            })
            .collect();

        Ok((books, total))
    }

    /// Authors of the given books
    pub async fn authors_for(&self, book_ids: &[i32]) -> AppResult<Vec<BookLink>> {
        if book_ids.is_empty() {
            return Ok(Vec::new());
        }
        let links = sqlx::query_as::<_, BookLink>(
            r#"
            SELECT ba.book_id, a.id, a.name
            FROM book_authors ba
            JOIN authors a ON a.id = ba.author_id
            WHERE ba.book_id = ANY($1)
            ORDER BY a.name
            "#,
        )
        .bind(book_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    /// Categories of the given books
    pub async fn categories_for(&self, book_ids: &[i32]) -> AppResult<Vec<BookLink>> {
        if book_ids.is_empty() {
            return Ok(Vec::new());
        }
        let links = sqlx::query_as::<_, BookLink>(
            r#"
            SELECT bc.book_id, c.id, c.name
            FROM book_categories bc
            JOIN categories c ON c.id = bc.category_id
            WHERE bc.book_id = ANY($1)
            ORDER BY c.name
            "#,
        )
        .bind(book_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
    }

    /// Book with publisher, authors, categories and copy counts
    pub async fn get_details(&self, id: i32) -> AppResult<BookDetails> {
        let book = self.get_by_id(id).await?;

        let publisher = match book.publisher_id {
            Some(publisher_id) => {
                sqlx::query_as::<_, Publisher>("SELECT * FROM publishers WHERE id = $1")
                    .bind(publisher_id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => None,
        };

        let authors = self
            .authors_for(&[id])
            .await?
            .into_iter()
            .map(|l| AuthorRef { id: l.id, name: l.name })
            .collect();
        let categories = self
            .categories_for(&[id])
            .await?
            .into_iter()
            .map(|l| CategoryRef { id: l.id, name: l.name })
            .collect();

        let counts: (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'available')
            FROM book_copies WHERE book_id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(BookDetails::from_parts(book, publisher, authors, categories, counts))
    }

    // =========================================================================
    // WRITE
    // =========================================================================

    async fn replace_links(
        tx: &mut Transaction<'_, Postgres>,
        book_id: i32,
        author_ids: Option<&[i32]>,
        category_ids: Option<&[i32]>,
    ) -> AppResult<()> {
        if let Some(ids) = author_ids {
            sqlx::query("DELETE FROM book_authors WHERE book_id = $1")
                .bind(book_id)
                .execute(&mut **tx)
                .await?;
            sqlx::query(
                "INSERT INTO book_authors (book_id, author_id) SELECT $1, UNNEST($2::int4[]) ON CONFLICT DO NOTHING",
            )
            .bind(book_id)
            .bind(ids)
            .execute(&mut **tx)
            .await
            .map_err(write_error)?;
        }
        if let Some(ids) = category_ids {
            sqlx::query("DELETE FROM book_categories WHERE book_id = $1")
                .bind(book_id)
                .execute(&mut **tx)
                .await?;
            sqlx::query(
                "INSERT INTO book_categories (book_id, category_id) SELECT $1, UNNEST($2::int4[]) ON CONFLICT DO NOTHING",
            )
            .bind(book_id)
            .bind(ids)
            .execute(&mut **tx)
            .await
            .map_err(write_error)?;
        }
        Ok(())
    }

    /// Create a book and its author/category links
    pub async fn create(&self, data: &CreateBook) -> AppResult<i32> {
        let mut tx = self.pool.begin().await?;

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO books (title, isbn, publisher_id, publication_year, language,
                               page_count, description, cover_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&data.title)
        .bind(&data.isbn)
        .bind(data.publisher_id)
        .bind(data.publication_year)
        .bind(&data.language)
        .bind(data.page_count)
        .bind(&data.description)
        .bind(&data.cover_url)
        .fetch_one(&mut *tx)
        .await
        .map_err(write_error)?;

        Self::replace_links(&mut tx, id, Some(&data.author_ids), Some(&data.category_ids)).await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Update a book; link lists replace the current links when present
    pub async fn update(&self, id: i32, data: &UpdateBook) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                isbn = COALESCE($3, isbn),
                publisher_id = COALESCE($4, publisher_id),
                publication_year = COALESCE($5, publication_year),
                language = COALESCE($6, language),
                page_count = COALESCE($7, page_count),
                description = COALESCE($8, description),
                cover_url = COALESCE($9, cover_url),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(&data.isbn)
        .bind(data.publisher_id)
        .bind(data.publication_year)
        .bind(&data.language)
        .bind(data.page_count)
        .bind(&data.description)
        .bind(&data.cover_url)
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book {} not found", id)));
        }

        Self::replace_links(
            &mut tx,
            id,
            data.author_ids.as_deref(),
            data.category_ids.as_deref(),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete a book that has no copies
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match violation(&e) {
                Some(Violation::ForeignKey) => AppError::Conflict(format!(
                    "Book {} still has copies; retire or delete them first",
                    id
                )),
                _ => e.into(),
            })?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book {} not found", id)));
        }
        Ok(())
    }
}
