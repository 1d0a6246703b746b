use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use super::{
    query::{CategoryStat, ExpenseFilter, ExpenseQuery},
    repo_types::{Category, Expense, ExpenseChanges, ExpenseRow, NewExpense},
};
use crate::db::StoreError;

/// Owner-scoped expense persistence. Every method takes the caller's id and
/// never touches rows owned by someone else; a foreign row looks missing.
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    async fn insert(&self, user_id: i64, expense: NewExpense) -> Result<Expense, StoreError>;
    async fn find(&self, user_id: i64, id: i64) -> Result<Option<Expense>, StoreError>;
    async fn update(
        &self,
        user_id: i64,
        id: i64,
        changes: ExpenseChanges,
    ) -> Result<Option<Expense>, StoreError>;
    /// `true` when a row was removed.
    async fn delete(&self, user_id: i64, id: i64) -> Result<bool, StoreError>;
    /// One page of matches plus the number of matches across all pages.
    async fn list(&self, user_id: i64, query: &ExpenseQuery)
        -> Result<(Vec<Expense>, u64), StoreError>;
    /// Count and sum per category over the matching rows.
    async fn category_totals(
        &self,
        user_id: i64,
        filter: &ExpenseFilter,
    ) -> Result<Vec<CategoryStat>, StoreError>;
}

#[derive(Clone)]
pub struct PgExpenseStore {
    db: PgPool,
}

impl PgExpenseStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const EXPENSE_COLUMNS: &str =
    "id, user_id, title, description, amount, category, expense_date, created_at, updated_at";

#[derive(FromRow)]
struct CategoryTotalRow {
    category: String,
    count: i64,
    total_amount: Option<Decimal>,
}

fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, user_id: i64, filter: &ExpenseFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(start) = filter.start_date {
        qb.push(" AND expense_date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND expense_date <= ").push_bind(end);
    }
    if let Some(category) = filter.category {
        qb.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(min) = filter.min_amount {
        qb.push(" AND amount >= ").push_bind(min);
    }
    if let Some(max) = filter.max_amount {
        qb.push(" AND amount <= ").push_bind(max);
    }
}

fn count_query(user_id: i64, filter: &ExpenseFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM expenses");
    push_predicate(&mut qb, user_id, filter);
    qb
}

/// Sorted on the requested column, then `id` ascending, with LIMIT/OFFSET.
fn page_query(user_id: i64, query: &ExpenseQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {EXPENSE_COLUMNS} FROM expenses"));
    push_predicate(&mut qb, user_id, &query.filter);
    qb.push(format!(
        " ORDER BY {} {}, id ASC",
        query.sort.field.column(),
        query.sort.order.keyword()
    ));
    qb.push(" LIMIT ")
        .push_bind(i64::from(query.page.limit))
        .push(" OFFSET ")
        .push_bind(i64::try_from(query.page.offset()).unwrap_or(i64::MAX));
    qb
}

fn category_totals_query(user_id: i64, filter: &ExpenseFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT category, COUNT(*) AS count, SUM(amount) AS total_amount FROM expenses",
    );
    push_predicate(&mut qb, user_id, filter);
    qb.push(" GROUP BY category");
    qb
}

fn into_expenses(rows: Vec<ExpenseRow>) -> Result<Vec<Expense>, StoreError> {
    rows.into_iter().map(Expense::try_from).collect()
}

#[async_trait]
impl ExpenseStore for PgExpenseStore {
    async fn insert(&self, user_id: i64, expense: NewExpense) -> Result<Expense, StoreError> {
        let sql = format!(
            "INSERT INTO expenses (user_id, title, description, amount, category, expense_date) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {EXPENSE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ExpenseRow>(&sql)
            .bind(user_id)
            .bind(&expense.title)
            .bind(&expense.description)
            .bind(expense.amount)
            .bind(expense.category.as_str())
            .bind(expense.expense_date)
            .fetch_one(&self.db)
            .await?;
        Expense::try_from(row)
    }

    async fn find(&self, user_id: i64, id: i64) -> Result<Option<Expense>, StoreError> {
        let sql = format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = $1 AND user_id = $2");
        let row = sqlx::query_as::<_, ExpenseRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        row.map(Expense::try_from).transpose()
    }

    async fn update(
        &self,
        user_id: i64,
        id: i64,
        changes: ExpenseChanges,
    ) -> Result<Option<Expense>, StoreError> {
        let sql = format!(
            r#"
            UPDATE expenses
               SET title        = COALESCE($3, title),
                   description  = COALESCE($4, description),
                   amount       = COALESCE($5, amount),
                   category     = COALESCE($6, category),
                   expense_date = COALESCE($7, expense_date),
                   updated_at   = now()
             WHERE id = $1 AND user_id = $2
         RETURNING {EXPENSE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, ExpenseRow>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(changes.title)
            .bind(changes.description)
            .bind(changes.amount)
            .bind(changes.category.map(Category::as_str))
            .bind(changes.expense_date)
            .fetch_optional(&self.db)
            .await?;
        row.map(Expense::try_from).transpose()
    }

    async fn delete(&self, user_id: i64, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        user_id: i64,
        query: &ExpenseQuery,
    ) -> Result<(Vec<Expense>, u64), StoreError> {
        let mut count = count_query(user_id, &query.filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut select = page_query(user_id, query);
        let rows = select
            .build_query_as::<ExpenseRow>()
            .fetch_all(&self.db)
            .await?;
        Ok((into_expenses(rows)?, u64::try_from(total).unwrap_or(0)))
    }

    async fn category_totals(
        &self,
        user_id: i64,
        filter: &ExpenseFilter,
    ) -> Result<Vec<CategoryStat>, StoreError> {
        let mut qb = category_totals_query(user_id, filter);
        let rows = qb
            .build_query_as::<CategoryTotalRow>()
            .fetch_all(&self.db)
            .await?;
        rows.into_iter()
            .map(|r| {
                let category = r
                    .category
                    .parse::<Category>()
                    .map_err(|e| StoreError::CorruptRow(e.to_string()))?;
                Ok(CategoryStat {
                    category,
                    count: u64::try_from(r.count).unwrap_or(0),
                    total_amount: r.total_amount.unwrap_or_default(),
                })
            })
            .collect()
    }
}
