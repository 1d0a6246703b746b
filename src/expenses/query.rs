//! Turns untrusted filter parameters into an owner-scoped, sorted, paginated
//! expense query, and aggregates statistics over the same predicate.
//!
//! Store implementations consume [`ExpenseQuery`] / [`ExpenseFilter`]: the
//! Postgres store translates them to SQL, the in-memory store evaluates
//! [`ExpenseFilter::matches`] and [`Sort::compare`] directly. Both must agree
//! on inclusive bounds and on the `id` tie-break.

use std::{cmp::Ordering, str::FromStr};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use time::{util::days_in_year_month, Date, Duration, Month};

use super::{
    repo::ExpenseStore,
    repo_types::{Category, Expense, CATEGORY_CHOICES},
};
use crate::{
    error::AppError,
    response::PageMeta,
    validation::{parse_iso_date, ValidationErrors},
};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    ExpenseDate,
    Amount,
    CreatedAt,
}

impl SortField {
    pub fn column(self) -> &'static str {
        match self {
            SortField::ExpenseDate => "expense_date",
            SortField::Amount => "amount",
            SortField::CreatedAt => "created_at",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "expense_date" => Some(SortField::ExpenseDate),
            "amount" => Some(SortField::Amount),
            "created_at" => Some(SortField::CreatedAt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sort {
    pub field: SortField,
    pub order: SortOrder,
}

impl Sort {
    /// Orders by the primary key in the requested direction, then by id
    /// ascending so pages never overlap.
    pub fn compare(&self, a: &Expense, b: &Expense) -> Ordering {
        let primary = match self.field {
            SortField::ExpenseDate => a.expense_date.cmp(&b.expense_date),
            SortField::Amount => a.amount.cmp(&b.amount),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        let primary = match self.order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// Symbolic date ranges anchored at "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    PastWeek,
    PastMonth,
    LastThreeMonths,
}

impl FromStr for Period {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "past_week" => Ok(Period::PastWeek),
            "past_month" => Ok(Period::PastMonth),
            "last_3_months" => Ok(Period::LastThreeMonths),
            other => Err(AppError::InvalidInput(format!(
                "Invalid period specified: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Date,
    pub end: Date,
}

impl Period {
    pub fn date_range(self, today: Date) -> DateRange {
        let start = match self {
            Period::PastWeek => today.saturating_sub(Duration::days(7)),
            Period::PastMonth => months_back(today, 1),
            Period::LastThreeMonths => months_back(today, 3),
        };
        DateRange { start, end: today }
    }
}

/// Same day `months` earlier, clamped to the end of a shorter month.
fn months_back(date: Date, months: u8) -> Date {
    let mut year = date.year();
    let mut month = date.month();
    for _ in 0..months {
        if month == Month::January {
            year -= 1;
        }
        month = month.previous();
    }
    let day = date.day().min(days_in_year_month(year, month));
    Date::from_calendar_date(year, month, day)
        .unwrap_or_else(|_| date.saturating_sub(Duration::days(31 * i64::from(months))))
}

/// Caller-supplied predicate; the owner constraint is added by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseFilter {
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub category: Option<Category>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
}

impl ExpenseFilter {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                errors.push("end_date must be on or after start_date");
            }
        }
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount) {
            if min > max {
                errors.push("max_amount must be greater than or equal to min_amount");
            }
        }
        errors.into_result()
    }

    /// Both ends of every range are inclusive.
    pub fn matches(&self, expense: &Expense) -> bool {
        self.start_date.map_or(true, |d| expense.expense_date >= d)
            && self.end_date.map_or(true, |d| expense.expense_date <= d)
            && self.category.map_or(true, |c| expense.category == c)
            && self.min_amount.map_or(true, |m| expense.amount >= m)
            && self.max_amount.map_or(true, |m| expense.amount <= m)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseQuery {
    pub filter: ExpenseFilter,
    pub sort: Sort,
    pub page: PageRequest,
}

/// Raw query string as received; every field is parsed and checked by
/// [`ExpenseQueryParams::to_query`] / [`ExpenseQueryParams::to_filter`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseQueryParams {
    pub period: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub category: Option<String>,
    pub min_amount: Option<String>,
    pub max_amount: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ExpenseQueryParams {
    /// Filters only; pagination and sort parameters are ignored.
    pub fn to_filter(&self, today: Date) -> Result<ExpenseFilter, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let filter = self.parse_filter(today, &mut errors);
        errors.into_result()?;
        filter.validate()?;
        Ok(filter)
    }

    pub fn to_query(&self, today: Date) -> Result<ExpenseQuery, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let filter = self.parse_filter(today, &mut errors);

        let mut page = PageRequest::default();
        if let Some(raw) = present(&self.page) {
            match raw.parse::<u32>() {
                Ok(p) if p >= 1 => page.page = p,
                _ => errors.push("page must be an integer greater than or equal to 1"),
            }
        }
        if let Some(raw) = present(&self.limit) {
            match raw.parse::<u32>() {
                Ok(l) if (1..=MAX_LIMIT).contains(&l) => page.limit = l,
                _ => errors.push(format!("limit must be an integer between 1 and {MAX_LIMIT}")),
            }
        }

        let mut sort = Sort::default();
        if let Some(raw) = present(&self.sort_by) {
            match SortField::parse(raw) {
                Some(field) => sort.field = field,
                None => errors.push("sort_by must be one of: expense_date, amount, created_at"),
            }
        }
        if let Some(raw) = present(&self.sort_order) {
            match SortOrder::parse(raw) {
                Some(order) => sort.order = order,
                None => errors.push("sort_order must be one of: asc, desc"),
            }
        }

        errors.into_result()?;
        filter.validate()?;
        Ok(ExpenseQuery { filter, sort, page })
    }

    fn parse_filter(&self, today: Date, errors: &mut ValidationErrors) -> ExpenseFilter {
        let mut filter = ExpenseFilter {
            start_date: parse_date_param(present(&self.start_date), "start_date", errors),
            end_date: parse_date_param(present(&self.end_date), "end_date", errors),
            ..ExpenseFilter::default()
        };

        if let Some(raw) = present(&self.period) {
            let explicit_dates = filter.start_date.is_some() || filter.end_date.is_some();
            if raw == "custom" {
                if filter.start_date.is_none() || filter.end_date.is_none() {
                    errors.push(
                        "Both start_date and end_date must be provided when using custom date range",
                    );
                }
            } else {
                match raw.parse::<Period>() {
                    Ok(_) if explicit_dates => {
                        errors.push("period cannot be combined with start_date or end_date")
                    }
                    Ok(period) => {
                        let range = period.date_range(today);
                        filter.start_date = Some(range.start);
                        filter.end_date = Some(range.end);
                    }
                    Err(_) => errors.push(
                        "period must be one of: past_week, past_month, last_3_months, custom",
                    ),
                }
            }
        }

        if let Some(raw) = present(&self.category) {
            match raw.parse::<Category>() {
                Ok(c) => filter.category = Some(c),
                Err(_) => errors.push(format!("Category must be one of: {CATEGORY_CHOICES}")),
            }
        }

        filter.min_amount = parse_amount_param(present(&self.min_amount), "min_amount", errors);
        filter.max_amount = parse_amount_param(present(&self.max_amount), "max_amount", errors);
        filter
    }
}

fn parse_date_param(raw: Option<&str>, name: &str, errors: &mut ValidationErrors) -> Option<Date> {
    let raw = raw?;
    let parsed = parse_iso_date(raw);
    if parsed.is_none() {
        errors.push(format!("{name} must be a valid ISO date (YYYY-MM-DD)"));
    }
    parsed
}

fn parse_amount_param(
    raw: Option<&str>,
    name: &str,
    errors: &mut ValidationErrors,
) -> Option<Decimal> {
    let raw = raw?;
    match Decimal::from_str(raw) {
        Ok(v) if v > Decimal::ZERO => Some(v),
        _ => {
            errors.push(format!("{name} must be a positive number"));
            None
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExpensePage {
    pub expenses: Vec<Expense>,
    pub pagination: PageMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryStat {
    pub category: Category,
    pub count: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpenseStats {
    pub total_expenses: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub average_amount: Decimal,
    pub categories: Vec<CategoryStat>,
}

impl ExpenseStats {
    /// Derives the totals from a per-category breakdown. The average is 0 for
    /// an empty set and is rounded to cents.
    pub fn from_breakdown(mut categories: Vec<CategoryStat>) -> Self {
        categories.sort_by(|a, b| {
            b.total_amount
                .cmp(&a.total_amount)
                .then_with(|| a.category.as_str().cmp(b.category.as_str()))
        });
        let total_expenses: u64 = categories.iter().map(|c| c.count).sum();
        let total_amount: Decimal = categories.iter().map(|c| c.total_amount).sum();
        let average_amount = if total_expenses == 0 {
            Decimal::ZERO
        } else {
            (total_amount / Decimal::from(total_expenses))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        };
        Self {
            total_expenses,
            total_amount,
            average_amount,
            categories,
        }
    }
}

/// One page of the caller's expenses plus pagination metadata.
pub async fn list_expenses(
    store: &dyn ExpenseStore,
    user_id: i64,
    query: &ExpenseQuery,
) -> Result<ExpensePage, AppError> {
    query.filter.validate()?;
    let (expenses, total) = store.list(user_id, query).await?;
    Ok(ExpensePage {
        expenses,
        pagination: PageMeta::new(query.page.page, query.page.limit, total),
    })
}

pub async fn expense_stats(
    store: &dyn ExpenseStore,
    user_id: i64,
    filter: &ExpenseFilter,
) -> Result<ExpenseStats, AppError> {
    filter.validate()?;
    let breakdown = store.category_totals(user_id, filter).await?;
    Ok(ExpenseStats::from_breakdown(breakdown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{macros::date, OffsetDateTime};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn expense(id: i64, amount: &str, category: Category, day: Date) -> Expense {
        Expense {
            id,
            user_id: 1,
            title: format!("expense {id}"),
            description: String::new(),
            amount: dec(amount),
            category,
            expense_date: day,
            created_at: OffsetDateTime::UNIX_EPOCH + Duration::seconds(id),
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn params(pairs: &[(&str, &str)]) -> ExpenseQueryParams {
        let mut p = ExpenseQueryParams::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "period" => p.period = v,
                "start_date" => p.start_date = v,
                "end_date" => p.end_date = v,
                "category" => p.category = v,
                "min_amount" => p.min_amount = v,
                "max_amount" => p.max_amount = v,
                "page" => p.page = v,
                "limit" => p.limit = v,
                "sort_by" => p.sort_by = v,
                "sort_order" => p.sort_order = v,
                other => panic!("unknown param {other}"),
            }
        }
        p
    }

    const TODAY: Date = date!(2024 - 03 - 31);

    #[test]
    fn defaults_apply_when_params_are_absent() {
        let q = ExpenseQueryParams::default().to_query(TODAY).unwrap();
        assert_eq!(q.page, PageRequest { page: 1, limit: 10 });
        assert_eq!(q.sort.field, SortField::ExpenseDate);
        assert_eq!(q.sort.order, SortOrder::Desc);
        assert_eq!(q.filter, ExpenseFilter::default());
    }

    #[test]
    fn parses_every_param() {
        let q = params(&[
            ("start_date", "2024-01-01"),
            ("end_date", "2024-01-31"),
            ("category", "food"),
            ("min_amount", "4"),
            ("max_amount", "5.00"),
            ("page", "2"),
            ("limit", "25"),
            ("sort_by", "amount"),
            ("sort_order", "asc"),
        ])
        .to_query(TODAY)
        .unwrap();
        assert_eq!(q.filter.start_date, Some(date!(2024 - 01 - 01)));
        assert_eq!(q.filter.end_date, Some(date!(2024 - 01 - 31)));
        assert_eq!(q.filter.category, Some(Category::Food));
        assert_eq!(q.filter.min_amount, Some(dec("4")));
        assert_eq!(q.filter.max_amount, Some(dec("5")));
        assert_eq!(q.page.offset(), 25);
        assert_eq!(q.sort, Sort { field: SortField::Amount, order: SortOrder::Asc });
    }

    #[test]
    fn rejects_out_of_range_pagination_and_unknown_enums() {
        for (k, v) in [
            ("page", "0"),
            ("page", "abc"),
            ("limit", "0"),
            ("limit", "101"),
            ("sort_by", "title"),
            ("sort_order", "sideways"),
            ("category", "groceries"),
            ("min_amount", "-1"),
            ("max_amount", "0"),
            ("start_date", "01/02/2024"),
        ] {
            assert!(params(&[(k, v)]).to_query(TODAY).is_err(), "{k}={v} should fail");
        }
        let errors = params(&[("page", "0"), ("limit", "500")]).to_query(TODAY).unwrap_err();
        assert_eq!(errors.messages().len(), 2);
    }

    #[test]
    fn cross_field_bounds_are_checked() {
        let err = params(&[("start_date", "2024-02-01"), ("end_date", "2024-01-01")])
            .to_query(TODAY)
            .unwrap_err();
        assert_eq!(err.to_string(), "end_date must be on or after start_date");

        let err = params(&[("min_amount", "10"), ("max_amount", "5")])
            .to_filter(TODAY)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "max_amount must be greater than or equal to min_amount"
        );

        assert!(params(&[("start_date", "2024-01-01"), ("end_date", "2024-01-01")])
            .to_query(TODAY)
            .is_ok());
        assert!(params(&[("start_date", "2024-01-01")]).to_query(TODAY).is_ok());
    }

    #[test]
    fn blank_values_count_as_absent() {
        let q = params(&[("category", ""), ("page", " ")]).to_query(TODAY).unwrap();
        assert_eq!(q, ExpenseQuery::default());
    }

    #[test]
    fn period_shorthand_resolves_to_dates() {
        let f = params(&[("period", "past_week")]).to_filter(TODAY).unwrap();
        assert_eq!(f.start_date, Some(date!(2024 - 03 - 24)));
        assert_eq!(f.end_date, Some(TODAY));

        assert!(params(&[("period", "past_week"), ("start_date", "2024-01-01")])
            .to_filter(TODAY)
            .is_err());
        assert!(params(&[("period", "custom"), ("start_date", "2024-01-01")])
            .to_filter(TODAY)
            .is_err());
        assert!(params(&[
            ("period", "custom"),
            ("start_date", "2024-01-01"),
            ("end_date", "2024-01-02")
        ])
        .to_filter(TODAY)
        .is_ok());
        assert!(params(&[("period", "yesterday")]).to_filter(TODAY).is_err());
    }

    #[test]
    fn period_ranges_clamp_month_ends() {
        assert_eq!(
            Period::PastMonth.date_range(TODAY),
            DateRange { start: date!(2024 - 02 - 29), end: TODAY }
        );
        assert_eq!(
            Period::LastThreeMonths.date_range(TODAY).start,
            date!(2023 - 12 - 31)
        );
        assert_eq!(
            Period::LastThreeMonths.date_range(date!(2024 - 05 - 31)).start,
            date!(2024 - 02 - 29)
        );
        assert_eq!(
            Period::PastMonth.date_range(date!(2024 - 01 - 15)).start,
            date!(2023 - 12 - 15)
        );
        assert!(matches!("fortnight".parse::<Period>(), Err(AppError::InvalidInput(_))));
        assert_eq!("last_3_months".parse::<Period>().unwrap(), Period::LastThreeMonths);
    }

    #[test]
    fn filter_bounds_are_inclusive() {
        let f = ExpenseFilter {
            start_date: Some(date!(2024 - 01 - 01)),
            end_date: Some(date!(2024 - 01 - 31)),
            category: Some(Category::Food),
            min_amount: Some(dec("4")),
            max_amount: Some(dec("5")),
        };
        assert!(f.matches(&expense(1, "4", Category::Food, date!(2024 - 01 - 01))));
        assert!(f.matches(&expense(2, "5.00", Category::Food, date!(2024 - 01 - 31))));
        assert!(!f.matches(&expense(3, "5.01", Category::Food, date!(2024 - 01 - 15))));
        assert!(!f.matches(&expense(4, "4.50", Category::Travel, date!(2024 - 01 - 15))));
        assert!(!f.matches(&expense(5, "4.50", Category::Food, date!(2024 - 02 - 01))));
        assert!(ExpenseFilter::default().matches(&expense(6, "999", Category::Other, TODAY)));
    }

    #[test]
    fn sort_breaks_ties_by_id() {
        let day = date!(2024 - 01 - 01);
        let mut rows = vec![
            expense(3, "1", Category::Food, day),
            expense(1, "2", Category::Food, day),
            expense(2, "1", Category::Food, day),
        ];
        let sort = Sort { field: SortField::Amount, order: SortOrder::Desc };
        rows.sort_by(|a, b| sort.compare(a, b));
        assert_eq!(rows.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2, 3]);

        let sort = Sort { field: SortField::ExpenseDate, order: SortOrder::Asc };
        rows.sort_by(|a, b| sort.compare(a, b));
        assert_eq!(rows.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn stats_of_nothing_average_to_zero() {
        let stats = ExpenseStats::from_breakdown(Vec::new());
        assert_eq!(stats.total_expenses, 0);
        assert_eq!(stats.total_amount, Decimal::ZERO);
        assert_eq!(stats.average_amount, Decimal::ZERO);
        assert!(stats.categories.is_empty());
    }

    #[test]
    fn stats_sum_and_order_categories() {
        let stats = ExpenseStats::from_breakdown(vec![
            CategoryStat { category: Category::Food, count: 2, total_amount: dec("10.00") },
            CategoryStat { category: Category::Travel, count: 1, total_amount: dec("100.01") },
        ]);
        assert_eq!(stats.total_expenses, 3);
        assert_eq!(stats.total_amount, dec("110.01"));
        assert_eq!(stats.average_amount, dec("36.67"));
        assert_eq!(stats.categories[0].category, Category::Travel);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_amount"], 110.01);
        assert_eq!(json["categories"][1]["count"], 2);
    }
}
