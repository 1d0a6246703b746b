use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};

use crate::db::StoreError;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Closed set of expense categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Transportation,
    Entertainment,
    Utilities,
    Healthcare,
    Shopping,
    Travel,
    Education,
    Other,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Food,
        Category::Transportation,
        Category::Entertainment,
        Category::Utilities,
        Category::Healthcare,
        Category::Shopping,
        Category::Travel,
        Category::Education,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::Transportation => "transportation",
            Category::Entertainment => "entertainment",
            Category::Utilities => "utilities",
            Category::Healthcare => "healthcare",
            Category::Shopping => "shopping",
            Category::Travel => "travel",
            Category::Education => "education",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category `{}`", self.0)
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

pub const CATEGORY_CHOICES: &str =
    "food, transportation, entertainment, utilities, healthcare, shopping, travel, education, other";

/// Expense row as stored; `category` is plain text in the table.
#[derive(Debug, Clone, FromRow)]
pub struct ExpenseRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub amount: Decimal,
    pub category: String,
    pub expense_date: Date,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Expense {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub category: Category,
    #[serde(with = "iso_date")]
    pub expense_date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl TryFrom<ExpenseRow> for Expense {
    type Error = StoreError;

    fn try_from(r: ExpenseRow) -> Result<Self, Self::Error> {
        let category = r
            .category
            .parse::<Category>()
            .map_err(|e| StoreError::CorruptRow(format!("expense {}: {e}", r.id)))?;
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            title: r.title,
            description: r.description,
            amount: r.amount,
            category,
            expense_date: r.expense_date,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Validated input for a new expense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExpense {
    pub title: String,
    pub description: String,
    pub amount: Decimal,
    pub category: Category,
    pub expense_date: Date,
}

/// Validated partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub category: Option<Category>,
    pub expense_date: Option<Date>,
}

impl ExpenseChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.expense_date.is_none()
    }

    pub fn apply(self, expense: &mut Expense) {
        if let Some(title) = self.title {
            expense.title = title;
        }
        if let Some(description) = self.description {
            expense.description = description;
        }
        if let Some(amount) = self.amount {
            expense.amount = amount;
        }
        if let Some(category) = self.category {
            expense.category = category;
        }
        if let Some(expense_date) = self.expense_date {
            expense.expense_date = expense_date;
        }
    }
}
