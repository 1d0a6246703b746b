use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use super::{
    query::ExpenseStats,
    repo_types::{Category, Expense, ExpenseChanges, NewExpense, CATEGORY_CHOICES},
};
use crate::validation::{parse_iso_date, ValidationErrors};

pub const TITLE_MAX_LENGTH: usize = 255;
pub const DESCRIPTION_MAX_LENGTH: usize = 1000;

/// Upper bound of a NUMERIC(12,2) column.
fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

/// Request body for a new expense. Fields are optional at the serde level
/// so a missing one is reported with its own message.
#[derive(Debug, Default, Deserialize)]
pub struct CreateExpenseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub expense_date: Option<String>,
}

impl CreateExpenseRequest {
    /// Validates against `today` (UTC) and produces the insertable value.
    pub fn into_new_expense(self, today: Date) -> Result<NewExpense, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        match &self.title {
            Some(title) => check_title(title, &mut errors),
            None => errors.push("Title is required"),
        }
        if let Some(description) = &self.description {
            check_description(description, &mut errors);
        }
        match self.amount {
            Some(amount) => check_amount(amount, &mut errors),
            None => errors.push("Amount is required"),
        }
        let category = match &self.category {
            Some(raw) => parse_category(raw, &mut errors),
            None => {
                errors.push("Category is required");
                None
            }
        };
        let expense_date = match &self.expense_date {
            Some(raw) => parse_expense_date(raw, today, &mut errors),
            None => {
                errors.push("Expense date is required");
                None
            }
        };

        errors.into_result()?;
        match (self.title, self.amount, category, expense_date) {
            (Some(title), Some(amount), Some(category), Some(expense_date)) => Ok(NewExpense {
                title,
                description: self.description.unwrap_or_default(),
                amount,
                category,
                expense_date,
            }),
            _ => Err(ValidationErrors::single("Invalid expense payload")),
        }
    }
}

/// Partial expense update; at least one field must be present.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateExpenseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub expense_date: Option<String>,
}

impl UpdateExpenseRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.expense_date.is_none()
    }

    pub fn into_changes(self, today: Date) -> Result<ExpenseChanges, ValidationErrors> {
        if self.is_empty() {
            return Err(ValidationErrors::single(
                "At least one field must be provided for update",
            ));
        }

        let mut errors = ValidationErrors::new();
        if let Some(title) = &self.title {
            check_title(title, &mut errors);
        }
        if let Some(description) = &self.description {
            check_description(description, &mut errors);
        }
        if let Some(amount) = self.amount {
            check_amount(amount, &mut errors);
        }
        let category = self
            .category
            .as_deref()
            .and_then(|raw| parse_category(raw, &mut errors));
        let expense_date = self
            .expense_date
            .as_deref()
            .and_then(|raw| parse_expense_date(raw, today, &mut errors));
        errors.into_result()?;

        Ok(ExpenseChanges {
            title: self.title,
            description: self.description,
            amount: self.amount,
            category,
            expense_date,
        })
    }
}

fn check_title(title: &str, errors: &mut ValidationErrors) {
    let len = title.chars().count();
    if len == 0 {
        errors.push("Title cannot be empty");
    } else if len > TITLE_MAX_LENGTH {
        errors.push("Title cannot exceed 255 characters");
    }
}

fn check_description(description: &str, errors: &mut ValidationErrors) {
    if description.chars().count() > DESCRIPTION_MAX_LENGTH {
        errors.push("Description cannot exceed 1000 characters");
    }
}

fn check_amount(amount: Decimal, errors: &mut ValidationErrors) {
    if amount <= Decimal::ZERO {
        errors.push("Amount must be a positive number");
    } else if amount.normalize().scale() > 2 {
        errors.push("Amount must have at most 2 decimal places");
    } else if amount > max_amount() {
        errors.push("Amount cannot exceed 9999999999.99");
    }
}

fn parse_category(raw: &str, errors: &mut ValidationErrors) -> Option<Category> {
    match raw.parse::<Category>() {
        Ok(category) => Some(category),
        Err(_) => {
            errors.push(format!("Category must be one of: {CATEGORY_CHOICES}"));
            None
        }
    }
}

fn parse_expense_date(raw: &str, today: Date, errors: &mut ValidationErrors) -> Option<Date> {
    match parse_iso_date(raw) {
        Some(date) if date > today => {
            errors.push("Expense date cannot be in the future");
            None
        }
        Some(date) => Some(date),
        None => {
            errors.push("Expense date must be in ISO format (YYYY-MM-DD)");
            None
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExpenseData {
    pub expense: Expense,
}

#[derive(Debug, Serialize)]
pub struct ExpenseListData {
    pub expenses: Vec<Expense>,
}

#[derive(Debug, Serialize)]
pub struct StatsData {
    pub stats: ExpenseStats,
}
