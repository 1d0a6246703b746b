use time::Date;
use tracing::info;

use super::{
    dto::{CreateExpenseRequest, UpdateExpenseRequest},
    repo::ExpenseStore,
    repo_types::Expense,
};
use crate::error::AppError;

const NOT_FOUND_OR_FOREIGN: &str = "Expense not found or unauthorized";

pub async fn create_expense(
    store: &dyn ExpenseStore,
    user_id: i64,
    req: CreateExpenseRequest,
    today: Date,
) -> Result<Expense, AppError> {
    let new = req.into_new_expense(today)?;
    let expense = store.insert(user_id, new).await?;
    info!(user_id, expense_id = expense.id, "expense created");
    Ok(expense)
}

/// `None` when the id does not exist or belongs to another user.
pub async fn get_expense(
    store: &dyn ExpenseStore,
    user_id: i64,
    id: i64,
) -> Result<Option<Expense>, AppError> {
    Ok(store.find(user_id, id).await?)
}

pub async fn update_expense(
    store: &dyn ExpenseStore,
    user_id: i64,
    id: i64,
    req: UpdateExpenseRequest,
    today: Date,
) -> Result<Expense, AppError> {
    let changes = req.into_changes(today)?;
    let expense = store
        .update(user_id, id, changes)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND_OR_FOREIGN.into()))?;
    info!(user_id, expense_id = id, "expense updated");
    Ok(expense)
}

pub async fn delete_expense(store: &dyn ExpenseStore, user_id: i64, id: i64) -> Result<(), AppError> {
    if !store.delete(user_id, id).await? {
        return Err(AppError::NotFound(NOT_FOUND_OR_FOREIGN.into()));
    }
    info!(user_id, expense_id = id, "expense deleted");
    Ok(())
}
