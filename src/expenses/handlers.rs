use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use time::{Date, OffsetDateTime};
use tracing::instrument;

use super::{
    dto::{CreateExpenseRequest, ExpenseData, ExpenseListData, StatsData, UpdateExpenseRequest},
    query::{self, ExpenseQueryParams},
    services,
};
use crate::{
    auth::extractors::AuthUser,
    error::{ApiError, AppError, ResultExt},
    extract::{ApiJson, ApiPath, ApiQuery},
    response::Envelope,
    state::AppState,
};

pub fn expense_routes() -> Router<AppState> {
    Router::new()
        .route("/expenses", get(list_expenses).post(create_expense))
        .route("/expenses/stats", get(expense_stats))
        .route(
            "/expenses/:id",
            get(get_expense).put(update_expense).delete(delete_expense),
        )
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

fn parse_expense_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|_| {
        ApiError::new(
            "Invalid expense ID",
            AppError::InvalidInput("Expense ID must be a valid number".into()),
        )
    })
}

#[instrument(skip(state, payload))]
pub async fn create_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<Envelope<ExpenseData>>), ApiError> {
    let expense = services::create_expense(state.expenses.as_ref(), auth.user_id, payload, today())
        .await
        .with_message("Failed to create expense")?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::success("Expense created successfully", ExpenseData { expense })),
    ))
}

#[instrument(skip(state))]
pub async fn list_expenses(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<ExpenseQueryParams>,
) -> Result<Json<Envelope<ExpenseListData>>, ApiError> {
    let query = params
        .to_query(today())
        .with_message("Query validation error")?;
    let page = query::list_expenses(state.expenses.as_ref(), auth.user_id, &query)
        .await
        .with_message("Failed to retrieve expenses")?;

    Ok(Json(
        Envelope::success(
            "Expenses retrieved successfully",
            ExpenseListData {
                expenses: page.expenses,
            },
        )
        .with_pagination(page.pagination),
    ))
}

#[instrument(skip(state))]
pub async fn expense_stats(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<ExpenseQueryParams>,
) -> Result<Json<Envelope<StatsData>>, ApiError> {
    let filter = params
        .to_filter(today())
        .with_message("Query validation error")?;
    let stats = query::expense_stats(state.expenses.as_ref(), auth.user_id, &filter)
        .await
        .with_message("Failed to retrieve expense statistics")?;

    Ok(Json(Envelope::success(
        "Expense statistics retrieved successfully",
        StatsData { stats },
    )))
}

#[instrument(skip(state))]
pub async fn get_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Envelope<ExpenseData>>, ApiError> {
    let id = parse_expense_id(&id)?;
    let expense = services::get_expense(state.expenses.as_ref(), auth.user_id, id)
        .await
        .with_message("Failed to retrieve expense")?
        .ok_or_else(|| {
            ApiError::new(
                "Expense not found",
                AppError::NotFound(
                    "The specified expense does not exist or you do not have permission to access it"
                        .into(),
                ),
            )
        })?;

    Ok(Json(Envelope::success(
        "Expense retrieved successfully",
        ExpenseData { expense },
    )))
}

#[instrument(skip(state, payload))]
pub async fn update_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<UpdateExpenseRequest>,
) -> Result<Json<Envelope<ExpenseData>>, ApiError> {
    let id = parse_expense_id(&id)?;
    let expense =
        services::update_expense(state.expenses.as_ref(), auth.user_id, id, payload, today())
            .await
            .with_message("Failed to update expense")?;

    Ok(Json(Envelope::success(
        "Expense updated successfully",
        ExpenseData { expense },
    )))
}

#[instrument(skip(state))]
pub async fn delete_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let id = parse_expense_id(&id)?;
    services::delete_expense(state.expenses.as_ref(), auth.user_id, id)
        .await
        .with_message("Failed to delete expense")?;

    Ok(Json(Envelope::message("Expense deleted successfully")))
}
