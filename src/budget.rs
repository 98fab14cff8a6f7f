//! Budget management and the budget ledger.
//!
//! This module contains everything related to budgets:
//! - The `Budget` model and its derived remark
//! - Database functions for storing, querying and deleting budgets
//! - The ledger operations that keep `remaining_amount` consistent with the
//!   expense transactions in the budget's category
//! - Route handlers for the budget endpoints
//!
//! The ledger has two disciplines. Incremental adjustment ([apply_expense] /
//! [reverse_expense]) is the hot path: O(1), applied exactly once per
//! transaction mutation by the transaction module. Recompute-from-scratch
//! ([recompute_remaining] / [recompute_all]) is the ground truth, run only
//! when explicitly requested or when a budget is edited directly.

use std::sync::Mutex;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::Date;

use crate::{
    Error,
    app_state::BudgetState,
    category::CategoryType,
    database_id::DatabaseID,
    db::decimal_from_column,
    pagination::{Page, PageParams},
    transaction::sum_expenses_by_category,
};

// ============================================================================
// MODELS
// ============================================================================

/// The remark for a budget with a negative remaining amount.
pub const REMARK_OVERSPENT: &str = "Overspent";
/// The remark for a budget that has been partially spent.
pub const REMARK_WITHIN_LIMIT: &str = "Within Limit";
/// The remark for a budget with no spending against it.
pub const REMARK_BUDGET_INTACT: &str = "Budget Intact";

/// A spending limit for a single category.
///
/// At most one budget exists per category. The budget references its expense
/// transactions only by category value, so deleting a budget never touches
/// any transaction and vice versa.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    /// The ID of the budget.
    pub id: DatabaseID,
    /// The category this budget applies to.
    pub category: CategoryType,
    /// The amount of money allocated to this budget.
    pub budget_limit: Decimal,
    /// The budget limit minus the expenses recorded against this category.
    pub remaining_amount: Decimal,
    /// The first day the budget is intended to cover. Informational only:
    /// expense totals include all transactions in the category.
    pub start_date: Option<Date>,
    /// The last day the budget is intended to cover. Informational only.
    pub end_date: Option<Date>,
}

impl Budget {
    /// A human-readable classification of the remaining amount.
    ///
    /// Always derived from the current figures, never stored, so it cannot go
    /// stale.
    pub fn remark(&self) -> &'static str {
        if self.remaining_amount < Decimal::ZERO {
            REMARK_OVERSPENT
        } else if self.remaining_amount < self.budget_limit {
            REMARK_WITHIN_LIMIT
        } else {
            REMARK_BUDGET_INTACT
        }
    }
}

/// The data for creating or updating a budget.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetData {
    /// The category the budget applies to.
    pub category: CategoryType,
    /// The amount of money to allocate.
    pub budget_limit: Decimal,
    /// The first day the budget is intended to cover.
    #[serde(default)]
    pub start_date: Option<Date>,
    /// The last day the budget is intended to cover.
    #[serde(default)]
    pub end_date: Option<Date>,
}

/// A budget as returned by the API: the stored fields plus the derived remark.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetResponse {
    /// The stored budget fields.
    #[serde(flatten)]
    pub budget: Budget,
    /// The derived classification of the remaining amount.
    pub remark: &'static str,
}

impl From<Budget> for BudgetResponse {
    fn from(budget: Budget) -> Self {
        let remark = budget.remark();

        Self { budget, remark }
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

pub(crate) fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
            id INTEGER PRIMARY KEY,
            category TEXT NOT NULL UNIQUE,
            budget_limit TEXT NOT NULL,
            remaining_amount TEXT NOT NULL,
            start_date TEXT,
            end_date TEXT
        )",
        (),
    )?;

    Ok(())
}

fn map_budget_row(row: &rusqlite::Row) -> Result<Budget, rusqlite::Error> {
    Ok(Budget {
        id: row.get(0)?,
        category: row.get(1)?,
        budget_limit: decimal_from_column(row, 2)?,
        remaining_amount: decimal_from_column(row, 3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
    })
}

const BUDGET_COLUMNS: &str = "id, category, budget_limit, remaining_amount, start_date, end_date";

/// Create a new budget in the database.
///
/// A fresh budget starts fully unspent: `remaining_amount` is initialized to
/// the budget limit.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateBudgetCategory] if a budget already exists for the category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_budget(data: BudgetData, connection: &Connection) -> Result<Budget, Error> {
    let budget = connection
        .prepare(&format!(
            "INSERT INTO budget (category, budget_limit, remaining_amount, start_date, end_date)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING {BUDGET_COLUMNS}"
        ))?
        .query_row(
            (
                data.category,
                data.budget_limit.to_string(),
                data.budget_limit.to_string(),
                data.start_date,
                data.end_date,
            ),
            map_budget_row,
        )?;

    Ok(budget)
}

/// Retrieve a budget in the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid budget,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_budget(id: DatabaseID, connection: &Connection) -> Result<Budget, Error> {
    let budget = connection
        .prepare(&format!("SELECT {BUDGET_COLUMNS} FROM budget WHERE id = :id"))?
        .query_row(&[(":id", &id)], map_budget_row)?;

    Ok(budget)
}

/// Retrieve the budget for `category`, if one exists.
///
/// Not every category has a budget: callers reacting to transaction mutations
/// must treat [Error::NotFound] as a valid absence, not a failure.
pub fn get_budget_by_category(
    category: CategoryType,
    connection: &Connection,
) -> Result<Budget, Error> {
    let budget = connection
        .prepare(&format!(
            "SELECT {BUDGET_COLUMNS} FROM budget WHERE category = :category"
        ))?
        .query_row(&[(":category", &category)], map_budget_row)?;

    Ok(budget)
}

fn get_all_budgets(connection: &Connection) -> Result<Vec<Budget>, Error> {
    connection
        .prepare(&format!("SELECT {BUDGET_COLUMNS} FROM budget ORDER BY id"))?
        .query_map([], map_budget_row)?
        .map(|maybe_budget| maybe_budget.map_err(Error::from))
        .collect()
}

/// Update a budget's category, limit and date window.
///
/// The remaining amount is not taken from the caller: it is recomputed from
/// scratch against the (possibly new) category's expenses, so a direct edit
/// always lands on ground truth.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid budget,
/// - [Error::DuplicateBudgetCategory] if the new category already has another budget,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_budget(
    id: DatabaseID,
    data: BudgetData,
    connection: &Connection,
) -> Result<Budget, Error> {
    let existing = get_budget(id, connection)?;

    let edited = Budget {
        id,
        category: data.category,
        budget_limit: data.budget_limit,
        remaining_amount: existing.remaining_amount,
        start_date: data.start_date,
        end_date: data.end_date,
    };
    let recomputed = recompute_remaining(&edited, connection)?;

    connection.execute(
        "UPDATE budget
         SET category = ?1, budget_limit = ?2, remaining_amount = ?3, start_date = ?4, end_date = ?5
         WHERE id = ?6",
        (
            recomputed.category,
            recomputed.budget_limit.to_string(),
            recomputed.remaining_amount.to_string(),
            recomputed.start_date,
            recomputed.end_date,
            id,
        ),
    )?;

    Ok(recomputed)
}

/// Delete a budget from the database.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid budget,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_budget(id: DatabaseID, connection: &Connection) -> Result<(), Error> {
    let rows_deleted = connection.execute("DELETE FROM budget WHERE id = ?1", (id,))?;

    if rows_deleted == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

fn budget_sort_column(sort_by: &str) -> &'static str {
    match sort_by {
        "category" => "category",
        // Amounts are stored as TEXT, cast so they sort numerically.
        "budgetLimit" => "CAST(budget_limit AS REAL)",
        "remainingAmount" => "CAST(remaining_amount AS REAL)",
        "startDate" => "start_date",
        "endDate" => "end_date",
        // Unknown sort fields fall back to the default rather than erroring.
        _ => "id",
    }
}

/// Retrieve one page of budgets.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is a SQL error.
pub fn get_budget_page(
    params: &PageParams,
    connection: &Connection,
) -> Result<Page<BudgetResponse>, Error> {
    // SQLite integers are i64, convert to the envelope's u64 after reading.
    let total_elements: i64 =
        connection.query_row("SELECT COUNT(id) FROM budget", [], |row| row.get(0))?;

    let limit = i64::try_from(params.size).unwrap_or(i64::MAX);
    let offset = i64::try_from(params.page.saturating_mul(params.size)).unwrap_or(i64::MAX);

    let items = connection
        .prepare(&format!(
            "SELECT {BUDGET_COLUMNS} FROM budget ORDER BY {} LIMIT {limit} OFFSET {offset}",
            budget_sort_column(&params.sort_by),
        ))?
        .query_map([], map_budget_row)?
        .map(|maybe_budget| {
            maybe_budget
                .map(BudgetResponse::from)
                .map_err(Error::from)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(
        items,
        params.page,
        params.size,
        total_elements as u64,
        params.sort_by.clone(),
    ))
}

// ============================================================================
// LEDGER OPERATIONS
// ============================================================================

/// How many times a budget adjustment is retried when the database reports a
/// concurrent-access conflict before the error is surfaced to the caller.
const MAX_ADJUST_RETRIES: u32 = 3;

/// Recompute a budget's remaining amount from the full expense set for its
/// category.
///
/// This is the ledger's ground truth: `remaining = limit - sum(expenses in
/// category)`. It is idempotent and self-correcting, and therefore the repair
/// operation for any drift the incremental path might accumulate. The result
/// is returned, not persisted.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is a SQL error.
pub fn recompute_remaining(budget: &Budget, connection: &Connection) -> Result<Budget, Error> {
    let total_expenses = sum_expenses_by_category(budget.category, connection)?;

    Ok(Budget {
        remaining_amount: budget.budget_limit - total_expenses,
        ..budget.clone()
    })
}

fn save_remaining(budget: &Budget, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "UPDATE budget SET remaining_amount = ?1 WHERE id = ?2",
        (budget.remaining_amount.to_string(), budget.id),
    )?;

    Ok(())
}

/// Recompute and persist the remaining amount of every stored budget.
///
/// The connection lock is taken once to list the budgets and then re-acquired
/// for each budget, so each recompute-and-save is its own atomic unit and
/// concurrent adjustments can interleave with the scan (last write wins).
/// A failure on one budget is logged and the batch continues with the rest.
/// Returns the number of budgets successfully updated.
///
/// # Errors
/// This function will return an [Error::SqlError] if the budgets could not be
/// listed at all.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub fn recompute_all(db_connection: &Mutex<Connection>) -> Result<usize, Error> {
    let budget_ids: Vec<DatabaseID> = {
        let connection = db_connection.lock().unwrap();

        get_all_budgets(&connection)?
            .into_iter()
            .map(|budget| budget.id)
            .collect()
    };

    let mut updated = 0;

    for id in budget_ids {
        let connection = db_connection.lock().unwrap();
        let result = get_budget(id, &connection).and_then(|budget| {
            recompute_remaining(&budget, &connection)
                .and_then(|recomputed| save_remaining(&recomputed, &connection))
        });

        match result {
            Ok(()) => updated += 1,
            // The budget was deleted while the scan was in flight.
            Err(Error::NotFound) => {}
            Err(error) => {
                tracing::error!("failed to recompute budget {id}: {error}");
            }
        }
    }

    Ok(updated)
}

/// Record a new expense against the budget for `category`, decrementing its
/// remaining amount.
///
/// Returns the adjusted budget, or `None` when the category has no budget —
/// a valid absence, not an error.
///
/// # Errors
/// This function will return a:
/// - [Error::Conflict] if the adjustment kept conflicting with concurrent updates,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn apply_expense(
    category: CategoryType,
    amount: Decimal,
    connection: &Connection,
) -> Result<Option<Budget>, Error> {
    adjust_remaining(category, -amount, connection)
}

/// Reverse a previously applied expense, restoring the amount to the budget
/// for `category`.
///
/// Reversal is exact: applying an expense and reversing it leaves the
/// remaining amount bit-for-bit where it started.
///
/// # Errors
/// See [apply_expense].
pub fn reverse_expense(
    category: CategoryType,
    amount: Decimal,
    connection: &Connection,
) -> Result<Option<Budget>, Error> {
    adjust_remaining(category, amount, connection)
}

fn adjust_remaining(
    category: CategoryType,
    delta: Decimal,
    connection: &Connection,
) -> Result<Option<Budget>, Error> {
    let mut attempts = 0;

    loop {
        match try_adjust_remaining(category, delta, connection) {
            Err(Error::Conflict) if attempts < MAX_ADJUST_RETRIES => {
                attempts += 1;
                tracing::debug!(
                    "budget adjustment for {category} conflicted, retrying ({attempts}/{MAX_ADJUST_RETRIES})"
                );
            }
            result => return result,
        }
    }
}

// The read and the write happen inside one SQLite transaction so no other
// writer can observe the pre-adjustment value in between.
fn try_adjust_remaining(
    category: CategoryType,
    delta: Decimal,
    connection: &Connection,
) -> Result<Option<Budget>, Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    let budget = match get_budget_by_category(category, &sql_transaction) {
        Ok(budget) => budget,
        Err(Error::NotFound) => return Ok(None),
        Err(error) => return Err(error),
    };

    let adjusted = Budget {
        remaining_amount: budget.remaining_amount + delta,
        ..budget
    };
    save_remaining(&adjusted, &sql_transaction)?;

    sql_transaction.commit()?;

    Ok(Some(adjusted))
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// A route handler for getting a budget by its database ID.
///
/// Returns the status code 404 if the requested budget does not exist.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn get_budget_endpoint(
    State(state): State<BudgetState>,
    Path(budget_id): Path<DatabaseID>,
) -> impl IntoResponse {
    let connection = state.db_connection.lock().unwrap();

    get_budget(budget_id, &connection).map(|budget| Json(BudgetResponse::from(budget)))
}

/// A route handler for listing budgets one page at a time.
pub async fn get_budgets_endpoint(
    State(state): State<BudgetState>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    let connection = state.db_connection.lock().unwrap();

    get_budget_page(&params, &connection).map(Json)
}

/// A route handler for creating a new budget.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn create_budget_endpoint(
    State(state): State<BudgetState>,
    Json(data): Json<BudgetData>,
) -> impl IntoResponse {
    let connection = state.db_connection.lock().unwrap();

    create_budget(data, &connection)
        .map(|budget| (StatusCode::CREATED, Json(BudgetResponse::from(budget))))
}

/// A route handler for editing a budget's category, limit and date window.
pub async fn update_budget_endpoint(
    State(state): State<BudgetState>,
    Path(budget_id): Path<DatabaseID>,
    Json(data): Json<BudgetData>,
) -> impl IntoResponse {
    let connection = state.db_connection.lock().unwrap();

    update_budget(budget_id, data, &connection).map(|budget| Json(BudgetResponse::from(budget)))
}

/// A route handler for deleting a budget.
pub async fn delete_budget_endpoint(
    State(state): State<BudgetState>,
    Path(budget_id): Path<DatabaseID>,
) -> impl IntoResponse {
    let connection = state.db_connection.lock().unwrap();

    delete_budget(budget_id, &connection).map(|()| StatusCode::NO_CONTENT)
}

/// A route handler that recomputes every budget's remaining amount from
/// scratch, repairing any drift.
///
/// The connection lock is managed by [recompute_all] itself, one budget at a
/// time, so other requests are served between budgets.
pub async fn reload_budgets_endpoint(State(state): State<BudgetState>) -> impl IntoResponse {
    recompute_all(&state.db_connection).map(|updated| Json(json!({ "updated": updated })))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod remark_tests {
    use rust_decimal_macros::dec;

    use super::{Budget, REMARK_BUDGET_INTACT, REMARK_OVERSPENT, REMARK_WITHIN_LIMIT};
    use crate::category::CategoryType;

    fn budget_with(remaining: rust_decimal::Decimal, limit: rust_decimal::Decimal) -> Budget {
        Budget {
            id: 1,
            category: CategoryType::Food,
            budget_limit: limit,
            remaining_amount: remaining,
            start_date: None,
            end_date: None,
        }
    }

    #[test]
    fn negative_remaining_is_overspent() {
        assert_eq!(
            budget_with(dec!(-0.01), dec!(100)).remark(),
            REMARK_OVERSPENT
        );
    }

    #[test]
    fn partially_spent_is_within_limit() {
        assert_eq!(
            budget_with(dec!(50), dec!(100)).remark(),
            REMARK_WITHIN_LIMIT
        );
    }

    #[test]
    fn zero_remaining_is_within_limit() {
        assert_eq!(budget_with(dec!(0), dec!(100)).remark(), REMARK_WITHIN_LIMIT);
    }

    #[test]
    fn unspent_budget_is_intact() {
        assert_eq!(
            budget_with(dec!(100), dec!(100)).remark(),
            REMARK_BUDGET_INTACT
        );
    }

    #[test]
    fn zero_limit_zero_remaining_is_intact() {
        assert_eq!(budget_with(dec!(0), dec!(0)).remark(), REMARK_BUDGET_INTACT);
    }
}
