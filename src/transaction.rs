//! Income and expense transactions.
//!
//! This module contains the `Transaction` model, the database functions for
//! storing and querying transactions, and the route handlers for the
//! transaction endpoints.
//!
//! Every mutation of an expense transaction notifies the budget ledger so
//! that the affected category's remaining amount stays consistent: creating
//! an expense applies it, deleting one reverses it, and updating one reverses
//! the old figures before applying the new.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use rusqlite::{Connection, params_from_iter, types::Value};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    app_state::TransactionState,
    budget,
    category::{CategoryType, TransactionType},
    database_id::DatabaseID,
    db::decimal_from_column,
    pagination::{Page, default_page_size, default_sort_by},
};

// ============================================================================
// MODELS
// ============================================================================

/// A single income or expense entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: DatabaseID,
    /// The amount of money involved. Always non-negative: direction comes
    /// from the transaction type.
    pub amount: Decimal,
    /// Whether the transaction is income or an expense.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// The category the transaction belongs to.
    pub category: CategoryType,
    /// A free-form description.
    pub description: String,
}

/// The data for creating or updating a transaction.
///
/// The transaction type is not part of the payload: it is derived from the
/// category on the server so the two can never disagree.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionData {
    /// The amount of money involved.
    pub amount: Decimal,
    /// The category the transaction belongs to.
    pub category: CategoryType,
    /// A free-form description.
    pub description: String,
}

/// The query parameters accepted by the transaction list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionListParams {
    /// The zero-based page number to fetch.
    #[serde(default)]
    pub page: u64,
    /// The number of items per page.
    #[serde(default = "default_page_size")]
    pub size: u64,
    /// The field to sort by. Unknown fields fall back to sorting by id.
    #[serde(default = "default_sort_by", rename = "sortBy")]
    pub sort_by: String,
    /// When set, return only the transaction with this ID and ignore the
    /// other filters.
    #[serde(default)]
    pub id: Option<DatabaseID>,
    /// When set, return only transactions whose description matches according
    /// to `filter_type`.
    #[serde(default)]
    pub description: Option<String>,
    /// How to match `description`: contains, startsWith, endsWith, equals,
    /// notEquals or notContains (case-insensitive). Unknown values disable
    /// the filter.
    #[serde(default = "default_filter_type", rename = "filterType")]
    pub filter_type: String,
}

fn default_filter_type() -> String {
    "contains".to_owned()
}

/// How a description filter compares against the stored descriptions.
///
/// All modes compare case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchMode {
    Contains,
    StartsWith,
    EndsWith,
    Equals,
    NotEquals,
    NotContains,
}

impl MatchMode {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "contains" => Some(Self::Contains),
            "startswith" => Some(Self::StartsWith),
            "endswith" => Some(Self::EndsWith),
            "equals" => Some(Self::Equals),
            "notequals" => Some(Self::NotEquals),
            "notcontains" => Some(Self::NotContains),
            _ => None,
        }
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

pub(crate) fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY,
            amount TEXT NOT NULL,
            type TEXT NOT NULL,
            category TEXT NOT NULL,
            description TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

fn map_transaction_row(row: &rusqlite::Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        amount: decimal_from_column(row, 1)?,
        transaction_type: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
    })
}

const TRANSACTION_COLUMNS: &str = "id, amount, type, category, description";

fn validate_amount(amount: Decimal) -> Result<(), Error> {
    if amount < Decimal::ZERO {
        return Err(Error::NegativeAmount);
    }

    Ok(())
}

/// Create a new transaction in the database.
///
/// If the transaction is an expense, the budget for its category (when one
/// exists) has its remaining amount decremented by the transaction amount.
///
/// # Errors
/// This function will return a:
/// - [Error::NegativeAmount] if `data.amount` is negative,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    data: TransactionData,
    connection: &Connection,
) -> Result<Transaction, Error> {
    validate_amount(data.amount)?;

    let transaction_type = data.category.transaction_type();

    let transaction = connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" (amount, type, category, description)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                data.amount.to_string(),
                transaction_type,
                data.category,
                &data.description,
            ),
            map_transaction_row,
        )?;

    if transaction.transaction_type == TransactionType::Expense {
        budget::apply_expense(transaction.category, transaction.amount, connection)?;
    }

    Ok(transaction)
}

/// Retrieve a transaction in the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_transaction(id: DatabaseID, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// Update a transaction's amount, category and description.
///
/// The budget ledger sees the change as a reversal of the old figures
/// followed by an application of the new ones, so moving a transaction
/// between categories moves its effect between the two budgets.
///
/// # Errors
/// This function will return a:
/// - [Error::NegativeAmount] if `data.amount` is negative,
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_transaction(
    id: DatabaseID,
    data: TransactionData,
    connection: &Connection,
) -> Result<Transaction, Error> {
    validate_amount(data.amount)?;

    let existing = get_transaction(id, connection)?;

    if existing.transaction_type == TransactionType::Expense {
        budget::reverse_expense(existing.category, existing.amount, connection)?;
    }

    let transaction_type = data.category.transaction_type();
    connection.execute(
        "UPDATE \"transaction\" SET amount = ?1, type = ?2, category = ?3, description = ?4
         WHERE id = ?5",
        (
            data.amount.to_string(),
            transaction_type,
            data.category,
            &data.description,
            id,
        ),
    )?;

    if transaction_type == TransactionType::Expense {
        budget::apply_expense(data.category, data.amount, connection)?;
    }

    Ok(Transaction {
        id,
        amount: data.amount,
        transaction_type,
        category: data.category,
        description: data.description,
    })
}

/// Delete a transaction from the database.
///
/// If the transaction was an expense, its amount is restored to the budget
/// for its category (when one exists).
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_transaction(id: DatabaseID, connection: &Connection) -> Result<(), Error> {
    let existing = get_transaction(id, connection)?;

    if existing.transaction_type == TransactionType::Expense {
        budget::reverse_expense(existing.category, existing.amount, connection)?;
    }

    connection.execute("DELETE FROM \"transaction\" WHERE id = ?1", (id,))?;

    Ok(())
}

/// Sum the amounts of all expense transactions in `category`.
///
/// The amounts are summed in decimal arithmetic rather than by SQLite so no
/// precision is lost.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is a SQL error.
pub(crate) fn sum_expenses_by_category(
    category: CategoryType,
    connection: &Connection,
) -> Result<Decimal, Error> {
    let amounts = connection
        .prepare("SELECT amount FROM \"transaction\" WHERE category = ?1 AND type = ?2")?
        .query_map((category, TransactionType::Expense), |row| {
            decimal_from_column(row, 0)
        })?
        .collect::<Result<Vec<Decimal>, _>>()?;

    Ok(amounts.into_iter().sum())
}

fn transaction_sort_column(sort_by: &str) -> &'static str {
    match sort_by {
        // Amounts are stored as TEXT, cast so they sort numerically.
        "amount" => "CAST(amount AS REAL)",
        "type" => "type",
        "category" => "category",
        "description" => "description",
        // Unknown sort fields fall back to the default rather than erroring.
        _ => "id",
    }
}

// LIKE treats %, _ and the escape character specially, escape them so filter
// text is always matched literally.
fn escape_like_pattern(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn description_filter(mode: MatchMode, description: &str) -> (&'static str, Value) {
    match mode {
        MatchMode::Contains => (
            "WHERE LOWER(description) LIKE LOWER(?1) ESCAPE '\\'",
            Value::Text(format!("%{}%", escape_like_pattern(description))),
        ),
        MatchMode::StartsWith => (
            "WHERE LOWER(description) LIKE LOWER(?1) ESCAPE '\\'",
            Value::Text(format!("{}%", escape_like_pattern(description))),
        ),
        MatchMode::EndsWith => (
            "WHERE LOWER(description) LIKE LOWER(?1) ESCAPE '\\'",
            Value::Text(format!("%{}", escape_like_pattern(description))),
        ),
        MatchMode::Equals => (
            "WHERE LOWER(description) = LOWER(?1)",
            Value::Text(description.to_owned()),
        ),
        MatchMode::NotEquals => (
            "WHERE LOWER(description) <> LOWER(?1)",
            Value::Text(description.to_owned()),
        ),
        MatchMode::NotContains => (
            "WHERE LOWER(description) NOT LIKE LOWER(?1) ESCAPE '\\'",
            Value::Text(format!("%{}%", escape_like_pattern(description))),
        ),
    }
}

/// Retrieve one page of transactions, optionally filtered.
///
/// The ID filter takes precedence over everything else: when `params.id` is
/// set, the page holds at most that one transaction. Otherwise the optional
/// description filter applies. An unrecognized filter type disables the
/// filter rather than erroring.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is a SQL error.
pub fn get_transaction_page(
    params: &TransactionListParams,
    connection: &Connection,
) -> Result<Page<Transaction>, Error> {
    if let Some(id) = params.id {
        let items = match get_transaction(id, connection) {
            Ok(transaction) => vec![transaction],
            Err(Error::NotFound) => vec![],
            Err(error) => return Err(error),
        };
        let total_elements = items.len() as u64;

        return Ok(Page::new(
            items,
            params.page,
            params.size,
            total_elements,
            params.sort_by.clone(),
        ));
    }

    let filter = params
        .description
        .as_deref()
        .and_then(|description| {
            MatchMode::parse(&params.filter_type).map(|mode| description_filter(mode, description))
        });
    let (where_clause, query_params) = match filter {
        Some((clause, param)) => (clause, vec![param]),
        None => ("", vec![]),
    };

    // SQLite integers are i64, convert to the envelope's u64 after reading.
    let total_elements: i64 = connection.query_row(
        &format!("SELECT COUNT(id) FROM \"transaction\" {where_clause}"),
        params_from_iter(query_params.clone()),
        |row| row.get(0),
    )?;

    let limit = i64::try_from(params.size).unwrap_or(i64::MAX);
    let offset = i64::try_from(params.page.saturating_mul(params.size)).unwrap_or(i64::MAX);

    let items = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" {where_clause} ORDER BY {} LIMIT {limit} OFFSET {offset}",
            transaction_sort_column(&params.sort_by),
        ))?
        .query_map(params_from_iter(query_params), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
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
// ROUTE HANDLERS
// ============================================================================

/// A route handler for listing transactions one page at a time.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn get_transactions_endpoint(
    State(state): State<TransactionState>,
    Query(params): Query<TransactionListParams>,
) -> impl IntoResponse {
    let connection = state.db_connection.lock().unwrap();

    get_transaction_page(&params, &connection).map(Json)
}

/// A route handler for getting a transaction by its database ID.
///
/// Returns the status code 404 if the requested transaction does not exist.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    Path(transaction_id): Path<DatabaseID>,
) -> impl IntoResponse {
    let connection = state.db_connection.lock().unwrap();

    get_transaction(transaction_id, &connection).map(Json)
}

/// A route handler for creating a new transaction.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Json(data): Json<TransactionData>,
) -> impl IntoResponse {
    let connection = state.db_connection.lock().unwrap();

    create_transaction(data, &connection)
        .map(|transaction| (StatusCode::CREATED, Json(transaction)))
}

/// A route handler for editing a transaction.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    Path(transaction_id): Path<DatabaseID>,
    Json(data): Json<TransactionData>,
) -> impl IntoResponse {
    let connection = state.db_connection.lock().unwrap();

    update_transaction(transaction_id, data, &connection).map(Json)
}

/// A route handler for deleting a transaction.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Path(transaction_id): Path<DatabaseID>,
) -> impl IntoResponse {
    let connection = state.db_connection.lock().unwrap();

    delete_transaction(transaction_id, &connection).map(|()| StatusCode::NO_CONTENT)
}

// ============================================================================
// TESTS
// ============================================================================



#[cfg(test)]
mod transaction_endpoint_tests {
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};

    use crate::{AppState, build_router, endpoints, endpoints::format_endpoint};

    fn new_test_server() -> TestServer {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        let state = AppState::new(connection, "http://localhost:4000")
            .expect("Could not create app state");

        TestServer::new(build_router(state))
    }

    #[tokio::test]
    async fn create_transaction_returns_created_with_derived_type() {
        let server = new_test_server();

        let response = server
            .post(endpoints::TRANSACTIONS)
            .json(&json!({"amount": 25.5, "category": "FOOD", "description": "lunch"}))
            .await;

        response.assert_status(axum::http::StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["type"], "EXPENSE");
        assert_eq!(body["category"], "FOOD");
        assert_eq!(body["amount"], json!(25.5));
    }

    #[tokio::test]
    async fn create_transaction_rejects_unknown_category() {
        let server = new_test_server();

        let response = server
            .post(endpoints::TRANSACTIONS)
            .json(&json!({"amount": 10, "category": "YACHTS", "description": "mooring"}))
            .await;

        response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn create_transaction_rejects_negative_amount() {
        let server = new_test_server();

        let response = server
            .post(endpoints::TRANSACTIONS)
            .json(&json!({"amount": -10, "category": "FOOD", "description": "oops"}))
            .await;

        response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn get_transaction_returns_404_as_json() {
        let server = new_test_server();

        let response = server
            .get(&format_endpoint(endpoints::TRANSACTION, 404))
            .await;

        response.assert_status_not_found();
        let body: Value = response.json();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn list_filters_by_description() {
        let server = new_test_server();
        for description in ["rent", "rental car", "petrol"] {
            server
                .post(endpoints::TRANSACTIONS)
                .json(&json!({"amount": 10, "category": "FOOD", "description": description}))
                .await
                .assert_status(axum::http::StatusCode::CREATED);
        }

        let response = server
            .get(endpoints::TRANSACTIONS)
            .add_query_param("description", "rent")
            .add_query_param("filterType", "startsWith")
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["totalElements"], 2);
        assert_eq!(body["items"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn deleting_an_expense_restores_its_budget() {
        let server = new_test_server();
        server
            .post(endpoints::BUDGETS)
            .json(&json!({"category": "FOOD", "budgetLimit": 1000}))
            .await
            .assert_status(axum::http::StatusCode::CREATED);
        let transaction: Value = server
            .post(endpoints::TRANSACTIONS)
            .json(&json!({"amount": 900, "category": "FOOD", "description": "splurge"}))
            .await
            .json();

        server
            .delete(&format_endpoint(
                endpoints::TRANSACTION,
                transaction["id"].as_i64().unwrap(),
            ))
            .await
            .assert_status(axum::http::StatusCode::NO_CONTENT);

        let budgets: Value = server.get(endpoints::BUDGETS).await.json();
        assert_eq!(budgets["items"][0]["remainingAmount"], json!(1000.0));
        assert_eq!(budgets["items"][0]["remark"], "Budget Intact");
    }

    #[tokio::test]
    async fn lists_income_category_names() {
        let server = new_test_server();

        let response = server
            .get(&endpoints::TRANSACTION_CATEGORIES.replace("{type}", "INCOME"))
            .await;

        response.assert_status_ok();
        let body: Vec<String> = response.json();
        assert!(body.contains(&"SALARY".to_owned()));
        assert!(!body.contains(&"FOOD".to_owned()));
    }

    #[tokio::test]
    async fn unknown_category_type_yields_empty_list() {
        let server = new_test_server();

        let response = server
            .get(&endpoints::TRANSACTION_CATEGORIES.replace("{type}", "windfall"))
            .await;

        response.assert_status_ok();
        let body: Vec<String> = response.json();
        assert!(body.is_empty());
    }
}
