//! Database initialization and shared row-mapping helpers.

use rusqlite::{Connection, Row, Transaction as SqlTransaction, types::Type};
use rust_decimal::Decimal;

use crate::{Error, budget::create_budget_table, transaction::create_transaction_table};

/// Create the tables for the domain models.
///
/// Safe to call on a database that already has the tables.
///
/// # Errors
/// Returns an [Error::SqlError] if a table could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_transaction_table(&transaction)?;
    create_budget_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Read a monetary amount from a TEXT column.
///
/// Amounts are stored as decimal strings so that no precision is lost going
/// through SQLite, which would otherwise coerce them to binary floats.
pub(crate) fn decimal_from_column(row: &Row, index: usize) -> Result<Decimal, rusqlite::Error> {
    let text: String = row.get(index)?;

    text.parse::<Decimal>().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
    })
}

#[cfg(test)]
mod initialize_tests {
    use rusqlite::Connection;

    use super::initialize;

    #[test]
    fn creates_tables() {
        let conn =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");

        initialize(&conn).expect("Could not initialize database");

        let table_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('transaction', 'budget')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(table_count, 2);
    }

    #[test]
    fn is_idempotent() {
        let conn =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");

        initialize(&conn).expect("Could not initialize database");

        assert_eq!(initialize(&conn), Ok(()));
    }
}

#[cfg(test)]
mod decimal_from_column_tests {
    use rusqlite::Connection;
    use rust_decimal_macros::dec;

    use super::decimal_from_column;

    #[test]
    fn parses_decimal_text_exactly() {
        let conn = Connection::open_in_memory().unwrap();

        let amount = conn
            .query_row("SELECT '123.45'", [], |row| decimal_from_column(row, 0))
            .unwrap();

        assert_eq!(amount, dec!(123.45));
    }

    #[test]
    fn rejects_non_numeric_text() {
        let conn = Connection::open_in_memory().unwrap();

        let result = conn.query_row("SELECT 'not a number'", [], |row| decimal_from_column(row, 0));

        assert!(result.is_err());
    }
}
