//! The closed set of transaction categories and their income/expense tagging.
//!
//! Every category maps to exactly one [TransactionType], so a transaction's
//! direction is always determined by its category.

use std::{fmt::Display, str::FromStr};

use axum::{Json, extract::Path, response::IntoResponse};
use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::Error;

/// The direction of a transaction: money coming in or going out.
///
/// Only expense transactions affect a budget's remaining amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money earned, e.g. a salary payment.
    Income,
    /// Money spent, e.g. groceries.
    Expense,
}

impl TransactionType {
    /// The canonical (uppercase) name of the transaction type.
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Income => "INCOME",
            TransactionType::Expense => "EXPENSE",
        }
    }

    /// Parse a transaction type from its name, ignoring case.
    ///
    /// Returns `None` for unrecognized names.
    pub fn from_name_ignore_case(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("income") {
            Some(TransactionType::Income)
        } else if name.eq_ignore_ascii_case("expense") {
            Some(TransactionType::Expense)
        } else {
            None
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef) -> FromSqlResult<Self> {
        let text = value.as_str()?;

        TransactionType::from_name_ignore_case(text).ok_or_else(|| {
            FromSqlError::Other(Box::new(Error::InvalidCategory(text.to_owned())))
        })
    }
}

/// A category for expenses and income.
///
/// The set is closed: categories cannot be created or deleted at runtime, and
/// each category's [TransactionType] is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryType {
    /// Regular wages.
    Salary,
    /// Interest earned on savings or investments.
    Interest,
    /// Rent collected from a property.
    Rent,
    /// Income from freelance or contract work.
    Freelancing,
    /// Groceries and eating out.
    Food,
    /// Movies, games, concerts and the like.
    Entertainment,
    /// Clothing and other retail spending.
    Shopping,
    /// Flights, accommodation and holidays.
    Travel,
    /// Tuition, courses and books.
    Education,
    /// Anything that does not fit the other expense categories.
    Others,
}

impl CategoryType {
    /// Every category, in declaration order.
    pub const ALL: [CategoryType; 10] = [
        CategoryType::Salary,
        CategoryType::Interest,
        CategoryType::Rent,
        CategoryType::Freelancing,
        CategoryType::Food,
        CategoryType::Entertainment,
        CategoryType::Shopping,
        CategoryType::Travel,
        CategoryType::Education,
        CategoryType::Others,
    ];

    /// The transaction type this category is permanently tagged with.
    pub fn transaction_type(self) -> TransactionType {
        match self {
            CategoryType::Salary
            | CategoryType::Interest
            | CategoryType::Rent
            | CategoryType::Freelancing => TransactionType::Income,
            CategoryType::Food
            | CategoryType::Entertainment
            | CategoryType::Shopping
            | CategoryType::Travel
            | CategoryType::Education
            | CategoryType::Others => TransactionType::Expense,
        }
    }

    /// The canonical (uppercase) name of the category.
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryType::Salary => "SALARY",
            CategoryType::Interest => "INTEREST",
            CategoryType::Rent => "RENT",
            CategoryType::Freelancing => "FREELANCING",
            CategoryType::Food => "FOOD",
            CategoryType::Entertainment => "ENTERTAINMENT",
            CategoryType::Shopping => "SHOPPING",
            CategoryType::Travel => "TRAVEL",
            CategoryType::Education => "EDUCATION",
            CategoryType::Others => "OTHERS",
        }
    }
}

impl Display for CategoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CategoryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryType::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidCategory(s.to_owned()))
    }
}

impl ToSql for CategoryType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for CategoryType {
    fn column_result(value: ValueRef) -> FromSqlResult<Self> {
        let text = value.as_str()?;

        text.parse()
            .map_err(|error: Error| FromSqlError::Other(Box::new(error)))
    }
}

/// List the names of all categories tagged with the named transaction type.
///
/// `type_name` is matched ignoring case; an unrecognized name yields an empty
/// list rather than an error.
pub fn category_names_for(type_name: &str) -> Vec<&'static str> {
    let Some(transaction_type) = TransactionType::from_name_ignore_case(type_name) else {
        return Vec::new();
    };

    CategoryType::ALL
        .into_iter()
        .filter(|category| category.transaction_type() == transaction_type)
        .map(CategoryType::as_str)
        .collect()
}

/// A route handler listing the category names for a transaction type.
///
/// Serves both `/transactions/categories/{type}` and
/// `/budgets/categories/{type}`.
pub async fn get_category_names_endpoint(Path(type_name): Path<String>) -> impl IntoResponse {
    Json(category_names_for(&type_name))
}

#[cfg(test)]
mod category_tests {
    use super::{CategoryType, TransactionType, category_names_for};

    #[test]
    fn categories_have_fixed_types() {
        assert_eq!(
            CategoryType::Salary.transaction_type(),
            TransactionType::Income
        );
        assert_eq!(
            CategoryType::Rent.transaction_type(),
            TransactionType::Income
        );
        assert_eq!(
            CategoryType::Food.transaction_type(),
            TransactionType::Expense
        );
        assert_eq!(
            CategoryType::Others.transaction_type(),
            TransactionType::Expense
        );
    }

    #[test]
    fn every_category_has_exactly_one_type() {
        for category in CategoryType::ALL {
            let listed_as_income =
                category_names_for("income").contains(&category.as_str());
            let listed_as_expense =
                category_names_for("expense").contains(&category.as_str());

            assert_ne!(
                listed_as_income, listed_as_expense,
                "{category} should appear in exactly one type listing"
            );
        }
    }

    #[test]
    fn names_are_matched_ignoring_case() {
        assert_eq!(category_names_for("Income"), category_names_for("INCOME"));
        assert_eq!(category_names_for("eXpEnSe"), category_names_for("expense"));
    }

    #[test]
    fn unknown_type_yields_empty_list() {
        assert!(category_names_for("savings").is_empty());
    }

    #[test]
    fn income_listing_contains_salary() {
        let names = category_names_for("income");

        assert_eq!(names, ["SALARY", "INTEREST", "RENT", "FREELANCING"]);
    }

    #[test]
    fn serializes_to_uppercase_names() {
        let json = serde_json::to_string(&CategoryType::Food).unwrap();

        assert_eq!(json, "\"FOOD\"");
    }

    #[test]
    fn parses_name_ignoring_case() {
        let category = "food".parse::<CategoryType>().unwrap();

        assert_eq!(category, CategoryType::Food);
    }
}
