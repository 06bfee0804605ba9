//! Request and response bodies exchanged with the budget tracker backend.
//!
//! The backend owns every record; these types only describe the wire shape.
//! Fields the backend sends that are not modelled here are kept in an
//! `extra` map so they survive a decode/encode pass untouched.

use serde::{Deserialize, Serialize};

pub type Extra = serde_json::Map<String, serde_json::Value>;

/// Declares an opaque identifier that the backend may send either as a
/// JSON number or as a JSON string.
macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(untagged)]
        pub enum $name {
            Int(i64),
            Text(String),
        }

        impl $name {
            /// Reads an id back from its textual form. Only text that an
            /// integer prints back to exactly becomes `Int`, so `"42"` is
            /// `Int(42)` while `"007"` stays `Text("007")`.
            pub fn parse(raw: &str) -> Self {
                match raw.parse::<i64>() {
                    Ok(value) if value.to_string() == raw => Self::Int(value),
                    _ => Self::Text(raw.to_string()),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    Self::Int(value) => write!(f, "{value}"),
                    Self::Text(value) => f.write_str(value),
                }
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self::Int(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::Text(value.to_string())
            }
        }
    };
}

pub mod user {
    use super::*;

    opaque_id!(
        /// Identifier of the backend's user record.
        UserId
    );

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct Credentials {
        pub username: String,
        pub password: String,
    }

    /// Body returned by `POST /login`.
    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    pub struct LoginResponse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub token: Option<String>,
        #[serde(default, alias = "userId", skip_serializing_if = "Option::is_none")]
        pub user_id: Option<UserId>,
        #[serde(flatten)]
        pub extra: Extra,
    }

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    pub struct User {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub id: Option<UserId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub username: Option<String>,
        #[serde(flatten)]
        pub extra: Extra,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ForgotPassword {
        pub email: String,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ResetPassword {
        /// Reset token delivered out of band (e-mail link).
        pub token: String,
        pub password: String,
    }
}

pub mod expense {
    use super::*;

    opaque_id!(
        /// Identifier of an expense record.
        ExpenseId
    );

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Expense {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub id: Option<ExpenseId>,
        /// Number or string, whichever the backend stores.
        #[serde(default)]
        pub amount: serde_json::Value,
        #[serde(default)]
        pub category: String,
        #[serde(default)]
        pub description: String,
        /// Passed through as sent by the backend.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub date: Option<String>,
        #[serde(flatten)]
        pub extra: Extra,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ExpenseNew {
        pub amount: f64,
        pub category: String,
        pub description: String,
        /// Optional: if absent, the backend picks the date.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub date: Option<String>,
    }

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    pub struct ExpenseUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub amount: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub category: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub date: Option<String>,
    }

    /// Envelope of every expense listing endpoint.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpensesResponse {
        pub expenses: Option<Vec<Expense>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoriesResponse {
        pub categories: Option<Vec<String>>,
    }
}
