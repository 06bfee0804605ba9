//! Client-side data access for the budget tracker backend.
//!
//! The crate is a thin layer: [`Client`] maps every call to one HTTP request,
//! [`Session`] keeps the logged-in user id and auth token mirrored to
//! storage, and [`RouteGuard`] turns away callers without a session.

pub mod client;
pub mod error;
pub mod guard;
pub mod session;
pub mod storage;

pub use client::{Client, ClientBuilder};
pub use error::{ClientError, StorageError};
pub use guard::{Navigation, RouteGuard};
pub use session::{AuthToken, Persisted, Session};
pub use storage::{FileStorage, MemoryStorage, Storage};

pub mod types {
    pub use api_types::{
        expense::{Expense, ExpenseId, ExpenseNew, ExpenseUpdate},
        user::{Credentials, ForgotPassword, LoginResponse, ResetPassword, User, UserId},
    };
}
