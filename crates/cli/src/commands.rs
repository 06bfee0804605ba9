use std::{
    io::{self, BufRead, Write},
    sync::Arc,
};

use budget_client::{
    AuthToken, Client, FileStorage, Navigation, RouteGuard, Session, Storage,
    types::{
        Credentials, ExpenseId, ExpenseNew, ExpenseUpdate, ForgotPassword, ResetPassword, UserId,
    },
};
use chrono::NaiveDate;
use clap::Subcommand;
use serde::Serialize;

use crate::{
    config::AppConfig,
    error::{AppError, Result},
};

const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account (password is read from stdin).
    Register { username: String },
    /// Log in and remember the user id and token (password is read from stdin).
    Login { username: String },
    /// Log out and forget the stored session.
    Logout,
    /// Show the logged-in user as seen by the backend.
    Whoami,
    /// Show a user record.
    User { id: String },
    /// Add an expense.
    Add {
        amount: f64,
        category: String,
        description: String,
        /// Expense date, passed to the backend as given.
        #[arg(long)]
        date: Option<String>,
    },
    /// List expenses, optionally from a date or within a date range.
    List {
        #[arg(long, conflicts_with = "range")]
        from: Option<NaiveDate>,
        #[arg(long, num_args = 2, value_names = ["START", "END"])]
        range: Option<Vec<NaiveDate>>,
    },
    /// Change fields of an expense.
    Update {
        id: String,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        date: Option<String>,
    },
    /// Delete an expense.
    Delete { id: String },
    /// Show expense statistics.
    Stats,
    /// List expense categories.
    Categories,
    /// Ask for a password reset e-mail.
    ForgotPassword { email: String },
    /// Set a new password with a reset token (password is read from stdin).
    ResetPassword { token: String },
}

pub struct Context {
    client: Client,
    session: Session,
    session_storage: FileStorage,
    guard: RouteGuard,
}

impl Context {
    pub fn open(config: &AppConfig) -> Result<Self> {
        let session_storage = FileStorage::new(&config.session_path);
        let durable = FileStorage::new(&config.state_path);
        let session = Session::open(Arc::new(session_storage.clone()), Arc::new(durable))?;

        let client = Client::builder()
            .base_url(&config.base_url)
            .token(session.auth_token().clone())
            .build()?;

        Ok(Self {
            client,
            session,
            session_storage,
            guard: RouteGuard::new(DASHBOARD_PATH),
        })
    }

    /// Runs the route guard for a dashboard page and yields the stored user.
    fn require_user(&self, page: &str) -> Result<UserId> {
        let path = format!("{DASHBOARD_PATH}/{page}");
        let storage: &dyn Storage = &self.session_storage;
        if let Navigation::Redirect { location, .. } = self.guard.check(&path, storage) {
            tracing::debug!(path = %path, location, "guard redirected");
            return Err(AppError::NotLoggedIn);
        }
        self.session.user_id().get().ok_or(AppError::NotLoggedIn)
    }
}

pub async fn run(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Register { username } => {
            let password = read_secret("password")?;
            let body = ctx
                .client
                .register(&Credentials { username, password })
                .await?;
            print_json(&body)
        }
        Command::Login { username } => {
            let password = read_secret("password")?;
            let res = ctx
                .client
                .login(&Credentials {
                    username: username.clone(),
                    password,
                })
                .await?;
            ctx.session
                .establish(res.user_id.clone(), res.token.clone().map(AuthToken::new))?;
            tracing::info!("logged in as {username}");
            print_json(&res)
        }
        Command::Logout => {
            let res = ctx.client.logout().await;
            ctx.session.end()?;
            print_json(&res?)
        }
        Command::Whoami => print_json(&ctx.client.current_user().await?),
        Command::User { id } => print_json(&ctx.client.user(&UserId::parse(&id)).await?),
        Command::Add {
            amount,
            category,
            description,
            date,
        } => {
            let user_id = ctx.require_user("expenses")?;
            let expense = ExpenseNew {
                amount,
                category,
                description,
                date,
            };
            print_json(&ctx.client.add_expense(&user_id, &expense).await?)
        }
        Command::List { from, range } => {
            let user_id = ctx.require_user("expenses")?;
            let expenses = match (from, range.as_deref()) {
                (_, Some(&[start, end])) => {
                    ctx.client.expenses_in_range(&user_id, start, end).await?
                }
                (_, Some(other)) => {
                    return Err(AppError::Input(format!(
                        "--range takes two dates, got {}",
                        other.len()
                    )));
                }
                (Some(from), None) => ctx.client.expenses_from(&user_id, from).await?,
                (None, None) => ctx.client.expenses(&user_id).await?,
            };
            print_json(&expenses)
        }
        Command::Update {
            id,
            amount,
            category,
            description,
            date,
        } => {
            let user_id = ctx.require_user("expenses")?;
            let update = ExpenseUpdate {
                amount,
                category,
                description,
                date,
            };
            let expense = ctx
                .client
                .update_expense(&user_id, &ExpenseId::parse(&id), &update)
                .await?;
            print_json(&expense)
        }
        Command::Delete { id } => {
            let user_id = ctx.require_user("expenses")?;
            let body = ctx
                .client
                .delete_expense(&user_id, &ExpenseId::parse(&id))
                .await?;
            print_json(&body)
        }
        Command::Stats => {
            let user_id = ctx.require_user("stats")?;
            print_json(&ctx.client.statistics(&user_id).await?)
        }
        Command::Categories => {
            let user_id = ctx.require_user("categories")?;
            print_json(&ctx.client.categories(&user_id).await?)
        }
        Command::ForgotPassword { email } => {
            print_json(&ctx.client.forgot_password(&ForgotPassword { email }).await?)
        }
        Command::ResetPassword { token } => {
            let password = read_secret("new password")?;
            let body = ctx
                .client
                .reset_password(&ResetPassword { token, password })
                .await?;
            print_json(&body)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_secret(label: &str) -> Result<String> {
    eprint!("{label}: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let secret = line.trim_end_matches(['\r', '\n']).to_string();
    if secret.is_empty() {
        return Err(AppError::Input(format!("{label} must not be empty")));
    }
    Ok(secret)
}
