use api_types::{
    expense::{
        CategoriesResponse, Expense, ExpenseId, ExpenseNew, ExpenseUpdate, ExpensesResponse,
    },
    user::{Credentials, ForgotPassword, LoginResponse, ResetPassword, User, UserId},
};
use chrono::NaiveDate;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::{
    error::{ClientError, Result},
    session::{AuthToken, Persisted},
};

pub const DEFAULT_BASE_URL: &str = "https://budget-tracker-back-end.vercel.app";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One method per backend endpoint, each issuing exactly one request.
///
/// The stored token is read again before every request, so logging in or
/// out through the shared [`Persisted`] value takes effect immediately.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    http: reqwest::Client,
    token: Option<Persisted<AuthToken>>,
}

impl Client {
    pub fn new(base_url: &str, token: Option<Persisted<AuthToken>>) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|err| ClientError::InvalidUrl(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("budget-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url,
            http,
            token,
        })
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn register(&self, credentials: &Credentials) -> Result<serde_json::Value> {
        let url = self.endpoint(&["register"])?;
        self.send(self.request(Method::POST, url).json(credentials))
            .await
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        let url = self.endpoint(&["login"])?;
        self.send(self.request(Method::POST, url).json(credentials))
            .await
    }

    pub async fn logout(&self) -> Result<serde_json::Value> {
        let url = self.endpoint(&["logout"])?;
        self.send(self.request(Method::GET, url)).await
    }

    pub async fn current_user(&self) -> Result<User> {
        let url = self.endpoint(&["users", "current"])?;
        self.send(self.request(Method::GET, url)).await
    }

    pub async fn user(&self, user_id: &UserId) -> Result<User> {
        let user_id = user_id.to_string();
        let url = self.endpoint(&["users", &user_id])?;
        self.send(self.request(Method::GET, url)).await
    }

    /// Returns the reply body as sent.
    pub async fn add_expense(
        &self,
        user_id: &UserId,
        expense: &ExpenseNew,
    ) -> Result<serde_json::Value> {
        let user_id = user_id.to_string();
        let url = self.endpoint(&["users", &user_id, "expenses"])?;
        self.send(self.request(Method::POST, url).json(expense))
            .await
    }

    pub async fn expenses(&self, user_id: &UserId) -> Result<Vec<Expense>> {
        let user_id = user_id.to_string();
        let url = self.endpoint(&["users", &user_id, "expenses"])?;
        self.expense_list(url).await
    }

    pub async fn expenses_from(&self, user_id: &UserId, from: NaiveDate) -> Result<Vec<Expense>> {
        let user_id = user_id.to_string();
        let from = from.format(DATE_FORMAT).to_string();
        let url = self.endpoint(&["users", &user_id, "expenses", "from", &from])?;
        self.expense_list(url).await
    }

    pub async fn expenses_in_range(
        &self,
        user_id: &UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Expense>> {
        let user_id = user_id.to_string();
        let start = start.format(DATE_FORMAT).to_string();
        let end = end.format(DATE_FORMAT).to_string();
        let url = self.endpoint(&["users", &user_id, "expenses", "range", &start, &end])?;
        self.expense_list(url).await
    }

    pub async fn update_expense(
        &self,
        user_id: &UserId,
        expense_id: &ExpenseId,
        update: &ExpenseUpdate,
    ) -> Result<serde_json::Value> {
        let user_id = user_id.to_string();
        let expense_id = expense_id.to_string();
        let url = self.endpoint(&["users", &user_id, "expenses", &expense_id])?;
        self.send(self.request(Method::PUT, url).json(update)).await
    }

    pub async fn delete_expense(
        &self,
        user_id: &UserId,
        expense_id: &ExpenseId,
    ) -> Result<serde_json::Value> {
        let user_id = user_id.to_string();
        let expense_id = expense_id.to_string();
        let url = self.endpoint(&["users", &user_id, "expenses", &expense_id])?;
        self.send(self.request(Method::DELETE, url)).await
    }

    /// Aggregates computed by the backend, returned as sent.
    pub async fn statistics(&self, user_id: &UserId) -> Result<serde_json::Value> {
        let user_id = user_id.to_string();
        let url = self.endpoint(&["users", &user_id, "expenses", "stats"])?;
        self.send(self.request(Method::GET, url)).await
    }

    pub async fn categories(&self, user_id: &UserId) -> Result<Vec<String>> {
        let user_id = user_id.to_string();
        let url = self.endpoint(&["users", &user_id, "expenses", "categories"])?;
        let body: CategoriesResponse = self.send(self.request(Method::GET, url)).await?;
        body.categories.ok_or(ClientError::MissingField("categories"))
    }

    pub async fn forgot_password(&self, payload: &ForgotPassword) -> Result<serde_json::Value> {
        let url = self.endpoint(&["forgot-password"])?;
        self.send(self.request(Method::POST, url).json(payload))
            .await
    }

    pub async fn reset_password(&self, payload: &ResetPassword) -> Result<serde_json::Value> {
        let url = self.endpoint(&["reset-password"])?;
        self.send(self.request(Method::POST, url).json(payload))
            .await
    }

    async fn expense_list(&self, url: Url) -> Result<Vec<Expense>> {
        let body: ExpensesResponse = self.send(self.request(Method::GET, url)).await?;
        body.expenses.ok_or(ClientError::MissingField("expenses"))
    }

    /// Appends percent-encoded segments to the base URL path.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self.http.request(method, url);
        match self.token.as_ref().and_then(|token| token.get()) {
            Some(token) => req.bearer_auth(token.as_str()),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let req = req.build()?;
        let method = req.method().clone();
        let path = req.url().path().to_string();
        tracing::debug!(%method, path = %path, "sending request");

        let res = self.http.execute(req).await?;
        let status = res.status();
        tracing::debug!(%method, path = %path, %status, "response received");

        if !status.is_success() {
            let body = res.text().await?;
            return Err(ClientError::Status { status, body });
        }

        let bytes = res.bytes().await?;
        if bytes.is_empty() {
            return Ok(serde_json::from_value(serde_json::Value::Null)?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[derive(Default, Debug)]
pub struct ClientBuilder {
    base_url: Option<String>,
    token: Option<Persisted<AuthToken>>,
}

impl ClientBuilder {
    pub fn base_url(mut self, base_url: &str) -> ClientBuilder {
        self.base_url = Some(base_url.to_string());
        self
    }

    /// Source of the bearer credential attached to every request.
    pub fn token(mut self, token: Persisted<AuthToken>) -> ClientBuilder {
        self.token = Some(token);
        self
    }

    pub fn build(self) -> Result<Client> {
        let base_url = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Client::new(base_url, self.token)
    }
}
