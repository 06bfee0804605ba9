use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use budget_client::{
    AuthToken, Client, ClientError, MemoryStorage, Session,
    types::{
        Credentials, ExpenseId, ExpenseNew, ExpenseUpdate, ForgotPassword, ResetPassword, UserId,
    },
};
use chrono::NaiveDate;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Clone, Debug)]
struct Recorded {
    method: Method,
    path: String,
    authorization: Option<String>,
    body: Option<Value>,
}

#[derive(Clone)]
struct Backend {
    status: StatusCode,
    reply: Option<Value>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl Backend {
    fn single(&self) -> Recorded {
        let requests = self.requests.lock().unwrap();
        assert_eq!(requests.len(), 1, "expected exactly one request");
        requests[0].clone()
    }
}

async fn record(
    State(backend): State<Backend>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = (!body.is_empty()).then(|| serde_json::from_slice(&body).unwrap());
    backend.requests.lock().unwrap().push(Recorded {
        method,
        path: uri.path().to_string(),
        authorization,
        body,
    });

    match backend.reply.clone() {
        Some(reply) => (backend.status, Json(reply)).into_response(),
        None => backend.status.into_response(),
    }
}

async fn spawn_backend(status: StatusCode, reply: Option<Value>) -> (String, Backend) {
    let backend = Backend {
        status,
        reply,
        requests: Arc::default(),
    };
    let app = Router::new().fallback(record).with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), backend)
}

async fn backend_ok(reply: Value) -> (String, Backend) {
    spawn_backend(StatusCode::OK, Some(reply)).await
}

fn memory_session() -> Session {
    Session::open(
        Arc::new(MemoryStorage::new()),
        Arc::new(MemoryStorage::new()),
    )
    .unwrap()
}

fn client_for(base_url: &str, session: &Session) -> Client {
    Client::builder()
        .base_url(base_url)
        .token(session.auth_token().clone())
        .build()
        .unwrap()
}

fn logged_in(base_url: &str) -> Client {
    let session = memory_session();
    session
        .establish(Some(UserId::Int(5)), Some(AuthToken::new("tok-5")))
        .unwrap();
    client_for(base_url, &session)
}

fn credentials() -> Credentials {
    Credentials {
        username: "alice".to_string(),
        password: "hunter2".to_string(),
    }
}

fn expense_json(id: i64) -> Value {
    json!({
        "id": id,
        "amount": 12.5,
        "category": "food",
        "description": "lunch",
        "date": "2024-03-01"
    })
}

#[tokio::test]
async fn register_posts_credentials_and_returns_body() {
    let (base, backend) = backend_ok(json!({ "message": "registered" })).await;
    let client = client_for(&base, &memory_session());

    let body = client.register(&credentials()).await.unwrap();

    assert_eq!(body, json!({ "message": "registered" }));
    let req = backend.single();
    assert_eq!(req.method, Method::POST);
    assert_eq!(req.path, "/register");
    assert_eq!(
        req.body,
        Some(json!({ "username": "alice", "password": "hunter2" }))
    );
    assert_eq!(req.authorization, None);
}

#[tokio::test]
async fn login_returns_token_and_user_id() {
    let (base, backend) = backend_ok(json!({ "token": "jwt", "userId": 9 })).await;
    let session = memory_session();
    let client = client_for(&base, &session);

    let res = client.login(&credentials()).await.unwrap();

    assert_eq!(res.token.as_deref(), Some("jwt"));
    assert_eq!(res.user_id, Some(UserId::Int(9)));
    let req = backend.single();
    assert_eq!(req.method, Method::POST);
    assert_eq!(req.path, "/login");
}

#[tokio::test]
async fn stored_token_is_read_on_every_request() {
    let (base, backend) = backend_ok(json!({ "id": 1, "username": "alice" })).await;
    let session = memory_session();
    let client = client_for(&base, &session);

    client.current_user().await.unwrap();
    session.auth_token().set(Some(AuthToken::new("late"))).unwrap();
    client.current_user().await.unwrap();
    session.end().unwrap();
    client.current_user().await.unwrap();

    let requests = backend.requests.lock().unwrap().clone();
    let headers: Vec<_> = requests.iter().map(|r| r.authorization.clone()).collect();
    assert_eq!(
        headers,
        vec![None, Some("Bearer late".to_string()), None]
    );
}

#[tokio::test]
async fn logout_is_a_get() {
    let (base, backend) = backend_ok(json!({ "message": "bye" })).await;
    let client = logged_in(&base);

    assert_eq!(client.logout().await.unwrap()["message"], "bye");
    let req = backend.single();
    assert_eq!(req.method, Method::GET);
    assert_eq!(req.path, "/logout");
    assert_eq!(req.authorization.as_deref(), Some("Bearer tok-5"));
}

#[tokio::test]
async fn current_user_and_user_by_id() {
    let (base, backend) = backend_ok(json!({ "id": 5, "username": "alice" })).await;
    let client = logged_in(&base);

    let me = client.current_user().await.unwrap();
    assert_eq!(me.username.as_deref(), Some("alice"));
    assert_eq!(backend.single().path, "/users/current");

    let (base, backend) = backend_ok(json!({ "id": "abc", "username": "bob" })).await;
    let client = logged_in(&base);
    let user = client.user(&UserId::from("abc")).await.unwrap();
    assert_eq!(user.id, Some(UserId::from("abc")));
    let req = backend.single();
    assert_eq!(req.method, Method::GET);
    assert_eq!(req.path, "/users/abc");
}

#[tokio::test]
async fn add_expense_posts_to_user_collection() {
    let (base, backend) = backend_ok(expense_json(3)).await;
    let client = logged_in(&base);

    let expense = client
        .add_expense(
            &UserId::Int(5),
            &ExpenseNew {
                amount: 12.5,
                category: "food".to_string(),
                description: "lunch".to_string(),
                date: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(expense, expense_json(3));
    let req = backend.single();
    assert_eq!(req.method, Method::POST);
    assert_eq!(req.path, "/users/5/expenses");
    assert_eq!(
        req.body,
        Some(json!({ "amount": 12.5, "category": "food", "description": "lunch" }))
    );
}

#[tokio::test]
async fn expenses_returns_the_expenses_field() {
    let (base, backend) =
        backend_ok(json!({ "expenses": [expense_json(1), expense_json(2)], "total": 25 })).await;
    let client = logged_in(&base);

    let expenses = client.expenses(&UserId::Int(5)).await.unwrap();

    assert_eq!(expenses.len(), 2);
    assert_eq!(expenses[1].id, Some(ExpenseId::Int(2)));
    let req = backend.single();
    assert_eq!(req.method, Method::GET);
    assert_eq!(req.path, "/users/5/expenses");
}

#[tokio::test]
async fn expenses_pass_string_amounts_through() {
    let mut row = expense_json(1);
    row["amount"] = json!("12.50");
    let (base, _backend) = backend_ok(json!({ "expenses": [row] })).await;
    let client = logged_in(&base);

    let expenses = client.expenses(&UserId::Int(5)).await.unwrap();
    assert_eq!(expenses[0].amount, json!("12.50"));
}

#[tokio::test]
async fn add_expense_returns_wrapped_reply_as_sent() {
    let reply = json!({ "message": "created", "expense": expense_json(7) });
    let (base, _backend) = backend_ok(reply.clone()).await;
    let client = logged_in(&base);

    let body = client
        .add_expense(
            &UserId::Int(5),
            &ExpenseNew {
                amount: 1.0,
                category: "misc".to_string(),
                description: "pen".to_string(),
                date: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(body, reply);
}

#[tokio::test]
async fn expenses_without_field_is_an_error() {
    let (base, _backend) = backend_ok(json!({ "items": [] })).await;
    let client = logged_in(&base);

    let err = client.expenses(&UserId::Int(5)).await.unwrap_err();
    assert!(matches!(err, ClientError::MissingField("expenses")));
}

#[tokio::test]
async fn expenses_from_date_formats_the_path() {
    let (base, backend) = backend_ok(json!({ "expenses": [] })).await;
    let client = logged_in(&base);
    let from = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

    let expenses = client.expenses_from(&UserId::Int(5), from).await.unwrap();

    assert!(expenses.is_empty());
    assert_eq!(backend.single().path, "/users/5/expenses/from/2024-03-01");
}

#[tokio::test]
async fn expenses_in_range_formats_both_dates() {
    let (base, backend) = backend_ok(json!({ "expenses": [expense_json(4)] })).await;
    let client = logged_in(&base);
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

    let expenses = client
        .expenses_in_range(&UserId::Int(5), start, end)
        .await
        .unwrap();

    assert_eq!(expenses.len(), 1);
    assert_eq!(
        backend.single().path,
        "/users/5/expenses/range/2024-01-01/2024-01-31"
    );
}

#[tokio::test]
async fn update_expense_puts_only_changed_fields() {
    let (base, backend) = backend_ok(expense_json(9)).await;
    let client = logged_in(&base);

    client
        .update_expense(
            &UserId::Int(5),
            &ExpenseId::Int(9),
            &ExpenseUpdate {
                description: Some("dinner".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let req = backend.single();
    assert_eq!(req.method, Method::PUT);
    assert_eq!(req.path, "/users/5/expenses/9");
    assert_eq!(req.body, Some(json!({ "description": "dinner" })));
}

#[tokio::test]
async fn delete_expense_accepts_empty_reply() {
    let (base, backend) = spawn_backend(StatusCode::NO_CONTENT, None).await;
    let client = logged_in(&base);

    let body = client
        .delete_expense(&UserId::Int(5), &ExpenseId::from("e-1"))
        .await
        .unwrap();

    assert_eq!(body, Value::Null);
    let req = backend.single();
    assert_eq!(req.method, Method::DELETE);
    assert_eq!(req.path, "/users/5/expenses/e-1");
}

#[tokio::test]
async fn statistics_are_passed_through() {
    let stats = json!({ "total": 120.0, "byCategory": { "food": 80.0, "rent": 40.0 } });
    let (base, backend) = backend_ok(stats.clone()).await;
    let client = logged_in(&base);

    assert_eq!(client.statistics(&UserId::Int(5)).await.unwrap(), stats);
    assert_eq!(backend.single().path, "/users/5/expenses/stats");
}

#[tokio::test]
async fn categories_returns_the_categories_field() {
    let (base, backend) = backend_ok(json!({ "categories": ["food", "rent"] })).await;
    let client = logged_in(&base);

    let categories = client.categories(&UserId::Int(5)).await.unwrap();

    assert_eq!(categories, vec!["food".to_string(), "rent".to_string()]);
    assert_eq!(backend.single().path, "/users/5/expenses/categories");
}

#[tokio::test]
async fn password_reset_flow() {
    let (base, backend) = backend_ok(json!({ "message": "sent" })).await;
    let client = client_for(&base, &memory_session());
    client
        .forgot_password(&ForgotPassword {
            email: "alice@example.com".to_string(),
        })
        .await
        .unwrap();
    let req = backend.single();
    assert_eq!(req.method, Method::POST);
    assert_eq!(req.path, "/forgot-password");
    assert_eq!(req.body, Some(json!({ "email": "alice@example.com" })));

    let (base, backend) = backend_ok(json!({ "message": "reset" })).await;
    let client = client_for(&base, &memory_session());
    client
        .reset_password(&ResetPassword {
            token: "reset-token".to_string(),
            password: "new-pass".to_string(),
        })
        .await
        .unwrap();
    let req = backend.single();
    assert_eq!(req.path, "/reset-password");
    assert_eq!(
        req.body,
        Some(json!({ "token": "reset-token", "password": "new-pass" }))
    );
}

#[tokio::test]
async fn error_status_is_returned_unmodified() {
    let (base, backend) =
        spawn_backend(StatusCode::UNAUTHORIZED, Some(json!({ "error": "bad token" }))).await;
    let client = logged_in(&base);

    let err = client.expenses(&UserId::Int(5)).await.unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    match err {
        ClientError::Status { body, .. } => assert_eq!(body, r#"{"error":"bad token"}"#),
        other => panic!("unexpected error: {other:?}"),
    }
    backend.single();
}

#[tokio::test]
async fn truncated_error_body_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        socket
            .write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 100\r\n\r\nshort")
            .await
            .unwrap();
        socket.shutdown().await.unwrap();
    });

    let client = client_for(&format!("http://{addr}"), &memory_session());
    let err = client.logout().await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{addr}"), &memory_session());
    let err = client.logout().await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));
}

#[tokio::test]
async fn base_url_path_prefix_is_kept() {
    let (base, backend) = backend_ok(json!({ "message": "ok" })).await;
    let client = client_for(&format!("{base}/api/"), &memory_session());

    client.logout().await.unwrap();
    assert_eq!(backend.single().path, "/api/logout");
}
