// Integration tests for /auth/:provider and /auth/callback/:provider
// against mock provider endpoints

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use forum::api::{create_router, AppState};
use forum::auth::CredentialHasher;
use forum::config::{OAuth2ProviderConfig, TwitterConfig};
use forum::content::ContentStore;
use forum::oauth::{OAuth2Provider, ProviderRegistry, TwitterProvider};
use forum::users::{NewUser, Provider, SqliteUserStore, User, UserFilter, UserRepository};
use mockito::{Matcher, Server, ServerGuard};
use std::sync::Arc;
use tower::ServiceExt;

fn google_config(base: &str) -> OAuth2ProviderConfig {
    OAuth2ProviderConfig {
        client_id: "google-client".to_string(),
        client_secret: "google-secret".to_string(),
        redirect_url: "http://localhost:8080/auth/callback/google".to_string(),
        scopes: vec!["profile".to_string()],
        auth_url: format!("{}/auth", base),
        token_url: format!("{}/token", base),
        profile_url: format!("{}/userinfo", base),
    }
}

fn twitter_config(base: &str) -> TwitterConfig {
    TwitterConfig {
        consumer_key: "ck".to_string(),
        consumer_secret: "cs".to_string(),
        token_key: "tk".to_string(),
        token_secret: "ts".to_string(),
        redirect_url: "http://localhost:8080/auth/callback/twitter".to_string(),
        request_token_url: format!("{}/oauth/request_token", base),
        authorize_url: format!("{}/oauth/authenticate", base),
        access_token_url: format!("{}/oauth/access_token", base),
        verify_credentials_url: format!("{}/1.1/account/verify_credentials.json", base),
    }
}

struct TestApp {
    router: Router,
    users: Arc<SqliteUserStore>,
}

fn create_test_app(server: &ServerGuard) -> TestApp {
    let users = Arc::new(SqliteUserStore::new(":memory:").unwrap());
    let content = Arc::new(ContentStore::new(":memory:").unwrap());

    let mut providers = ProviderRegistry::new();
    providers.insert(Arc::new(OAuth2Provider::google(google_config(&server.url()))));
    providers.insert(Arc::new(TwitterProvider::new(twitter_config(&server.url()))));

    let state = AppState::new(
        users.clone(),
        content,
        CredentialHasher::new("oauth-test-key"),
        providers,
    );
    TestApp {
        router: create_router(state, "static"),
        users,
    }
}

impl TestApp {
    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    fn user_count(&self, login: &str, provider: Provider) -> usize {
        self.users
            .find(UserFilter::Login { login, provider })
            .unwrap()
            .into_iter()
            .count()
    }
}

/// Value of the cookie `name` set by the response, if any (removals excluded)
fn set_cookie_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v.to_string())
}

fn location(response: &Response) -> String {
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

/// First Google sign-in creates the user and sets a working session cookie.
#[tokio::test]
async fn test_google_sign_in() {
    let mut server = Server::new_async().await;
    let app = create_test_app(&server);

    let response = app.get("/auth/google", None).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let state = set_cookie_value(&response, "oauthstate").expect("state cookie");
    let target = location(&response);
    assert!(target.starts_with(&format!("{}/auth?client_id=google-client", server.url())));
    assert!(target.contains("response_type=code"));
    assert!(target.ends_with(&format!("state={}", state)));

    let token_mock = server
        .mock("POST", "/token")
        .match_body(Matcher::UrlEncoded("code".into(), "auth-code".into()))
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "google-token", "token_type": "Bearer"}"#)
        .create_async()
        .await;
    let profile_mock = server
        .mock("GET", "/userinfo")
        .match_query(Matcher::UrlEncoded("access_token".into(), "google-token".into()))
        .with_body(r#"{"id": "1001", "name": "Ada Lovelace"}"#)
        .create_async()
        .await;

    let response = app
        .get(
            &format!("/auth/callback/google?state={}&code=auth-code", state),
            Some(&format!("oauthstate={}", state)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    let session = set_cookie_value(&response, "UAAT").expect("session cookie");
    assert!(response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .any(|v| v.to_str().unwrap().starts_with("oauthstate=;")));

    token_mock.assert_async().await;
    profile_mock.assert_async().await;

    let user = app
        .users
        .find(UserFilter::Login {
            login: "1001",
            provider: Provider::Google,
        })
        .unwrap()
        .unwrap();
    assert_eq!(user.name, "Ada Lovelace");
    assert!(user.api_key_hash.is_some());

    let response = app.get("/", Some(&format!("UAAT={}", session))).await;
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let home: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(home["user"]["id"], user.id);
    assert_eq!(home["providers"], serde_json::json!(["google", "twitter"]));
}

/// A callback whose state does not match the cookie touches neither the
/// provider nor the user table.
#[tokio::test]
async fn test_state_mismatch_creates_no_user() {
    let mut server = Server::new_async().await;
    let app = create_test_app(&server);

    let token_mock = server
        .mock("POST", "/token")
        .expect(0)
        .create_async()
        .await;

    let response = app
        .get(
            "/auth/callback/google?state=attacker&code=auth-code",
            Some("oauthstate=victim"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert!(set_cookie_value(&response, "UAAT").is_none());

    let response = app
        .get("/auth/callback/google?state=victim&code=auth-code", None)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(set_cookie_value(&response, "UAAT").is_none());

    token_mock.assert_async().await;
}

/// A profile body carrying an error marker never creates a user.
#[tokio::test]
async fn test_profile_error_creates_no_user() {
    let mut server = Server::new_async().await;
    let app = create_test_app(&server);

    server
        .mock("POST", "/token")
        .with_body(r#"{"access_token": "google-token"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/userinfo")
        .match_query(Matcher::Any)
        .with_body(r#"{"id": "1001", "name": "Ada", "error": {"code": 401}}"#)
        .create_async()
        .await;

    let response = app
        .get(
            "/auth/callback/google?state=s&code=auth-code",
            Some("oauthstate=s"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert!(set_cookie_value(&response, "UAAT").is_none());
    assert_eq!(app.user_count("1001", Provider::Google), 0);
}

/// A failed token exchange aborts the same way.
#[tokio::test]
async fn test_token_exchange_failure_redirects_home() {
    let mut server = Server::new_async().await;
    let app = create_test_app(&server);

    server
        .mock("POST", "/token")
        .with_status(500)
        .create_async()
        .await;

    let response = app
        .get("/auth/callback/google?state=s&code=c", Some("oauthstate=s"))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(set_cookie_value(&response, "UAAT").is_none());
}

/// User table that can be read but rejects every write
struct ReadOnlyUsers(SqliteUserStore);

impl UserRepository for ReadOnlyUsers {
    fn find(&self, filter: UserFilter<'_>) -> anyhow::Result<Option<User>> {
        self.0.find(filter)
    }

    fn create(&self, _user: NewUser) -> anyhow::Result<User> {
        anyhow::bail!("database is read-only")
    }

    fn update_access_token_hash(&self, _user_id: i64, _hash: &str) -> anyhow::Result<()> {
        anyhow::bail!("database is read-only")
    }

    fn update_api_key_hash(&self, _user_id: i64, _hash: &str) -> anyhow::Result<()> {
        anyhow::bail!("database is read-only")
    }
}

/// A provider-confirmed identity that cannot be stored still ends at home,
/// with the state cookie cleared and no session cookie.
#[tokio::test]
async fn test_storage_failure_sets_no_session() {
    let mut server = Server::new_async().await;

    let mut providers = ProviderRegistry::new();
    providers.insert(Arc::new(OAuth2Provider::google(google_config(&server.url()))));
    let state = AppState::new(
        Arc::new(ReadOnlyUsers(SqliteUserStore::new(":memory:").unwrap())),
        Arc::new(ContentStore::new(":memory:").unwrap()),
        CredentialHasher::new("oauth-test-key"),
        providers,
    );
    let router = create_router(state, "static");

    let token_mock = server
        .mock("POST", "/token")
        .with_body(r#"{"access_token": "google-token"}"#)
        .create_async()
        .await;
    let profile_mock = server
        .mock("GET", "/userinfo")
        .match_query(Matcher::Any)
        .with_body(r#"{"id": "1001", "name": "Ada Lovelace"}"#)
        .create_async()
        .await;

    let request = Request::builder()
        .uri("/auth/callback/google?state=s&code=auth-code")
        .header(header::COOKIE, "oauthstate=s")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert!(set_cookie_value(&response, "UAAT").is_none());
    assert!(response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .any(|v| v.to_str().unwrap().starts_with("oauthstate=;")));

    token_mock.assert_async().await;
    profile_mock.assert_async().await;
}

/// Full Twitter three-legged flow.
#[tokio::test]
async fn test_twitter_sign_in() {
    let mut server = Server::new_async().await;
    let app = create_test_app(&server);

    let request_token = server
        .mock("POST", "/oauth/request_token")
        .match_header("authorization", Matcher::Regex("^OAuth ".into()))
        .with_body("oauth_token=req-token&oauth_token_secret=req-secret&oauth_callback_confirmed=true")
        .create_async()
        .await;

    let response = app.get("/auth/twitter", None).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        format!("{}/oauth/authenticate?oauth_token=req-token", server.url())
    );
    assert_eq!(
        set_cookie_value(&response, "oauthstate").as_deref(),
        Some("req-token")
    );
    request_token.assert_async().await;

    let access_token = server
        .mock("POST", "/oauth/access_token")
        .match_header("authorization", Matcher::Regex(r#"oauth_token="req-token""#.into()))
        .with_body("oauth_token=user-token&oauth_token_secret=user-secret&user_id=42")
        .create_async()
        .await;
    let verify = server
        .mock("GET", "/1.1/account/verify_credentials.json")
        .with_body(r#"{"id_str": "42", "name": "Ada"}"#)
        .create_async()
        .await;

    let response = app
        .get(
            "/auth/callback/twitter?oauth_token=req-token&oauth_verifier=v",
            Some("oauthstate=req-token"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(set_cookie_value(&response, "UAAT").is_some());
    access_token.assert_async().await;
    verify.assert_async().await;

    let user = app
        .users
        .find(UserFilter::Login {
            login: "42",
            provider: Provider::Twitter,
        })
        .unwrap()
        .unwrap();
    assert_eq!(user.api_key_hash, None);
}

/// Twitter callback with a token other than the stored one is rejected.
#[tokio::test]
async fn test_twitter_token_mismatch() {
    let mut server = Server::new_async().await;
    let app = create_test_app(&server);

    let access_token = server
        .mock("POST", "/oauth/access_token")
        .expect(0)
        .create_async()
        .await;

    let response = app
        .get(
            "/auth/callback/twitter?oauth_token=other&oauth_verifier=v",
            Some("oauthstate=req-token"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(set_cookie_value(&response, "UAAT").is_none());
    assert_eq!(app.user_count("42", Provider::Twitter), 0);
    access_token.assert_async().await;
}

/// Failing request-token call sends the browser home without a state cookie.
#[tokio::test]
async fn test_twitter_request_token_failure() {
    let mut server = Server::new_async().await;
    let app = create_test_app(&server);

    server
        .mock("POST", "/oauth/request_token")
        .with_status(403)
        .create_async()
        .await;

    let response = app.get("/auth/twitter", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert!(set_cookie_value(&response, "oauthstate").is_none());
}
