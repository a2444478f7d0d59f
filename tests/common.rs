use std::collections::HashMap;

use axum::http::StatusCode;
use axum_test::TestServer;
use lms::{build_server_with_pool, model::DbConnection};
use serde_json::{Value, json};
use sqlx::{Executor, PgPool, postgres::PgPoolOptions};
use tower_cookies::Cookie;
use url::Url;
use uuid::Uuid;

const ADMIN_URL_VAR: &str = "TEST_DATABASE_ADMIN_URL";

/// Creates a scratch database and migrates it. Returns `None` when no postgres
/// server is configured, so database flows are skipped instead of failing.
pub async fn setup_test_db() -> Option<FlowDatabase> {
    let _ = dotenvy::dotenv();
    let Ok(admin_url) = std::env::var(ADMIN_URL_VAR) else {
        eprintln!("{ADMIN_URL_VAR} is not set, skipping database flow");
        return None;
    };

    let db_name = format!("test_db_{}", Uuid::new_v4());
    let mut url = Url::parse(&admin_url).unwrap();

    let admin_pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(url.as_str())
        .await
        .unwrap();

    admin_pool
        .execute(format!(r#"CREATE DATABASE "{}""#, db_name).as_str())
        .await
        .unwrap();

    url.set_path(&db_name);

    let pool = PgPool::connect(url.as_str()).await.unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();

    Some(FlowDatabase {
        db_name,
        admin_url,
        pool,
    })
}

/// Temporary postgres database, dropped when it goes out of scope.
// FIXME: Drop database even if the test panics
pub struct FlowDatabase {
    db_name: String,
    admin_url: String,
    pool: PgPool,
}

impl Drop for FlowDatabase {
    fn drop(&mut self) {
        let db_name = self.db_name.clone();
        let admin_url = self.admin_url.clone();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn_blocking(move || {
                // fresh runtime inside this blocking thread
                let rt = tokio::runtime::Runtime::new().unwrap();
                rt.block_on(async move {
                    if let Ok(admin_pool) = PgPool::connect(&admin_url).await {
                        let _ = admin_pool
                            .execute(format!(r#"DROP DATABASE "{}" WITH (FORCE)"#, db_name).as_str())
                            .await;
                    }
                });
            });
        }
    }
}

pub async fn setup_server(db: &FlowDatabase) -> TestServer {
    let pool = DbConnection::from_pool(db.pool.clone());
    let server = build_server_with_pool(pool).await.unwrap().1;
    TestServer::new(server).unwrap()
}

#[derive(Debug)]
pub struct FlowContext {
    pub store: HashMap<&'static str, Value>, // a way to pass data between steps
}

impl FlowContext {
    pub fn new() -> Self {
        Self {
            store: HashMap::new(),
        }
    }

    pub fn store(&mut self, key: &'static str, val: Value) {
        self.store.insert(key, val);
    }

    pub fn get(&self, key: &str) -> &Value {
        self.store.get(key).expect("missing store key")
    }

    /// `id` field of a stored object.
    pub fn id(&self, key: &str) -> String {
        self.get(key)["id"]
            .as_str()
            .unwrap_or_else(|| panic!("stored `{key}` has no id"))
            .to_string()
    }
}

type PathFn = Box<dyn Fn(&FlowContext) -> String + Send + Sync>;
type BodyFn = Box<dyn Fn(&FlowContext) -> Value + Send + Sync>;

pub struct Action {
    pub name: &'static str,
    pub method: &'static str,
    pub path: String,
    pub dyn_path: Option<PathFn>,
    pub body: Option<Value>,
    pub dyn_body: Option<BodyFn>,
    pub raw_body: Option<String>,
    pub expect: StatusCode,
    pub clear_cookies: bool,
    pub save_cookies: bool,
    pub query_params: Vec<(String, String)>,
    pub cookie_asserts: Vec<(&'static str, Box<dyn Fn(&Cookie) + Send + Sync>)>,
    pub body_asserts: Vec<Box<dyn Fn(&Value) + Send + Sync>>,
    pub save_as: Option<&'static str>,
}

impl Action {
    pub fn new(name: &'static str, method: &'static str, path: &str) -> Self {
        Self {
            name,
            method,
            path: path.to_string(),
            dyn_path: None,
            body: None,
            dyn_body: None,
            raw_body: None,
            expect: StatusCode::OK,
            clear_cookies: false,
            save_cookies: true,
            query_params: vec![],
            cookie_asserts: vec![],
            body_asserts: vec![],
            save_as: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sends the text as-is, the way `navigator.sendBeacon` does.
    pub fn with_raw_body<S: Into<String>>(mut self, body: S) -> Self {
        self.raw_body = Some(body.into());
        self
    }

    pub fn with_expect(mut self, expect: StatusCode) -> Self {
        self.expect = expect;
        self
    }

    pub fn with_save_cookies(mut self, save_cookies: bool) -> Self {
        self.save_cookies = save_cookies;
        self
    }

    pub fn with_clear_cookies(mut self, clear_cookies: bool) -> Self {
        self.clear_cookies = clear_cookies;
        self
    }

    #[allow(unused)]
    pub fn with_param(mut self, key: &str, val: &str) -> Self {
        self.query_params
            .push((String::from(key), String::from(val)));
        self
    }

    pub fn with_dyn_path<F>(mut self, f: F) -> Self
    where
        F: Fn(&FlowContext) -> String + Send + Sync + 'static,
    {
        self.dyn_path = Some(Box::new(f));
        self
    }

    pub fn with_dyn_body<F>(mut self, f: F) -> Self
    where
        F: Fn(&FlowContext) -> Value + Send + Sync + 'static,
    {
        self.dyn_body = Some(Box::new(f));
        self
    }

    pub fn with_save_as(mut self, key: &'static str) -> Self {
        self.save_as = Some(key);
        self
    }

    #[allow(unused)]
    pub fn assert_cookie<F>(mut self, name: &'static str, check: F) -> Self
    where
        F: Fn(&Cookie) + Send + Sync + 'static,
    {
        self.cookie_asserts.push((name, Box::new(check)));
        self
    }

    pub fn assert_body<F>(mut self, check: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.body_asserts.push(Box::new(check));
        self
    }
}

pub struct Flow {
    actions: Vec<Action>,
}

impl Flow {
    pub fn new() -> Self {
        Self { actions: vec![] }
    }

    pub fn step(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub async fn run(self, server: &mut TestServer, _db: FlowDatabase) {
        let mut ctx = FlowContext::new(); // create new context for this flow
        for action in self.actions {
            println!("==> Running test action `{}`", action.name);
            if action.clear_cookies {
                server.clear_cookies();
            }

            if action.save_cookies {
                server.save_cookies();
            } else {
                server.do_not_save_cookies();
            }

            let path = match &action.dyn_path {
                Some(dyn_path_fn) => dyn_path_fn(&ctx),
                None => action.path.clone(),
            };

            let mut req = match action.method {
                "GET" => server.get(&path),
                "POST" => server.post(&path),
                "PUT" => server.put(&path),
                "DELETE" => server.delete(&path),
                _ => panic!("unsupported method {}", action.method),
            };

            match (&action.dyn_body, action.body, action.raw_body) {
                (Some(f), _, _) => req = req.json(&f(&ctx)),
                (_, Some(json), _) => req = req.json(&json),
                (_, _, Some(text)) => req = req.text(text),
                _ => {}
            }

            for (k, v) in action.query_params {
                req = req.add_query_param(&k, v);
            }

            let resp = req.await;
            resp.assert_status(action.expect);
            let cookies = resp.cookies();

            for (cookie_name, check) in action.cookie_asserts {
                let cookie = cookies
                    .get(cookie_name)
                    .unwrap_or_else(|| panic!("Cookie {} is not set", cookie_name));
                check(cookie);
            }

            if !action.body_asserts.is_empty() {
                let body = resp.json::<Value>();
                for check in action.body_asserts {
                    check(&body);
                }
            }

            if let Some(save_key) = action.save_as {
                ctx.store(save_key, resp.json::<Value>());
            }
        }
    }
}

// Common actions builders

pub fn signin_action(name: &str, password: &str) -> Action {
    Action::new("signin", "POST", "/api/v1/account/signin").with_body(json!({
        "username": name,
        "password": password,
    }))
}

pub fn signin_admin_action() -> Action {
    signin_action("admin", "admin").with_clear_cookies(true)
}

pub fn create_user_action(name: &str, role: &str) -> Action {
    Action::new("create_user", "POST", "/api/v1/users")
        .with_body(json!({
            "username": name,
            "password": "secret",
            "full_name": name,
            "role": role,
        }))
        .with_expect(StatusCode::CREATED)
}

pub fn signin_user_action(name: &str) -> Action {
    signin_action(name, "secret").with_clear_cookies(true)
}

pub fn create_course_action(code: &str, enroll_type: &str) -> Action {
    Action::new("create_course", "POST", "/api/v1/courses")
        .with_body(json!({
            "code": code,
            "title": format!("Course {code}"),
            "enroll_type": enroll_type,
            "status": "published",
        }))
        .with_expect(StatusCode::CREATED)
}

/// Path below a stored object, e.g. `under("course", "lessons")`.
pub fn under(key: &'static str, tail: &'static str) -> impl Fn(&FlowContext) -> String {
    move |ctx| {
        let collection = match key {
            "course" => "courses",
            "lesson" | "video" | "pdf" => "lessons",
            "test" => "tests",
            "user" | "student" => "users",
            other => panic!("no collection for `{other}`"),
        };
        if tail.is_empty() {
            format!("/api/v1/{collection}/{}", ctx.id(key))
        } else {
            format!("/api/v1/{collection}/{}/{tail}", ctx.id(key))
        }
    }
}
