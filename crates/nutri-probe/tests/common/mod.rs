// crates/nutri-probe/tests/common/mod.rs
// ============================================================================
// Module: Fake Nutri Tracker Server
// Description: In-process HTTP server mimicking the Nutri Tracker routes.
// Purpose: Exercise sessions, probes, and suites without a real deployment.
// Dependencies: tiny_http, serde_json, url
// ============================================================================

//! ## Overview
//! The fake server renders a login form with an anti-forgery token, issues a
//! `Path=/` session cookie on success, redirects anonymous page requests to
//! the login route, and answers the food, meal, export, and admin APIs with
//! the status semantics the probes expect. Behaviour switches in
//! [`FakeOptions`] let tests break individual pieces.

#![allow(
    dead_code,
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Shared test fixture; not every test binary uses every helper."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;

use nutri_probe::Credentials;
use nutri_probe::ProbeConfig;
use serde_json::Value;
use serde_json::json;
use tiny_http::Header;
use tiny_http::Request;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Fixture Constants
// ============================================================================

/// Token rendered into the login form.
pub const CSRF_TOKEN: &str = "tok-3f9a1c7e5b2d4a60";
/// Administrator identity accepted by the server.
pub const ADMIN: (&str, &str) = ("admin", "admin123");
/// Regular identity accepted by the server.
pub const USER: (&str, &str) = ("demo", "demo123");
/// Food id the server knows about and that is referenced by a meal log.
pub const KNOWN_FOOD_ID: u64 = 1;
/// Serving id belonging to [`KNOWN_FOOD_ID`].
pub const KNOWN_SERVING_ID: u64 = 11;
/// User id that may receive a password reset.
pub const KNOWN_USER_ID: u64 = 2;

// ============================================================================
// SECTION: Options
// ============================================================================

/// Behaviour switches for the fake server.
#[derive(Debug, Clone, Copy)]
pub struct FakeOptions {
    /// Render the hidden token input on the login page.
    pub render_token: bool,
    /// Render the token in a `<meta name="csrf-token">` tag instead.
    pub token_in_meta: bool,
    /// Accept a login POST that carries no token.
    pub accept_without_token: bool,
    /// Make the reports page fail with a template error.
    pub broken_reports: bool,
    /// Make the login page itself fail.
    pub broken_login_page: bool,
}

impl Default for FakeOptions {
    fn default() -> Self {
        Self {
            render_token: true,
            token_in_meta: false,
            accept_without_token: false,
            broken_reports: false,
            broken_login_page: false,
        }
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Running fake server; stops when dropped.
pub struct FakeNutriServer {
    /// Listening server, unblocked on drop.
    server: Arc<Server>,
    /// Accept loop thread.
    handle: Option<JoinHandle<()>>,
    /// `http://127.0.0.1:<port>`.
    base_url: String,
    /// `METHOD /path` of every request received.
    hits: Arc<Mutex<Vec<String>>>,
}

impl FakeNutriServer {
    /// Starts a server with default behaviour.
    pub fn start() -> Self {
        Self::start_with(FakeOptions::default())
    }

    /// Starts a server with the given behaviour switches.
    pub fn start_with(options: FakeOptions) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        let hits = Arc::new(Mutex::new(Vec::new()));
        let worker = Arc::clone(&server);
        let worker_hits = Arc::clone(&hits);
        let handle = thread::spawn(move || {
            while let Ok(request) = worker.recv() {
                let line = format!("{} {}", request.method(), request.url());
                worker_hits.lock().unwrap().push(line);
                handle_request(request, options);
            }
        });
        Self {
            server,
            handle: Some(handle),
            base_url: format!("http://{addr}"),
            hits,
        }
    }

    /// Base URL of the server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Requests received so far as `METHOD /path?query`.
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    /// Configuration pointing at this server with both identities and seeds.
    pub fn config(&self) -> ProbeConfig {
        let mut config = ProbeConfig::default();
        config.target.base_url = self.base_url.clone();
        config.target.timeout_ms = 5_000;
        config.credentials.admin = Some(Credentials::new(ADMIN.0, ADMIN.1));
        config.credentials.user = Some(Credentials::new(USER.0, USER.1));
        config.seed.food_id = Some(KNOWN_FOOD_ID);
        config.seed.referenced_food_id = Some(KNOWN_FOOD_ID);
        config.seed.serving_id = Some(KNOWN_SERVING_ID);
        config.seed.user_id = Some(KNOWN_USER_ID);
        config
    }
}

impl Drop for FakeNutriServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// ============================================================================
// SECTION: Routing
// ============================================================================

/// Identity attached to a request by its session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Caller {
    /// No valid session cookie.
    Anonymous,
    /// Logged in as the regular user.
    User,
    /// Logged in as the administrator.
    Admin,
}

/// Routes one request and sends the reply.
fn handle_request(mut request: Request, options: FakeOptions) {
    let method = request.method().to_string();
    let raw_url = request.url().to_string();
    let (path, query) = raw_url.split_once('?').unwrap_or((raw_url.as_str(), ""));
    let path = path.to_string();
    let query: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let caller = caller_of(&request);
    let csrf_header = header_value(&request, "X-CSRFToken");
    let mut body = String::new();
    let _ = request.as_reader().read_to_string(&mut body);

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    let reply = match (method.as_str(), segments.as_slice()) {
        ("GET", ["auth", "login"]) => login_page(options),
        ("POST", ["auth", "login"]) => login_submit(&body, options),
        ("GET", ["dashboard"]) => page(caller, false, "<h1>Dashboard</h1>"),
        ("GET", ["dashboard", "log-meal"]) => page(caller, false, LOG_MEAL_HTML),
        ("GET", ["dashboard", "nutrition-goals"]) => page(caller, false, "<h1>Goals</h1>"),
        ("GET", ["dashboard", "reports"])
            if options.broken_reports && caller != Caller::Anonymous =>
        {
            html(500, "jinja2.exceptions.UndefinedError: 'report' is undefined")
        }
        ("GET", ["dashboard", "reports"]) => page(caller, false, "<h1>Reports</h1>"),
        ("GET", ["dashboard", "export-data"]) => export(caller, &query),
        ("GET", ["api", "foods", "search-verified"]) => search(caller, &query),
        ("GET", ["api", "foods", id, "servings"]) => food_detail(caller, id, json!([
            {"id": KNOWN_SERVING_ID, "unit": "cup", "grams_per_unit": 244.0}
        ])),
        ("GET", ["api", "foods", id, "nutrition"]) => food_detail(caller, id, json!({
            "calories": 61.0, "protein": 3.2
        })),
        ("POST", ["api", "v2", "meals"]) => log_meal(caller, csrf_header.as_deref(), &body),
        ("GET", ["admin", "users" | "foods" | "food-uploads"])
        | ("GET", ["admin", "food-servings", "uploads"]) => page(caller, true, "<h1>Admin</h1>"),
        (method, ["api", "admin", "foods", id]) => {
            admin_food(caller, method, id, csrf_header.as_deref())
        }
        ("POST", ["api", "admin", "users", _, "reset-password"]) => admin_api(caller, || {
            (200, json!({"success": true}))
        }),
        _ => json_reply(404, &json!({"error": "Not found"})),
    };
    let _ = request.respond(reply);
}

/// Response type every handler returns.
type Reply = Response<std::io::Cursor<Vec<u8>>>;

/// Login form, with or without the CSRF field.
fn login_page(options: FakeOptions) -> Reply {
    if options.broken_login_page {
        return html(503, "maintenance");
    }
    let meta = if options.token_in_meta {
        format!(r#"<meta name="csrf-token" content="{CSRF_TOKEN}">"#)
    } else {
        String::new()
    };
    let input = if options.render_token && !options.token_in_meta {
        format!(r#"<input id="csrf_token" name="csrf_token" type="hidden" value="{CSRF_TOKEN}">"#)
    } else {
        String::new()
    };
    html(
        200,
        &format!(
            "<html><head>{meta}</head><body><form method=\"post\">{input}\
             <input name=\"username\"><input name=\"password\" type=\"password\">\
             </form></body></html>"
        ),
    )
}

/// Checks the posted form and issues a session cookie.
fn login_submit(body: &str, options: FakeOptions) -> Reply {
    let form: Vec<(String, String)> = url::form_urlencoded::parse(body.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let field =
        |name: &str| form.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str());
    let token_ok = match field("csrf_token") {
        Some(token) => token == CSRF_TOKEN,
        None => options.accept_without_token,
    };
    if !token_ok {
        return html(400, "Bad Request: The CSRF token is missing.");
    }
    let username = field("username").unwrap_or_default();
    let password = field("password").unwrap_or_default();
    if (username, password) != ADMIN && (username, password) != USER {
        return html(200, "<form>Invalid username or password</form>");
    }
    let cookie = format!("session=sid-{username}; Path=/; HttpOnly");
    with_headers(
        Response::from_data(Vec::new()).with_status_code(302),
        &[("Location", "/dashboard/".to_string()), ("Set-Cookie", cookie)],
    )
}

/// Protected HTML page.
fn page(caller: Caller, admin_only: bool, content: &str) -> Reply {
    match caller {
        Caller::Anonymous => redirect_to_login(),
        Caller::User if admin_only => html(403, "Forbidden"),
        Caller::User | Caller::Admin => html(200, content),
    }
}

/// CSV or PDF export for a logged-in caller.
fn export(caller: Caller, query: &[(String, String)]) -> Reply {
    if caller == Caller::Anonymous {
        return redirect_to_login();
    }
    match query_value(query, "format") {
        Some("csv") => with_headers(
            Response::from_data(b"date,food,calories\n".to_vec()),
            &[("Content-Type", "text/csv; charset=utf-8".to_string())],
        ),
        Some("pdf") => with_headers(
            Response::from_data(b"%PDF-1.4\n".to_vec()),
            &[("Content-Type", "application/pdf".to_string())],
        ),
        _ => html(400, "unsupported format"),
    }
}

/// Food search API.
fn search(caller: Caller, query: &[(String, String)]) -> Reply {
    if caller == Caller::Anonymous {
        return json_reply(401, &json!({"error": "Authentication required"}));
    }
    let term = query_value(query, "q").unwrap_or_default().trim().to_ascii_lowercase();
    let results = match term.as_str() {
        "" => return json_reply(400, &json!({"error": "Search query is required"})),
        "milk" => json!([
            {"id": 3, "name": "Milk, whole", "calories_per_100g": 61.0, "verified": true},
            {"id": 4, "name": "Milk, skim", "calories_per_100g": 34.0, "verified": true}
        ]),
        "apple" => json!([
            {"id": 7, "name": "Apple, raw", "calories_per_100g": 52.0, "verified": true}
        ]),
        _ => json!([]),
    };
    json_reply(200, &results)
}

/// Servings or nutrition for the known food only.
fn food_detail(caller: Caller, id: &str, payload: Value) -> Reply {
    if caller == Caller::Anonymous {
        return json_reply(401, &json!({"error": "Authentication required"}));
    }
    if id == KNOWN_FOOD_ID.to_string() {
        json_reply(200, &payload)
    } else {
        json_reply(404, &json!({"error": "Food not found"}))
    }
}

/// Meal logging API.
fn log_meal(caller: Caller, csrf: Option<&str>, body: &str) -> Reply {
    if caller == Caller::Anonymous {
        return json_reply(401, &json!({"error": "Authentication required"}));
    }
    if csrf != Some(CSRF_TOKEN) {
        return html(400, "Bad Request: The CSRF token is missing.");
    }
    let Ok(payload) = serde_json::from_str::<Value>(body) else {
        return json_reply(400, &json!({"error": "Invalid JSON"}));
    };
    if payload.get("food_id").is_none() {
        return json_reply(400, &json!({"error": "food_id is required"}));
    }
    json_reply(201, &json!({"success": true, "meal_log": {"id": 99}}))
}

/// Admin food API: lookup and delete.
fn admin_food(caller: Caller, method: &str, id: &str, csrf: Option<&str>) -> Reply {
    let known = id == KNOWN_FOOD_ID.to_string();
    admin_api(caller, || match (method, known) {
        ("GET", true) => (200, json!({"id": KNOWN_FOOD_ID, "name": "Basmati Rice"})),
        ("DELETE", true) if csrf != Some(CSRF_TOKEN) => {
            (400, json!({"error": "CSRF token missing"}))
        }
        ("DELETE", true) => (
            409,
            json!({"error": "Food is referenced by meal logs", "code": "food_in_use"}),
        ),
        _ => (404, json!({"error": "Food not found"})),
    })
}

/// Applies the 401/403 gate before an admin handler.
fn admin_api<F>(caller: Caller, handler: F) -> Reply
where
    F: FnOnce() -> (u16, Value),
{
    match caller {
        Caller::Anonymous => json_reply(401, &json!({"error": "Authentication required"})),
        Caller::User => json_reply(403, &json!({"error": "Admin access required"})),
        Caller::Admin => {
            let (status, payload) = handler();
            json_reply(status, &payload)
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the caller from the session cookie.
fn caller_of(request: &Request) -> Caller {
    let cookies = header_value(request, "Cookie").unwrap_or_default();
    let session = cookies
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == "session")
        .map(|(_, value)| value.to_string());
    match session.as_deref() {
        Some(value) if value == format!("sid-{}", ADMIN.0) => Caller::Admin,
        Some(value) if value == format!("sid-{}", USER.0) => Caller::User,
        _ => Caller::Anonymous,
    }
}

/// Case-insensitive header lookup.
fn header_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|header| header.field.as_str().as_str().eq_ignore_ascii_case(name))
        .map(|header| header.value.as_str().to_string())
}

/// First query value for `name`.
fn query_value<'a>(query: &'a [(String, String)], name: &str) -> Option<&'a str> {
    query.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
}

/// `302` to the login page.
fn redirect_to_login() -> Reply {
    with_headers(
        Response::from_data(Vec::new()).with_status_code(302),
        &[("Location", "/auth/login?next=%2Fdashboard%2F".to_string())],
    )
}

/// HTML reply.
fn html(status: u16, body: &str) -> Reply {
    with_headers(
        Response::from_data(body.as_bytes().to_vec()).with_status_code(status),
        &[("Content-Type", "text/html; charset=utf-8".to_string())],
    )
}

/// JSON reply.
fn json_reply(status: u16, value: &Value) -> Reply {
    with_headers(
        Response::from_data(value.to_string().into_bytes()).with_status_code(status),
        &[("Content-Type", "application/json".to_string())],
    )
}

/// Adds extra headers to a reply.
fn with_headers(mut response: Reply, headers: &[(&str, String)]) -> Reply {
    for (name, value) in headers {
        response.add_header(Header::from_bytes(name.as_bytes(), value.as_bytes()).unwrap());
    }
    response
}

/// Log-meal page with the widgets the catalog looks for.
const LOG_MEAL_HTML: &str = r#"<h1>Log Meal</h1>
<input type="text" class="form-control" id="foodSearch" placeholder="Search foods">
<div id="foodSearchResults" class="list-group"></div>
<script>document.addEventListener('DOMContentLoaded', () => new EnhancedMealLogger());</script>"#;
