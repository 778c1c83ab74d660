// crates/nutri-probe/src/catalog.rs
// ============================================================================
// Module: Built-in Suites
// Description: Nutri Tracker checks grouped by feature area.
// Purpose: Build runnable suites from configuration and seeded identifiers.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Suites are built from a [`ProbeConfig`] so routes honour the configured
//! login path and base URL prefix. Checks that need seeded data (a food id, a
//! user id, a known search result) are only included when `[seed]` provides
//! the value; nothing here assumes a particular database.
//!
//! Dashboard pages and food APIs run as the regular user when one is
//! configured and as the administrator otherwise.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;

use crate::assertions::CaseMode;
use crate::assertions::Expectation;
use crate::config::ProbeConfig;
use crate::probe::ProbeRequest;
use crate::suite::AuthMode;
use crate::suite::Check;
use crate::suite::Suite;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Suite identifiers in execution order.
const SUITE_IDS: [&str; 6] = ["auth", "food-search", "meal-logging", "export", "admin", "uploads"];

/// Protected dashboard pages.
const DASHBOARD_PAGES: [(&str, &str); 3] = [
    ("log meal", "/dashboard/log-meal"),
    ("nutrition goals", "/dashboard/nutrition-goals"),
    ("reports", "/dashboard/reports"),
];

/// Food search route.
const SEARCH_PATH: &str = "/api/foods/search-verified";
/// Meal logging API route.
const MEALS_PATH: &str = "/api/v2/meals";
/// Export route.
const EXPORT_PATH: &str = "/dashboard/export-data";
/// JSON content type prefix.
const JSON: &str = "application/json";
/// Export period in days.
const EXPORT_PERIOD_DAYS: &str = "7";

/// Returns the built-in suite identifiers.
#[must_use]
pub const fn suite_ids() -> &'static [&'static str] {
    &SUITE_IDS
}

/// Builds one suite by identifier.
#[must_use]
pub fn build(id: &str, config: &ProbeConfig) -> Option<Suite> {
    let suite = match id {
        "auth" => auth_suite(config),
        "food-search" => food_search_suite(config),
        "meal-logging" => meal_logging_suite(config),
        "export" => export_suite(config),
        "admin" => admin_suite(config),
        "uploads" => uploads_suite(),
        _ => return None,
    };
    Some(suite)
}

/// Builds every suite in execution order.
#[must_use]
pub fn build_all(config: &ProbeConfig) -> Vec<Suite> {
    SUITE_IDS.iter().filter_map(|id| build(id, config)).collect()
}

// ============================================================================
// SECTION: Suites
// ============================================================================

/// Login form and protected page access.
fn auth_suite(config: &ProbeConfig) -> Suite {
    let member = member_identity(config);
    let login_route = login_route(config);
    let login_page = ProbeRequest::get(config.login.path.clone());
    let mut checks = vec![
        Check::new("login page serves anti-forgery field", AuthMode::Anonymous, login_page)
            .expect(Expectation::Status(200))
            .expect(Expectation::tag_with_attr("input", "name", config.login.csrf_field.clone())),
    ];
    for (label, path) in DASHBOARD_PAGES {
        let name = format!("anonymous {label} redirects to login");
        checks.push(
            Check::new(name, AuthMode::Anonymous, ProbeRequest::get(path))
                .expect(Expectation::RedirectTo(login_route.clone())),
        );
        checks.push(
            Check::new(format!("{label} renders when logged in"), member, ProbeRequest::get(path))
                .expect(Expectation::Status(200))
                .expect(Expectation::BodyLacks {
                    text: "Traceback".to_string(),
                    case: CaseMode::Sensitive,
                }),
        );
    }
    Suite {
        id: "auth".to_string(),
        title: "Authentication and protected pages".to_string(),
        checks,
    }
}

/// Verified food search and per-food endpoints.
fn food_search_suite(config: &ProbeConfig) -> Suite {
    let member = member_identity(config);
    let search = |query: &str| ProbeRequest::get(SEARCH_PATH).query("q", query);
    let mut checks = vec![
        Check::new("search returns verified foods", member, search("milk"))
            .expect(Expectation::Status(200))
            .expect(Expectation::ContentType(JSON.to_string()))
            .expect(Expectation::json_items_have(&["id", "name", "calories_per_100g"]))
            .expect(Expectation::JsonArrayFieldTrueIfPresent("verified".to_string())),
        Check::new("empty search query is rejected", member, search(""))
            .expect(Expectation::Status(400))
            .expect(Expectation::JsonErrorPayload),
    ];
    if let Some(known) = &config.seed.known_food {
        let name = format!("search {:?} finds one known food", known.query);
        checks.push(
            Check::new(name, member, search(&known.query))
                .expect(Expectation::Status(200))
                .expect(Expectation::JsonArrayLen(1))
                .expect(Expectation::JsonArrayAnyNameContains {
                    field: "name".to_string(),
                    text: known.name_contains.clone(),
                })
                .expect(Expectation::JsonPointerEquals {
                    pointer: "/0/calories_per_100g".to_string(),
                    value: json!(known.calories_per_100g),
                }),
        );
    }
    if let Some(food_id) = config.seed.food_id {
        let servings = ProbeRequest::get(format!("/api/foods/{food_id}/servings"));
        checks.push(
            Check::new("food servings are listed", member, servings)
                .expect(Expectation::Status(200))
                .expect(Expectation::ContentType(JSON.to_string())),
        );
        let nutrition = ProbeRequest::get(format!("/api/foods/{food_id}/nutrition"));
        checks.push(
            Check::new("food nutrition is served", member, nutrition)
                .expect(Expectation::Status(200))
                .expect(Expectation::ContentType(JSON.to_string())),
        );
    }
    Suite {
        id: "food-search".to_string(),
        title: "Verified food search".to_string(),
        checks,
    }
}

/// Meal logging page and API.
fn meal_logging_suite(config: &ProbeConfig) -> Suite {
    let member = member_identity(config);
    let log_meal_page = ProbeRequest::get("/dashboard/log-meal");
    let mut checks = vec![
        Check::new("log meal page wires the search widget", member, log_meal_page)
            .expect(Expectation::Status(200))
            .expect(Expectation::ElementId("foodSearch".to_string()))
            .expect(Expectation::ElementId("foodSearchResults".to_string()))
            .expect(Expectation::body_contains("EnhancedMealLogger")),
    ];
    if let Some(food_id) = config.seed.food_id {
        let grams = meal_body(food_id, json!({"grams": 100.0}));
        let by_grams = ProbeRequest::post(MEALS_PATH).json(grams);
        checks.push(
            Check::new("meal logged by grams", member, by_grams)
                .expect(Expectation::StatusOneOf(vec![200, 201]))
                .expect(Expectation::ContentType(JSON.to_string())),
        );
        if let Some(serving_id) = config.seed.serving_id {
            let by_serving = meal_body(food_id, json!({"serving_id": serving_id, "quantity": 1}));
            let request = ProbeRequest::post(MEALS_PATH).json(by_serving);
            checks.push(
                Check::new("meal logged by serving", member, request)
                    .expect(Expectation::StatusOneOf(vec![200, 201])),
            );
        }
    }
    let without_food = json!({"grams": 100.0, "meal_type": "lunch"});
    checks.push(
        Check::new(
            "meal without food is rejected",
            member,
            ProbeRequest::post(MEALS_PATH).json(without_food),
        )
        .expect(Expectation::Status(400))
        .expect(Expectation::JsonErrorPayload),
    );
    let anonymous_food = config.seed.food_id.unwrap_or(config.seed.missing_food_id);
    let anonymous_body = meal_body(anonymous_food, json!({"grams": 100.0}));
    checks.push(
        Check::new(
            "anonymous meal post is refused",
            AuthMode::Anonymous,
            ProbeRequest::post(MEALS_PATH).json(anonymous_body),
        )
        .expect(Expectation::StatusOneOf(vec![401, 302])),
    );
    Suite {
        id: "meal-logging".to_string(),
        title: "Meal logging".to_string(),
        checks,
    }
}

/// Data export formats.
fn export_suite(config: &ProbeConfig) -> Suite {
    let member = member_identity(config);
    let export = |format: &str| {
        ProbeRequest::get(EXPORT_PATH).query("format", format).query("period", EXPORT_PERIOD_DAYS)
    };
    let checks = vec![
        Check::new("csv export", member, export("csv"))
            .expect(Expectation::Status(200))
            .expect(Expectation::ContentType("text/csv".to_string())),
        Check::new("pdf export", member, export("pdf"))
            .expect(Expectation::Status(200))
            .expect(Expectation::ContentType("application/pdf".to_string())),
        Check::new("anonymous export redirects to login", AuthMode::Anonymous, export("csv"))
            .expect(Expectation::RedirectTo(login_route(config))),
    ];
    Suite {
        id: "export".to_string(),
        title: "Data export".to_string(),
        checks,
    }
}

/// Admin pages and admin API authorization.
fn admin_suite(config: &ProbeConfig) -> Suite {
    let missing = config.seed.missing_food_id;
    let admin_food = |id: u64| ProbeRequest::get(format!("/api/admin/foods/{id}"));
    let mut checks = vec![
        Check::new("users page renders", AuthMode::Admin, ProbeRequest::get("/admin/users"))
            .expect(Expectation::Status(200)),
        Check::new("foods page renders", AuthMode::Admin, ProbeRequest::get("/admin/foods"))
            .expect(Expectation::Status(200)),
        Check::new("admin food api rejects anonymous", AuthMode::Anonymous, admin_food(missing))
            .expect(Expectation::Status(401)),
        Check::new("missing food is not found", AuthMode::Admin, admin_food(missing))
            .expect(Expectation::Status(404))
            .expect(Expectation::JsonErrorPayload),
    ];
    if config.credentials.user.is_some() {
        let probe_id = config.seed.food_id.unwrap_or(missing);
        checks.push(
            Check::new("admin food api forbids regular users", AuthMode::User, admin_food(probe_id))
                .expect(Expectation::Status(403)),
        );
    }
    if let Some(food_id) = config.seed.referenced_food_id {
        let request = ProbeRequest::delete(format!("/api/admin/foods/{food_id}"));
        checks.push(
            Check::new("deleting a logged food conflicts", AuthMode::Admin, request)
                .expect(Expectation::Status(409))
                .expect(Expectation::JsonErrorPayload),
        );
    }
    if let Some(user_id) = config.seed.user_id {
        let path = format!("/api/admin/users/{user_id}/reset-password");
        let request = ProbeRequest::post(path).json(json!({}));
        checks.push(
            Check::new("password reset rejects anonymous callers", AuthMode::Anonymous, request)
                .expect(Expectation::Status(401)),
        );
    }
    Suite {
        id: "admin".to_string(),
        title: "Administration".to_string(),
        checks,
    }
}

/// Bulk upload pages.
fn uploads_suite() -> Suite {
    let uploads = ProbeRequest::get("/admin/food-uploads");
    let history = ProbeRequest::get("/admin/food-servings/uploads").query("tab", "history");
    let checks = vec![
        Check::new("food uploads page renders", AuthMode::Admin, uploads)
            .expect(Expectation::Status(200)),
        Check::new("serving upload history renders", AuthMode::Admin, history)
            .expect(Expectation::Status(200)),
    ];
    Suite {
        id: "uploads".to_string(),
        title: "Bulk uploads".to_string(),
        checks,
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Identity for member-facing pages.
const fn member_identity(config: &ProbeConfig) -> AuthMode {
    if config.credentials.user.is_some() { AuthMode::User } else { AuthMode::Admin }
}

/// Absolute path of the login route including any base URL prefix.
fn login_route(config: &ProbeConfig) -> String {
    config
        .url_for(&config.login.path, &[])
        .map_or_else(|_| config.login.path.clone(), |url| url.path().to_string())
}

/// Meal payload for a food with extra quantity fields.
fn meal_body(food_id: u64, quantity: Value) -> Value {
    let mut body = json!({"food_id": food_id, "meal_type": "lunch"});
    if let (Some(target), Value::Object(extra)) = (body.as_object_mut(), quantity) {
        target.extend(extra);
    }
    body
}
