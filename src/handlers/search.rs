use serde::Serialize;
use serde_json::Value;

use crate::config::SearchConfig;
use crate::protocol::{ErrorCode, ErrorReport, SearchQueryParams, ToolResult};

/// Supported result-count range.
pub const MIN_RESULT_COUNT: i64 = 1;
pub const MAX_RESULT_COUNT: i64 = 10;
const DEFAULT_RESULT_COUNT: i64 = 5;

/// Clamp the caller's requested result count into the supported range.
pub fn clamp_result_count(num: Option<i64>) -> usize {
    num.unwrap_or(DEFAULT_RESULT_COUNT)
        .clamp(MIN_RESULT_COUNT, MAX_RESULT_COUNT) as usize
}

#[derive(Debug, Serialize)]
struct SearchResultItem {
    title: String,
    url: String,
    snippet: String,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    engine: &'static str,
    query: String,
    results: Vec<SearchResultItem>,
}

/// Handle a `search.query` tool call.
///
/// Engine resolution: explicit `engine` parameter first; otherwise SerpAPI
/// when configured, falling back to Google Custom Search when SerpAPI comes
/// back empty; otherwise Google alone. No configured engine is a tool-level
/// error, as are upstream HTTP failures.
pub async fn handle(
    params: SearchQueryParams,
    search: &SearchConfig,
    http: &reqwest::Client,
) -> ToolResult {
    let Some(query) = params.effective_query() else {
        return ErrorReport::new(
            ErrorCode::MissingArgument,
            "Missing required parameter: query (or its alias q)",
        )
        .into();
    };

    let mut query = query.trim().to_string();
    if let Some(site) = params.site.as_deref() {
        let site = site.trim();
        if !site.is_empty() {
            query.push_str(" site:");
            query.push_str(site);
        }
    }

    let cap = clamp_result_count(params.num);
    let date_restrict = params.date_restrict.as_deref().map(str::trim);

    match params.engine.as_deref() {
        Some("serpapi") => {
            let Some(key) = configured_serpapi_key(search) else {
                return engine_unavailable("serpapi (SERPAPI_KEY not set)");
            };
            match serpapi_search(http, key, &query, cap, date_restrict).await {
                Ok(results) => render("serpapi", query, results),
                Err(report) => report.into(),
            }
        }
        Some("google") => {
            let Some((key, cx)) = configured_google_creds(search) else {
                return engine_unavailable("google (GOOGLE_CSE_KEY/GOOGLE_CSE_CX not set)");
            };
            match google_search(http, key, cx, &query, cap, date_restrict).await {
                Ok(results) => render("google", query, results),
                Err(report) => report.into(),
            }
        }
        // The schema enum rejects anything else before we get here.
        Some(other) => engine_unavailable(other),
        None => {
            if let Some(key) = configured_serpapi_key(search) {
                match serpapi_search(http, key, &query, cap, date_restrict).await {
                    Ok(results) if results.is_empty() => {
                        // Primary came back empty; try the secondary if present.
                        if let Some((gkey, gcx)) = configured_google_creds(search) {
                            match google_search(http, gkey, gcx, &query, cap, date_restrict).await
                            {
                                Ok(results) => render("google", query, results),
                                Err(report) => report.into(),
                            }
                        } else {
                            render("serpapi", query, results)
                        }
                    }
                    Ok(results) => render("serpapi", query, results),
                    Err(report) => report.into(),
                }
            } else if let Some((key, cx)) = configured_google_creds(search) {
                match google_search(http, key, cx, &query, cap, date_restrict).await {
                    Ok(results) => render("google", query, results),
                    Err(report) => report.into(),
                }
            } else {
                ErrorReport::new(
                    ErrorCode::EngineUnavailable,
                    "No search engine configured; set SERPAPI_KEY or GOOGLE_CSE_KEY and GOOGLE_CSE_CX",
                )
                .into()
            }
        }
    }
}

fn engine_unavailable(detail: &str) -> ToolResult {
    ErrorReport::new(
        ErrorCode::EngineUnavailable,
        format!("Search engine not available: {detail}"),
    )
    .into()
}

fn configured_serpapi_key(search: &SearchConfig) -> Option<&str> {
    search
        .serpapi_configured()
        .then(|| search.serpapi_key.as_deref())
        .flatten()
}

fn configured_google_creds(search: &SearchConfig) -> Option<(&str, &str)> {
    if !search.google_configured() {
        return None;
    }
    Some((
        search.google_cse_key.as_deref()?,
        search.google_cse_cx.as_deref()?,
    ))
}

fn render(engine: &'static str, query: String, results: Vec<SearchResultItem>) -> ToolResult {
    let payload = SearchResponse {
        engine,
        query,
        results,
    };
    match serde_json::to_string(&payload) {
        Ok(json) => ToolResult::text(json),
        Err(e) => ErrorReport::new(
            ErrorCode::InternalError,
            format!("failed to serialize search results: {e}"),
        )
        .into(),
    }
}

async fn serpapi_search(
    http: &reqwest::Client,
    key: &str,
    query: &str,
    cap: usize,
    date_restrict: Option<&str>,
) -> Result<Vec<SearchResultItem>, ErrorReport> {
    let mut pairs: Vec<(&str, String)> = vec![
        ("engine", "google".to_string()),
        ("q", query.to_string()),
        ("num", cap.to_string()),
        ("api_key", key.to_string()),
    ];
    if let Some(dr) = date_restrict.filter(|s| !s.is_empty()) {
        // SerpAPI takes Google's qdr syntax: d7 → qdr:d7
        pairs.push(("tbs", format!("qdr:{dr}")));
    }

    let body = fetch_json(http, "https://serpapi.com/search.json", &pairs, "serpapi").await?;

    let mut out = Vec::new();
    if let Some(items) = body.get("organic_results").and_then(Value::as_array) {
        for item in items.iter().take(cap) {
            if let Some(result) = extract_item(item) {
                out.push(result);
            }
        }
    }
    Ok(out)
}

async fn google_search(
    http: &reqwest::Client,
    key: &str,
    cx: &str,
    query: &str,
    cap: usize,
    date_restrict: Option<&str>,
) -> Result<Vec<SearchResultItem>, ErrorReport> {
    let mut pairs: Vec<(&str, String)> = vec![
        ("key", key.to_string()),
        ("cx", cx.to_string()),
        ("q", query.to_string()),
        ("num", cap.to_string()),
    ];
    if let Some(dr) = date_restrict.filter(|s| !s.is_empty()) {
        pairs.push(("dateRestrict", dr.to_string()));
    }

    let body = fetch_json(
        http,
        "https://www.googleapis.com/customsearch/v1",
        &pairs,
        "google",
    )
    .await?;

    let mut out = Vec::new();
    if let Some(items) = body.get("items").and_then(Value::as_array) {
        for item in items.iter().take(cap) {
            if let Some(result) = extract_item(item) {
                out.push(result);
            }
        }
    }
    Ok(out)
}

/// GET a JSON endpoint, turning transport failures, non-2xx statuses, and
/// undecodable bodies into upstream-failure reports.
async fn fetch_json(
    http: &reqwest::Client,
    url: &str,
    pairs: &[(&str, String)],
    engine: &str,
) -> Result<Value, ErrorReport> {
    let resp = http.get(url).query(pairs).send().await.map_err(|e| {
        ErrorReport::new(
            ErrorCode::UpstreamFailure,
            format!("{engine} request failed: {e}"),
        )
    })?;

    let status = resp.status();
    let text = resp.text().await.map_err(|e| {
        ErrorReport::new(
            ErrorCode::UpstreamFailure,
            format!("{engine} response body unreadable: {e}"),
        )
    })?;

    if !status.is_success() {
        return Err(ErrorReport::new(
            ErrorCode::UpstreamFailure,
            format!(
                "{engine} returned HTTP {status}: {}",
                upstream_detail(&text)
            ),
        ));
    }

    serde_json::from_str(&text).map_err(|e| {
        ErrorReport::new(
            ErrorCode::UpstreamFailure,
            format!("{engine} returned malformed JSON: {e}"),
        )
    })
}

/// Pull the upstream's own error message out of an error body when present.
fn upstream_detail(body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        // Google: {"error": {"message": ...}}; SerpAPI: {"error": "..."}
        if let Some(msg) = v
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
        {
            return msg.to_string();
        }
        if let Some(msg) = v.get("error").and_then(Value::as_str) {
            return msg.to_string();
        }
    }
    let mut detail = body.trim().to_string();
    if detail.len() > 200 {
        detail.truncate(200);
    }
    detail
}

fn extract_item(item: &Value) -> Option<SearchResultItem> {
    let title = item.get("title").and_then(Value::as_str).unwrap_or("");
    let url = item.get("link").and_then(Value::as_str).unwrap_or("");
    if title.is_empty() || url.is_empty() {
        return None;
    }
    let snippet = item
        .get("snippet")
        .and_then(Value::as_str)
        .unwrap_or(title)
        .to_string();
    Some(SearchResultItem {
        title: title.to_string(),
        url: url.to_string(),
        snippet,
    })
}
