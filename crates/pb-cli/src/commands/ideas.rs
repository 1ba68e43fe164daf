use pb_core::config::Config;
use pb_core::types::Idea;
use pb_core::view::{visible_ideas, ViewSelection};

use super::{api_client, friendly_error, truncate, IdeasArgs};

/// Run the `ideas` subcommand: fetch, filter, sort and print the list.
pub async fn run(cfg: &Config, args: &IdeasArgs) -> anyhow::Result<()> {
    println!("{}", render(cfg, args).await?);
    Ok(())
}

pub async fn render(cfg: &Config, args: &IdeasArgs) -> anyhow::Result<String> {
    let selection = ViewSelection {
        filter: args.filter.to_filter()?,
        sort: args.sort.unwrap_or(cfg.view.default_sort),
    };
    let batch = api_client(cfg)?
        .fetch_ideas(&selection.filter.query())
        .await
        .map_err(friendly_error)?;

    // The service may ignore some parameters; filter again locally.
    let mut ideas = visible_ideas(&batch.ideas, &selection);
    let matched = ideas.len();
    if let Some(limit) = args.limit {
        ideas.truncate(limit);
    }

    if args.json {
        return Ok(serde_json::to_string_pretty(&ideas)?);
    }
    Ok(render_table(&ideas, matched, batch.ideas.len()))
}

pub fn render_table(ideas: &[Idea], matched: usize, fetched: usize) -> String {
    if ideas.is_empty() {
        return if fetched == 0 {
            "No ideas yet.".to_string()
        } else {
            format!("No ideas match the filter ({fetched} fetched).")
        };
    }

    let mut out = format!(
        "{:<8} {:<11} {:<2} {:>6}  {:<12} {:<10}  {:<26} {}\n",
        "ID", "DECISION", "FT", "ICE", "TIER", "CREATED", "AGENT", "CONTENT"
    );
    for idea in ideas {
        out.push_str(&format!(
            "{:<8} {:<11} {:<2} {:>6}  {:<12} {:<10}  {:<26} {}\n",
            truncate(&idea.id, 8),
            idea.decision.label(),
            if idea.fast_track { "*" } else { "" },
            idea.ice_display(),
            idea.tier_label(),
            idea.created_display(),
            truncate(&idea.agent, 26),
            truncate(&idea.content, 60),
        ));
    }
    out.push_str(&format!(
        "{} shown, {matched} matching, {fetched} fetched",
        ideas.len()
    ));
    out
}

#[cfg(test)]
mod tests {
    use axum::{extract::Query, routing::get, Json, Router};
    use pb_core::types::Decision;
    use pb_core::view::SortKey;
    use serde_json::json;
    use std::collections::HashMap;

    use super::*;
    use crate::commands::test_support::serve;
    use crate::commands::FilterArgs;

    fn app() -> Router {
        Router::new().route(
            "/api/ideas",
            get(|| async {
                Json(json!({"ideas": [
                    {"id": 1, "content": "AI bookkeeping", "agent_name": "Hoddle Trend Scout",
                     "final_decision": "fast_track", "ice_plus_score": 9.8, "profit_tier": 1,
                     "created_at": "2025-08-08T10:00:00Z"},
                    {"id": 2, "content": "Dog walking", "agent_name": "Waddle Gap Finder",
                     "final_decision": "archive", "ice_plus_score": 2.1,
                     "created_at": "2025-08-09T10:00:00Z"},
                    {"id": 3, "content": "Drone survey", "agent_name": "Hoddle Gap Finder",
                     "final_decision": "review"}
                ]}))
            }),
        )
    }

    #[tokio::test]
    async fn lists_newest_first_by_default() {
        let cfg = serve(app()).await;
        let out = render(&cfg, &IdeasArgs::default()).await.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].starts_with("2 "));
        assert!(lines[2].starts_with("1 "));
        assert!(lines[3].contains("N/A"));
        assert!(lines[3].contains("Unknown"));
        assert!(out.ends_with("3 shown, 3 matching, 3 fetched"));
    }

    #[tokio::test]
    async fn filters_locally_when_server_ignores_params() {
        let cfg = serve(app()).await;
        let args = IdeasArgs {
            filter: FilterArgs {
                decision: Some(Decision::FastTrack),
                ..Default::default()
            },
            ..Default::default()
        };
        let out = render(&cfg, &args).await.unwrap();
        assert!(out.contains("AI bookkeeping"));
        assert!(!out.contains("Dog walking"));
        assert!(out.contains("$5k+/month"));
    }

    #[tokio::test]
    async fn decision_column_shows_decision_and_flag_separately() {
        let app = Router::new().route(
            "/api/ideas",
            get(|| async {
                Json(json!([
                    {"id": 5, "content": "Flagged approval", "final_decision": "approved",
                     "fast_track": true}
                ]))
            }),
        );
        let cfg = serve(app).await;
        let out = render(&cfg, &IdeasArgs::default()).await.unwrap();
        let row = out.lines().nth(1).unwrap();
        assert!(row.starts_with("5        Approved    * "));
        assert!(!out.contains("Fast Track"));

        let args = IdeasArgs {
            filter: FilterArgs {
                decision: Some(Decision::FastTrack),
                ..Default::default()
            },
            ..Default::default()
        };
        let out = render(&cfg, &args).await.unwrap();
        assert_eq!(out, "No ideas match the filter (1 fetched).");
    }

    #[tokio::test]
    async fn json_output_respects_sort_and_limit() {
        let cfg = serve(app()).await;
        let args = IdeasArgs {
            sort: Some(SortKey::IceScore),
            limit: Some(2),
            json: true,
            ..Default::default()
        };
        let out = render(&cfg, &args).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        let ids: Vec<&str> = v
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn forwards_filter_as_query() {
        let app = Router::new().route(
            "/api/ideas",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                Json(json!([{
                    "id": 9,
                    "content": format!("search={}", params.get("search").cloned().unwrap_or_default()),
                    "final_decision": params.get("decision").cloned().unwrap_or_default()
                }]))
            }),
        );
        let cfg = serve(app).await;
        let args = IdeasArgs {
            filter: FilterArgs {
                search: Some("Search".into()),
                decision: Some(Decision::Review),
                ..Default::default()
            },
            ..Default::default()
        };
        let out = render(&cfg, &args).await.unwrap();
        assert!(out.contains("search=search"));
        assert!(out.contains("Review"));
    }

    #[tokio::test]
    async fn empty_collection_message() {
        let app = Router::new().route("/api/ideas", get(|| async { Json(json!([])) }));
        let cfg = serve(app).await;
        let out = render(&cfg, &IdeasArgs::default()).await.unwrap();
        assert_eq!(out, "No ideas yet.");
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let app = Router::new().route(
            "/api/ideas",
            get(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "") }),
        );
        let cfg = serve(app).await;
        let err = render(&cfg, &IdeasArgs::default()).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));
    }
}
