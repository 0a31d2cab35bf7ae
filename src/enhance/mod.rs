use anyhow::Result;
use clap::Args;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::graph::{decode_row, GraphStore, Statement};
use crate::telemetry::ops::enhance::Phase as EnhancePhase;
use crate::telemetry::{self};

pub mod client;
pub mod store;

use client::{EnhanceConfig, EntityEnhancer, KnowledgeClient};
use store::{mark_processed_statement, organization_statements, RawOrganization};

/// Fan-out ceiling: a small multiple of available parallelism, capped so the
/// knowledge API is never hammered.
pub fn worker_cap(requested: Option<usize>) -> usize {
    requested
        .unwrap_or_else(|| {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4);
            (cores * 5).min(20)
        })
        .max(1)
}

const SELECT_UNPROCESSED: &str = "\
MATCH (t:Tag)
WHERE t.type = 'Organization' AND t.processed IS NULL
RETURN t.name AS name
ORDER BY t.name
LIMIT $limit";

#[derive(Args)]
pub struct EnhanceCmd {
    /// How many unprocessed organizations to enhance
    #[arg(long, default_value_t = 20)]
    pub size: i64,
    /// Concurrent requests against the knowledge API
    #[arg(long)]
    pub concurrency: Option<usize>,
    #[arg(long, default_value_t = false)]
    pub apply: bool,
}

#[derive(Debug, Deserialize)]
struct NameRow {
    name: String,
}

#[derive(Serialize)]
pub struct EnhancePlan {
    pub candidates: usize,
    pub concurrency: usize,
    pub sample: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhanceOutcome {
    /// Entities that came back with organization facts.
    pub enhanced: usize,
    /// Entities the knowledge API had nothing for (still marked processed).
    pub no_data: usize,
    /// Entities whose lookup failed; left unprocessed for the next run.
    pub failed: usize,
}

pub async fn run(graph: &dyn GraphStore, args: EnhanceCmd) -> Result<()> {
    let log = telemetry::enhance();
    let _g = log
        .root_span_kv([
            ("apply", args.apply.to_string()),
            ("size", args.size.to_string()),
        ])
        .entered();

    let names = {
        let _s = log.span(&EnhancePhase::Select).entered();
        select_unprocessed(graph, args.size).await?
    };
    if names.is_empty() {
        log.info("ℹ️  No unprocessed organizations to enhance");
        return Ok(());
    }

    let cap = worker_cap(args.concurrency);

    if !args.apply {
        if telemetry::config::json_mode() {
            let plan = EnhancePlan {
                candidates: names.len(),
                concurrency: cap,
                sample: names.iter().take(10).cloned().collect(),
            };
            log.plan(&plan)?;
        } else {
            log.info(format!(
                "📝 Enhance plan — candidates={} concurrency={}",
                names.len(),
                cap
            ));
            for name in names.iter().take(10) {
                log.info(format!("  {name}"));
            }
            if names.len() > 10 {
                log.info(format!("  ... ({} more)", names.len() - 10));
            }
            log.info("   Use --apply to execute.");
        }
        return Ok(());
    }

    let client = KnowledgeClient::new(EnhanceConfig::from_env())?;
    let outcome = run_enhance(graph, &client, names, cap, &log).await?;

    log.info(format!(
        "✅ Enhanced {} organization(s) — no_data={} failed={}",
        outcome.enhanced, outcome.no_data, outcome.failed
    ));
    if telemetry::config::json_mode() {
        log.result(&outcome)?;
    }
    Ok(())
}

pub async fn select_unprocessed(
    graph: &dyn GraphStore,
    limit: i64,
) -> Result<Vec<String>, PipelineError> {
    let rows = graph
        .fetch_rows(Statement::new(SELECT_UNPROCESSED).param("limit", limit))
        .await?;
    rows.into_iter()
        .map(|row| decode_row::<NameRow>(row).map(|r| r.name))
        .collect()
}

/// Bounded concurrent enrichment. Each lookup is independent; failures are
/// logged and skipped so one flaky call never aborts the batch. All graph
/// writes land in one transaction at the end.
pub async fn run_enhance(
    graph: &dyn GraphStore,
    client: &dyn EntityEnhancer,
    names: Vec<String>,
    concurrency: usize,
    log: &crate::telemetry::ctx::LogCtx<crate::telemetry::ops::enhance::Enhance>,
) -> Result<EnhanceOutcome, PipelineError> {
    let fetched: Vec<(String, Result<client::EnhanceResponse, PipelineError>)> = {
        let _s = log.span(&EnhancePhase::Fetch).entered();
        stream::iter(names)
            .map(|name| async move {
                let response = client.enhance(&name, "Organization").await;
                (name, response)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await
    };

    let mut statements: Vec<Statement> = Vec::new();
    let mut outcome = EnhanceOutcome {
        enhanced: 0,
        no_data: 0,
        failed: 0,
    };

    for (name, result) in fetched {
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                log.warn_kv(
                    "⚠️ enhance lookup failed",
                    [("name", name.clone()), ("error", err.to_string())],
                );
                outcome.failed += 1;
                continue;
            }
        };

        let organization = response
            .data
            .first()
            .and_then(|hit| serde_json::from_value::<RawOrganization>(hit.entity.clone()).ok())
            .filter(|org| org.kind.as_deref() == Some("Organization"));

        match organization {
            Some(org) => {
                statements.extend(organization_statements(&name, &org));
                outcome.enhanced += 1;
            }
            None => {
                statements.push(mark_processed_statement(&name));
                outcome.no_data += 1;
            }
        }
    }

    if !statements.is_empty() {
        let _s = log.span(&EnhancePhase::Store).entered();
        graph.execute_batch(statements).await?;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enhance::client::{EnhanceHit, EnhanceResponse, MockEnhancer};
    use crate::graph::RecordingStore;
    use serde_json::json;

    #[test]
    fn worker_cap_is_bounded() {
        assert_eq!(worker_cap(Some(3)), 3);
        assert_eq!(worker_cap(Some(0)), 1);
        let derived = worker_cap(None);
        assert!(derived >= 1);
        assert!(derived <= 20);
    }

    #[tokio::test]
    async fn select_unprocessed_decodes_names() {
        let store = RecordingStore::new();
        store.push_rows(vec![json!({"name": "AMD"}), json!({"name": "Nvidia"})]);
        let names = select_unprocessed(&store, 10).await.unwrap();
        assert_eq!(names, vec!["AMD".to_string(), "Nvidia".to_string()]);
    }

    #[tokio::test]
    async fn enhance_splits_enriched_and_no_data() {
        let store = RecordingStore::new();
        let client = MockEnhancer::new();
        client.insert(
            "Nvidia",
            EnhanceResponse {
                data: vec![EnhanceHit {
                    entity: json!({
                        "type": "Organization",
                        "nbEmployees": 29600,
                        "ceo": {"name": "Jensen Huang", "type": "Person"}
                    }),
                }],
            },
        );

        let log = telemetry::enhance();
        let outcome = run_enhance(
            &store,
            &client,
            vec!["Nvidia".into(), "Ghost Corp".into()],
            4,
            &log,
        )
        .await
        .unwrap();

        assert_eq!(outcome.enhanced, 1);
        assert_eq!(outcome.no_data, 1);
        assert_eq!(outcome.failed, 0);
        assert_eq!(client.calls().len(), 2);

        // one transaction covering both entities
        let batches = store.batches();
        assert_eq!(batches.len(), 1);
        assert!(batches[0]
            .iter()
            .any(|s| s.text.contains("t.processed = true")));
        assert!(batches[0].iter().any(|s| s.text.contains("HAS_CEO")));
    }
}
