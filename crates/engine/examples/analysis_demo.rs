//! Demonstration of the analysis engine
//!
//! Run with: cargo run --example analysis_demo -p tracelens-engine

use serde_json::json;
use std::sync::Arc;
use tracelens_engine::{Action, AnalysisEngine, EngineConfig, MemoryCacheTier, MemoryEntryStore};
use tracelens_types::{Entry, EntryKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("=== Telemetry Analysis Engine Demo ===\n");

    let store = Arc::new(MemoryEntryStore::new());
    seed_workload(&store).await;

    let engine = AnalysisEngine::new(
        store,
        Arc::new(MemoryCacheTier::new()),
        EngineConfig::default(),
    )?;

    // Demo 1: Per-kind summaries
    println!("1. Per-Kind Summaries");
    demo_summaries(&engine).await?;

    // Demo 2: Request statistics and performance score
    println!("\n2. Request Statistics");
    demo_statistics(&engine).await?;

    // Demo 3: Paginated listing
    println!("\n3. Paginated Listing");
    demo_listing(&engine).await?;

    // Demo 4: Statement analysis
    println!("\n4. Statement Analysis");
    demo_statement_analysis(&engine).await?;

    // Demo 5: Cache behavior
    println!("\n5. Cache Behavior");
    demo_cache(&engine).await?;

    println!("\n=== Demo Complete ===");
    Ok(())
}

async fn seed_workload(store: &MemoryEntryStore) {
    let mut entries = Vec::new();

    for i in 0..40 {
        let duration = 40.0 + (i % 7) as f64 * 35.0;
        entries.push(Entry::new(
            EntryKind::Request,
            json!({
                "uri": if i % 5 == 0 { "/api/reports" } else { "/api/users" },
                "method": "GET",
                "duration": if i % 5 == 0 { duration + 1400.0 } else { duration },
                "response_status": if i % 13 == 0 { 500 } else { 200 },
                "memory": 24.0 + (i % 3) as f64 * 8.0,
            }),
        ));
    }

    // an N+1 burst plus repeated count queries
    for i in 0..12 {
        entries.push(Entry::new(
            EntryKind::Query,
            json!({
                "sql": format!("SELECT * FROM profiles WHERE user_id = {i}"),
                "time": 6.5,
            }),
        ));
    }
    for _ in 0..3 {
        entries.push(Entry::new(
            EntryKind::Query,
            json!({"sql": "SELECT COUNT(*) FROM sessions", "time": 95.0}),
        ));
    }
    entries.push(Entry::new(
        EntryKind::Query,
        json!({"sql": "SELECT * FROM reports ORDER BY created_at", "time": 1350.0}),
    ));

    entries.push(Entry::new(
        EntryKind::Exception,
        json!({"class": "Timeout", "message": "upstream gave up", "file": "client.rs", "line": 88}),
    ));

    store.add_all(entries).await;
}

async fn demo_summaries(engine: &AnalysisEngine) -> anyhow::Result<()> {
    for kind in [EntryKind::Request, EntryKind::Query, EntryKind::Exception] {
        let summary = engine.execute(kind, Action::Summary, &json!({})).await?;
        println!(
            "  {:<10} total={} avg={:.1}",
            kind.as_str(),
            summary["total"],
            summary["stats"]["avg"].as_f64().unwrap_or(0.0),
        );
    }
    Ok(())
}

async fn demo_statistics(engine: &AnalysisEngine) -> anyhow::Result<()> {
    let stats = engine
        .execute(EntryKind::Request, Action::Stats, &json!({"period": "1h"}))
        .await?;

    println!("  Requests (last hour): {}", stats["total"]);
    println!(
        "  Duration avg={:.1}ms p95={:.1}ms",
        stats["stats"]["avg"].as_f64().unwrap_or(0.0),
        stats["stats"]["percentiles"]["p95"].as_f64().unwrap_or(0.0),
    );

    let score = &stats["performance"]["score"];
    println!(
        "  Performance score: {} ({})",
        score["score"],
        score["rating"].as_str().unwrap_or("?"),
    );
    for penalty in score["penalties"].as_array().into_iter().flatten() {
        println!(
            "    -{} {}",
            penalty["points"],
            penalty["reason"].as_str().unwrap_or(""),
        );
    }

    if let Some(top) = stats["performance"]["endpoints"].as_array().and_then(|e| e.first()) {
        println!(
            "  Slowest endpoint: {} avg={:.1}ms",
            top["endpoint"].as_str().unwrap_or("?"),
            top["avg_duration_ms"].as_f64().unwrap_or(0.0),
        );
    }
    Ok(())
}

async fn demo_listing(engine: &AnalysisEngine) -> anyhow::Result<()> {
    let page = engine
        .execute(EntryKind::Request, Action::List, &json!({"limit": 5}))
        .await?;

    println!(
        "  Page 1/{} ({} of {} entries, has_more={})",
        page["total_pages"], page["limit"], page["total"], page["has_more"],
    );
    for item in page["data"].as_array().into_iter().flatten() {
        println!(
            "    {} {} {:.1}ms",
            item["content"]["method"].as_str().unwrap_or("?"),
            item["content"]["uri"].as_str().unwrap_or("?"),
            item["content"]["duration"].as_f64().unwrap_or(0.0),
        );
    }
    println!(
        "  Response meta: {} bytes, ~{} tokens",
        page["meta"]["size_bytes"], page["meta"]["estimated_tokens"],
    );
    Ok(())
}

async fn demo_statement_analysis(engine: &AnalysisEngine) -> anyhow::Result<()> {
    let slow = engine
        .execute(EntryKind::Query, Action::Slow, &json!({}))
        .await?;
    println!(
        "  Slow queries (>{}ms): {}",
        slow["threshold_ms"],
        slow["slow_queries"].as_array().map(Vec::len).unwrap_or(0),
    );
    if let Some(worst) = slow["slow_queries"].as_array().and_then(|q| q.first()) {
        println!(
            "    worst: {:.0}ms [{}] {}",
            worst["time_ms"].as_f64().unwrap_or(0.0),
            worst["severity"].as_str().unwrap_or("?"),
            worst["sql"].as_str().unwrap_or("?"),
        );
    }

    let duplicates = engine
        .execute(EntryKind::Query, Action::Duplicates, &json!({}))
        .await?;
    for group in duplicates["duplicates"].as_array().into_iter().flatten() {
        println!(
            "  Duplicate x{}: {} (wasted {:.0}ms)",
            group["count"],
            group["sql"].as_str().unwrap_or("?"),
            group["wasted_time_ms"].as_f64().unwrap_or(0.0),
        );
    }

    let n_plus_one = engine
        .execute(EntryKind::Query, Action::NPlusOne, &json!({}))
        .await?;
    for pattern in n_plus_one["patterns"].as_array().into_iter().flatten() {
        println!("  N+1 x{}: {}", pattern["count"], pattern["signature"]);
        println!(
            "    suggestion: {}",
            pattern["suggestion"].as_str().unwrap_or(""),
        );
    }
    Ok(())
}

async fn demo_cache(engine: &AnalysisEngine) -> anyhow::Result<()> {
    for _ in 0..3 {
        engine
            .execute(EntryKind::Request, Action::Summary, &json!({}))
            .await?;
    }

    let stats = engine.cache_stats();
    println!(
        "  hits={} misses={} writes={} bypasses={}",
        stats.hits, stats.misses, stats.writes, stats.bypasses,
    );

    let dropped = engine.invalidate(Some(EntryKind::Request)).await?;
    println!("  invalidated {dropped} request-scoped results");
    Ok(())
}
