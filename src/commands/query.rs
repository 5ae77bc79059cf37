use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::Instant;

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::{info, warn};

use crate::channels::build_channel_queries;
use crate::cli::QueryArgs;
use crate::commands::{CachePaths, write_json_stdout};
use crate::index::{Channel, SqliteIndex};
use crate::model::RetrievalCandidate;
use crate::rerank::{cap, rerank};
use crate::retrieval::{RetrievalRequest, retrieve_with_trace};
use crate::weights::{ConfigStore, WeightVector};

#[derive(Debug, Serialize)]
struct QueryResponse<'a> {
    query: &'a str,
    tag: Option<&'a str>,
    cold_start: bool,
    shortlist: usize,
    limit: usize,
    weights: WeightVector,
    channel_rows: BTreeMap<Channel, usize>,
    skipped_channels: Vec<Channel>,
    failed_channels: Vec<Channel>,
    duration_ms: f64,
    returned: usize,
    results: Vec<RetrievalCandidate>,
}

pub fn run(args: QueryArgs) -> Result<()> {
    let paths = CachePaths::from_store(&args.store);
    if !paths.db_path.exists() {
        bail!("index database not found: {}", paths.db_path.display());
    }

    let query_text = args.query.trim();
    if query_text.is_empty() {
        bail!("query text must not be empty");
    }
    let tag = args
        .tag
        .as_deref()
        .map(str::trim)
        .filter(|tag| !tag.is_empty());

    let store = ConfigStore::new(&paths.config_path);
    let config = store.snapshot()?;
    let weights = store.load_weights(tag)?;
    let mut limits = store.load_limits(tag)?;
    if let Some(shortlist) = args.shortlist {
        limits.shortlist = shortlist;
    }
    if let Some(limit) = args.limit {
        limits.topk = limit;
    }

    let started = Instant::now();
    let queries = build_channel_queries(query_text, tag.unwrap_or_default(), &config.tuned_tags());
    let index = SqliteIndex::new(&paths.db_path);
    let request = RetrievalRequest::new(&queries, &weights, limits.shortlist).with_tag(tag.unwrap_or_default());
    let trace = retrieve_with_trace(&index, &request, &config.adjacency);

    if !trace.failed.is_empty() {
        warn!(
            failed = ?trace.failed,
            "some retrieval channels failed; results use the remaining channels"
        );
    }

    let reranked = rerank(
        trace.candidates,
        config.rerank.alpha,
        config.rerank.per_source_penalty,
        limits.topk,
    );
    let results = cap(reranked, weights.per_file_cap as usize);
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

    info!(
        tag = tag.unwrap_or_default(),
        cold_start = queries.cold_start,
        returned = results.len(),
        duration_ms,
        "query finished"
    );

    let response = QueryResponse {
        query: query_text,
        tag,
        cold_start: queries.cold_start,
        shortlist: limits.shortlist,
        limit: limits.topk,
        weights,
        channel_rows: trace.channel_rows,
        skipped_channels: trace.skipped,
        failed_channels: trace.failed,
        duration_ms,
        returned: results.len(),
        results,
    };

    if args.json {
        write_json_stdout(&response, "query")
    } else {
        write_text_response(&response)
    }
}

fn write_text_response(response: &QueryResponse<'_>) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Query: {}", response.query)?;
    writeln!(
        output,
        "Tag: {} cold_start={} shortlist={} limit={} duration_ms={:.3}",
        response.tag.unwrap_or("(none)"),
        response.cold_start,
        response.shortlist,
        response.limit,
        response.duration_ms,
    )?;
    let rows = response
        .channel_rows
        .iter()
        .map(|(channel, count)| format!("{channel}={count}"))
        .collect::<Vec<String>>()
        .join(" ");
    writeln!(output, "Channels: {rows}")?;
    writeln!(output, "Results: {}", response.returned)?;

    for (rank, result) in response.results.iter().enumerate() {
        writeln!(
            output,
            "{}.\t{}\tchunk={}\tscore={:.6}",
            rank + 1,
            result.file_path,
            result.chunk_id.as_deref().unwrap_or("-"),
            result.score,
        )?;
        writeln!(
            output,
            "\tpath={:.3} short={:.3} title={:.3} bm25={:.3} vec={:.3} adjacency={:.3}",
            result.s_path, result.s_short, result.s_title, result.s_bm25, result.s_vec, result.s_adjacency,
        )?;
        if let Some(snippet) = result.snippet.as_deref()
            && !snippet.is_empty()
        {
            writeln!(output, "\t{snippet}")?;
        }
    }

    output.flush()?;
    Ok(())
}
