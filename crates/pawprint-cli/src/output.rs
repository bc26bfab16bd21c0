//! JSON output formatting

use pawprint_core::{FingerprintRecord, SearchOutcome, SearchResult, SearchStatistics};
use serde::Serialize;

#[derive(Serialize)]
struct MatchOutput<'a> {
    /// Subject id, or the query image path
    query: &'a str,
    matches: usize,
    candidates_scanned: usize,
    #[serde(skip_serializing_if = "is_zero")]
    incompatible: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    corrupt: Vec<String>,
    results: &'a [SearchResult],
    #[serde(skip_serializing_if = "Option::is_none")]
    statistics: Option<&'a SearchStatistics>,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

#[derive(Serialize)]
struct GenerateOutput<'a> {
    subject_id: &'a str,
    species: &'a str,
    lifecycle_status: &'a str,
    extractor_version: &'a str,
    vector_len: Option<usize>,
    generated_at: String,
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}

/// Print a summary of a committed fingerprint
pub fn print_json_record(record: &FingerprintRecord) {
    print_json(&GenerateOutput {
        subject_id: record.subject_id.as_str(),
        species: record.species.as_str(),
        lifecycle_status: &record.lifecycle_status,
        extractor_version: &record.extractor_version,
        vector_len: record.vector_len(),
        generated_at: record.generated_at.to_rfc3339(),
    });
}

/// Print ranked matches, with statistics when requested
pub fn print_json_results(query: &str, outcome: &SearchOutcome, statistics: Option<&SearchStatistics>) {
    print_json(&MatchOutput {
        query,
        matches: outcome.matches_found,
        candidates_scanned: outcome.candidates_scanned,
        incompatible: outcome.incompatible,
        corrupt: outcome.corrupt.iter().map(|c| c.to_string()).collect(),
        results: &outcome.results,
        statistics,
    });
}

/// Print only the statistics record of a failed search
pub fn print_json_statistics(statistics: &SearchStatistics) {
    print_json(statistics);
}
