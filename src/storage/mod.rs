//! Persisted results between runs
//!
//! The results file is a JSON array of [`TestResult`]. Proxies already present
//! in it are skipped on the next run, and fresh results are merged in by name.

use crate::{
    error::{AppError, Result},
    models::{ProxyDescriptor, TestResult},
};
use std::{cmp::Ordering, collections::HashSet, fs, path::PathBuf};

/// JSON file holding the results of earlier runs
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Previous results; a missing file means none
    pub fn load(&self) -> Result<Vec<TestResult>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            AppError::io(format!("Failed to read results file '{}': {}", self.path.display(), e))
        })?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            AppError::parse(format!("Failed to parse results file '{}': {}", self.path.display(), e))
        })
    }

    pub fn save(&self, results: &[TestResult]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    AppError::io(format!("Failed to create directory '{}': {}", parent.display(), e))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(results)?;
        fs::write(&self.path, content).map_err(|e| {
            AppError::io(format!("Failed to write results file '{}': {}", self.path.display(), e))
        })
    }
}

/// Proxies whose name has no previous result, order preserved
pub fn select_untested(proxies: Vec<ProxyDescriptor>, previous: &[TestResult]) -> Vec<ProxyDescriptor> {
    let tested: HashSet<&str> = previous.iter().map(|r| r.proxy_name.as_str()).collect();
    proxies
        .into_iter()
        .filter(|p| !tested.contains(p.name.as_str()))
        .collect()
}

/// New results replace same-named previous ones in place; the rest are appended
pub fn merge_results(previous: Vec<TestResult>, fresh: Vec<TestResult>) -> Vec<TestResult> {
    let mut merged = previous;
    for result in fresh {
        match merged.iter_mut().find(|r| r.proxy_name == result.proxy_name) {
            Some(existing) => *existing = result,
            None => merged.push(result),
        }
    }
    merged
}

/// Download speed descending, then latency ascending; unreachable proxies last
pub fn sort_results(results: &mut [TestResult]) {
    results.sort_by(compare_results);
}

fn compare_results(a: &TestResult, b: &TestResult) -> Ordering {
    match (a.is_reachable(), b.is_reachable()) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }

    let speed = |r: &TestResult| r.download_speed.unwrap_or(0.0);
    speed(b)
        .partial_cmp(&speed(a))
        .unwrap_or(Ordering::Equal)
        .then_with(|| match (a.latency, b.latency) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}
