//! Sequential lookup loop.

use std::io::Write;

use serde::Serialize;

use crate::lookup::{LookupError, LookupOutcome, PartRecord, PartSearch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Indented JSON per found part.
    #[default]
    Pretty,
    /// One line per result.
    Compact,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LookupSummary {
    pub found: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Drives a [`PartSearch`] over a list of parts, printing each result as
/// soon as it arrives.
pub struct LookupRunner<S: PartSearch> {
    search: S,
    format: OutputFormat,
}

impl<S: PartSearch> LookupRunner<S> {
    pub fn new(search: S, format: OutputFormat) -> Self {
        Self { search, format }
    }

    fn print(&self, out: &mut impl Write, outcome: &LookupOutcome) -> Result<(), LookupError> {
        match (outcome, self.format) {
            (LookupOutcome::Found { body, .. }, OutputFormat::Pretty) => {
                let text = serde_json::to_string_pretty(body).map_err(std::io::Error::from)?;
                writeln!(out, "{}", text)?;
            }
            _ => writeln!(out, "{}", outcome)?,
        }
        Ok(())
    }

    /// Look up every part in order, one request at a time. A failed part
    /// is reported and the batch continues.
    pub async fn run(
        &self,
        parts: &[PartRecord],
        skipped: usize,
        out: &mut impl Write,
    ) -> Result<LookupSummary, LookupError> {
        let mut summary = LookupSummary {
            skipped,
            ..LookupSummary::default()
        };
        for part in parts {
            let outcome = self.search.search(&part.mpn).await;
            if outcome.is_found() {
                summary.found += 1;
            } else {
                summary.failed += 1;
                tracing::debug!("Row {}: {}", part.row, outcome);
            }
            self.print(out, &outcome)?;
        }
        out.flush()?;
        tracing::info!(
            "Lookup finished: {} found, {} failed, {} skipped",
            summary.found,
            summary.failed,
            summary.skipped
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::FailureKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Fails part numbers starting with "X", records call order.
    struct FakeSearch {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PartSearch for FakeSearch {
        async fn search(&self, mpn: &str) -> LookupOutcome {
            self.calls.lock().unwrap().push(mpn.to_string());
            if mpn.starts_with('X') {
                LookupOutcome::Failed {
                    mpn: mpn.to_string(),
                    kind: FailureKind::Status(404),
                    detail: "Not Found".into(),
                }
            } else {
                LookupOutcome::Found {
                    mpn: mpn.to_string(),
                    body: json!({"part": mpn}),
                }
            }
        }
    }

    fn parts(mpns: &[&str]) -> Vec<PartRecord> {
        mpns.iter()
            .enumerate()
            .map(|(i, m)| PartRecord {
                row: i + 1,
                mpn: m.to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_batch_continues_after_failure() {
        let runner = LookupRunner::new(
            FakeSearch {
                calls: Mutex::new(Vec::new()),
            },
            OutputFormat::Compact,
        );
        let mut out = Vec::new();
        let summary = runner.run(&parts(&["A1", "X2", "B3"]), 1, &mut out).await.unwrap();

        assert_eq!(
            summary,
            LookupSummary {
                found: 2,
                failed: 1,
                skipped: 1
            }
        );
        assert_eq!(*runner.search.calls.lock().unwrap(), vec!["A1", "X2", "B3"]);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"part\":\"A1\"}\nFailed to fetch part number: X2 (HTTP 404)\n{\"part\":\"B3\"}\n"
        );
    }

    #[tokio::test]
    async fn test_pretty_output() {
        let runner = LookupRunner::new(
            FakeSearch {
                calls: Mutex::new(Vec::new()),
            },
            OutputFormat::Pretty,
        );
        let mut out = Vec::new();
        runner.run(&parts(&["A1"]), 0, &mut out).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\n  \"part\": \"A1\"\n}\n");
    }
}
