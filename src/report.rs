//! Console rendering and on-disk artifacts for simulation results.
//!
//! Artifacts are written to temporary siblings and renamed into place only
//! once every file of a report is complete, so a failed run leaves neither a
//! half-written file nor a table without its summary.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::analysis::{AggregateResult, DistStats, StatusFrequencies};
use crate::config::{RunwayConfig, SimulationConfig, TriangularSpec};
use crate::error::ReportError;
use crate::resolver::{TrialOutcome, TrialStatus};
use crate::runway::{RunwayOutcome, RunwaySummary};

const BAR_WIDTH: usize = 50;
const IRR_BUCKETS: usize = 10;

/// One row of the per-trial table.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRow {
    pub trial: u64,
    pub status: TrialStatus,
    pub month: Option<u32>,
    pub final_equity: Option<f64>,
    pub irr: Option<f64>,
}

impl TrialRow {
    pub fn new(trial: u64, outcome: &TrialOutcome) -> Self {
        TrialRow {
            trial,
            status: outcome.status(),
            month: outcome.month().map(|m| m.0),
            final_equity: outcome.final_equity(),
            irr: outcome.irr(),
        }
    }
}

pub fn trial_rows(result: &AggregateResult) -> impl Iterator<Item = TrialRow> + '_ {
    result
        .outcomes
        .iter()
        .enumerate()
        .map(|(i, o)| TrialRow::new(i as u64, o))
}

#[derive(Serialize)]
struct PfSummary<'a> {
    iterations: usize,
    horizon: u32,
    frequencies: &'a StatusFrequencies,
    shares: Vec<(TrialStatus, f64)>,
    irr: &'a Option<DistStats>,
    default_month: &'a Option<DistStats>,
    default_histogram: &'a [usize],
}

#[derive(Serialize)]
struct RunwayReport<'a> {
    iterations: usize,
    months: u32,
    insolvency_rate_pct: f64,
    mean_exhaustion_month: f64,
    insolvent: usize,
    survived: usize,
    histogram: &'a [usize],
}

// ── Console ──────────────────────────────────────────────────────────────────

fn pct(spec: &TriangularSpec) -> String {
    format!("Tri({:.0}%, {:.0}%, {:.0}%)", spec.min * 100.0, spec.mode * 100.0, spec.max * 100.0)
}

/// Horizontal bar chart, bars scaled to the largest count.
pub fn bar_chart(rows: &[(String, usize)]) -> String {
    let max = rows.iter().map(|(_, n)| *n).max().unwrap_or(0);
    let label_width = rows.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (label, n) in rows {
        let len = if max == 0 { 0 } else { (n * BAR_WIDTH).div_ceil(max) };
        let bar = "#".repeat(len);
        let _ = writeln!(out, "  {label:>label_width$} | {bar:<width$} {n}", width = BAR_WIDTH);
    }
    out
}

fn month_rows(histogram: &[usize]) -> Vec<(String, usize)> {
    histogram
        .iter()
        .enumerate()
        .map(|(i, n)| (format!("M{}", i + 1), *n))
        .collect()
}

/// Equal-width IRR buckets between the smallest and largest exit IRR.
fn irr_rows(outcomes: &[TrialOutcome]) -> Vec<(String, usize)> {
    let irrs: Vec<f64> = outcomes.iter().filter_map(|o| o.irr()).collect();
    let (Some(lo), Some(hi)) = (
        irrs.iter().copied().reduce(f64::min),
        irrs.iter().copied().reduce(f64::max),
    ) else {
        return Vec::new();
    };
    let width = (hi - lo) / IRR_BUCKETS as f64;
    let mut counts = [0usize; IRR_BUCKETS];
    for irr in &irrs {
        let idx = if width > 0.0 {
            (((irr - lo) / width) as usize).min(IRR_BUCKETS - 1)
        } else {
            0
        };
        counts[idx] += 1;
    }
    counts
        .iter()
        .enumerate()
        .filter(|(i, _)| width > 0.0 || *i == 0)
        .map(|(i, n)| {
            let start = lo + width * i as f64;
            (format!("{:>7.1}%", start * 100.0), *n)
        })
        .collect()
}

fn dist_line(label: &str, ds: &DistStats, scale: f64) -> String {
    format!(
        "{label:>10} | {:>8.1} | {:>8.1} | {:>8.1} | {:>8.1} | {:>8.1} | {:>8.1} | {:>8.1} | {:>8.1} | {:>8.1}",
        ds.min * scale,
        ds.p5 * scale,
        ds.p25 * scale,
        ds.p50 * scale,
        ds.p75 * scale,
        ds.p95 * scale,
        ds.max * scale,
        ds.mean * scale,
        ds.std_dev * scale,
    )
}

/// Human-readable summary of a PF run.
pub fn render_pf_summary(result: &AggregateResult, config: &SimulationConfig) -> String {
    let mut out = String::new();
    let f = &result.frequencies;

    let _ = writeln!(out, "=== PF distress simulation (n={}, horizon M{}) ===", f.total, result.horizon.0);
    let _ = writeln!(
        out,
        "  Timeline: completion M{} (+ delay), refinancing M{}, exit M{}",
        config.timeline.completion_target,
        config.timeline.refinance_checkpoint,
        config.timeline.exit_month,
    );
    let _ = writeln!(
        out,
        "  Rates: construction {}, stabilization {}, exit {}",
        pct(&config.construction.rate),
        pct(&config.stabilization.rate),
        pct(&config.exit.rate),
    );

    let _ = writeln!(out, "\n--- Outcome frequencies ---");
    for status in TrialStatus::ALL {
        let _ = writeln!(
            out,
            "  {:<17} {:>7}  {:>6.2}%",
            status.as_str(),
            f.count(status),
            f.share(status) * 100.0
        );
    }
    let rows: Vec<(String, usize)> = TrialStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), f.count(*s)))
        .collect();
    out.push_str(&bar_chart(&rows));

    let _ = writeln!(out, "\n--- Insolvency ---");
    let _ = writeln!(out, "  Insolvency rate: {:.1}%", result.insolvency_rate() * 100.0);
    match result.mean_default_month() {
        Some(mean) => {
            let _ = writeln!(out, "  Avg. exhaustion: month {mean:.1}");
            let _ = writeln!(out, "\n--- Exhaustion month ---");
            out.push_str(&bar_chart(&month_rows(&result.default_histogram)));
        }
        None => {
            let _ = writeln!(out, "  Avg. exhaustion: n/a (no defaults)");
        }
    }

    let _ = writeln!(out, "\n--- Exit IRR (%) over exit trials ---");
    match &result.irr {
        Some(irr) => {
            let _ = writeln!(
                out,
                "{:>10} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8}",
                "", "min", "p5", "p25", "p50", "p75", "p95", "max", "mean", "stddev"
            );
            let _ = writeln!(out, "{}", dist_line("IRR", irr, 100.0));
            out.push_str(&bar_chart(&irr_rows(&result.outcomes)));
        }
        None => {
            let _ = writeln!(out, "  no exit trials");
        }
    }
    out
}

/// Human-readable summary of a runway run.
pub fn render_runway_summary(summary: &RunwaySummary, config: &RunwayConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Liquidity exhaustion risk (n={}) ===", summary.outcomes.len());
    let _ = writeln!(out, "  KEY RISK METRICS");
    let _ = writeln!(out, "   Insolvency Rate: {:.1}%", summary.insolvency_rate_pct());
    let _ = writeln!(out, "   Avg. Exhaustion: Month {:.1}", summary.mean_exhaustion_month());
    let _ = writeln!(out, "  ASSUMPTIONS");
    let _ = writeln!(out, "   Interest Rate : {}", pct(&config.rate));
    let _ = writeln!(out, "   Capitalization: {:.0}%", config.capitalization_ratio * 100.0);
    let _ = writeln!(out, "   Target Milestone: M{}", config.target_milestone);
    let _ = writeln!(out, "\n--- Month of exhaustion ---");
    let mut rows = month_rows(&summary.histogram);
    rows.push(("survived".to_string(), summary.survived));
    let milestone = format!("M{} ", config.target_milestone);
    for line in bar_chart(&rows).lines() {
        out.push_str(line);
        if line.trim_start().starts_with(&milestone) {
            out.push_str("  <- target milestone");
        }
        out.push('\n');
    }
    out
}

// ── Artifacts ────────────────────────────────────────────────────────────────

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ReportError + '_ {
    move |source| ReportError::Io { path: path.to_path_buf(), source }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// A fully written temporary file waiting to be renamed over `path`.
struct Staged {
    tmp: PathBuf,
    path: PathBuf,
}

/// Write `body` to a temporary sibling of `path`. Nothing is left on disk if
/// `body` fails.
fn stage<F>(path: &Path, body: F) -> Result<Staged, ReportError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), ReportError>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let tmp = temp_path(path);
    let result = (|| {
        let file = File::create(&tmp).map_err(io_err(&tmp))?;
        let mut writer = BufWriter::new(file);
        body(&mut writer)?;
        writer.flush().map_err(io_err(&tmp))
    })();
    match result {
        Ok(()) => Ok(Staged { tmp, path: path.to_path_buf() }),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

/// Rename every staged file into place. If any rename fails, files already
/// renamed and the remaining temporaries are removed.
fn commit(staged: &[Staged]) -> Result<(), ReportError> {
    for (i, file) in staged.iter().enumerate() {
        if let Err(source) = fs::rename(&file.tmp, &file.path) {
            for done in &staged[..i] {
                let _ = fs::remove_file(&done.path);
            }
            for pending in &staged[i..] {
                let _ = fs::remove_file(&pending.tmp);
            }
            return Err(ReportError::Io { path: file.path.clone(), source });
        }
    }
    Ok(())
}

/// Write the per-trial table and its summary; either both land or neither does.
fn write_pair<A, B>(table: &Path, write_table: A, summary: &Path, write_summary: B) -> Result<(), ReportError>
where
    A: FnOnce(&mut BufWriter<File>) -> Result<(), ReportError>,
    B: FnOnce(&mut BufWriter<File>) -> Result<(), ReportError>,
{
    let first = stage(table, write_table)?;
    let second = match stage(summary, write_summary) {
        Ok(second) => second,
        Err(e) => {
            let _ = fs::remove_file(&first.tmp);
            return Err(e);
        }
    };
    commit(&[first, second])
}

fn opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write the per-trial table as CSV and the aggregate summary as JSON next
/// to it (same stem, `.json`).
pub fn write_pf_report(result: &AggregateResult, path: &Path) -> Result<(), ReportError> {
    let summary = PfSummary {
        iterations: result.iterations(),
        horizon: result.horizon.0,
        frequencies: &result.frequencies,
        shares: TrialStatus::ALL
            .iter()
            .map(|s| (*s, result.frequencies.share(*s)))
            .collect(),
        irr: &result.irr,
        default_month: &result.default_month,
        default_histogram: &result.default_histogram,
    };
    let write_table = |w: &mut BufWriter<File>| -> Result<(), ReportError> {
        writeln!(w, "trial,status,month,final_equity,irr").map_err(io_err(path))?;
        for row in trial_rows(result) {
            writeln!(
                w,
                "{},{},{},{},{}",
                row.trial,
                row.status,
                opt(row.month),
                opt(row.final_equity),
                opt(row.irr),
            )
            .map_err(io_err(path))?;
        }
        Ok(())
    };
    let write_summary = |w: &mut BufWriter<File>| -> Result<(), ReportError> {
        serde_json::to_writer_pretty(&mut *w, &summary)?;
        Ok(())
    };
    write_pair(path, write_table, &path.with_extension("json"), write_summary)
}

/// Write runway outcomes as CSV (survivors at `months + 1`) plus a JSON summary.
pub fn write_runway_report(summary: &RunwaySummary, path: &Path) -> Result<(), ReportError> {
    let report = RunwayReport {
        iterations: summary.outcomes.len(),
        months: summary.months,
        insolvency_rate_pct: summary.insolvency_rate_pct(),
        mean_exhaustion_month: summary.mean_exhaustion_month(),
        insolvent: summary.insolvent,
        survived: summary.survived,
        histogram: &summary.histogram,
    };
    let write_table = |w: &mut BufWriter<File>| -> Result<(), ReportError> {
        writeln!(w, "trial,status,month").map_err(io_err(path))?;
        for (i, (outcome, month)) in summary
            .outcomes
            .iter()
            .zip(summary.exhaustion_months())
            .enumerate()
        {
            let status = match outcome {
                RunwayOutcome::Insolvent { .. } => "insolvent",
                RunwayOutcome::Survived => "survived",
            };
            writeln!(w, "{i},{status},{month}").map_err(io_err(path))?;
        }
        Ok(())
    };
    let write_summary = |w: &mut BufWriter<File>| -> Result<(), ReportError> {
        serde_json::to_writer_pretty(&mut *w, &report)?;
        Ok(())
    };
    write_pair(path, write_table, &path.with_extension("json"), write_summary)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::types::Month;

    fn sample_result() -> AggregateResult {
        AggregateResult::from_outcomes(
            vec![
                TrialOutcome::Default { month: Month(20) },
                TrialOutcome::RefiFail { month: Month(24), principal: 2.0, max_refinanceable: 1.0 },
                TrialOutcome::Exit { month: Month(36), final_equity: 1.5e9, irr: 0.25 },
                TrialOutcome::Exit { month: Month(36), final_equity: 0.0, irr: -1.0 },
            ],
            Month(36),
        )
    }

    #[test]
    fn csv_has_one_row_per_trial_with_blank_optional_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/pf.csv");
        write_pf_report(&sample_result(), &path).unwrap();

        let csv = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "trial,status,month,final_equity,irr");
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "0,default,20,,");
        assert_eq!(lines[3], "2,exit,36,1500000000,0.25");
        assert_eq!(lines[4], "3,exit,36,0,-1");

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path.with_extension("json")).unwrap()).unwrap();
        assert_eq!(json["iterations"], 4);
        assert_eq!(json["frequencies"]["exit"], 2);
        assert_eq!(json["irr"]["n"], 2);
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn failed_body_leaves_no_temporary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pf.csv");
        let staged = stage(&path, |_| {
            Err(ReportError::Io {
                path: PathBuf::from("x"),
                source: io::Error::other("boom"),
            })
        });
        assert!(staged.is_err());
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn failed_summary_rolls_back_the_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pf.csv");
        // The summary cannot be renamed over a directory.
        fs::create_dir(path.with_extension("json")).unwrap();

        let err = write_pf_report(&sample_result(), &path).unwrap_err();
        assert!(matches!(err, ReportError::Io { .. }));
        assert!(!path.exists());
        assert_eq!(entries(dir.path()), vec!["pf.json".to_string()]);
    }

    #[test]
    fn failed_runway_summary_rolls_back_the_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runway.csv");
        fs::create_dir(path.with_extension("json")).unwrap();
        let summary = RunwaySummary::from_outcomes(vec![RunwayOutcome::Survived], 30);

        assert!(write_runway_report(&summary, &path).is_err());
        assert!(!path.exists());
        assert_eq!(entries(dir.path()), vec!["runway.json".to_string()]);
    }

    #[test]
    fn runway_csv_encodes_survivors_after_horizon() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runway.csv");
        let summary = RunwaySummary::from_outcomes(
            vec![RunwayOutcome::Insolvent { month: Month(13) }, RunwayOutcome::Survived],
            30,
        );
        write_runway_report(&summary, &path).unwrap();
        let csv = fs::read_to_string(&path).unwrap();
        assert_eq!(csv, "trial,status,month\n0,insolvent,13\n1,survived,31\n");
    }

    #[test]
    fn pf_summary_mentions_every_status() {
        let text = render_pf_summary(&sample_result(), &SimulationConfig::canonical());
        for status in TrialStatus::ALL {
            assert!(text.contains(status.as_str()), "missing {status}");
        }
        assert!(text.contains("Insolvency rate: 25.0%"));
    }

    #[test]
    fn pf_summary_without_exits_says_so() {
        let result =
            AggregateResult::from_outcomes(vec![TrialOutcome::Default { month: Month(20) }], Month(36));
        let text = render_pf_summary(&result, &SimulationConfig::canonical());
        assert!(text.contains("no exit trials"));
    }

    #[test]
    fn runway_summary_shows_key_metrics() {
        let summary = RunwaySummary::from_outcomes(
            vec![RunwayOutcome::Insolvent { month: Month(12) }, RunwayOutcome::Survived],
            30,
        );
        let text = render_runway_summary(&summary, &RunwayConfig::canonical());
        assert!(text.contains("Insolvency Rate: 50.0%"));
        assert!(text.contains("Avg. Exhaustion: Month 12.0"));
        assert!(text.contains("Tri(9%, 14%, 16%)"));
        assert!(text.contains("Target Milestone: M14"));
    }

    #[test]
    fn runway_chart_marks_the_target_milestone() {
        let summary = RunwaySummary::from_outcomes(
            vec![
                RunwayOutcome::Insolvent { month: Month(1) },
                RunwayOutcome::Insolvent { month: Month(14) },
                RunwayOutcome::Insolvent { month: Month(15) },
            ],
            30,
        );
        let text = render_runway_summary(&summary, &RunwayConfig::canonical());
        let marked: Vec<&str> = text.lines().filter(|l| l.contains("<- target milestone")).collect();
        assert_eq!(marked.len(), 1);
        assert!(marked[0].trim_start().starts_with("M14 "));
    }

    #[test]
    fn bar_chart_scales_to_largest() {
        let chart = bar_chart(&[("a".to_string(), 10), ("b".to_string(), 5), ("c".to_string(), 0)]);
        let lines: Vec<&str> = chart.lines().collect();
        assert_eq!(lines[0].matches('#').count(), BAR_WIDTH);
        assert_eq!(lines[1].matches('#').count(), BAR_WIDTH / 2);
        assert_eq!(lines[2].matches('#').count(), 0);
    }
}
