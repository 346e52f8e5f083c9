//! Stats command implementation.

use super::{print_json, stat_line, version, Keyed};
use segscope_core::{
    diag_stats, latest_footer, open_read_only, size_histograms, AggregatedStats, DumpOptions,
    FragStats, OutputFormat, SnapshotAggregator, StatValue, TraversalMode,
};
use std::collections::BTreeMap;
use std::path::PathBuf;

const NAME_WIDTH: usize = 25;
const DIAG_NAME_WIDTH: usize = 35;

/// Runs `stats footer`.
pub fn run_footer(
    dirs: &[PathBuf],
    mode: TraversalMode,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut out = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let store = open_read_only(dir)?;
        out.push((dir, SnapshotAggregator::new(&store).aggregate(mode)?));
    }

    match format {
        OutputFormat::Json => {
            let keyed: Vec<_> = out.iter().map(|(dir, stats)| Keyed::new(dir, stats)).collect();
            print_json(&keyed)?;
        }
        OutputFormat::Text => {
            for (dir, stats) in &out {
                println!("{}", dir.display());
                print!("{}", footer_text(stats));
            }
        }
    }
    Ok(())
}

/// Runs `stats fragmentation`.
pub fn run_fragmentation(
    dirs: &[PathBuf],
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut out = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let store = open_read_only(dir)?;
        out.push((dir, SnapshotAggregator::new(&store).fragmentation()?));
    }

    match format {
        OutputFormat::Json => {
            let keyed: Vec<_> = out.iter().map(|(dir, frag)| Keyed::new(dir, frag)).collect();
            print_json(&keyed)?;
        }
        OutputFormat::Text => {
            for (dir, frag) in &out {
                println!("{}", dir.display());
                print!("{}", fragmentation_text(frag));
            }
        }
    }
    Ok(())
}

/// Runs `stats diag`.
pub fn run_diag(dirs: &[PathBuf], format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let mut out = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let store = open_read_only(dir)?;
        out.push((dir, diag_stats(&store)?));
    }

    match format {
        OutputFormat::Json => {
            let keyed: Vec<_> = out.iter().map(|(dir, stats)| Keyed::new(dir, stats)).collect();
            print_json(&keyed)?;
        }
        OutputFormat::Text => {
            println!("{}", version::banner());
            for (dir, stats) in &out {
                println!("{}", dir.display());
                print!("{}", diag_text(stats));
            }
        }
    }
    Ok(())
}

/// Runs `stats hist`.
pub fn run_hist(dirs: &[PathBuf], options: &DumpOptions) -> Result<(), Box<dyn std::error::Error>> {
    for dir in dirs {
        let store = open_read_only(dir)?;
        let footer = latest_footer(&store)?;
        let (keys, values) = size_histograms(&footer, options)?;
        println!("{}", dir.display());
        println!("{}", keys.render());
        print!("{}", values.render());
    }
    Ok(())
}

fn footer_text(stats: &AggregatedStats) -> String {
    let mut text = String::new();
    for (name, footer) in stats.iter() {
        text.push_str(&name);
        text.push('\n');
        for (stat, value) in footer.to_map() {
            text.push_str(&stat_line(&stat, value, NAME_WIDTH));
            text.push('\n');
        }
    }
    text
}

fn fragmentation_text(frag: &FragStats) -> String {
    frag.entries()
        .iter()
        .map(|(name, value)| stat_line(name, value, NAME_WIDTH) + "\n")
        .collect()
}

fn diag_text(stats: &BTreeMap<String, StatValue>) -> String {
    stats
        .iter()
        .map(|(name, value)| stat_line(name, value, DIAG_NAME_WIDTH) + "\n")
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragmentation_text_lists_all_figures() {
        let text = fragmentation_text(&FragStats::compute(300, 200));
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], stat_line("fragmentation_bytes", -100, NAME_WIDTH));
        assert_eq!(lines[3], stat_line("fragmentation_percent", -50, NAME_WIDTH));
    }

    #[test]
    fn diag_text_is_sorted() {
        let mut stats = BTreeMap::new();
        stats.insert("total_persists".to_string(), StatValue::Scalar(2));
        stats.insert("num_segments".to_string(), StatValue::Scalar(1));
        stats.insert("segment_bytes".to_string(), StatValue::List(vec![3, 4]));

        let text = diag_text(&stats);
        let names: Vec<_> = text
            .lines()
            .map(|line| line.split(" : ").next().unwrap_or_default().trim())
            .collect();
        assert_eq!(names, ["num_segments", "segment_bytes", "total_persists"]);
        assert!(text.contains(" : [3 4]"));
    }
}
