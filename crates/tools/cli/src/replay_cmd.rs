//! `replay` command: rebuild a book from a journal and print it

use anyhow::{Context, Result};
use clap::Args;
use replay::{ReplayConfig, ReplaySummary, Replayer};
use std::fmt::Write;
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Journal with snapshot and diff records
    #[arg(long)]
    pub file: PathBuf,

    /// Levels to print per side
    #[arg(long, default_value_t = 10)]
    pub depth: usize,

    /// Stop after this many diffs (0 = all)
    #[arg(long, default_value_t = 0)]
    pub event_limit: u64,
}

pub fn run(args: &ReplayArgs) -> Result<()> {
    let summary = Replayer::new(ReplayConfig::capped(args.event_limit))
        .replay_file(&args.file)
        .with_context(|| format!("failed to replay {}", args.file.display()))?;

    print!("{}", render(&args.file, &summary, args.depth, args.event_limit));
    Ok(())
}

/// Console report: header, then bids and asks as `price | quantity`
pub fn render(file: &Path, summary: &ReplaySummary, depth: usize, event_limit: u64) -> String {
    let applied = if event_limit == 0 {
        "all".to_string()
    } else {
        summary.diffs_applied.to_string()
    };
    let top = summary.top_levels(depth);

    let mut out = String::new();
    let _ = writeln!(out, "Reconstructed order book from {}", file.display());
    let _ = writeln!(out, "Diff events applied: {applied}");
    for (title, levels) in [("BIDS", &top.bids), ("ASKS", &top.asks)] {
        let _ = writeln!(out);
        let _ = writeln!(out, "   ----- {title} (price | quantity) -----");
        for level in levels {
            let _ = writeln!(
                out,
                "{:>15} | {:>15}",
                level.price.to_string(),
                level.qty.to_string()
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{DepthDiff, PriceLevel};
    use lob::OrderBook;
    use rust_decimal_macros::dec;

    fn summary() -> ReplaySummary {
        let mut book = OrderBook::new();
        book.apply_snapshot(
            &[
                PriceLevel::new(dec!(30000.10000000), dec!(0.50000000)),
                PriceLevel::new(dec!(29999.5), dec!(12)),
            ],
            &[PriceLevel::new(dec!(30000.2), dec!(1.25))],
        );
        book.apply_diff(&DepthDiff::new(
            2,
            2,
            vec![],
            vec![PriceLevel::new(dec!(30001), dec!(3))],
        ));
        ReplaySummary {
            book,
            diffs_applied: 1,
            snapshots_loaded: 1,
            last_update_id: Some(2),
            stopped_at_limit: false,
        }
    }

    #[test]
    fn test_render_layout() {
        let text = render(Path::new("btcusdt_diffs.jsonl"), &summary(), 10, 0);
        let expected = [
            "Reconstructed order book from btcusdt_diffs.jsonl",
            "Diff events applied: all",
            "",
            "   ----- BIDS (price | quantity) -----",
            "        30000.1 |             0.5",
            "        29999.5 |              12",
            "",
            "   ----- ASKS (price | quantity) -----",
            "        30000.2 |            1.25",
            "          30001 |               3",
        ];
        assert_eq!(text.lines().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_render_capped_depth_and_count() {
        let text = render(Path::new("x.jsonl"), &summary(), 1, 5);
        assert!(text.contains("Diff events applied: 1\n"));
        assert_eq!(text.matches(" | ").count(), 4);
    }
}
