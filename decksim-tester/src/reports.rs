//! End-of-run reporting: console summary and CSV export.
//!
//! Rendering takes any writer so tests can capture output; only `main` points
//! it at stdout.

use chrono::Local;
use colored::Colorize;
use std::io::{self, Write};
use std::path::Path;

use crate::stats::{MatchupResult, TestRunSummary, MIN_COLOR_SAMPLE};
use crate::util::{format_hms, truncate};

const RANKED_COUNT: usize = 3;

/// Write the full post-run report.
///
/// # Errors
///
/// Propagates writer failures.
pub fn print_summary(out: &mut impl Write, summary: &TestRunSummary) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", format!("═══ Results: {} ═══", summary.deck_name).bold())?;
    writeln!(out)?;

    for matchup in &summary.matchups {
        print_matchup_line(out, matchup)?;
    }

    let totals = &summary.totals;
    writeln!(out)?;
    writeln!(
        out,
        "Overall: {}-{}-{}  ({:.1}% win rate over {} games)",
        totals.wins.to_string().green(),
        totals.losses.to_string().red(),
        totals.draws,
        summary.overall_win_rate() * 100.0,
        totals.valid_games(),
    )?;
    writeln!(out, "Average game length: {:.1} rounds", summary.average_rounds())?;

    if summary.is_multiparty() {
        print_color_analysis(out, summary)?;
    } else {
        print_matchup_rankings(out, summary)?;
    }

    writeln!(out)?;
    writeln!(
        out,
        "Completed {} of {} trials in {} ({:.1} games/min)",
        totals.played,
        totals.expected,
        format_hms(summary.duration),
        summary.games_per_minute(),
    )?;
    if totals.errors > 0 {
        writeln!(
            out,
            "{}",
            format!("{} trials errored or timed out and were excluded", totals.errors).yellow()
        )?;
    }
    Ok(())
}

fn print_matchup_line(out: &mut impl Write, m: &MatchupResult) -> io::Result<()> {
    let mut line = format!(
        "  vs {:<22} {}-{}-{}  ({:.1}%)",
        truncate(&m.opponent_name, 22),
        m.wins,
        m.losses,
        m.draws,
        m.win_rate() * 100.0,
    );
    if m.total_games() > 0 {
        line.push_str(&format!("  avg {:.1} rounds", m.average_rounds()));
    }
    if m.errors > 0 {
        line.push_str(&format!("  [{} errors]", m.errors));
    }
    writeln!(out, "{line}")
}

fn print_matchup_rankings(out: &mut impl Write, summary: &TestRunSummary) -> io::Result<()> {
    if summary.matchups.len() < 2 {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "{}", "Best matchups:".bold())?;
    for m in summary.best_matchups(RANKED_COUNT) {
        writeln!(
            out,
            "  {:<22} {:.1}% over {} games",
            truncate(&m.opponent_name, 22),
            m.win_rate() * 100.0,
            m.total_games(),
        )?;
    }
    writeln!(out, "{}", "Worst matchups:".bold())?;
    for m in summary.worst_matchups(RANKED_COUNT) {
        writeln!(
            out,
            "  {:<22} {:.1}% over {} games",
            truncate(&m.opponent_name, 22),
            m.win_rate() * 100.0,
            m.total_games(),
        )?;
    }
    Ok(())
}

/// Multi-party runs rank opponent color identities by weighted placement
/// rate instead of raw matchups.
fn print_color_analysis(out: &mut impl Write, summary: &TestRunSummary) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "Color identity analysis (weighted placements):".bold())?;

    let ranked = summary.ranked_color_stats();
    if ranked.is_empty() {
        writeln!(
            out,
            "  not enough data; rankings need at least {MIN_COLOR_SAMPLE} games per color"
        )?;
    } else {
        if let Some((key, stats)) = ranked.first() {
            writeln!(
                out,
                "  strongest against {}: {:.1}% weighted over {} games",
                key.bold(),
                stats.win_rate() * 100.0,
                stats.games,
            )?;
        }
        if ranked.len() > 1
            && let Some((key, stats)) = ranked.last()
        {
            writeln!(
                out,
                "  weakest against  {}: {:.1}% weighted over {} games",
                key.bold(),
                stats.win_rate() * 100.0,
                stats.games,
            )?;
        }
    }

    for (key, stats) in summary.faced_color_stats() {
        writeln!(
            out,
            "  {:<6} {:>5.1}%  {:>4} games  {:>5.1}+ / {:.1}- points  avg {:.1} rounds",
            key,
            stats.win_rate() * 100.0,
            stats.games,
            stats.weighted_wins,
            stats.weighted_losses,
            stats.average_rounds(),
        )?;
    }
    Ok(())
}

/// Export per-matchup rows as CSV, best win rate first.
///
/// # Errors
///
/// Propagates file creation and write failures.
pub fn save_results_csv(path: &Path, summary: &TestRunSummary) -> io::Result<()> {
    let mut out = io::BufWriter::new(std::fs::File::create(path)?);
    write_results_csv(&mut out, summary)?;
    out.flush()
}

/// CSV body, for callers that already hold a writer.
///
/// # Errors
///
/// Propagates writer failures.
pub fn write_results_csv(out: &mut impl Write, summary: &TestRunSummary) -> io::Result<()> {
    writeln!(
        out,
        "# {} tested {}",
        summary.deck_name,
        Local::now().format("%Y-%m-%d %H:%M:%S"),
    )?;
    writeln!(
        out,
        "opponent,colors,parties,wins,losses,draws,errors,win_rate,avg_rounds"
    )?;
    for m in summary.best_matchups(summary.matchups.len()) {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{:.4},{:.2}",
            csv_field(&m.opponent_name),
            m.opponent_colors,
            m.parties,
            m.wins,
            m.losses,
            m.draws,
            m.errors,
            m.win_rate(),
            m.average_rounds(),
        )?;
    }
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{ColorWeightedStats, TotalsSnapshot};
    use std::collections::HashMap;
    use std::time::Duration;

    fn matchup(name: &str, wins: u32, losses: u32, draws: u32) -> MatchupResult {
        let mut m = MatchupResult::new("Subject", name, "R", 2);
        m.wins = wins;
        m.losses = losses;
        m.draws = draws;
        m.total_turns = u64::from((wins + losses + draws) * 12);
        m
    }

    fn summary(matchups: Vec<MatchupResult>) -> TestRunSummary {
        let totals = TotalsSnapshot {
            wins: matchups.iter().map(|m| m.wins).sum(),
            losses: matchups.iter().map(|m| m.losses).sum(),
            draws: matchups.iter().map(|m| m.draws).sum(),
            errors: matchups.iter().map(|m| m.errors).sum(),
            played: matchups.iter().map(MatchupResult::recorded_trials).sum(),
            expected: matchups.iter().map(MatchupResult::recorded_trials).sum(),
        };
        TestRunSummary {
            deck_name: "Subject".to_string(),
            matchups,
            color_stats: HashMap::new(),
            totals,
            duration: Duration::from_secs(90),
        }
    }

    fn render(summary: &TestRunSummary) -> String {
        colored::control::set_override(false);
        let mut buf = Vec::new();
        print_summary(&mut buf, summary).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn pairwise_report_shows_matchups_and_rankings() {
        let text = render(&summary(vec![
            matchup("Goblins", 8, 2, 0),
            matchup("Control", 2, 8, 0),
        ]));
        assert!(text.contains("Results: Subject"));
        assert!(text.contains("vs Goblins"));
        assert!(text.contains("8-2-0"));
        assert!(text.contains("Best matchups:"));
        assert!(text.contains("Worst matchups:"));
        assert!(text.contains("00:01:30"));
    }

    #[test]
    fn errors_are_called_out_when_present() {
        let mut m = matchup("Goblins", 4, 4, 0);
        m.errors = 2;
        let text = render(&summary(vec![m]));
        assert!(text.contains("[2 errors]"));
        assert!(text.contains("2 trials errored"));
    }

    #[test]
    fn multiparty_report_ranks_color_identities() {
        let mut s = summary(vec![{
            let mut m = matchup("Pod", 6, 4, 0);
            m.parties = 4;
            m
        }]);
        s.color_stats.insert(
            "RG".to_string(),
            ColorWeightedStats {
                weighted_wins: 8.0,
                weighted_losses: 4.0,
                games: 10,
                total_turns: 400,
                parties: 4,
            },
        );
        let text = render(&s);
        assert!(text.contains("Color identity analysis"));
        assert!(text.contains("strongest against RG"));
        assert!(!text.contains("Best matchups:"));
    }

    #[test]
    fn sparse_multiparty_data_reports_the_sample_gate() {
        let mut s = summary(vec![{
            let mut m = matchup("Pod", 1, 1, 0);
            m.parties = 4;
            m
        }]);
        s.color_stats.insert(
            "W".to_string(),
            ColorWeightedStats {
                weighted_wins: 1.0,
                weighted_losses: 1.0,
                games: 2,
                total_turns: 60,
                parties: 4,
            },
        );
        let text = render(&s);
        assert!(text.contains("not enough data"));
        // The faced table still lists the sparse key.
        assert!(text.contains("W "));
    }

    #[test]
    fn csv_rows_are_sorted_and_quoted() {
        let dir = std::env::temp_dir().join(format!(
            "decksim-report-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("results.csv");

        let s = summary(vec![
            matchup("Weak, But Fun", 1, 9, 0),
            matchup("Goblins", 9, 1, 0),
        ]);
        save_results_csv(&path, &s).expect("save csv");
        let text = std::fs::read_to_string(&path).expect("read csv");
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("# Subject tested "));
        assert!(lines[1].starts_with("opponent,colors"));
        assert!(lines[2].starts_with("Goblins,"));
        assert!(lines[3].starts_with("\"Weak, But Fun\","));
    }
}
