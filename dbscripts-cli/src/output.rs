//! Terminal output formatting for all dbscripts commands.
//! Uses comfy-table for tabular output and colored for
//! severity-aware terminal styling.

use colored::Colorize;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};

use dbscripts_core::consolidate::CommitReport;
use dbscripts_core::{
    CheckReport, ConsolidateReport, ConsolidateSchemaReport, ListReport, OrphansReport,
    ReorderAllReport, ReorderReport, UnreachableReport,
};

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.into_iter().map(Cell::new).collect::<Vec<_>>());
    table
}

/// Print every script, then a per-schema summary.
pub fn print_list_report(report: &ListReport) {
    if report.scripts.is_empty() {
        println!("{}", "No scripts found.".yellow());
        return;
    }

    let mut table = new_table(vec!["Module", "Schema", "Script", "From", "To", "Type"]);
    for script in &report.scripts {
        let kind = if script.incremental {
            "Incremental".dimmed().to_string()
        } else {
            "Release".blue().to_string()
        };
        table.add_row(vec![
            Cell::new(&script.module),
            Cell::new(&script.schema),
            Cell::new(&script.filename),
            Cell::new(script.from_version),
            Cell::new(script.to_version),
            Cell::new(kind),
        ]);
    }
    println!("{table}");

    let mut summary = new_table(vec!["Module", "Schema", "Scripts", "Incremental", "Latest"]);
    for schema in &report.schemas {
        summary.add_row(vec![
            Cell::new(&schema.module),
            Cell::new(&schema.schema),
            Cell::new(schema.script_count),
            Cell::new(schema.incremental_count),
            Cell::new(schema.latest_version),
        ]);
    }
    println!("{summary}");
}

/// Print a reordered script, or a one-line summary when it was written back.
pub fn print_reorder_report(report: &ReorderReport, write: bool) {
    if !write {
        print!("{}", report.output);
        return;
    }

    if report.written {
        println!(
            "{}",
            format!("Reordered {}", report.path).green().bold()
        );
    } else {
        println!(
            "{}",
            format!("{} is already in order.", report.path).green()
        );
    }
}

/// Print the scripts whose statement order changes.
pub fn print_reorder_all_report(report: &ReorderAllReport, write: bool) {
    if report.changed.is_empty() {
        println!(
            "{}",
            format!(
                "Checked {} script(s). All are in order.",
                report.scripts_checked
            )
            .green()
            .bold()
        );
        return;
    }

    let verb = if write { "Reordered" } else { "Would reorder" };
    println!(
        "{}",
        format!(
            "{} {} of {} script(s):",
            verb,
            report.changed.len(),
            report.scripts_checked
        )
        .yellow()
        .bold()
    );
    for name in &report.changed {
        println!("  {} {}", "→".yellow(), name);
    }
    if write && report.written < report.changed.len() {
        println!(
            "{}",
            format!(
                "{} script(s) were not loaded from disk and were left alone.",
                report.changed.len() - report.written
            )
            .dimmed()
        );
    }
}

/// Print the schemas that need consolidation in a range.
pub fn print_consolidate_report(report: &ConsolidateReport) {
    if report.candidates.is_empty() {
        println!(
            "{}",
            format!(
                "No schemas need consolidation between {} and {}.",
                report.from, report.to
            )
            .green()
            .bold()
        );
        return;
    }

    let mut table = new_table(vec!["Module", "Schema", "Scripts", "Consolidated Script"]);
    for candidate in &report.candidates {
        table.add_row(vec![
            Cell::new(&candidate.module),
            Cell::new(&candidate.schema),
            Cell::new(candidate.scripts.join("\n")),
            Cell::new(&candidate.filename),
        ]);
    }
    println!("{table}");
}

/// Print a consolidated script with its warnings and commit outcome.
pub fn print_consolidate_schema_report(report: &ConsolidateSchemaReport) {
    let script = &report.script;

    match report.commit {
        Some(ref commit) => print_commit(commit),
        None => {
            println!(
                "{}",
                format!("-- {} ({} script(s))", script.filename, script.sources.len()).dimmed()
            );
            print!("{}", script.contents);
        }
    }

    for warning in &script.warnings {
        eprintln!("{} {}", "WARNING:".yellow().bold(), warning);
    }
}

fn print_commit(commit: &CommitReport) {
    println!(
        "{}",
        format!("Wrote {}", commit.written).green().bold()
    );
    for path in &commit.deleted {
        println!("  {} {}", "✗".red(), path);
    }
    for failure in &commit.failed {
        println!(
            "  {} {}: {}",
            "!".yellow().bold(),
            failure.path,
            failure.error.dimmed()
        );
    }
}

/// Print orphaned scripts and their successors.
pub fn print_orphans_report(report: &OrphansReport) {
    if report.orphans.is_empty() {
        println!(
            "{}",
            format!(
                "Checked {} script(s). No orphaned scripts.",
                report.scripts_checked
            )
            .green()
            .bold()
        );
        return;
    }

    let mut table = new_table(vec!["Module", "Schema", "Orphaned Script", "Superseded By"]);
    for entry in &report.orphans {
        table.add_row(vec![
            Cell::new(&entry.module),
            Cell::new(&entry.schema),
            Cell::new(entry.orphan.as_str().red().to_string()),
            Cell::new(&entry.successor),
        ]);
    }
    println!("{table}");
}

/// Print unreachable scripts batched by release.
pub fn print_unreachable_report(report: &UnreachableReport) {
    let checkpoints: Vec<String> = report.checkpoints.iter().map(|c| c.to_string()).collect();

    if report.batches.is_empty() {
        println!(
            "{}",
            format!(
                "All scripts are reachable when upgrading to {} from {}.",
                report.to,
                checkpoints.join(", ")
            )
            .green()
            .bold()
        );
        return;
    }

    println!(
        "{}",
        format!(
            "{} script(s) unreachable when upgrading to {} from {}:",
            report.total,
            report.to,
            checkpoints.join(", ")
        )
        .yellow()
        .bold()
    );

    let mut table = new_table(vec!["Module", "Schema", "Release", "Scripts"]);
    for batch in &report.batches {
        table.add_row(vec![
            Cell::new(&batch.module),
            Cell::new(&batch.schema),
            Cell::new(batch.release),
            Cell::new(batch.scripts.join("\n")),
        ]);
    }
    println!("{table}");
}

/// Print dialect check warnings.
pub fn print_check_report(report: &CheckReport) {
    if report.issues.is_empty() {
        println!(
            "{}",
            format!("Checked {} script(s). No issues found.", report.files_checked)
                .green()
                .bold()
        );
        return;
    }

    println!(
        "{}",
        format!(
            "Checked {} script(s): {} with warnings",
            report.files_checked, report.files_with_warnings
        )
        .bold()
    );
    println!();

    for issue in &report.issues {
        println!(
            "  {} {}/{} {}",
            "[warn]".yellow().bold(),
            issue.module,
            issue.script,
            issue.message
        );
    }
}
