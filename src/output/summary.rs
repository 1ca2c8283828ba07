use std::fmt::Write;

use comfy_table::{Cell, Color as TableColor};

use crate::report::{PipelineReport, StatusReport};
use crate::status::Status;

use super::styling::{bright, bright_yellow, cyan, dim, styled_status};
use super::tables::{
    color_coded_coverage_cell, color_coded_duration_cell, create_table, flag_cell, status_cell,
};

/// Prints a human-readable summary of reconciled pipelines to stdout.
///
/// Displays color-coded tables showing:
/// - Overview: pipeline/job counts, status edges observed, status breakdown
/// - Pipelines: derived status, timing, coverage, warnings and retryability
/// - Jobs: every record, with superseded attempts marked as retried
///
/// Color coding:
/// - Green: success, coverage ≥80%, durations ≤10min
/// - Yellow: in flight, coverage 50-80%, durations 10-15min
/// - Red: failed, coverage <50%, durations >15min
pub fn print_summary(report: &StatusReport) {
    println!("{}", render_summary(report));
}

/// Prints the cross-pipeline stage ordering.
pub fn print_stages(stages: &[String]) {
    if stages.is_empty() {
        println!("{}", bright_yellow("No stages found."));
        return;
    }
    println!("{} {}", dim("Stages:"), cyan(stages.join(" → ")));
}

// Helper functions

fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn count_by_status(pipelines: &[PipelineReport]) -> Vec<(Status, usize)> {
    Status::ALL
        .into_iter()
        .map(|status| {
            let count = pipelines.iter().filter(|p| p.status == status).count();
            (status, count)
        })
        .filter(|(_, count)| *count > 0)
        .collect()
}

fn count_recipients(report: &StatusReport) -> usize {
    report.notifications.iter().map(|n| n.recipients.len()).sum()
}

fn format_manual_actions(pipeline: &PipelineReport) -> String {
    if pipeline.manual_actions.is_empty() {
        "-".to_string()
    } else {
        pipeline.manual_actions.join("\n")
    }
}

pub fn render_summary(report: &StatusReport) -> String {
    let mut output = String::new();

    // Overview section
    add_section_header(&mut output, "📊", "Overview");

    let breakdown = count_by_status(&report.pipelines)
        .into_iter()
        .map(|(status, count)| format!("{} {}", styled_status(status), count))
        .collect::<Vec<_>>()
        .join(", ");

    let _ = write!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n\n",
        dim("Pipelines:"),
        bright_yellow(report.total_pipelines),
        dim("Job records:"),
        bright_yellow(report.total_jobs),
        dim("Status changes:"),
        bright_yellow(report.status_changes),
        dim("Recipients notified:"),
        bright_yellow(count_recipients(report)),
        dim("Statuses:"),
        if breakdown.is_empty() { dim("-").to_string() } else { breakdown },
        dim("Stages:"),
        cyan(report.stages.join(" → ")),
        dim("Generated:"),
        dim(report.generated_at.format("%Y-%m-%d %H:%M UTC"))
    );

    if report.pipelines.is_empty() {
        let _ = writeln!(output, "{}", bright_yellow("No pipeline data found."));
        return output;
    }

    // Pipelines
    add_section_header(&mut output, "📋", "Pipelines");

    let mut pipelines_table = create_table();
    pipelines_table.set_header(create_cyan_header(&[
        "ID",
        "Ref",
        "SHA",
        "Status",
        "Duration",
        "Coverage",
        "Warnings",
        "Retryable",
        "Manual Actions",
    ]));

    for pipeline in &report.pipelines {
        let ref_label = if pipeline.branch {
            pipeline.ref_.clone()
        } else {
            format!("{} (tag)", pipeline.ref_)
        };

        pipelines_table.add_row(vec![
            Cell::new(pipeline.id),
            Cell::new(ref_label),
            Cell::new(&pipeline.short_sha),
            status_cell(pipeline.status),
            color_coded_duration_cell(pipeline.duration),
            color_coded_coverage_cell(pipeline.coverage),
            flag_cell(pipeline.has_warnings, TableColor::Yellow),
            flag_cell(pipeline.retryable, TableColor::Red),
            Cell::new(format_manual_actions(pipeline)),
        ]);
    }

    let _ = write!(output, "{pipelines_table}\n\n");

    // Jobs
    add_section_header(&mut output, "🧱", "Jobs");

    let mut jobs_table = create_table();
    jobs_table.set_header(create_cyan_header(&[
        "Pipeline", "Job", "Stage", "Status", "Duration", "Coverage", "Retried",
    ]));

    for pipeline in &report.pipelines {
        for job in &pipeline.jobs {
            let name = if job.allow_failure {
                format!("{} (allowed to fail)", job.name)
            } else {
                job.name.clone()
            };
            let coverage = job
                .coverage
                .map_or_else(|| "-".to_string(), |c| format!("{c:.2}%"));

            jobs_table.add_row(vec![
                Cell::new(pipeline.id),
                Cell::new(name),
                Cell::new(&job.stage),
                status_cell(job.status),
                color_coded_duration_cell(job.duration),
                Cell::new(coverage),
                flag_cell(job.retried, TableColor::DarkGrey),
            ]);
        }
    }

    let _ = write!(output, "{jobs_table}\n\n");

    output
}
