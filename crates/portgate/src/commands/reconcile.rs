//! Reconciliation and snapshot-refresh commands.

use serde::Serialize;
use tabled::Tabled;

use portgate_core::reconcile::Diagnostic;
use portgate_core::{ReconcileReport, Reconciler};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::Context;

fn engine(ctx: &Context) -> Reconciler {
    Reconciler::new(ctx.store.clone(), ctx.factory.clone())
        .with_concurrency(ctx.config.concurrency)
}

pub async fn handle(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let report = engine(ctx).run().await?;
    let rendered = output::render_single(
        &global.output,
        &report,
        render_report,
        |r| r.changed().to_string(),
    );
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub async fn handle_snapshot(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let (written, diagnostics) = engine(ctx).refresh_snapshots().await?;

    #[derive(Debug, Serialize)]
    struct SnapshotSummary {
        rows_written: usize,
        diagnostics: Vec<Diagnostic>,
    }

    let summary = SnapshotSummary {
        rows_written: written,
        diagnostics,
    };
    let rendered = output::render_single(
        &global.output,
        &summary,
        |s| {
            let mut out = format!("{} snapshot row(s) written", s.rows_written);
            for diag in &s.diagnostics {
                out.push_str(&format!("\nwarning: {diag}"));
            }
            out
        },
        |s| s.rows_written.to_string(),
    );
    output::print_output(&rendered, global.quiet);
    Ok(())
}

fn render_report(report: &ReconcileReport) -> String {
    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "METRIC")]
        metric: &'static str,
        #[tabled(rename = "COUNT")]
        count: usize,
    }

    let rows = vec![
        Row { metric: "machines correlated", count: report.correlated },
        Row { metric: "machines discovered", count: report.discovered },
        Row { metric: "bindings added", count: report.bindings_added },
        Row { metric: "bindings updated", count: report.bindings_updated },
        Row { metric: "snapshot rows written", count: report.snapshots_written },
    ];
    let mut out = tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string();
    for diag in &report.diagnostics {
        out.push_str(&format!("\nwarning: {diag}"));
    }
    out
}
