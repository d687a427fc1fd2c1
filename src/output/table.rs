use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::cycle::CycleReport;
use crate::grades::{ChangeEvent, ChangeKind};
use crate::snapshot::StateSnapshot;

pub fn render_events_table(events: &[ChangeEvent]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Change", "Module", "Evaluation", "Grade", "Mention"]);

    for event in events {
        let (label, color) = match event.kind {
            ChangeKind::NewGrade => ("NEW", Color::Green),
            ChangeKind::PlaceholderFilled => ("FILLED", Color::Green),
            ChangeKind::GradeUpdated => ("UPDATED", Color::Yellow),
            ChangeKind::GradeRetracted => ("RETRACTED", Color::Red),
            ChangeKind::Unchanged => ("-", Color::Reset),
        };
        let grade = match &event.old_grade {
            Some(old) => format!("{old} -> {}", event.new_grade),
            None => event.new_grade.clone(),
        };
        table.add_row(Row::from(vec![
            Cell::new(label).fg(color),
            Cell::new(event.evaluation.module_label()),
            Cell::new(&event.evaluation.description),
            Cell::new(grade),
            Cell::new(if event.escalate { "@everyone" } else { "" }),
        ]));
    }
    table.to_string()
}

pub fn render_report(report: &CycleReport) -> String {
    let semester = report
        .semester
        .as_ref()
        .map(|s| format!("{} ({})", s.title, s.id))
        .unwrap_or_else(|| "none".to_string());
    let mut out = format!(
        "Semester: {semester}\nLogin: {}\nInitialization: {}\n",
        report.auth,
        if report.initialization { "yes" } else { "no" }
    );
    if report.events.is_empty() {
        out.push_str("No grade changes.\n");
    } else {
        out.push_str(&render_events_table(&report.events));
        out.push('\n');
    }
    if report.rejected_records > 0 {
        out.push_str(&format!(
            "{} malformed record(s) skipped.\n",
            report.rejected_records
        ));
    }
    if report.delivery_failures > 0 {
        out.push_str(&format!(
            "{} notification delivery failure(s).\n",
            report.delivery_failures
        ));
    }
    out
}

pub fn render_snapshot_table(snapshot: &StateSnapshot) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Evaluation", "Last grade"]);
    for (id, grade) in snapshot.iter() {
        table.add_row(vec![id, grade]);
    }
    table.to_string()
}
