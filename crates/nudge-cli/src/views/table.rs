use chrono::{TimeZone, Utc};
use chrono_humanize::Humanize;
use chrono_tz::Tz;
use comfy_table::{Attribute, Cell, Color, Row, Table};
use nudge_core::dispatch::DispatchReport;
use nudge_core::models::{Contact, ExportRecord, StoreStats};
use nudge_core::recurrence::RepeatRule;
use nudge_core::time::MinuteKey;

/// "in 3 hours" style text for a fire time written in `tz`.
fn relative(fire_at: MinuteKey, tz: &Tz) -> Option<String> {
    tz.from_local_datetime(&fire_at.as_naive())
        .earliest()
        .map(|at| at.humanize())
}

pub fn display_reminders(records: &[ExportRecord], tz: &Tz) {
    if records.is_empty() {
        println!("No reminders found.");
        return;
    }

    let now = Utc::now().with_timezone(tz).naive_local();
    let mut table = Table::new();
    table.set_header(vec!["ID", "Text", "Repeat", "Next", "Times", "Recipients"]);

    for record in records {
        let mut row = Row::new();
        row.add_cell(Cell::new(record.event_id));

        let mut text = record.text.replace('\n', " ");
        if record.repeat.is_repeating() {
            text = format!("↻ {text}");
        }
        row.add_cell(Cell::new(text));

        let repeat_cell = Cell::new(record.repeat.to_string());
        row.add_cell(match record.repeat {
            RepeatRule::None => repeat_cell,
            _ => repeat_cell.fg(Color::Cyan),
        });

        let next_cell = match record.fire_times.first() {
            Some(&first) => {
                let text = relative(first, tz).unwrap_or_else(|| first.to_string());
                if first.as_naive() < now {
                    Cell::new(text).fg(Color::Red)
                } else {
                    Cell::new(text)
                }
            }
            None => Cell::new("None").fg(Color::DarkGrey),
        };
        row.add_cell(next_cell);

        let times: Vec<String> = record.fire_times.iter().map(ToString::to_string).collect();
        row.add_cell(Cell::new(times.join("\n")));
        row.add_cell(Cell::new(record.recipients.join(", ")));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_contacts(contacts: &[Contact]) {
    if contacts.is_empty() {
        println!("No contacts found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Chat ID", "Username", "Name", "Added"]);

    for contact in contacts {
        let mut row = Row::new();
        row.add_cell(Cell::new(contact.id));
        row.add_cell(Cell::new(contact.chat_id));
        row.add_cell(match &contact.username {
            Some(username) => Cell::new(format!("@{username}")).add_attribute(Attribute::Bold),
            None => Cell::new("None").fg(Color::DarkGrey),
        });
        let name = [contact.first_name.as_deref(), contact.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        row.add_cell(Cell::new(if name.is_empty() { "None".to_string() } else { name }));
        row.add_cell(Cell::new(contact.created_at.humanize()));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_stats(stats: &StoreStats) {
    let mut table = Table::new();
    table.set_header(vec!["Relation", "Rows"]);
    table.add_row(vec![Cell::new("contacts"), Cell::new(stats.contacts)]);
    table.add_row(vec![Cell::new("events"), Cell::new(stats.events)]);
    table.add_row(vec![Cell::new("occurrences"), Cell::new(stats.occurrences)]);
    table.add_row(vec![Cell::new("links"), Cell::new(stats.links)]);
    println!("{table}");
}

pub fn display_report(report: &DispatchReport) {
    if report.occurrences == 0 {
        println!("Nothing due.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Due", "Sent", "Failed sends", "Finalized", "Retried", "Postponed", "Skipped", "Update errors"]);
    let failed = Cell::new(report.failed_sends);
    let update_errors = Cell::new(report.failed_updates);
    table.add_row(vec![
        Cell::new(report.occurrences),
        Cell::new(report.sent).fg(Color::Green),
        if report.failed_sends > 0 { failed.fg(Color::Red) } else { failed },
        Cell::new(report.finalized),
        Cell::new(report.retried),
        Cell::new(report.postponed),
        Cell::new(report.skipped),
        if report.failed_updates > 0 { update_errors.fg(Color::Red) } else { update_errors },
    ]);
    println!("{table}");
}
