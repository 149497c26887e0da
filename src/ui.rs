use colored::*;

use crate::{
    models::{day::Day, task::Task, weekday::describe_days},
    services::history::History,
};

/// Get the terminal width, defaulting to 80 if unavailable
fn get_terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(80)
}

/// Get the status glyph for a task on the viewed day
pub fn get_status_glyph(done: bool) -> ColoredString {
    if done { "✓".green() } else { "○".normal() }
}

/// Relative label for a day, e.g. "Today", "Tomorrow", "3 days ago"
pub fn relative_label(day: Day, today: Day) -> Option<String> {
    let offset = day.date().since(today.date()).ok()?.get_days();
    match offset {
        0 => Some("Today".to_string()),
        1 => Some("Tomorrow".to_string()),
        -1 => Some("Yesterday".to_string()),
        n if n > 1 && n < 7 => Some(format!("In {n} days")),
        n if n < -1 && n > -7 => Some(format!("{} days ago", -n)),
        _ => None,
    }
}

/// Render the header of a day view
pub fn render_day_header(day: Day, today: Day, count: usize) {
    let task_word = if count == 1 { "task" } else { "tasks" };
    let title = match relative_label(day, today) {
        Some(label) => format!("{} · {}", label, day),
        None => day.to_string(),
    };
    println!("\n  {} ({} {})\n", title.cyan().bold(), count, task_word);
}

/// Render a single task line with id, glyph, text and right-aligned schedule
pub fn render_task_line(task: &Task, done: bool) {
    let terminal_width = get_terminal_width();

    let id_str = format!("{:>8}", task.id);
    let glyph = get_status_glyph(done);
    let left_section = format!("  {}  {}  {}", id_str.dimmed(), glyph, task.text);
    let styled_left = if done {
        left_section.dimmed()
    } else {
        left_section.bold()
    };

    let schedule = describe_days(&task.days);
    let left_visible_len = format!("  {}  {}  {}", id_str, " ", task.text).chars().count();
    let total_content = left_visible_len + schedule.chars().count();

    if total_content + 4 < terminal_width {
        let padding = terminal_width - total_content - 2;
        println!("{}{}{}", styled_left, " ".repeat(padding), schedule.dimmed());
    } else {
        // Not enough space for right alignment, just print normally
        println!("{}", styled_left);
    }
}

/// Render the visible tasks of a day
pub fn render_day(day: Day, today: Day, tasks: &[(Task, bool)]) {
    render_day_header(day, today, tasks.len());
    if tasks.is_empty() {
        println!("  {}", "Nothing scheduled".dimmed());
        return;
    }
    for (task, done) in tasks {
        render_task_line(task, *done);
    }
}

/// Render the dates a task was completed on
pub fn render_task_history(task: &Task, dates: &[String]) {
    println!("\n  {} ({})\n", task.text.cyan().bold(), describe_days(&task.days));
    if dates.is_empty() {
        println!("  {}", "Never completed".dimmed());
        return;
    }
    for date in dates {
        println!("  {}  {}", "✓".green(), date);
    }
    println!("\n  {} {}", dates.len(), if dates.len() == 1 { "day" } else { "days" });
}

/// Render every recorded day with the number of tasks completed on it
pub fn render_history_overview(history: &History) {
    let recorded: Vec<_> = history.iter().filter(|(_, ids)| !ids.is_empty()).collect();
    if recorded.is_empty() {
        println!("\n  {}", "Nothing completed yet".dimmed());
        return;
    }
    println!();
    for (date, ids) in recorded {
        let task_word = if ids.len() == 1 { "task" } else { "tasks" };
        println!("  {}  {} {}", date.cyan(), ids.len(), task_word);
    }
}

pub fn render_filters(registered: &[&str], active: &[String]) {
    for name in registered {
        let on = active.iter().any(|a| a == name);
        println!("  {}  {}", get_status_glyph(on), name);
    }
}

/// Render the key bindings of the interactive browser
pub fn render_browse_help() {
    println!(
        "  {}  n next · p previous · t today · x <id> toggle · f [filter] · q quit",
        "keys".dimmed()
    );
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;

    use super::*;

    #[test]
    fn test_relative_label() {
        let today = Day::new(date(2018, 12, 24));
        assert_eq!(relative_label(today, today).as_deref(), Some("Today"));
        assert_eq!(relative_label(today.add_days(1), today).as_deref(), Some("Tomorrow"));
        assert_eq!(relative_label(today.sub_days(1), today).as_deref(), Some("Yesterday"));
        assert_eq!(relative_label(today.add_days(3), today).as_deref(), Some("In 3 days"));
        assert_eq!(relative_label(today.sub_days(4), today).as_deref(), Some("4 days ago"));
        assert_eq!(relative_label(today.add_days(30), today), None);
    }
}
