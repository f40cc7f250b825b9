use colored::*;
use tasker_core::Task;

pub const RULE_WIDTH: usize = 100;

pub fn status_icon(task: &Task) -> &'static str {
    if task.completed {
        "✅"
    } else {
        "⏳"
    }
}

pub fn priority_icon(priority: i64) -> &'static str {
    match priority {
        p if p >= 4 => "🔴",
        2..=3 => "🟡",
        0..=1 => "🟢",
        _ => "⚪",
    }
}

pub fn due_label(task: &Task) -> String {
    task.due_date_string()
        .or_else(|| task.due_date_raw.clone())
        .unwrap_or_else(|| "—".to_string())
}

pub fn tags_label(task: &Task) -> String {
    let tags = task.tag_list();
    if tags.is_empty() {
        String::new()
    } else {
        tags.iter()
            .map(|t| format!("#{}", t))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn task_line(task: &Task) -> String {
    let title = if task.completed {
        task.title.dimmed().strikethrough().to_string()
    } else {
        task.title.white().bold().to_string()
    };
    format!(
        "{} {} {:>5} {:<10} {} {}",
        status_icon(task),
        priority_icon(task.priority),
        task.id.to_string().blue(),
        due_label(task),
        title,
        tags_label(task).dimmed()
    )
}

pub fn print_task_list(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("📭 No tasks found.");
        return;
    }

    println!("{}", "📋 Your Tasks:".bold());
    println!("{}", "─".repeat(RULE_WIDTH).dimmed());
    for task in tasks {
        println!("{}", task_line(task));
    }
    println!("{}", "─".repeat(RULE_WIDTH).dimmed());
    println!(
        "{}",
        "Legend: ✅=done ⏳=open | 🔴=priority 4-5 🟡=2-3 🟢=0-1".dimmed()
    );
}

pub fn print_task_detail(task: &Task, event_id: Option<&str>) {
    println!("{}", format!("📝 Task {}", task.id).bold().cyan());
    println!("{}", "─".repeat(40).dimmed());
    println!("Title:       {}", task.title.white().bold());
    if !task.description.is_empty() {
        println!("Description: {}", task.description);
    }
    println!("Due:         {}", due_label(task));
    println!(
        "Priority:    {} {}",
        priority_icon(task.priority),
        task.priority
    );
    println!("Tags:        {}", tags_label(task));
    println!(
        "Status:      {} {}",
        status_icon(task),
        if task.completed { "done" } else { "open" }
    );
    println!(
        "Updated:     {}",
        task.updated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed()
    );
    match event_id {
        Some(id) => println!("Calendar:    🔗 {}", id.green()),
        None => println!("Calendar:    {}", "not synced".dimmed()),
    }
}
