//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Trait for library tree nodes
pub trait TreeDisplay: Sized {
    fn id(&self) -> u32;
    fn label(&self) -> String;
    /// Short node kind shown next to the label
    fn kind(&self) -> String;
    fn children(&self) -> &[Self];
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Print a single item
pub fn print_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_header(T::headers());
            table.add_row(item.row());
            println!("{table}");
        }
        OutputFormat::Json => print_json(item),
        OutputFormat::Plain => {
            let row = item.row();
            for (header, value) in T::headers().iter().zip(row.iter()) {
                println!("{}: {}", header, value);
            }
        }
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() && format != OutputFormat::Json {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }
            println!("{table}");
        }
        OutputFormat::Json => print_json(items),
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print a library tree; `selected` is highlighted
pub fn print_tree<T: Serialize + TreeDisplay>(nodes: &[T], selected: Option<u32>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            print_json(&serde_json::json!({
                "nodes": nodes,
                "selected_id": selected.unwrap_or(0),
            }));
        }
        OutputFormat::Table => {
            let mut rows = Vec::new();
            flatten(nodes, 0, &mut rows);
            let mut table = new_table();
            table.set_header(vec!["ID", "Name", "Type"]);
            for (depth, node) in rows {
                let mut label = format!("{}{}", "  ".repeat(depth), node.label());
                if selected == Some(node.id()) {
                    label = format!("{} *", label);
                }
                table.add_row(vec![node.id().to_string(), label, node.kind()]);
            }
            println!("{table}");
        }
        OutputFormat::Plain => {
            let mut rows = Vec::new();
            flatten(nodes, 0, &mut rows);
            for (depth, node) in rows {
                let label = if selected == Some(node.id()) {
                    node.label().bold().to_string()
                } else {
                    node.label()
                };
                println!("{}{} {}", "  ".repeat(depth), node.id().to_string().dimmed(), label);
            }
        }
    }
}

fn flatten<'a, T: TreeDisplay>(nodes: &'a [T], depth: usize, out: &mut Vec<(usize, &'a T)>) {
    for node in nodes {
        out.push((depth, node));
        flatten(node.children(), depth + 1, out);
    }
}

/// Print an arbitrary JSON value
pub fn print_value<T: Serialize>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(value),
        _ => match serde_json::to_value(value) {
            Ok(serde_json::Value::Object(map)) => {
                for (key, value) in map {
                    println!("{}: {}", key, plain(&value));
                }
            }
            Ok(other) => println!("{}", plain(&other)),
            Err(_) => {}
        },
    }
}

fn plain(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Print a simple message
pub fn print_message(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "message": message })),
        _ => println!("{}", message),
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "!".yellow().bold(), message);
}
