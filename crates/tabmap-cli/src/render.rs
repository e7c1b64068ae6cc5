//! Terminal tables for sessions, auto-match reports and schemas.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use tabmap_map::{AutoMatchReport, ClassificationStore, closest_fields};
use tabmap_model::{Authority, Category, ColumnClassification, EntityType, FieldSchema, Phase};

/// Hints shown per unmatched column.
const HINT_LIMIT: usize = 3;

pub fn print_store(
    source_id: &str,
    tab: &str,
    restored_from: Option<&str>,
    store: &ClassificationStore,
    schema: &FieldSchema,
) {
    println!("Source: {source_id}");
    println!("Tab: {tab} (header row {})", store.header_row());
    println!("Phase: {}", store.phase());
    if let Some(restored_from) = restored_from {
        println!("Restored from: {restored_from}");
    }

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("#"),
        header_cell("Column"),
        header_cell("Category"),
        header_cell("Key"),
        header_cell("Field"),
        header_cell("Authority"),
        header_cell("Notes"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Center);
    for (index, column) in store.columns().iter().enumerate() {
        table.add_row(vec![
            Cell::new(index),
            Cell::new(&column.source_column),
            category_cell(column.category),
            key_cell(column),
            field_cell(column, schema),
            authority_cell(column.authority),
            notes_cell(column),
        ]);
    }
    println!("{table}");

    let summary = store.summary();
    println!(
        "{} columns, {} unclassified, {} mapped, {} suggested",
        summary.total, summary.unclassified, summary.mapped, summary.ai_suggested
    );
    for (entity, index) in &summary.keys {
        println!("{entity} key: column {index}");
    }
    if store.phase() == Phase::Map {
        print_hints(store, schema);
    }
}

/// Summarizes an auto-match pass.
pub fn print_match_report(report: &AutoMatchReport, store: &ClassificationStore) {
    println!(
        "Auto-matched {} field(s), {} column(s) left unmatched",
        report.assigned.len(),
        report.unmatched.len()
    );
    for assignment in &report.assigned {
        let name = store
            .column(assignment.index)
            .map_or("?", |c| c.source_column.as_str());
        println!("  {name} -> {}.{}", assignment.entity, assignment.field);
    }
}

fn print_hints(store: &ClassificationStore, schema: &FieldSchema) {
    let unmapped: Vec<(usize, &ColumnClassification, EntityType)> = store
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, column)| column.target_field.is_none())
        .filter_map(|(index, column)| column.category.entity().map(|e| (index, column, e)))
        .collect();
    if unmapped.is_empty() {
        return;
    }
    println!();
    println!("Unmapped entity columns:");
    for (index, column, entity) in unmapped {
        let hints: Vec<String> =
            closest_fields(&column.source_column, schema.fields_for(entity), HINT_LIMIT)
                .into_iter()
                .map(|hint| format!("{} ({:.2})", hint.field.name, hint.score))
                .collect();
        let hints = if hints.is_empty() {
            "-".to_string()
        } else {
            hints.join(", ")
        };
        println!("  [{index}] {} ({entity}): {hints}", column.source_column);
    }
}

/// Lists the fields of `schema`, optionally for one entity.
pub fn print_fields(schema: &FieldSchema, entity: Option<EntityType>) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Entity"),
        header_cell("Field"),
        header_cell("Label"),
        header_cell("Aliases"),
        header_cell("Group"),
    ]);
    apply_table_style(&mut table);
    let entities: Vec<EntityType> = match entity {
        Some(entity) => vec![entity],
        None => EntityType::ALL.to_vec(),
    };
    for entity in entities {
        for field in schema.fields_for(entity) {
            table.add_row(vec![
                category_cell(Category::from(entity)),
                Cell::new(&field.name).add_attribute(Attribute::Bold),
                Cell::new(&field.label),
                if field.aliases.is_empty() {
                    dim_cell("-")
                } else {
                    Cell::new(field.aliases.join(", "))
                },
                field.group.as_deref().map_or_else(|| dim_cell("-"), Cell::new),
            ]);
        }
    }
    println!("{table}");
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn category_cell(category: Category) -> Cell {
    let color = match category {
        Category::Partner => Color::Blue,
        Category::Staff => Color::Magenta,
        Category::Asin => Color::Cyan,
        Category::Weekly => Color::Yellow,
        Category::Computed => Color::Green,
        Category::Skip => Color::DarkGrey,
        Category::Unclassified => Color::Red,
    };
    Cell::new(category).fg(color)
}

fn key_cell(column: &ColumnClassification) -> Cell {
    if column.is_key {
        Cell::new("✓")
            .fg(Color::Green)
            .add_attribute(Attribute::Bold)
    } else {
        dim_cell("-")
    }
}

fn field_cell(column: &ColumnClassification, schema: &FieldSchema) -> Cell {
    match (&column.target_field, column.category.entity()) {
        (Some(field), Some(entity)) if schema.field(entity, field).is_some() => Cell::new(field),
        // fields restored from elsewhere may be missing from this schema
        (Some(field), _) => Cell::new(format!("{field}?")).fg(Color::Yellow),
        (None, _) => dim_cell("-"),
    }
}

fn authority_cell(authority: Authority) -> Cell {
    match authority {
        Authority::SourceOfTruth => Cell::new("source"),
        Authority::Reference => Cell::new("reference").fg(Color::DarkGrey),
    }
}

fn notes_cell(column: &ColumnClassification) -> Cell {
    let mut notes = Vec::new();
    if column.is_empty {
        notes.push("empty".to_string());
    }
    if column.ai_suggested {
        notes.push(format!("suggested {:.0}%", column.ai_confidence * 100.0));
    }
    if !column.tag_ids.is_empty() {
        let tags: Vec<&str> = column.tag_ids.iter().map(String::as_str).collect();
        notes.push(format!("tags: {}", tags.join(", ")));
    }
    if notes.is_empty() {
        dim_cell("")
    } else {
        Cell::new(notes.join("; "))
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
