use colored::Colorize;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use ndarray::s;

use crate::lookahead::LookaheadResults;
use crate::tree::Action;

/// Strategy of one batch instance: a row per hand, a column per root action,
/// followed by the opponent's achieved value and (when known) the re-solving
/// player's root value.
pub fn strategy_table(results: &LookaheadResults, actions: &[Action], hand_names: &[String], instance: usize) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![Cell::new("Hand")];
    for action in actions {
        header.push(Cell::new(styled_action(action)).set_alignment(CellAlignment::Right));
    }
    header.push(Cell::new("Opp CFV").set_alignment(CellAlignment::Right));
    if results.root_cfvs.is_some() {
        header.push(Cell::new("Root CFV").set_alignment(CellAlignment::Right));
    }
    table.set_header(header);

    let strategy = results.strategy.slice(s![.., instance, ..]);
    for (h, name) in hand_names.iter().enumerate() {
        let mut row = vec![Cell::new(name.bold().to_string())];
        for a in 0..actions.len() {
            row.push(Cell::new(probability(strategy[[a, h]])).set_alignment(CellAlignment::Right));
        }
        row.push(Cell::new(value(results.achieved_cfvs[[instance, h]])).set_alignment(CellAlignment::Right));
        if let Some(root) = &results.root_cfvs {
            row.push(Cell::new(value(root[[instance, h]])).set_alignment(CellAlignment::Right));
        }
        table.add_row(row);
    }

    table.to_string()
}

fn probability(p: f32) -> String {
    let text = format!("{:.1}%", p * 100.0);
    if p >= 0.995 {
        text.bold().to_string()
    } else if p < 0.005 {
        text.dimmed().to_string()
    } else {
        text
    }
}

fn value(v: f32) -> String {
    let text = format!("{:+.3}", v);
    if v >= 0.0 {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

pub fn styled_action(action: &Action) -> String {
    let label = action.to_string();
    match action {
        Action::Bet(_) | Action::AllIn => label.red().bold().to_string(),
        Action::Call => label.green().bold().to_string(),
        Action::Fold => label.dimmed().bold().to_string(),
        Action::Check => label.yellow().bold().to_string(),
    }
}

pub fn print_section(title: &str, content: &str) {
    println!("\n{}", title.cyan().bold());
    println!("  {}", content);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "Error:".red().bold(), msg);
}

pub fn print_success(msg: &str) {
    println!("{}", msg.green().bold());
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    #[test]
    fn table_lists_every_hand_and_action() {
        colored::control::set_override(false);
        let results = LookaheadResults {
            strategy: Array3::from_elem((2, 1, 2), 0.5),
            achieved_cfvs: Array2::zeros((1, 2)),
            children_cfvs: Array3::zeros((2, 1, 2)),
            root_cfvs: None,
            root_cfvs_both_players: None,
        };
        let names = vec!["A".to_string(), "B".to_string()];
        let table = strategy_table(&results, &[Action::Fold, Action::Call], &names, 0);
        assert!(table.contains("Fold"));
        assert!(table.contains("Call"));
        assert!(table.contains("50.0%"));
        assert!(!table.contains("Root CFV"));
    }
}
