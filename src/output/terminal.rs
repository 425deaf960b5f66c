//! Terminal output formatting with colors and box drawing.

use colored::Colorize;

use crate::experiment::Evaluation;
use crate::training::FitSummary;

/// Format an evaluation report for human-readable terminal output.
///
/// One box per run: the true sources, then every (round, probe) design and
/// observation in the order they were taken.
pub fn format_evaluation(evaluation: &Evaluation) -> String {
    let mut output = String::new();

    for (index, theta) in evaluation.thetas.iter().enumerate() {
        let run_id = index + 1;
        output.push_str(&format_box_top());
        let header = format!("Example run {}", run_id).bold().to_string();
        output.push_str(&format_box_line(&header));

        let sources: Vec<String> = theta.iter().map(|s| format_point(s)).collect();
        output.push_str(&format_box_line(&format!("True sources: {}", sources.join(" ")).dimmed().to_string()));
        output.push_str(&format_box_separator());

        for row in evaluation.run(run_id) {
            let line = format!(
                "Round {:>2}  probe {:>2}  xi = {}  y = {}",
                row.order,
                row.probe,
                format_point(&row.design),
                format!("{:+.3}", row.observation).cyan()
            );
            output.push_str(&format_box_line(&line));
        }
        output.push_str(&format_box_bottom());
    }

    output
}

/// Format the end-of-training summary.
pub fn format_summary(summary: &FitSummary, location: Option<&str>) -> String {
    let mut output = String::new();

    output.push_str(&format_box_top());
    output.push_str(&format_box_line(&"Training summary".bold().to_string()));
    output.push_str(&format_box_separator());

    output.push_str(&format_box_line(&format!("Steps: {}", summary.steps)));
    output.push_str(&format_box_line(&format!("Loss (tail average): {:.4}", summary.loss_av50)));

    let diff = format!("Relative change: {:+.1}%", summary.loss_diff50 * 100.0);
    let diff = if summary.loss_diff50 < 0.0 {
        diff.green()
    } else if summary.loss_diff50 > 0.0 {
        diff.red()
    } else {
        diff.normal()
    };
    output.push_str(&format_box_line(&diff.to_string()));
    output.push_str(&format_box_line(&format!("EIG lower bound: {:.4} nats", -summary.loss_av50)));

    if let Some(location) = location {
        output.push_str(&format_box_separator());
        output.push_str(&format_box_line(&format!("Model: {}", location)));
    }
    output.push_str(&format_box_bottom());

    output
}

fn format_point(coords: &[f64]) -> String {
    let parts: Vec<String> = coords.iter().map(|x| format!("{:.3}", x)).collect();
    format!("({})", parts.join(", "))
}

// Box drawing helpers

const BOX_WIDTH: usize = 60;

fn format_box_top() -> String {
    format!("\u{250C}{}\u{2510}\n", "\u{2500}".repeat(BOX_WIDTH))
}

fn format_box_bottom() -> String {
    format!("\u{2514}{}\u{2518}\n", "\u{2500}".repeat(BOX_WIDTH))
}

fn format_box_separator() -> String {
    format!("\u{251C}{}\u{2524}\n", "\u{2500}".repeat(BOX_WIDTH))
}

fn format_box_line(content: &str) -> String {
    // Strip ANSI codes for length calculation
    let visible_len = strip_ansi_codes(content).chars().count();
    let padding = (BOX_WIDTH - 2).saturating_sub(visible_len);
    format!("\u{2502} {}{} \u{2502}\n", content, " ".repeat(padding))
}

/// Strip ANSI escape codes for accurate length calculation.
fn strip_ansi_codes(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            while let Some(&next) = chars.peek() {
                chars.next();
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}
