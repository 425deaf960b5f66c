//! Output formatting for evaluation reports and training summaries.
//!
//! - Terminal: human-readable output with colors and box drawing
//! - JSON: machine-readable serialization
//! - CSV: see [`Evaluation::to_csv`](crate::Evaluation::to_csv)

pub(crate) mod terminal;

pub use terminal::{format_evaluation, format_summary};

use crate::error::Result;
use crate::experiment::Evaluation;

/// Serialize an evaluation report to indented JSON.
pub fn to_json(evaluation: &Evaluation) -> Result<String> {
    Ok(serde_json::to_string_pretty(evaluation)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::EvaluationRow;

    #[test]
    fn json_keeps_rows_and_sources() {
        let evaluation = Evaluation {
            rows: vec![EvaluationRow {
                run_id: 1,
                order: 1,
                probe: 0,
                design: vec![0.25, 0.75],
                observation: -1.5,
            }],
            thetas: vec![vec![vec![0.1, 0.2]]],
        };
        let value: serde_json::Value = serde_json::from_str(&to_json(&evaluation).unwrap()).unwrap();
        assert_eq!(value["rows"][0]["design"][1], 0.75);
        assert_eq!(value["rows"][0]["run_id"], 1);
        assert_eq!(value["thetas"][0][0][0], 0.1);
    }
}
