//! Output formatting for batch command results.

use super::execute::BatchResult;
use crate::output::Outputable;

impl Outputable for BatchResult {
    fn to_table(&self) -> String {
        let mut lines = Vec::new();

        if let Some(affected) = self.affected {
            lines.push(format!("Rows affected: {}", affected));
            lines.push(String::new());
        }

        if self.sets.is_empty() {
            lines.push("No result sets.".to_string());
        }

        for (i, set) in self.sets.iter().enumerate() {
            if i > 0 {
                lines.push(String::new());
            }
            lines.push(format!("Result set {}:", i + 1));
            lines.push(set.to_table());
        }

        lines.join("\n")
    }
}
