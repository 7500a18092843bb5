//! Output formatting for exec command results.

use super::execute::ExecResult;
use crate::output::Outputable;

impl Outputable for ExecResult {
    fn to_table(&self) -> String {
        match self.affected {
            1 => "1 row affected.".to_string(),
            n => format!("{} rows affected.", n),
        }
    }
}
