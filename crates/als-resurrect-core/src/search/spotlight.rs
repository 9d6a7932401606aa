use super::{stat_candidates, CandidateSearch, RecoveryCandidate};
use crate::error::Error;
use std::path::PathBuf;
use std::process::Command;
use tracing::trace;

const NAME_QUERY: &str = "kMDItemDisplayName";

/// Spotlight metadata search through the `mdfind` command.
#[derive(Debug, Clone)]
pub struct SpotlightSearch {
    program: String,
}

impl Default for SpotlightSearch {
    fn default() -> Self {
        Self {
            program: "mdfind".to_string(),
        }
    }
}

impl SpotlightSearch {
    pub fn with_program(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

/// Spotlight query matching a display name exactly.
pub fn display_name_query(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '\\' | '\'' | '*') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!("{} == '{}'", NAME_QUERY, escaped)
}

impl CandidateSearch for SpotlightSearch {
    fn search(&self, name: &str) -> Result<Vec<RecoveryCandidate>, Error> {
        let query = display_name_query(name);
        trace!("{} {}", self.program, query);

        let output = Command::new(&self.program)
            .arg(&query)
            .output()
            .map_err(|e| Error::Search(format!("could not run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(Error::Search(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let paths = stdout
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from);
        Ok(stat_candidates(paths))
    }
}
