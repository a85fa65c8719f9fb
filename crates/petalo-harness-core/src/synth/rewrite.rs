//! Line-oriented path rewriting of control scripts.

use crate::domain::Substitution;
use std::path::Path;

pub const REGISTER_MACRO: &str = "/nexus/RegisterMacro";
pub const OUTPUT_FILE: &str = "/petalosim/persistency/output_file";
pub const HISTOGRAM_FILE: &str = "/Actions/PetAnalysisRunAction/histo_file";
pub const NTUPLE_FILE: &str = "/Actions/PetAnalysisRunAction/ntuple_file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteTarget {
    Staging,
    Output,
}

pub fn rewrite_target(directive: &str) -> Option<RewriteTarget> {
    match directive {
        REGISTER_MACRO => Some(RewriteTarget::Staging),
        OUTPUT_FILE | HISTOGRAM_FILE | NTUPLE_FILE => Some(RewriteTarget::Output),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RewriteRoots<'a> {
    pub staging_dir: &'a Path,
    pub output_dir: &'a Path,
}

impl RewriteRoots<'_> {
    fn root_for(&self, target: RewriteTarget) -> &Path {
        match target {
            RewriteTarget::Staging => self.staging_dir,
            RewriteTarget::Output => self.output_dir,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenScript {
    pub text: String,
    pub substitutions: Vec<Substitution>,
}

/// Rewrites allow-listed directives to point at the staging or output root.
///
/// Only the final path segment of the original argument is kept. Every other
/// line, line ending and blank line is copied through unchanged.
pub fn rewrite_script(text: &str, roots: &RewriteRoots<'_>) -> RewrittenScript {
    let mut rewritten = String::with_capacity(text.len());
    let mut substitutions = Vec::new();

    for line in text.split_inclusive('\n') {
        let (content, ending) = split_line_ending(line);
        match rewrite_line(content, roots) {
            Some((new_line, substitution)) => {
                rewritten.push_str(&new_line);
                rewritten.push_str(ending);
                substitutions.push(substitution);
            }
            None => rewritten.push_str(line),
        }
    }

    RewrittenScript {
        text: rewritten,
        substitutions,
    }
}

fn rewrite_line(content: &str, roots: &RewriteRoots<'_>) -> Option<(String, Substitution)> {
    let (directive, tail) = content.split_once(char::is_whitespace)?;
    let target = rewrite_target(directive)?;
    let old_value = tail.split_whitespace().next()?;
    let file_name = old_value.rsplit('/').next().unwrap_or(old_value);
    // A directory argument has no file name to carry over.
    if file_name.is_empty() || file_name == "." || file_name == ".." {
        return None;
    }
    let new_value = normalize_path(&roots.root_for(target).join(file_name));

    tracing::debug!(directive, old_value, new_value = %new_value, "rewrote script path");
    Some((
        format!("{} {}", directive, new_value),
        Substitution {
            directive: directive.to_string(),
            old_value: old_value.to_string(),
            new_value,
        },
    ))
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(content) = line.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = line.strip_suffix('\n') {
        (content, "\n")
    } else {
        (line, "")
    }
}

pub(crate) fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::{RewriteRoots, RewriteTarget, rewrite_script, rewrite_target};
    use std::path::Path;

    fn roots() -> RewriteRoots<'static> {
        RewriteRoots {
            staging_dir: Path::new("/tmp/staging"),
            output_dir: Path::new("/tmp/output"),
        }
    }

    #[test]
    fn allow_listed_directives_pick_their_root() {
        assert_eq!(
            rewrite_target("/nexus/RegisterMacro"),
            Some(RewriteTarget::Staging)
        );
        for directive in [
            "/petalosim/persistency/output_file",
            "/Actions/PetAnalysisRunAction/histo_file",
            "/Actions/PetAnalysisRunAction/ntuple_file",
        ] {
            assert_eq!(rewrite_target(directive), Some(RewriteTarget::Output));
        }
        assert_eq!(rewrite_target("/nexus/RegisterGeometry"), None);
    }

    #[test]
    fn rewriting_keeps_only_the_final_segment() {
        let script = "/nexus/RegisterMacro macros/PETit/PETit.config.mac\n\
                      /petalosim/persistency/output_file /data/runs/PETit\n";
        let rewritten = rewrite_script(script, &roots());

        assert_eq!(
            rewritten.text,
            "/nexus/RegisterMacro /tmp/staging/PETit.config.mac\n\
             /petalosim/persistency/output_file /tmp/output/PETit\n"
        );
        assert_eq!(rewritten.substitutions.len(), 2);
        assert_eq!(
            rewritten.substitutions[0].old_value,
            "macros/PETit/PETit.config.mac"
        );
        assert_eq!(rewritten.substitutions[1].new_value, "/tmp/output/PETit");
    }

    #[test]
    fn other_lines_pass_through_byte_for_byte() {
        let script = "\n### GEOMETRY   \r\n/nexus/RegisterGeometry PetBox  \n\n/run/verbose 1";
        let rewritten = rewrite_script(script, &roots());
        assert_eq!(rewritten.text, script);
        assert!(rewritten.substitutions.is_empty());
    }

    #[test]
    fn crlf_endings_survive_rewriting() {
        let rewritten = rewrite_script("/nexus/RegisterMacro a/b.mac\r\n#end", &roots());
        assert_eq!(
            rewritten.text,
            "/nexus/RegisterMacro /tmp/staging/b.mac\r\n#end"
        );
    }

    #[test]
    fn directory_arguments_are_left_alone() {
        let script = "/petalosim/persistency/output_file /data/runs/
                      /Actions/PetAnalysisRunAction/histo_file ..
";
        let rewritten = rewrite_script(script, &roots());
        assert_eq!(rewritten.text, script);
        assert!(rewritten.substitutions.is_empty());
    }

    #[test]
    fn directive_without_argument_is_left_alone() {
        let script = "/nexus/RegisterMacro\n/nexus/RegisterMacro   \n";
        assert_eq!(rewrite_script(script, &roots()).text, script);
    }
}
