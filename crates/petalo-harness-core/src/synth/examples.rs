//! Discovery of the init templates shipped under the macros directory.

use super::SynthesisError;
use globset::{Glob, GlobMatcher, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_EXAMPLE_EVENTS: u64 = 20;

const INIT_PATTERN: &str = "**/*.init.mac";
const EXCLUDED_PATTERNS: &[&str] = &["old/**", "**/old/**"];
const INIT_SUFFIX: &str = ".init.mac";
const CONFIG_SUFFIX: &str = ".config.mac";
const SINGLE_EVENT_TEMPLATES: &[&str] = &["PETit_ring_lutable.init.mac"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleMacro {
    /// Path relative to the macros root, always `/`-separated.
    pub name: String,
    pub init_template: PathBuf,
    pub event_count: u64,
}

/// Finds every init template below `macros_root` in sorted path order.
/// Anything under an `old/` directory, at any depth, is skipped.
pub fn discover_example_macros(macros_root: &Path) -> Result<Vec<ExampleMacro>, SynthesisError> {
    let init = compile(INIT_PATTERN)?;
    let excluded = compile_set(EXCLUDED_PATTERNS)?;

    let mut relative_paths = Vec::new();
    collect_relative_files(macros_root, macros_root, &mut relative_paths)?;
    relative_paths.sort();

    Ok(relative_paths
        .into_iter()
        .filter(|relative| init.is_match(relative) && !excluded.is_match(relative))
        .map(|relative| {
            let event_count = if SINGLE_EVENT_TEMPLATES.contains(&relative.as_str()) {
                1
            } else {
                DEFAULT_EXAMPLE_EVENTS
            };
            ExampleMacro {
                init_template: macros_root.join(&relative),
                name: relative,
                event_count,
            }
        })
        .collect())
}

/// Config template that belongs to an init template: same directory, with
/// `.init.mac` swapped for `.config.mac` in the file name.
pub fn paired_config_path(init_template: &Path) -> Option<PathBuf> {
    let file_name = init_template.file_name()?.to_str()?;
    let stem = file_name.strip_suffix(INIT_SUFFIX)?;
    Some(init_template.with_file_name(format!("{stem}{CONFIG_SUFFIX}")))
}

fn compile(pattern: &str) -> Result<GlobMatcher, SynthesisError> {
    Ok(glob(pattern)?.compile_matcher())
}

fn compile_set(patterns: &[&str]) -> Result<GlobSet, SynthesisError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(glob(pattern)?);
    }
    builder.build().map_err(|source| SynthesisError::InvalidPattern {
        pattern: patterns.join(", "),
        source,
    })
}

fn glob(pattern: &str) -> Result<Glob, SynthesisError> {
    Glob::new(pattern).map_err(|source| SynthesisError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn collect_relative_files(
    root: &Path,
    current_dir: &Path,
    results: &mut Vec<String>,
) -> Result<(), SynthesisError> {
    let scan_error = |path: &Path, source| SynthesisError::ScanTemplates {
        path: path.to_path_buf(),
        source,
    };

    let directory = fs::read_dir(current_dir).map_err(|source| scan_error(current_dir, source))?;
    for entry in directory {
        let entry = entry.map_err(|source| scan_error(current_dir, source))?;
        let entry_path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|source| scan_error(&entry_path, source))?;

        if file_type.is_dir() {
            collect_relative_files(root, &entry_path, results)?;
        } else if file_type.is_file() {
            let relative = entry_path
                .strip_prefix(root)
                .unwrap_or(&entry_path)
                .to_string_lossy()
                .replace('\\', "/");
            results.push(relative);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_EXAMPLE_EVENTS, discover_example_macros, paired_config_path};
    use crate::synth::SynthesisError;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent dir");
        }
        fs::write(path, "/run/verbose 0\n").expect("file written");
    }

    #[test]
    fn discovery_is_sorted_recursive_and_skips_old() {
        let temp = TempDir::new().expect("tempdir should be created");
        let root = temp.path();
        for relative in [
            "PETit.init.mac",
            "PETit.config.mac",
            "PETit_ring_lutable.init.mac",
            "PetBox/pet_box.init.mac",
            "old/legacy.init.mac",
            "old/nested/legacy.init.mac",
            "PetBox/old/legacy.init.mac",
            "PetBox/deep/old/stale.init.mac",
            "PetBox/golden/kept.init.mac",
            "README.md",
            "bold/kept.init.mac",
        ] {
            touch(root, relative);
        }

        let found = discover_example_macros(root).expect("discovery should succeed");
        let names = found
            .iter()
            .map(|example| example.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            [
                "PETit.init.mac",
                "PETit_ring_lutable.init.mac",
                "PetBox/golden/kept.init.mac",
                "PetBox/pet_box.init.mac",
                "bold/kept.init.mac",
            ]
        );
        assert_eq!(found[0].event_count, DEFAULT_EXAMPLE_EVENTS);
        assert_eq!(found[1].event_count, 1);
        assert_eq!(found[3].init_template, root.join("PetBox/pet_box.init.mac"));
    }

    #[test]
    fn missing_macros_root_is_a_scan_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let error = discover_example_macros(&temp.path().join("absent"))
            .expect_err("absent root should fail");
        assert!(matches!(error, SynthesisError::ScanTemplates { .. }));
    }

    #[test]
    fn config_pair_swaps_only_the_file_suffix() {
        assert_eq!(
            paired_config_path(Path::new("macros/init/PETit.init.mac")),
            Some(PathBuf::from("macros/init/PETit.config.mac"))
        );
        assert_eq!(paired_config_path(Path::new("macros/PETit.mac")), None);
    }
}
