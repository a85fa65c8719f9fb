mod examples;
mod rewrite;
mod templates;

pub use examples::{
    DEFAULT_EXAMPLE_EVENTS, ExampleMacro, discover_example_macros, paired_config_path,
};
pub use templates::is_reserved_directive;
pub use rewrite::{
    HISTOGRAM_FILE, NTUPLE_FILE, OUTPUT_FILE, REGISTER_MACRO, RewriteRoots, RewriteTarget,
    RewrittenScript, rewrite_script, rewrite_target,
};

use crate::domain::{GeneratedScript, HarnessError, Scenario, ScriptKind, ScriptPair};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error(
        "staged script '{}' already belongs to '{owner}'",
        path.display()
    )]
    PathCollision {
        scenario: String,
        path: PathBuf,
        owner: String,
    },
    #[error("template '{}' does not exist", path.display())]
    MissingTemplate { scenario: String, path: PathBuf },
    #[error("no value for required directive '{directive}'")]
    MissingConfigValue { scenario: String, directive: String },
    #[error("config option '{directive}' is set by the synthesizer itself")]
    ReservedDirective { scenario: String, directive: String },
    #[error("failed to read template '{}': {source}", path.display())]
    ReadTemplate {
        scenario: String,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create directory '{}': {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write script '{}': {source}", path.display())]
    WriteScript {
        scenario: String,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to scan templates under '{}': {source}", path.display())]
    ScanTemplates {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid template pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: globset::Error,
    },
}

impl SynthesisError {
    pub fn scenario(&self) -> Option<&str> {
        match self {
            Self::PathCollision { scenario, .. }
            | Self::MissingTemplate { scenario, .. }
            | Self::MissingConfigValue { scenario, .. }
            | Self::ReservedDirective { scenario, .. }
            | Self::ReadTemplate { scenario, .. }
            | Self::WriteScript { scenario, .. } => Some(scenario),
            Self::CreateDirectory { .. }
            | Self::ScanTemplates { .. }
            | Self::InvalidPattern { .. } => None,
        }
    }
}

impl From<SynthesisError> for HarnessError {
    fn from(error: SynthesisError) -> Self {
        let message = error.to_string();
        let scenario = error.scenario().map(str::to_string);
        let converted = match error {
            SynthesisError::PathCollision { .. } => {
                HarnessError::input_validation("SYNTH.PATH_COLLISION", message)
            }
            SynthesisError::MissingTemplate { .. } => {
                HarnessError::input_validation("SYNTH.MISSING_TEMPLATE", message)
            }
            SynthesisError::MissingConfigValue { .. } => {
                HarnessError::input_validation("SYNTH.MISSING_VALUE", message)
            }
            SynthesisError::ReservedDirective { .. } => {
                HarnessError::input_validation("SYNTH.RESERVED_DIRECTIVE", message)
            }
            SynthesisError::InvalidPattern { .. } => {
                HarnessError::internal("SYS.SYNTH_PATTERN", message)
            }
            SynthesisError::ReadTemplate { .. }
            | SynthesisError::CreateDirectory { .. }
            | SynthesisError::WriteScript { .. }
            | SynthesisError::ScanTemplates { .. } => {
                HarnessError::io_system("IO.SYNTH_FILESYSTEM", message)
            }
        };
        match scenario {
            Some(scenario) => converted.with_scenario(scenario),
            None => converted,
        }
    }
}

/// Renders control scripts into one staging directory.
///
/// The synthesizer remembers which scenario owns each staged file, so two
/// scenarios whose scripts share a file name cannot overwrite each other.
/// Rendering the same scenario again rewrites identical bytes.
#[derive(Debug)]
pub struct ScriptSynthesizer {
    staging_dir: PathBuf,
    output_dir: PathBuf,
    owners: BTreeMap<PathBuf, String>,
}

impl ScriptSynthesizer {
    pub fn new(staging_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            output_dir: output_dir.into(),
            owners: BTreeMap::new(),
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn render(&mut self, scenario: &Scenario) -> Result<ScriptPair, SynthesisError> {
        let init_body = templates::init_template(scenario)?;
        let config_body = templates::config_template(scenario)?;

        let pair = self.stage_pair(
            &scenario.name,
            StagedSource {
                file_name: ScriptKind::Init.file_name(&scenario.name),
                template_path: None,
                body: init_body,
            },
            StagedSource {
                file_name: ScriptKind::Config.file_name(&scenario.name),
                template_path: None,
                body: config_body,
            },
        )?;
        tracing::info!(
            scenario = %scenario.name,
            init = %pair.init.rendered_path.display(),
            "rendered scenario scripts"
        );
        Ok(pair)
    }

    /// Stages an existing init template and its paired config template.
    pub fn render_template(
        &mut self,
        owner: &str,
        init_template: &Path,
    ) -> Result<ScriptPair, SynthesisError> {
        let config_template = paired_config_path(init_template).ok_or_else(|| {
            SynthesisError::MissingTemplate {
                scenario: owner.to_string(),
                path: init_template.to_path_buf(),
            }
        })?;

        let init = read_template(owner, init_template)?;
        let config = read_template(owner, &config_template)?;

        self.stage_pair(owner, init, config)
    }

    fn stage_pair(
        &mut self,
        owner: &str,
        init: StagedSource,
        config: StagedSource,
    ) -> Result<ScriptPair, SynthesisError> {
        let init_path = self.staging_dir.join(&init.file_name);
        let config_path = self.staging_dir.join(&config.file_name);
        self.check_owner(owner, &init_path)?;
        self.check_owner(owner, &config_path)?;

        create_dir(&self.staging_dir)?;
        create_dir(&self.output_dir)?;

        let init = self.write_script(owner, ScriptKind::Init, init, init_path)?;
        let config = self.write_script(owner, ScriptKind::Config, config, config_path)?;
        Ok(ScriptPair { init, config })
    }

    fn check_owner(&self, owner: &str, path: &Path) -> Result<(), SynthesisError> {
        match self.owners.get(path) {
            Some(existing) if existing != owner => Err(SynthesisError::PathCollision {
                scenario: owner.to_string(),
                path: path.to_path_buf(),
                owner: existing.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn write_script(
        &mut self,
        owner: &str,
        kind: ScriptKind,
        source: StagedSource,
        rendered_path: PathBuf,
    ) -> Result<GeneratedScript, SynthesisError> {
        let roots = RewriteRoots {
            staging_dir: &self.staging_dir,
            output_dir: &self.output_dir,
        };
        let rewritten = rewrite_script(&source.body, &roots);

        fs::write(&rendered_path, rewritten.text.as_bytes()).map_err(|io_error| {
            SynthesisError::WriteScript {
                scenario: owner.to_string(),
                path: rendered_path.clone(),
                source: io_error,
            }
        })?;
        self.owners
            .insert(rendered_path.clone(), owner.to_string());

        Ok(GeneratedScript {
            kind,
            scenario_name: owner.to_string(),
            source_template_path: source.template_path,
            rendered_path,
            substitutions: rewritten.substitutions,
        })
    }
}

struct StagedSource {
    file_name: String,
    template_path: Option<PathBuf>,
    body: String,
}

fn read_template(owner: &str, path: &Path) -> Result<StagedSource, SynthesisError> {
    let body = fs::read_to_string(path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            SynthesisError::MissingTemplate {
                scenario: owner.to_string(),
                path: path.to_path_buf(),
            }
        } else {
            SynthesisError::ReadTemplate {
                scenario: owner.to_string(),
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| SynthesisError::MissingTemplate {
            scenario: owner.to_string(),
            path: path.to_path_buf(),
        })?;

    Ok(StagedSource {
        file_name,
        template_path: Some(path.to_path_buf()),
        body,
    })
}

fn create_dir(path: &Path) -> Result<(), SynthesisError> {
    fs::create_dir_all(path).map_err(|source| SynthesisError::CreateDirectory {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::{ScriptSynthesizer, SynthesisError};
    use crate::catalog::builtin_scenarios;
    use crate::domain::{HarnessError, ScriptKind};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn scenario(name: &str) -> crate::domain::Scenario {
        builtin_scenarios()
            .into_iter()
            .find(|scenario| scenario.name == name)
            .expect("builtin scenario")
    }

    #[test]
    fn render_points_init_at_staged_config_and_config_at_output() {
        let temp = TempDir::new().expect("tempdir should be created");
        let staging = temp.path().join("staging");
        let output = temp.path().join("output");
        let mut synthesizer = ScriptSynthesizer::new(&staging, &output);

        let pair = synthesizer
            .render(&scenario("ring_tiles"))
            .expect("render should succeed");

        assert_eq!(pair.init.kind, ScriptKind::Init);
        assert_eq!(pair.init.rendered_path, staging.join("ring_tiles.init.mac"));
        assert_eq!(pair.config.rendered_path, staging.join("ring_tiles.config.mac"));
        assert!(output.is_dir());

        let init = fs::read_to_string(&pair.init.rendered_path).expect("init readable");
        assert!(init.contains(&format!(
            "/nexus/RegisterMacro {}\n",
            slash(&staging.join("ring_tiles.config.mac"))
        )));

        let config = fs::read_to_string(&pair.config.rendered_path).expect("config readable");
        let output_lines = config
            .lines()
            .filter(|line| line.starts_with("/petalosim/persistency/output_file "))
            .collect::<Vec<_>>();
        assert_eq!(
            output_lines,
            [format!(
                "/petalosim/persistency/output_file {}",
                slash(&output.join("ring_tiles"))
            )]
        );
        assert_eq!(pair.config.substitutions.len(), 1);
        assert_eq!(pair.config.substitutions[0].old_value, "ring_tiles");
    }

    #[test]
    fn rerendering_is_byte_identical() {
        let temp = TempDir::new().expect("tempdir should be created");
        let staging = temp.path().join("staging");
        let output = temp.path().join("output");
        let petit = scenario("petit");

        let first = ScriptSynthesizer::new(&staging, &output)
            .render(&petit)
            .expect("first render");
        let first_init = fs::read(&first.init.rendered_path).expect("init readable");
        let first_config = fs::read(&first.config.rendered_path).expect("config readable");

        let mut synthesizer = ScriptSynthesizer::new(&staging, &output);
        synthesizer.render(&petit).expect("second render");
        let second = synthesizer.render(&petit).expect("same owner may re-render");

        assert_eq!(first, second);
        assert_eq!(
            fs::read(&second.init.rendered_path).expect("init readable"),
            first_init
        );
        assert_eq!(
            fs::read(&second.config.rendered_path).expect("config readable"),
            first_config
        );
    }

    #[test]
    fn templates_sharing_a_file_name_collide_across_owners() {
        let temp = TempDir::new().expect("tempdir should be created");
        let macros = temp.path().join("macros");
        write_pair(&macros.join("a"), "PETit", "/run/verbose 1\n");
        write_pair(&macros.join("b"), "PETit", "/run/verbose 2\n");

        let mut synthesizer =
            ScriptSynthesizer::new(temp.path().join("staging"), temp.path().join("output"));
        synthesizer
            .render_template("a/PETit.init.mac", &macros.join("a/PETit.init.mac"))
            .expect("first template stages");
        let error = synthesizer
            .render_template("b/PETit.init.mac", &macros.join("b/PETit.init.mac"))
            .expect_err("second template collides");

        match &error {
            SynthesisError::PathCollision {
                scenario, owner, ..
            } => {
                assert_eq!(scenario, "b/PETit.init.mac");
                assert_eq!(owner, "a/PETit.init.mac");
            }
            other => panic!("unexpected error: {other}"),
        }
        let staged = fs::read_to_string(temp.path().join("staging/PETit.config.mac"))
            .expect("first config stays staged");
        assert_eq!(staged, "/run/verbose 1\n");

        let error = HarnessError::from(error);
        assert_eq!(error.placeholder(), "SYNTH.PATH_COLLISION");
        assert_eq!(error.scenario(), Some("b/PETit.init.mac"));
    }

    #[test]
    fn template_rendering_rewrites_paths_and_records_sources() {
        let temp = TempDir::new().expect("tempdir should be created");
        let dir = temp.path().join("macros");
        fs::create_dir_all(&dir).expect("macro dir");
        let init_path = dir.join("PetBox.init.mac");
        fs::write(
            &init_path,
            "/nexus/RegisterGeometry PetBox\n/nexus/RegisterMacro macros/PetBox.config.mac\n",
        )
        .expect("init written");
        fs::write(
            dir.join("PetBox.config.mac"),
            "/Actions/PetAnalysisRunAction/histo_file out/histo.root\n",
        )
        .expect("config written");

        let staging = temp.path().join("staging");
        let output = temp.path().join("output");
        let pair = ScriptSynthesizer::new(&staging, &output)
            .render_template("PetBox.init.mac", &init_path)
            .expect("template stages");

        assert_eq!(pair.init.source_template_path.as_deref(), Some(init_path.as_path()));
        let init = fs::read_to_string(&pair.init.rendered_path).expect("init readable");
        assert_eq!(
            init,
            format!(
                "/nexus/RegisterGeometry PetBox\n/nexus/RegisterMacro {}\n",
                slash(&staging.join("PetBox.config.mac"))
            )
        );
        let config = fs::read_to_string(&pair.config.rendered_path).expect("config readable");
        assert_eq!(
            config,
            format!(
                "/Actions/PetAnalysisRunAction/histo_file {}\n",
                slash(&output.join("histo.root"))
            )
        );
    }

    #[test]
    fn missing_config_template_is_reported() {
        let temp = TempDir::new().expect("tempdir should be created");
        let init_path = temp.path().join("lonely.init.mac");
        fs::write(&init_path, "/run/verbose 1\n").expect("init written");

        let error = ScriptSynthesizer::new(temp.path().join("s"), temp.path().join("o"))
            .render_template("lonely", &init_path)
            .expect_err("config template is missing");
        match error {
            SynthesisError::MissingTemplate { scenario, path } => {
                assert_eq!(scenario, "lonely");
                assert_eq!(path, temp.path().join("lonely.config.mac"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    fn write_pair(dir: &Path, stem: &str, config_body: &str) {
        fs::create_dir_all(dir).expect("template dir");
        fs::write(
            dir.join(format!("{stem}.init.mac")),
            format!("/nexus/RegisterMacro {}/{stem}.config.mac\n", dir.display()),
        )
        .expect("init written");
        fs::write(dir.join(format!("{stem}.config.mac")), config_body).expect("config written");
    }

    fn slash(path: &Path) -> String {
        path.to_string_lossy().replace('\\', "/")
    }
}
