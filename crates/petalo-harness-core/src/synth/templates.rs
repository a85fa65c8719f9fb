use super::SynthesisError;
use super::rewrite::{OUTPUT_FILE, REGISTER_MACRO, rewrite_target};
use crate::domain::{Scenario, ScriptDirective, ScriptKind};
use std::fmt::Write as _;

const CONFIG_PREAMBLE: &str = "
/run/verbose 1
/event/verbose 0
/tracking/verbose 0

/process/em/verbose 0
";

pub(super) const RANDOM_SEED: &str = "/nexus/random_seed";

/// Directives the synthesizer writes itself. A scenario's config options
/// may not set them.
pub fn is_reserved_directive(command: &str) -> bool {
    let command = command.trim();
    rewrite_target(command).is_some() || command == RANDOM_SEED
}

/// Init script body before path rewriting.
pub(super) fn init_template(scenario: &Scenario) -> Result<String, SynthesisError> {
    let init = &scenario.init;
    if init.physics_lists.is_empty() {
        return Err(missing(scenario, "/PhysicsList/RegisterPhysics"));
    }

    let mut text = String::from("\n");
    for list in &init.physics_lists {
        push_directive(&mut text, scenario, "/PhysicsList/RegisterPhysics", list)?;
    }

    text.push_str("\n### GEOMETRY\n");
    push_directive(&mut text, scenario, "/nexus/RegisterGeometry", &scenario.geometry)?;

    text.push_str("\n### GENERATOR\n");
    push_directive(&mut text, scenario, "/nexus/RegisterGenerator", &init.generator)?;

    text.push_str("\n### ACTIONS\n");
    push_directive(&mut text, scenario, "/nexus/RegisterRunAction", &init.run_action)?;
    push_directive(&mut text, scenario, "/nexus/RegisterEventAction", &init.event_action)?;
    push_directive(
        &mut text,
        scenario,
        "/nexus/RegisterTrackingAction",
        &init.tracking_action,
    )?;
    if let Some(stacking_action) = &init.stacking_action {
        push_directive(
            &mut text,
            scenario,
            "/nexus/RegisterStackingAction",
            stacking_action,
        )?;
    }

    text.push('\n');
    push_directive(
        &mut text,
        scenario,
        "/nexus/RegisterPersistencyManager",
        &init.persistency_manager,
    )?;

    text.push('\n');
    let config_name = ScriptKind::Config.file_name(&scenario.name);
    push_directive(&mut text, scenario, REGISTER_MACRO, &config_name)?;
    Ok(text)
}

/// Config script body before path rewriting. Directives keep the order the
/// scenario declares them in.
pub(super) fn config_template(scenario: &Scenario) -> Result<String, SynthesisError> {
    let seed = scenario
        .random_seed
        .ok_or_else(|| missing(scenario, RANDOM_SEED))?;

    let mut text = String::from(CONFIG_PREAMBLE);
    if !scenario.physics_options.is_empty() {
        text.push('\n');
    }
    for ScriptDirective { command, value } in &scenario.physics_options {
        if command.trim().is_empty() {
            return Err(missing(scenario, "<unnamed directive>"));
        }
        if is_reserved_directive(command) {
            return Err(SynthesisError::ReservedDirective {
                scenario: scenario.name.clone(),
                directive: command.trim().to_string(),
            });
        }
        push_directive(&mut text, scenario, command, value)?;
    }

    text.push('\n');
    push_directive(&mut text, scenario, OUTPUT_FILE, &scenario.name)?;
    push_directive(&mut text, scenario, RANDOM_SEED, &seed.to_string())?;
    text.push('\n');
    Ok(text)
}

fn push_directive(
    text: &mut String,
    scenario: &Scenario,
    command: &str,
    value: &str,
) -> Result<(), SynthesisError> {
    if value.trim().is_empty() {
        return Err(missing(scenario, command));
    }
    // Writing into a String cannot fail.
    let _ = writeln!(text, "{} {}", command, value.trim());
    Ok(())
}

fn missing(scenario: &Scenario, directive: &str) -> SynthesisError {
    SynthesisError::MissingConfigValue {
        scenario: scenario.name.clone(),
        directive: directive.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{config_template, init_template, is_reserved_directive};
    use crate::catalog::builtin_scenarios;
    use crate::domain::ScriptDirective;
    use crate::synth::SynthesisError;

    fn scenario(name: &str) -> crate::domain::Scenario {
        builtin_scenarios()
            .into_iter()
            .find(|scenario| scenario.name == name)
            .expect("builtin scenario")
    }

    #[test]
    fn init_template_registers_each_module_once() {
        let text = init_template(&scenario("nest")).expect("init should render");
        let count = |prefix: &str| {
            text.lines()
                .filter(|line| line.starts_with(&format!("{} ", prefix)))
                .count()
        };

        assert_eq!(count("/PhysicsList/RegisterPhysics"), 6);
        assert_eq!(count("/nexus/RegisterGeometry"), 1);
        assert_eq!(count("/nexus/RegisterGenerator"), 1);
        assert_eq!(count("/nexus/RegisterRunAction"), 1);
        assert_eq!(count("/nexus/RegisterEventAction"), 1);
        assert_eq!(count("/nexus/RegisterTrackingAction"), 1);
        assert_eq!(count("/nexus/RegisterStackingAction"), 1);
        assert_eq!(count("/nexus/RegisterPersistencyManager"), 1);
        assert_eq!(
            text.lines().last(),
            Some("/nexus/RegisterMacro nest.config.mac")
        );
    }

    #[test]
    fn config_template_keeps_declared_directive_order() {
        let text = config_template(&scenario("ring_tiles")).expect("config should render");
        let depth = text.find("/Geometry/FullRingTiles/depth 3. cm");
        let region = text.find("/Generator/Back2back/region CENTER");
        assert!(depth.is_some() && region.is_some());
        assert!(depth < region);
        assert!(text.contains("/petalosim/persistency/output_file ring_tiles\n"));
        assert!(text.contains("/nexus/random_seed 16062020\n"));
    }

    #[test]
    fn config_options_cannot_add_a_second_output_file() {
        let mut scenario = scenario("full_body");
        scenario.physics_options.push(ScriptDirective::new(
            " /petalosim/persistency/output_file",
            "/data/other",
        ));
        assert!(matches!(
            config_template(&scenario),
            Err(SynthesisError::ReservedDirective { scenario, directive })
                if scenario == "full_body" && directive == "/petalosim/persistency/output_file"
        ));
        assert!(is_reserved_directive("/Actions/PetAnalysisRunAction/ntuple_file"));
        assert!(!is_reserved_directive("/Geometry/FullRingInfinity/depth"));
    }

    #[test]
    fn missing_seed_or_value_is_a_synthesis_error() {
        let mut without_seed = scenario("full_body");
        without_seed.random_seed = None;
        assert!(matches!(
            config_template(&without_seed),
            Err(SynthesisError::MissingConfigValue { directive, .. }) if directive == "/nexus/random_seed"
        ));

        let mut blank_value = scenario("full_body");
        blank_value.physics_options[0].value = "  ".to_string();
        assert!(matches!(
            config_template(&blank_value),
            Err(SynthesisError::MissingConfigValue { directive, .. })
                if directive == "/Geometry/FullRingInfinity/depth"
        ));

        let mut no_generator = scenario("petit");
        no_generator.init.generator.clear();
        assert!(matches!(
            init_template(&no_generator),
            Err(SynthesisError::MissingConfigValue { directive, .. })
                if directive == "/nexus/RegisterGenerator"
        ));
    }
}
