use crate::domain::{
    EncodingMode, EncodingParams, InitModules, ProvenanceExpectation, Scenario, ScenarioChecks,
    ScriptDirective, SensorPopulation,
};

const STANDARD_PHYSICS: [&str; 6] = [
    "G4EmStandardPhysics_option4",
    "G4DecayPhysics",
    "G4RadioactiveDecayPhysics",
    "G4OpticalPhysics",
    "PetaloPhysics",
    "G4StepLimiterPhysics",
];

const RING_SEED: u64 = 16_062_020;
const BOX_SEED: u64 = 23_102_022;

const PETIT_FIRST_SENSOR_ID: i64 = 11;
const PETIT_FIRST_ID_SECOND_PLANE: i64 = 111;
const PETIT_MIN_CHARGE: f64 = 50.0;

const PHANTOM_VOLUMES: [&str; 13] = [
    "WATER_BCKG",
    "ROD0",
    "ROD1",
    "ROD2",
    "ROD3",
    "ROD4",
    "ROD5",
    "SPHERE0",
    "SPHERE1",
    "SPHERE2",
    "SPHERE3",
    "SPHERE4",
    "SPHERE5",
];

/// The regression scenarios in execution order.
pub fn builtin_scenarios() -> Vec<Scenario> {
    let mut scenarios = vec![full_body(), ring_tiles()];
    scenarios.extend([
        pet_box(
            "pet_box_HamamatsuVUV",
            ("HamamatsuVUV", "HamamatsuVUV"),
            128,
            16,
            SensorPopulation::single("SiPMHmtsuVUV"),
        ),
        pet_box(
            "pet_box_HamamatsuBlue",
            ("HamamatsuBlue", "HamamatsuBlue"),
            128,
            16,
            SensorPopulation::single("SiPMHmtsuBlue"),
        ),
        pet_box(
            "pet_box_FBK",
            ("FBK", "FBK"),
            512,
            64,
            SensorPopulation::single("SiPMFBKVUV"),
        ),
        pet_box(
            "pet_box_mix_Ham_FBK",
            ("HamamatsuVUV", "FBK"),
            320,
            64,
            SensorPopulation::dual("SiPMFBKVUV", "SiPMHmtsuVUV"),
        ),
    ]);
    scenarios.extend([
        petit(),
        petit_saturation(),
        petit_pyrex(),
        nest(),
        phantom(),
    ]);
    scenarios
}

fn full_body() -> Scenario {
    let mut options = full_ring_options();
    options.extend(directives(&[
        ("/Geometry/FullRingInfinity/specific_vertex", "0. 0. 0. cm"),
        ("/Geometry/SiPMpet/efficiency", "0.2"),
        ("/Geometry/SiPMpet/visibility", "true"),
        ("/Geometry/SiPMpet/size", "6. mm"),
        ("/Generator/Back2back/region", "AD_HOC"),
        ("/process/optical/processActivation", "Cerenkov false"),
    ]));

    Scenario {
        name: "full_body".to_string(),
        geometry: "FullRingInfinity".to_string(),
        sensor_count: 102_304,
        encoding_mode: EncodingMode::Flat,
        encoding_params: EncodingParams::default(),
        init_sns_id: None,
        sensor_names: SensorPopulation::single("SiPMpet"),
        min_event_charge: 0.0,
        event_count: 20,
        init: back_to_back_modules("PetaloTrackingAction", None, true),
        physics_options: options,
        random_seed: Some(RING_SEED),
        checks: ScenarioChecks::default(),
        reads_output_of: None,
    }
}

fn ring_tiles() -> Scenario {
    Scenario {
        name: "ring_tiles".to_string(),
        geometry: "FullRingTiles".to_string(),
        sensor_count: 3840,
        encoding_mode: EncodingMode::BoardPacked,
        encoding_params: EncodingParams {
            board_ordering_divisor: Some(1000),
            n_boards: Some(120),
            sipms_per_board: Some(32),
            ..EncodingParams::default()
        },
        init_sns_id: None,
        sensor_names: SensorPopulation::single("SiPMpet"),
        min_event_charge: 0.0,
        event_count: 20,
        init: back_to_back_modules("PetaloTrackingAction", None, true),
        physics_options: directives(&[
            ("/Geometry/FullRingTiles/depth", "3. cm"),
            ("/Geometry/FullRingTiles/inner_radius", "165. mm"),
            ("/Geometry/FullRingTiles/tile_rows", "2"),
            ("/Geometry/FullRingTiles/instrumented_faces", "1"),
            ("/Geometry/SiPMpet/efficiency", "0.2"),
            ("/Geometry/SiPMpet/visibility", "true"),
            ("/Geometry/SiPMpet/size", "3. mm"),
            ("/Generator/Back2back/region", "CENTER"),
        ]),
        random_seed: Some(RING_SEED),
        checks: ScenarioChecks::default(),
        reads_output_of: None,
    }
}

fn pet_box(
    name: &str,
    (detection_tile, coincidence_tile): (&str, &str),
    sensor_count: u32,
    sipms_per_tile: i64,
    sensor_names: SensorPopulation,
) -> Scenario {
    let mut options = directives(&[
        ("/Geometry/PetBox/tile_type_d", detection_tile),
        ("/Geometry/PetBox/tile_type_c", coincidence_tile),
    ]);
    options.extend(sodium_source_options());

    Scenario {
        name: name.to_string(),
        geometry: "PetBox".to_string(),
        sensor_count,
        encoding_mode: EncodingMode::TilePacked,
        encoding_params: plane_params(sipms_per_tile),
        init_sns_id: Some(PETIT_FIRST_SENSOR_ID),
        sensor_names,
        min_event_charge: PETIT_MIN_CHARGE,
        event_count: 20,
        init: sodium_source_modules(),
        physics_options: options,
        random_seed: Some(BOX_SEED),
        checks: ScenarioChecks::tile_response(),
        reads_output_of: None,
    }
}

// The all-Hamamatsu-VUV box; the FBK and mixed variants are covered by PetBox.
fn petit() -> Scenario {
    Scenario {
        name: "petit".to_string(),
        geometry: "PETit".to_string(),
        sensor_count: 128,
        encoding_mode: EncodingMode::DualPlane,
        encoding_params: plane_params(16),
        init_sns_id: Some(PETIT_FIRST_SENSOR_ID),
        sensor_names: SensorPopulation::single("SiPMHmtsuVUV"),
        min_event_charge: PETIT_MIN_CHARGE,
        event_count: 50,
        init: sodium_source_modules(),
        physics_options: sodium_source_options(),
        random_seed: Some(BOX_SEED),
        checks: ScenarioChecks::tile_response(),
        reads_output_of: None,
    }
}

// Per-cell sensor output; nothing is validated on it.
fn petit_saturation() -> Scenario {
    let mut options = directives(&[("/Geometry/PETit/sipm_cells", "true")]);
    options.extend(directives(&[
        ("/Generator/IonGenerator/region", "SOURCE"),
        ("/Generator/IonGenerator/atomic_number", "11"),
        ("/Generator/IonGenerator/mass_number", "22"),
        ("/petalosim/persistency/sipm_cells", "true"),
        ("/petalosim/persistency/save_tot_charge", "false"),
    ]));

    Scenario {
        name: "petit_saturation".to_string(),
        geometry: "PETit".to_string(),
        sensor_count: 128,
        encoding_mode: EncodingMode::DualPlane,
        encoding_params: plane_params(16),
        init_sns_id: Some(PETIT_FIRST_SENSOR_ID),
        sensor_names: SensorPopulation::single("SiPMHmtsuVUV"),
        min_event_charge: 0.0,
        event_count: 20,
        init: sodium_source_modules(),
        physics_options: options,
        random_seed: Some(BOX_SEED),
        checks: ScenarioChecks::none(),
        reads_output_of: None,
    }
}

fn petit_pyrex() -> Scenario {
    let mut options = directives(&[("/Geometry/PETitPyrex/blue_tiles", "true")]);
    options.extend(sodium_source_options());

    Scenario {
        name: "petit_pyrex".to_string(),
        geometry: "PETitPyrex".to_string(),
        sensor_count: 128,
        encoding_mode: EncodingMode::DualPlane,
        encoding_params: plane_params(16),
        init_sns_id: Some(PETIT_FIRST_SENSOR_ID),
        sensor_names: SensorPopulation::single("SiPMHmtsuBlue"),
        min_event_charge: PETIT_MIN_CHARGE,
        event_count: 20,
        init: sodium_source_modules(),
        physics_options: options,
        random_seed: Some(BOX_SEED),
        checks: ScenarioChecks {
            plane_population: true,
            ..ScenarioChecks::tile_response()
        },
        reads_output_of: None,
    }
}

// A single event is enough to see which process created the photons.
fn nest() -> Scenario {
    let mut options = full_ring_options();
    options.extend(directives(&[
        ("/Geometry/FullRingInfinity/specific_vertex", "0. 0. 0. cm"),
        ("/Geometry/SiPMpet/efficiency", "0.2"),
        ("/Geometry/SiPMpet/visibility", "true"),
        ("/Geometry/SiPMpet/size", "6. mm"),
        ("/Generator/Back2back/region", "AD_HOC"),
        ("/process/optical/processActivation", "Scintillation false"),
        ("/process/optical/processActivation", "Cerenkov false"),
        ("/PhysicsList/Petalo/nest", "true"),
    ]));

    Scenario {
        name: "nest".to_string(),
        geometry: "FullRingInfinity".to_string(),
        sensor_count: 102_304,
        encoding_mode: EncodingMode::Flat,
        encoding_params: EncodingParams::default(),
        init_sns_id: None,
        sensor_names: SensorPopulation::single("SiPMpet"),
        min_event_charge: 0.0,
        event_count: 1,
        init: back_to_back_modules(
            "OpticalTrackingAction",
            Some("PetNESTStackingAction"),
            true,
        ),
        physics_options: options,
        random_seed: Some(RING_SEED),
        checks: ScenarioChecks {
            provenance: Some(ProvenanceExpectation {
                particle_names: vec!["opticalphoton".to_string(), "thermalelectron".to_string()],
                creator_proc: "S1".to_string(),
            }),
            ..ScenarioChecks::none()
        },
        reads_output_of: None,
    }
}

fn phantom() -> Scenario {
    let mut options = full_ring_options();
    options.extend(directives(&[
        ("/Geometry/FullRingInfinity/phantom", "true"),
        ("/Geometry/SiPMpet/efficiency", "0.2"),
        ("/Geometry/SiPMpet/visibility", "true"),
        ("/Geometry/SiPMpet/size", "6. mm"),
        ("/Generator/Back2back/region", "JPHANTOM"),
    ]));

    Scenario {
        name: "phantom".to_string(),
        geometry: "FullRingInfinity".to_string(),
        sensor_count: 102_304,
        encoding_mode: EncodingMode::Flat,
        encoding_params: EncodingParams::default(),
        init_sns_id: None,
        sensor_names: SensorPopulation::single("SiPMpet"),
        min_event_charge: 0.0,
        event_count: 10_000,
        init: back_to_back_modules("DefaultTrackingAction", None, false),
        physics_options: options,
        random_seed: Some(RING_SEED),
        checks: ScenarioChecks {
            vertex_volumes: Some(PHANTOM_VOLUMES.iter().map(|v| v.to_string()).collect()),
            ..ScenarioChecks::none()
        },
        reads_output_of: None,
    }
}

fn full_ring_options() -> Vec<ScriptDirective> {
    directives(&[
        ("/Geometry/FullRingInfinity/depth", "3. cm"),
        ("/Geometry/FullRingInfinity/sipm_pitch", "7. mm"),
        ("/Geometry/FullRingInfinity/inner_radius", "380. mm"),
        ("/Geometry/FullRingInfinity/sipm_rows", "278"),
        ("/Geometry/FullRingInfinity/instrumented_faces", "1"),
    ])
}

fn sodium_source_options() -> Vec<ScriptDirective> {
    directives(&[
        ("/Generator/IonGenerator/region", "SOURCE"),
        ("/Generator/IonGenerator/atomic_number", "11"),
        ("/Generator/IonGenerator/mass_number", "22"),
        ("/Actions/PetSensorsEventAction/min_charge", "50"),
    ])
}

fn plane_params(sipms_per_tile: i64) -> EncodingParams {
    EncodingParams {
        sipms_per_tile: Some(sipms_per_tile),
        first_id_second_plane: Some(PETIT_FIRST_ID_SECOND_PLANE),
        ..EncodingParams::default()
    }
}

fn physics_lists(optical: bool) -> Vec<String> {
    STANDARD_PHYSICS
        .iter()
        .filter(|list| optical || **list != "G4OpticalPhysics")
        .map(|list| list.to_string())
        .collect()
}

fn back_to_back_modules(
    tracking_action: &str,
    stacking_action: Option<&str>,
    optical: bool,
) -> InitModules {
    InitModules {
        physics_lists: physics_lists(optical),
        generator: "Back2backGammas".to_string(),
        run_action: "DefaultRunAction".to_string(),
        event_action: "PetaloEventAction".to_string(),
        tracking_action: tracking_action.to_string(),
        stacking_action: stacking_action.map(str::to_string),
        persistency_manager: "PetaloPersistencyManager".to_string(),
    }
}

fn sodium_source_modules() -> InitModules {
    InitModules {
        physics_lists: physics_lists(true),
        generator: "IonGenerator".to_string(),
        run_action: "DefaultRunAction".to_string(),
        event_action: "PetSensorsEventAction".to_string(),
        tracking_action: "PetaloTrackingAction".to_string(),
        stacking_action: None,
        persistency_manager: "PetaloPersistencyManager".to_string(),
    }
}

fn directives(pairs: &[(&str, &str)]) -> Vec<ScriptDirective> {
    pairs
        .iter()
        .map(|(command, value)| ScriptDirective::new(*command, *value))
        .collect()
}
