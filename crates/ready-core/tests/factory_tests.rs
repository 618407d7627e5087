//! SystemFactory integration tests

mod common;

use common::fixtures::{
    fixture_path, formula_rd, image_document, inbuilt_rd, kernel_rd, mesh_document, two_chemicals,
    write_fixture, ArraySpec,
};
use ready_core::{
    Axis, ComputeOptions, FormatError, MissingDataKind, Properties, PropertyValue,
    ReactionDiffusionSystem, ReadyError, RuleKind, SystemFactory, Topology,
};
use rstest::rstest;

fn load(path: &std::path::Path, options: ComputeOptions) -> Result<ready_core::LoadedSystem, ReadyError> {
    let mut settings = Properties::render_settings();
    SystemFactory::default().create_from_file(path, &options, &mut settings)
}

// === Dispatch ===

#[test]
fn test_image_file_gives_image_system() {
    let loaded = load(&fixture_path("gray_scott.vti"), ComputeOptions::default()).unwrap();
    let system = loaded.system;
    assert_eq!(system.topology(), Topology::Image);
    assert_eq!(system.dimensions(), [4, 4, 1]);
    assert_eq!(system.number_of_chemicals(), 2);
    assert_eq!(system.rule_kind(), RuleKind::Inbuilt);
    assert_eq!(system.rule_name(), "Gray-Scott");
    assert_eq!(system.parameters().get("k"), Some(0.06));
    assert!(system.description().contains("patch of b"));
    assert!(!loaded.warn_to_update);
}

#[test]
fn test_mesh_file_gives_mesh_system() {
    let loaded = load(&fixture_path("gray_scott_mesh.vtu"), ComputeOptions::default()).unwrap();
    let system = loaded.system;
    assert_eq!(system.topology(), Topology::Mesh);
    assert_eq!(system.dimensions(), [4, 1, 1]);
    assert_eq!(system.number_of_chemicals(), 2);
    // parameters not in the file keep their defaults
    assert_eq!(system.parameters().get("k"), Some(0.062));
    assert_eq!(system.parameters().get("F"), Some(0.035));
}

#[test]
fn test_unsupported_container_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "poly.vtp", "<VTKFile type=\"PolyData\"/>");
    let err = load(&path, ComputeOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        ReadyError::Format(FormatError::UnsupportedContainer(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = load(
        std::path::Path::new("/nonexistent/pattern.vti"),
        ComputeOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ReadyError::Io { .. }));
}

#[test]
fn test_overflowing_extent_is_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let content = image_document(&inbuilt_rd("Gray-Scott"), [2, 2, 1], Some(&two_chemicals(4)))
        .replace("0 1 0 1 0 0", "-1 9223372036854775807 0 0 0 0");
    let path = write_fixture(dir.path(), "huge.vti", &content);
    let err = load(&path, ComputeOptions::default()).unwrap_err();
    assert!(matches!(err, ReadyError::Format(FormatError::Malformed(_))));
}

#[test]
fn test_missing_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    let content = image_document("", [2, 2, 1], Some(&two_chemicals(4)));
    let path = write_fixture(dir.path(), "plain.vti", &content);
    let err = load(&path, ComputeOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        ReadyError::Format(FormatError::MissingDescriptor)
    ));
}

// === Rule selection ===

#[test]
fn test_inbuilt_needs_no_backend() {
    let loaded = load(&fixture_path("gray_scott.vti"), ComputeOptions::unavailable()).unwrap();
    assert!(loaded.system.compute_target().is_none());
}

#[test]
fn test_unknown_inbuilt_rule() {
    let dir = tempfile::tempdir().unwrap();
    let content = image_document(&inbuilt_rd("Bogus"), [2, 2, 1], Some(&two_chemicals(4)));
    let path = write_fixture(dir.path(), "bogus.vti", &content);
    let err = load(&path, ComputeOptions::default()).unwrap_err();
    match err {
        ReadyError::UnsupportedRule { name } => assert_eq!(name, "Bogus"),
        other => panic!("expected UnsupportedRule, got {:?}", other),
    }
}

#[test]
fn test_unknown_rule_type() {
    let dir = tempfile::tempdir().unwrap();
    let rd = "<RD format_version=\"6\"><rule type=\"magic\" name=\"x\"/></RD>";
    let content = image_document(rd, [2, 2, 1], Some(&two_chemicals(4)));
    let path = write_fixture(dir.path(), "magic.vti", &content);
    let err = load(&path, ComputeOptions::default()).unwrap_err();
    assert!(matches!(err, ReadyError::UnsupportedRuleType { rule_type } if rule_type == "magic"));
}

#[rstest]
#[case::formula_image(image_document(&formula_rd("delta_a = 0;"), [2, 2, 1], Some(&two_chemicals(4))))]
#[case::kernel_image(image_document(&kernel_rd(), [2, 2, 1], Some(&two_chemicals(4))))]
#[case::formula_without_data(image_document(&formula_rd("delta_a = 0;"), [2, 2, 1], None))]
#[case::formula_bad_source(image_document(&formula_rd("delta_a = = ;"), [2, 2, 1], Some(&two_chemicals(4))))]
#[case::formula_mesh(mesh_document(&formula_rd("delta_a = 0;"), None))]
#[case::kernel_mesh(mesh_document(&kernel_rd(), Some(&two_chemicals(2))))]
fn test_compute_rules_refused_without_compute(#[case] content: String) {
    let dir = tempfile::tempdir().unwrap();
    let name = if content.contains("ImageData") { "rd.vti" } else { "rd.vtu" };
    let path = write_fixture(dir.path(), name, &content);
    let err = load(&path, ComputeOptions::unavailable()).unwrap_err();
    match err {
        ReadyError::ComputeUnavailable { hints } => assert!(hints.contains("OpenCL")),
        other => panic!("expected ComputeUnavailable, got {:?}", other),
    }
}

#[test]
fn test_three_channel_formula_image() {
    let dir = tempfile::tempdir().unwrap();
    let values: Vec<f64> = (0..32 * 32 * 3).map(|i| (i % 7) as f64 / 7.0).collect();
    let arrays = [ArraySpec::new("abc", "Float32", values).with_components(3)];
    let content = image_document(
        &formula_rd("delta_a = 0; delta_b = 0; delta_c = 0;"),
        [32, 32, 1],
        Some(&arrays),
    );
    let path = write_fixture(dir.path(), "three.vti", &content);

    let loaded = load(&path, ComputeOptions::default()).unwrap();
    let system = loaded.system;
    assert_eq!(system.dimensions(), [32, 32, 1]);
    assert_eq!(system.number_of_chemicals(), 3);
    assert!(!system.is_modified());
    assert_eq!(system.filename(), Some(path.as_path()));
    assert_eq!(system.rule_kind(), RuleKind::Formula);
    // channel 1 is the second component of the single array
    assert_eq!(system.chemical_values(1).unwrap()[0], 1.0 / 7.0);
    assert!(system.compute_target().is_some());
}

#[test]
fn test_inbuilt_chemical_count_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let arrays = [ArraySpec::new("abc", "Float32", vec![0.0; 12]).with_components(3)];
    let content = image_document(&inbuilt_rd("Gray-Scott"), [2, 2, 1], Some(&arrays));
    let path = write_fixture(dir.path(), "three.vti", &content);
    let err = load(&path, ComputeOptions::default()).unwrap_err();
    assert!(matches!(
        &err,
        ReadyError::Format(FormatError::ChemicalCountMismatch {
            declared: 2,
            found: 3,
            ..
        })
    ));
    let message = err.to_string();
    assert!(message.contains("Gray-Scott"), "{message}");
    assert!(message.contains("exactly 2 chemicals"), "{message}");
}

#[test]
fn test_unopenable_device() {
    let dir = tempfile::tempdir().unwrap();
    let content = image_document(&formula_rd("delta_a = 0;"), [2, 2, 1], Some(&two_chemicals(4)));
    let path = write_fixture(dir.path(), "device.vti", &content);
    let options = ComputeOptions {
        device: 3,
        ..ComputeOptions::default()
    };
    let err = load(&path, options).unwrap_err();
    assert!(matches!(err, ReadyError::Compute(_)));
}

#[test]
fn test_kernel_loads_but_host_cannot_run_it() {
    let dir = tempfile::tempdir().unwrap();
    let content = image_document(&kernel_rd(), [2, 2, 1], Some(&two_chemicals(4)));
    let path = write_fixture(dir.path(), "kernel.vti", &content);
    let mut system = load(&path, ComputeOptions::default()).unwrap().system;
    assert_eq!(system.rule_kind(), RuleKind::Kernel);
    assert!(matches!(system.update(1), Err(ReadyError::Compute(_))));
}

// === Missing data ===

#[rstest]
#[case::no_section(None, MissingDataKind::NoDataSection)]
#[case::empty_section(Some(vec![]), MissingDataKind::NoArrays)]
#[case::unknown_type(
    Some(vec![ArraySpec::new("a", "Quaternion", vec![0.0; 4])]),
    MissingDataKind::UnknownScalarType
)]
fn test_missing_image_data(#[case] arrays: Option<Vec<ArraySpec>>, #[case] expected: MissingDataKind) {
    let dir = tempfile::tempdir().unwrap();
    let content = image_document(&inbuilt_rd("Gray-Scott"), [2, 2, 1], arrays.as_deref());
    let path = write_fixture(dir.path(), "missing.vti", &content);
    match load(&path, ComputeOptions::default()).unwrap_err() {
        ReadyError::MissingData { kind, topology } => {
            assert_eq!(kind, expected);
            assert_eq!(topology, "image");
        }
        other => panic!("expected MissingData, got {:?}", other),
    }
}

#[rstest]
#[case::no_section(None, MissingDataKind::NoDataSection)]
#[case::empty_section(Some(vec![]), MissingDataKind::NoArrays)]
fn test_missing_mesh_data(#[case] arrays: Option<Vec<ArraySpec>>, #[case] expected: MissingDataKind) {
    let dir = tempfile::tempdir().unwrap();
    let content = mesh_document(&inbuilt_rd("Gray-Scott"), arrays.as_deref());
    let path = write_fixture(dir.path(), "missing.vtu", &content);
    match load(&path, ComputeOptions::default()).unwrap_err() {
        ReadyError::MissingData { kind, topology } => {
            assert_eq!(kind, expected);
            assert_eq!(topology, "mesh");
        }
        other => panic!("expected MissingData, got {:?}", other),
    }
}

// === Format versions ===

#[test]
fn test_old_format_version_warns() {
    let dir = tempfile::tempdir().unwrap();
    let rd = inbuilt_rd("Gray-Scott").replace("format_version=\"6\"", "format_version=\"3\"");
    let content = image_document(&rd, [2, 2, 1], Some(&two_chemicals(4)));
    let path = write_fixture(dir.path(), "old.vti", &content);
    assert!(load(&path, ComputeOptions::default()).unwrap().warn_to_update);
}

#[test]
fn test_unreadable_format_version() {
    let dir = tempfile::tempdir().unwrap();
    let rd = inbuilt_rd("Gray-Scott").replace("format_version=\"6\"", "format_version=\"0\"");
    let content = image_document(&rd, [2, 2, 1], Some(&two_chemicals(4)));
    let path = write_fixture(dir.path(), "ancient.vti", &content);
    assert!(matches!(
        load(&path, ComputeOptions::default()).unwrap_err(),
        ReadyError::Format(FormatError::UnreadableVersion { version: 0 })
    ));
}

// === Render settings ===

#[test]
fn test_render_settings_overlay_changes_only_named() {
    let mut settings = Properties::render_settings();
    let before = settings.clone();
    SystemFactory::default()
        .create_from_file(
            fixture_path("gray_scott.vti"),
            &ComputeOptions::default(),
            &mut settings,
        )
        .unwrap();

    assert_eq!(settings.get_float("low"), Some(0.1));
    assert_eq!(settings.get_color("color_high"), Some([0.0, 1.0, 0.0]));
    assert_eq!(settings.get_int("timesteps_per_render"), Some(50));
    for property in before.iter() {
        if !["low", "color_high", "timesteps_per_render"].contains(&property.name.as_str()) {
            assert_eq!(settings.get(&property.name), Some(&property.value));
        }
    }
    assert_eq!(settings.get_axis("slice_3D_axis"), Some(Axis::Z));
}

#[test]
fn test_absent_render_settings_leave_store_unchanged() {
    let mut settings = Properties::render_settings();
    settings.add("low", PropertyValue::Float(-2.0));
    let before = settings.clone();
    SystemFactory::default()
        .create_from_file(
            fixture_path("gray_scott_mesh.vtu"),
            &ComputeOptions::default(),
            &mut settings,
        )
        .unwrap();
    assert_eq!(settings, before);
}

#[test]
fn test_failed_load_leaves_store_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let rd = "<RD format_version=\"6\"><rule type=\"inbuilt\" name=\"Bogus\"/>\
              <render_settings><low value=\"0.5\"/></render_settings></RD>";
    let content = image_document(rd, [2, 2, 1], Some(&two_chemicals(4)));
    let path = write_fixture(dir.path(), "bogus.vti", &content);

    let mut settings = Properties::render_settings();
    let before = settings.clone();
    assert!(SystemFactory::default()
        .create_from_file(&path, &ComputeOptions::default(), &mut settings)
        .is_err());
    assert_eq!(settings, before);
}

// === Initial pattern ===

#[test]
fn test_pattern_applied_when_loading() {
    let loaded = load(&fixture_path("gray_scott_mesh.vtu"), ComputeOptions::default()).unwrap();
    let system = loaded.system;
    assert_eq!(system.chemical_values(0), Some(&[1.0, 1.0, 1.0, 1.0][..]));
    // only the left-hand triangle lies inside the rectangle
    assert_eq!(system.chemical_values(1), Some(&[0.0, 0.0, 0.0, 0.5][..]));
    assert!(!system.is_modified());
}
