use crate::common::test_utils::temp_file_with_ext;
use docdissect::config::DissectConfig;
use docdissect::DissectError;

#[test]
fn partial_json_fills_defaults() {
    let config = DissectConfig::from_json_str(
        r#"{ "cbff": { "max_directory_depth": 8 }, "pdf": { "decode_streams": false } }"#,
    )
    .unwrap();
    let defaults = DissectConfig::default();
    assert_eq!(config.cbff.max_directory_depth, 8);
    assert_eq!(config.cbff.extensions, defaults.cbff.extensions);
    assert!(!config.pdf.decode_streams);
    assert_eq!(config.pdf.eof_search_window, 1024);
    assert_eq!(config.budget, defaults.budget);
}

#[test]
fn config_file_round_trips() {
    let mut config = DissectConfig::default();
    config.pdf.max_xref_sections = 3;
    config.budget.max_time_seconds = 5;
    let file = temp_file_with_ext(config.to_json_pretty().unwrap().as_bytes(), "json");
    assert_eq!(DissectConfig::from_path(file.path()).unwrap(), config);
}

#[test]
fn malformed_json_is_a_config_error() {
    assert!(matches!(
        DissectConfig::from_json_str("{ \"pdf\": "),
        Err(DissectError::Config(_))
    ));
}
