use reelcheck::config::Config;
use reelcheck::error::AnalysisError;

#[test]
fn parse_example_config() {
    let raw = include_str!("../reelcheck.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    cfg.validate().expect("example config is valid");
    assert!(cfg.orchestrator.invocation_budget_seconds >= 1);
    assert!(!cfg.paths.jobs_dir.is_empty());
    assert_eq!(cfg.extractor.storyboard_timeout_seconds, 90);
    let exts = &cfg.security.allowed_file_extensions;
    assert!(exts.iter().any(|e| e == "mp4"));
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let cfg: Config =
        toml::from_str("[orchestrator]\nclaim_ttl_seconds = 30\n").expect("parse TOML");
    assert_eq!(cfg.orchestrator.claim_ttl_seconds, 30);
    assert_eq!(cfg.orchestrator.invocation_budget_seconds, 100);
    assert_eq!(cfg.paths.jobs_dir, "jobs");
    assert_eq!(cfg.logging.level, "info");
}

#[test]
fn zero_budget_is_rejected() {
    let cfg: Config =
        toml::from_str("[orchestrator]\ninvocation_budget_seconds = 0\n").expect("parse TOML");
    assert!(matches!(cfg.validate(), Err(AnalysisError::Config(_))));
}

#[test]
fn load_reports_the_path_on_bad_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[orchestrator\n").unwrap();
    let err = Config::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("parsing TOML"));
}
