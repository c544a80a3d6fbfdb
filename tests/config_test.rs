//! Configuration files and orchestrator bootstrap.

#![cfg(feature = "cli")]

use std::path::PathBuf;

use mimir::bootstrap::{LEXICON_PROVIDER_ID, build_orchestrator};
use mimir::config::{Config, LexiconConfig, Secrets, TaskConfig};
use mimir::{CancellationToken, Item, LanguagePair, MimirError, RuntimeConfig, TaskRequest};

fn write(dir: &std::path::Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn explicit_config_must_exist() {
    let err = Config::load(Some(&PathBuf::from("/nonexistent/mimir.toml"))).unwrap_err();
    assert!(matches!(err, MimirError::Configuration(_)));
}

#[test]
fn explicit_config_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "config.toml",
        r#"
            [orchestrator]
            max_concurrent_batches = 8

            [tasks.wsd]
            model = "gpt-5"
            prompt_id = "wsd_v1"
        "#,
    );

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.orchestrator.max_concurrent_batches, 8);
    assert_eq!(config.task("wsd").unwrap().prompt_id.as_deref(), Some("wsd_v1"));
}

#[test]
fn malformed_config_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "config.toml", "[orchestrator\n");
    assert!(matches!(
        Config::from_file(&path),
        Err(MimirError::Configuration(_))
    ));
}

#[cfg(unix)]
#[test]
fn secrets_file_must_be_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "secrets.toml",
        "[deepl]\napi_key = \"abc:fx\"\n",
    );

    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
    let err = Secrets::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("insecure permissions"));

    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();
    let secrets = Secrets::from_file(&path).unwrap();
    assert_eq!(secrets.api_key("deepl"), Some("abc:fx".to_string()));
}

#[tokio::test]
async fn lexicon_config_registers_lexicon_provider() {
    let dir = tempfile::tempdir().unwrap();
    let lexicon = write(
        dir.path(),
        "pl.json",
        r#"{"kota": {"lemma": "kot", "part_of_speech": "noun"}}"#,
    );

    let mut config = Config::default();
    config.cache.dir = Some(dir.path().join("cache"));
    config.lexicon = Some(LexiconConfig {
        path: lexicon,
        language: "pl".to_string(),
        language_pairs: vec!["pl-en".to_string()],
    });
    config.tasks.insert(
        "lui".to_string(),
        TaskConfig {
            provider: Some(LEXICON_PROVIDER_ID.to_string()),
            ..Default::default()
        },
    );

    let orchestrator = build_orchestrator(&config, &Secrets::default()).unwrap();
    assert_eq!(orchestrator.registry().default_for("lui"), Some(LEXICON_PROVIDER_ID));
    let lexicon_summary = orchestrator
        .registry()
        .describe("lui")
        .into_iter()
        .find(|s| s.id == LEXICON_PROVIDER_ID)
        .unwrap();
    assert_eq!(lexicon_summary.language_pairs, vec!["pl-en".to_string()]);
    assert!(
        !orchestrator
            .registry()
            .providers("lui")
            .iter()
            .find(|p| p.id() == LEXICON_PROVIDER_ID)
            .unwrap()
            .supports_language_pair(&LanguagePair::new("es", "en"))
    );

    let request = TaskRequest::new(
        "lui",
        vec![Item::new("1", "kota", "Widzę kota.")],
        RuntimeConfig::new("pl", "en"),
    );
    let report = orchestrator
        .run(&request, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.provider, LEXICON_PROVIDER_ID);
    assert_eq!(report.outcomes[0].payload().unwrap()["lemma"], "kot");
}

#[test]
fn bad_language_pair_in_lexicon_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let lexicon = write(dir.path(), "pl.json", "{}");

    let mut config = Config::default();
    config.lexicon = Some(LexiconConfig {
        path: lexicon,
        language: "pl".to_string(),
        language_pairs: vec!["polish".to_string()],
    });

    assert!(matches!(
        build_orchestrator(&config, &Secrets::default()),
        Err(MimirError::InvalidInput(_))
    ));
}
