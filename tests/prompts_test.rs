//! The prompts shipped under `prompts/` load and render.

use std::path::PathBuf;

use mimir::MimirError;
use mimir::prompts::{DefaultPrompts, PromptRegistry};

fn shipped() -> PromptRegistry {
    PromptRegistry::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("prompts"))
}

fn vars() -> [(&'static str, &'static str); 5] {
    [
        ("items_json", r#"[{"uid": "u1", "word": "kota", "sentence": "Mam kota."}]"#),
        ("source_language_name", "Polish"),
        ("target_language_name", "English"),
        ("source_language_code", "pl"),
        ("target_language_code", "en"),
    ]
}

#[test]
fn every_shipped_prompt_renders() {
    let registry = shipped();
    let shipped = [
        ("lui", "lui_v1"),
        ("lui", "lui_pl_v1"),
        ("lui", "lui_es_v1"),
        ("wsd", "wsd_v1"),
        ("translation", "translation_v1"),
        ("hint", "hint_v1"),
        ("cloze_scoring", "cloze_scoring_v1"),
        ("usage_level", "usage_level_v1"),
        ("collocation", "collocation_v1"),
    ];
    for (task, id) in shipped {
        let prompt = registry.load(task, id).unwrap();
        assert_eq!(prompt.id, id);
        assert_eq!(prompt.task, task);
        assert!(prompt.placeholders().contains(&"items_json".to_string()), "{id}");

        let text = prompt.render(&vars()).unwrap();
        assert!(text.contains(r#""uid": "u1""#), "{id}");
        assert!(!text.contains("{items_json}"), "{id}");
    }
}

#[test]
fn literal_braces_survive_rendering() {
    let prompt = shipped().load("lui", "lui_pl_v1").unwrap();
    let text = prompt.render(&vars()).unwrap();
    assert!(text.contains(r#"{"lemma": "martwić się""#));
}

#[test]
fn language_default_beats_task_default() {
    let registry = shipped();
    assert_eq!(registry.resolve("lui", None, "pl").unwrap().id, "lui_pl_v1");
    assert_eq!(registry.resolve("lui", None, "es").unwrap().id, "lui_es_v1");
    assert_eq!(registry.resolve("lui", None, "de").unwrap().id, "lui_v1");
    assert_eq!(
        registry.resolve("lui", Some("lui_v1"), "pl").unwrap().id,
        "lui_v1"
    );
}

#[test]
fn runtime_overrides_are_exposed() {
    let prompt = shipped().load("wsd", "wsd_v1").unwrap();
    assert_eq!(prompt.runtime_overrides["batch_size"], 30);
    assert_eq!(prompt.version, "1.0");
}

#[test]
fn task_without_default_is_an_error() {
    let err = shipped().resolve("etymology", None, "pl").unwrap_err();
    assert!(matches!(err, MimirError::NoDefaultPrompt(task) if task == "etymology"));
}

#[test]
fn missing_prompt_names_its_path() {
    let err = shipped().load("lui", "lui_v42").unwrap_err();
    match err {
        MimirError::PromptNotFound { task, prompt_id, path } => {
            assert_eq!(task, "lui");
            assert_eq!(prompt_id, "lui_v42");
            assert!(path.ends_with("lui/prompts/lui_v42.json"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn custom_root_and_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let prompts = dir.path().join("lui").join("prompts");
    std::fs::create_dir_all(&prompts).unwrap();
    std::fs::write(
        prompts.join("tiny.json"),
        r#"{"id": "tiny", "version": "0.1"}"#,
    )
    .unwrap();
    std::fs::write(prompts.join("tiny.template.txt"), "Words: {items_json}").unwrap();

    let registry =
        PromptRegistry::with_defaults(dir.path(), DefaultPrompts::new().with_default("lui", "tiny"));
    let prompt = registry.resolve("lui", None, "pl").unwrap();
    assert_eq!(prompt.render(&[("items_json", "[]")]).unwrap(), "Words: []");
    assert!(prompt.render(&[]).is_err());
}
