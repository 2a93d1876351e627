use figment::Jail;
use prism_config::{LlmSettings, PrismConfig, update_env_file};

#[test]
fn process_env_beats_dotenv() {
    Jail::expect_with(|jail| {
        jail.create_file(".env", "GRAPHRAG_LLM_MODEL=from-dotenv\n")?;
        jail.set_env("GRAPHRAG_LLM_MODEL", "from-process");

        let config = PrismConfig::load(jail.directory()).expect("config loads");
        assert_eq!(config.llm.model, "from-process");
        Ok(())
    });
}

#[test]
fn dotenv_beats_settings_file() {
    Jail::expect_with(|jail| {
        jail.create_file("settings.yaml", "llm:\n  model: from-yaml\n")?;
        jail.create_file(".env", "GRAPHRAG_LLM_MODEL=from-dotenv\n")?;

        let config = PrismConfig::load_with_env(jail.directory(), Vec::new()).unwrap();
        assert_eq!(config.llm.model, "from-dotenv");
        Ok(())
    });
}

#[test]
fn storage_keys_map_to_storage_section() {
    Jail::expect_with(|jail| {
        let env = vec![
            (
                "GRAPHRAG_STORAGE_CONNECTION_STRING".to_string(),
                "AccountName=a;AccountKey=b".to_string(),
            ),
            (
                "GRAPHRAG_STORAGE_CONTAINER_NAME".to_string(),
                "indexes".to_string(),
            ),
        ];
        let config = PrismConfig::load_with_env(jail.directory(), env).unwrap();
        assert!(config.storage.is_configured());
        assert_eq!(config.storage.container_name, "indexes");
        Ok(())
    });
}

#[test]
fn settings_update_then_reload_picks_up_new_values() {
    Jail::expect_with(|jail| {
        jail.create_file(".env", "GRAPHRAG_API_KEY=old\nUNRELATED=1\n")?;
        let before = PrismConfig::load_with_env(jail.directory(), Vec::new()).unwrap();
        assert_eq!(before.llm.api_key, "old");

        let settings = LlmSettings {
            llm_model: "gpt-4o-mini".into(),
            llm_api_key: "new".into(),
            embeddings_model: "text-embedding-3-large".into(),
            embeddings_api_key: "emb-new".into(),
            ..LlmSettings::default()
        };
        update_env_file(&jail.directory().join(".env"), &settings.env_pairs()).unwrap();

        let after = PrismConfig::load_with_env(jail.directory(), Vec::new()).unwrap();
        assert_eq!(after.llm.api_key, "new");
        assert_eq!(after.llm.model, "gpt-4o-mini");
        assert_eq!(after.embeddings.llm.api_key, "emb-new");
        assert_eq!(after.embeddings.llm.model, "text-embedding-3-large");
        Ok(())
    });
}
