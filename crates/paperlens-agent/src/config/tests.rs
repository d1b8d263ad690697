#[cfg(test)]
mod tests {
    use super::super::*;

    fn with_papers_dir(toml_body: &str, dir: &Path) -> Config {
        let mut config = Config::from_toml(toml_body).unwrap();
        config.processing.papers_dir = dir.to_path_buf();
        config
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.llm.provider, Provider::Anthropic);
        assert_eq!(config.llm.model(), "claude-sonnet-4-20250514");
        assert_eq!(config.llm.max_tokens, 4_000);
        assert_eq!(config.llm.max_chars(), 100_000);
        assert_eq!(config.processing.workers, 5);
        assert_eq!(config.processing.output_dir, PathBuf::from("outputs"));
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.pubmed.email, "user@example.com");
        assert!(!config.notify.enabled);
    }

    #[test]
    fn test_partial_sections_keep_field_defaults() {
        let config = Config::from_toml(
            r#"
            [llm]
            provider = "openai"
            temperature = 0.5

            [processing]
            workers = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.provider, Provider::OpenAi);
        assert_eq!(config.llm.model(), "gpt-4o");
        assert_eq!(config.llm.max_chars(), 80_000);
        assert_eq!(config.llm.max_retries, 3);
        assert_eq!(config.processing.workers, 8);
        assert_eq!(config.processing.papers_dir, PathBuf::from("papers"));
    }

    #[test]
    fn test_configured_key_wins_over_env() {
        let config = Config::from_toml(
            r#"
            [llm]
            anthropic_api_key = "sk-from-file"
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.api_key().as_deref(), Some("sk-from-file"));
    }

    #[test]
    fn test_secrets_are_not_printed() {
        let config = Config::from_toml(
            r#"
            [llm]
            anthropic_api_key = "sk-very-secret"
            "#,
        )
        .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        let summary = config.summary();
        assert!(summary.iter().any(|(k, v)| *k == "api_key" && v == "set"));
        assert!(summary.iter().all(|(_, v)| !v.contains("sk-very-secret")));
    }

    #[test]
    fn test_valid_config_has_no_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = with_papers_dir(
            r#"
            [llm]
            anthropic_api_key = "sk-test"
            "#,
            dir.path(),
        );
        assert!(config.validate().is_empty(), "{:?}", config.validate());
    }

    #[test]
    fn test_validation_reports_each_problem() {
        let dir = tempfile::tempdir().unwrap();
        let config = with_papers_dir(
            r#"
            [llm]
            anthropic_api_key = "sk-test"
            temperature = 1.5

            [processing]
            workers = 0

            [storage]
            backend = "s3"
            "#,
            dir.path(),
        );
        let errors = config.validate();
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("workers")));
        assert!(errors.iter().any(|e| e.contains("temperature")));
        assert!(errors.iter().any(|e| e.contains("bucket")));
    }

    #[test]
    fn test_missing_papers_dir_is_reported() {
        let config = Config::from_toml(
            r#"
            [llm]
            anthropic_api_key = "sk-test"

            [processing]
            papers_dir = "/definitely/not/here"
            "#,
        )
        .unwrap();
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("/definitely/not/here"));
    }

    #[test]
    fn test_compatible_provider_needs_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let config = with_papers_dir(
            r#"
            [llm]
            provider = "openai_compatible"
            "#,
            dir.path(),
        );
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("base_url"));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut config = Config::from_toml("").unwrap();
        config.apply(&Overrides {
            papers_dir: Some(PathBuf::from("/data/pdfs")),
            output_dir: None,
            workers: Some(12),
            provider: Some(Provider::OpenAi),
        });
        assert_eq!(config.processing.papers_dir, PathBuf::from("/data/pdfs"));
        assert_eq!(config.processing.output_dir, PathBuf::from("outputs"));
        assert_eq!(config.processing.workers, 12);
        assert_eq!(config.llm.provider, Provider::OpenAi);
    }

    #[test]
    fn test_cost_overrides_fall_back_per_field() {
        let config = Config::from_toml(
            r#"
            [costs]
            input_per_million = 1.0
            "#,
        )
        .unwrap();
        let pricing = config.costs.pricing(Provider::Anthropic);
        assert_eq!(pricing.input_per_million, 1.0);
        assert_eq!(pricing.output_per_million, 15.0);
    }

    #[test]
    fn test_tracking_file_resolves_under_output_dir() {
        let mut config = Config::from_toml("").unwrap();
        assert_eq!(config.tracking_file(), PathBuf::from("outputs/processed_papers.json"));
        config.pubmed.tracking_file = PathBuf::from("/var/lib/paperlens/seen.json");
        assert_eq!(config.tracking_file(), PathBuf::from("/var/lib/paperlens/seen.json"));
    }

    #[test]
    fn test_summariser_settings_follow_llm_section() {
        let config = Config::from_toml(
            r#"
            [llm]
            max_tokens = 1500
            max_retries = 5
            retry_min_wait_secs = 1
            retry_max_wait_secs = 2
            "#,
        )
        .unwrap();
        let s = config.llm.summariser_config();
        assert_eq!(s.max_tokens, 1500);
        assert_eq!(s.retry.max_retries, 5);
        assert_eq!(s.retry.min_wait, std::time::Duration::from_secs(1));
        assert_eq!(s.retry.max_wait, std::time::Duration::from_secs(2));
    }
}
