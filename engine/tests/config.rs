mod config {
    use engine::{samples, Config, ConfigError};

    #[test]
    fn shipped_config_file_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../config.toml");
        let config = Config::from_file(path).expect("Failed to read config.toml");

        config.validate().expect("Shipped config is invalid");
        assert!(samples::NAMES.contains(&config.sample.name.as_str()));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::from_file_or_default("does/not/exist.toml");
        assert_eq!(config.sample.name, samples::COLOR_WRITE_ENABLE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_reports_its_path() {
        match Config::from_file("does/not/exist.toml") {
            Err(ConfigError::Read { path, .. }) => assert_eq!(path, "does/not/exist.toml"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Config::from_toml("[window\nwidth = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn serialized_config_reads_back() {
        let mut config = Config::default();
        config.apply_args(["--sample", samples::HELLO_TRIANGLE, "--no-validation"]);

        let text = config.to_toml().expect("Failed to serialize config");
        let read = Config::from_toml(&text).expect("Failed to parse serialized config");

        assert_eq!(read.sample.name, samples::HELLO_TRIANGLE);
        assert!(!read.graphics.validation);
        assert_eq!(read.window.title, config.window.title);
    }
}
