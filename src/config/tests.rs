// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use crate::config::{
        Config, ConfigError, ConfigProvider, FileConfigProvider, PropertiesConfigProvider,
        WebConfiguration, keys,
    };
    use serde_json::{Value, json};
    use std::io::Write;
    use std::path::PathBuf;

    #[derive(Debug)]
    struct MockConfigProvider {
        values: serde_json::Map<String, Value>,
        name: String,
    }

    impl MockConfigProvider {
        fn new(name: &str) -> Self {
            let mut values = serde_json::Map::new();
            values.insert(keys::HTTP_PORT.to_string(), json!(8181));
            values.insert(keys::SESSION_COOKIE.to_string(), json!("PAXSESSION"));
            Self {
                values,
                name: name.to_string(),
            }
        }

        fn with(mut self, key: &str, value: Value) -> Self {
            self.values.insert(key.to_string(), value);
            self
        }
    }

    impl ConfigProvider for MockConfigProvider {
        fn has(&self, key: &str) -> bool {
            self.values.contains_key(key)
        }

        fn provider_name(&self) -> &str {
            &self.name
        }

        fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
            Ok(self.values.get(key).cloned())
        }
    }

    fn temp_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_later_providers_override_earlier_ones() {
        let config = Config::builder()
            .with_provider(MockConfigProvider::new("first"))
            .with_provider(MockConfigProvider::new("second").with(keys::HTTP_PORT, json!(9000)))
            .build();

        assert_eq!(config.get::<u16>(keys::HTTP_PORT).unwrap(), Some(9000));
        assert_eq!(
            config.get::<String>(keys::SESSION_COOKIE).unwrap().as_deref(),
            Some("PAXSESSION")
        );
        assert_eq!(config.get_or_default("unknown.key", 30).unwrap(), 30);
    }

    #[test]
    fn test_defaults_without_providers() {
        let web = WebConfiguration::from_config(&Config::empty()).unwrap();
        assert_eq!(web, WebConfiguration::default());
        assert!(web.http_enabled);
        assert_eq!(web.http_port, 8080);
        assert_eq!(web.http_secure_port, 8443);
        assert_eq!(web.listening_addresses, vec!["0.0.0.0".to_string()]);
        assert_eq!(web.session_cookie, "JSESSIONID");
        assert_eq!(web.session_timeout, None);
        web.validate().unwrap();
    }

    #[test]
    fn test_web_configuration_from_properties() {
        let provider = PropertiesConfigProvider::parse(
            "org.osgi.service.http.port = 8282\n\
             org.osgi.service.http.secure.enabled = true\n\
             org.ops4j.pax.web.listening.addresses = 127.0.0.1, ::1\n\
             org.ops4j.pax.web.session.timeout = 30\n\
             org.ops4j.pax.web.ssl.password = secret\n\
             org.ops4j.pax.web.ssl.keypassword = secret\n\
             org.ops4j.pax.web.ssl.protocols.included = TLSv1.2,TLSv1.3\n\
             javax.servlet.context.tempdir = /var/tmp/paxweb\n",
        );
        let config = Config::builder().with_provider(provider).build();
        let web = WebConfiguration::from_config(&config).unwrap();

        assert_eq!(web.http_port, 8282);
        assert!(web.http_secure_enabled);
        assert_eq!(web.listening_addresses, vec!["127.0.0.1", "::1"]);
        assert_eq!(web.session_timeout, Some(30));
        assert!(web.ssl.has_passwords());
        assert_eq!(web.ssl.protocols_included, vec!["TLSv1.2", "TLSv1.3"]);
        assert_eq!(web.temporary_directory, PathBuf::from("/var/tmp/paxweb"));
    }

    #[test]
    fn test_numbers_given_as_strings() {
        let config = Config::builder()
            .with_provider(
                MockConfigProvider::new("strings")
                    .with(keys::HTTP_PORT, json!("8383"))
                    .with(keys::HTTP_ENABLED, json!("yes")),
            )
            .build();
        let web = WebConfiguration::from_config(&config).unwrap();
        assert_eq!(web.http_port, 8383);
        assert!(web.http_enabled);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let config = Config::builder()
            .with_provider(MockConfigProvider::new("bad").with(keys::HTTP_PORT, json!(70000)))
            .build();
        let result = WebConfiguration::from_config(&config);
        assert!(matches!(result, Err(ConfigError::InvalidValue { ref key, .. }) if key == keys::HTTP_PORT));
    }

    #[test]
    fn test_validate_requires_a_connector() {
        let mut web = WebConfiguration::default();
        web.http_enabled = false;
        assert!(web.validate().is_err());

        web.http_secure_enabled = true;
        web.validate().unwrap();

        let web = WebConfiguration::default().with_listening_addresses(Vec::<String>::new());
        assert!(web.validate().is_err());
    }

    #[test]
    fn test_file_provider_flat_and_nested_keys() {
        let flat = temp_file(
            ".json",
            r#"{ "org.osgi.service.http.port": 8484, "org": { "ops4j": { "pax": { "web": { "session": { "cookie": "NESTED" } } } } } }"#,
        );
        let config = Config::default_file(flat.path().to_str().unwrap()).unwrap();
        let web = WebConfiguration::from_config(&config).unwrap();
        assert_eq!(web.http_port, 8484);
        assert_eq!(web.session_cookie, "NESTED");
    }

    #[test]
    fn test_file_provider_toml_tables() {
        let file = temp_file(
            ".toml",
            "[org.osgi.service.http]\nport = 8585\nenabled = true\n",
        );
        let provider = FileConfigProvider::new(file.path().to_str().unwrap()).unwrap();
        assert!(provider.has("org.osgi.service.http.port"));
        assert_eq!(
            provider.get_raw("org.osgi.service.http.port").unwrap(),
            Some(json!(8585))
        );
    }

    #[test]
    fn test_default_file_picks_properties_provider() {
        let file = temp_file(".cfg", "org.osgi.service.http.port=8686\n");
        let config = Config::default_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.get::<u16>(keys::HTTP_PORT).unwrap(), Some(8686));
    }

    #[test]
    fn test_unsupported_file_format() {
        let file = temp_file(".ini", "x=1");
        let result = FileConfigProvider::new(file.path().to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::ProviderError { .. })));
    }
}
