use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{Error, Result};
use crate::tables::{TableList, TableRefExtractor};

pub const ENV_HOST: &str = "DATABRICKS_HOST";
pub const ENV_TOKEN: &str = "DATABRICKS_TOKEN";

/// Databricks workspace credentials, resolved once at startup so a
/// missing variable fails before any work happens.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub host: String,
    pub token: String,
}

impl Credentials {
    /// Reads both required variables and reports every absent one.
    pub fn from_env() -> Result<Self> {
        let host = env::var(ENV_HOST).ok().filter(|v| !v.is_empty());
        let token = env::var(ENV_TOKEN).ok().filter(|v| !v.is_empty());

        match (host, token) {
            (Some(host), Some(token)) => Ok(Self {
                host: host.trim_end_matches('/').to_string(),
                token,
            }),
            (host, token) => {
                let mut vars = Vec::new();
                if host.is_none() {
                    vars.push(ENV_HOST.to_string());
                }
                if token.is_none() {
                    vars.push(ENV_TOKEN.to_string());
                }
                Err(Error::MissingCredentials { vars })
            }
        }
    }
}

/// The deployed `extracts.json` document. No schema is enforced beyond a
/// top-level `extracts` array; each entry's `config` subtree is walked
/// as-is, whatever shape the deployment templated into it.
#[derive(Debug)]
pub struct ExtractsConfig {
    path: PathBuf,
    doc: Value,
}

impl ExtractsConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = fs::read_to_string(&path).map_err(|source| Error::ConfigUnreadable {
            path: path.clone(),
            source,
        })?;
        let doc: Value = serde_json::from_str(&content).map_err(|source| Error::ConfigInvalid {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, doc })
    }

    /// Number of entries under the top-level `extracts` key.
    pub fn extract_count(&self) -> usize {
        self.extract_entries().len()
    }

    /// Collects every table referenced anywhere under any extract entry's
    /// nested `config`. Walk order never affects the result: names land
    /// in a set and come back sorted.
    pub fn table_names(&self, extractor: &dyn TableRefExtractor) -> Result<TableList> {
        let mut names = BTreeSet::new();
        for entry in self.extract_entries() {
            if let Some(config) = entry.get("config") {
                walk_strings(config, extractor, &mut names);
            }
        }
        TableList::from_set(names).ok_or_else(|| Error::NoTablesFound {
            path: self.path.clone(),
        })
    }

    fn extract_entries(&self) -> &[Value] {
        self.doc
            .get("extracts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn walk_strings(value: &Value, extractor: &dyn TableRefExtractor, out: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => extractor.extract(s, out),
        Value::Array(items) => {
            for item in items {
                walk_strings(item, extractor, out);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                walk_strings(item, extractor, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::RegexTableExtractor;
    use std::io::Write;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    // set_var/remove_var race parallel tests; every credential test goes
    // through this lock and restores the previous values on drop.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct EnvGuard {
        _lock: MutexGuard<'static, ()>,
        saved: [(&'static str, Option<String>); 2],
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }

    fn scoped_env(host: Option<&str>, token: Option<&str>) -> EnvGuard {
        let lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let saved = [
            (ENV_HOST, env::var(ENV_HOST).ok()),
            (ENV_TOKEN, env::var(ENV_TOKEN).ok()),
        ];
        match host {
            Some(v) => env::set_var(ENV_HOST, v),
            None => env::remove_var(ENV_HOST),
        }
        match token {
            Some(v) => env::set_var(ENV_TOKEN, v),
            None => env::remove_var(ENV_TOKEN),
        }
        EnvGuard { _lock: lock, saved }
    }

    #[test]
    fn missing_both_credentials_lists_both_variables() {
        let _env = scoped_env(None, None);
        let err = Credentials::from_env().unwrap_err();
        match err {
            Error::MissingCredentials { vars } => assert_eq!(vars, [ENV_HOST, ENV_TOKEN]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_token_lists_only_the_absent_variable() {
        let _env = scoped_env(Some("https://workspace.example"), None);
        let err = Credentials::from_env().unwrap_err();
        match err {
            Error::MissingCredentials { vars } => assert_eq!(vars, [ENV_TOKEN]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_host_counts_as_missing() {
        let _env = scoped_env(Some(""), Some("dapi123"));
        let err = Credentials::from_env().unwrap_err();
        match err {
            Error::MissingCredentials { vars } => assert_eq!(vars, [ENV_HOST]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn present_credentials_resolve_with_trailing_slash_trimmed() {
        let _env = scoped_env(Some("https://workspace.example/"), Some("dapi123"));
        let creds = Credentials::from_env().unwrap();
        assert_eq!(creds.host, "https://workspace.example");
        assert_eq!(creds.token, "dapi123");
    }

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_and_extracts_tables_from_nested_config() {
        let file = write_config(
            r#"{"extracts":[{"name":"ext_hr","config":{"parameters":["TABLE hr.employees;","TABLE hr.departments;"],"raw_config":"EXTRACT ext_hr\nTABLE finance.ledger;"}}]}"#,
        );
        let config = ExtractsConfig::load(file.path()).unwrap();
        let tables = config.table_names(&RegexTableExtractor::new()).unwrap();
        assert_eq!(tables.names(), ["DEPARTMENTS", "EMPLOYEES", "LEDGER"]);
    }

    #[test]
    fn missing_file_is_unreadable_error() {
        let err = ExtractsConfig::load("/nonexistent/extracts.json").unwrap_err();
        assert!(matches!(err, Error::ConfigUnreadable { .. }));
    }

    #[test]
    fn malformed_json_is_invalid_error() {
        let file = write_config("{not json");
        let err = ExtractsConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid { .. }));
    }

    #[test]
    fn table_less_document_is_an_error_not_an_empty_success() {
        let file =
            write_config(r#"{"extracts":[{"name":"ext1","config":{"x":"no statements here"}}]}"#);
        let config = ExtractsConfig::load(file.path()).unwrap();
        let err = config.table_names(&RegexTableExtractor::new()).unwrap_err();
        assert!(matches!(err, Error::NoTablesFound { .. }));
    }

    #[test]
    fn strings_outside_extract_configs_are_ignored() {
        let file = write_config(
            r#"{"comment":"TABLE not.counted","extracts":[{"name":"TABLE also.ignored","config":{"p":"TABLE hr.employees"}}]}"#,
        );
        let config = ExtractsConfig::load(file.path()).unwrap();
        let tables = config.table_names(&RegexTableExtractor::new()).unwrap();
        assert_eq!(tables.names(), ["EMPLOYEES"]);
    }

    #[test]
    fn counts_extract_entries() {
        let file = write_config(
            r#"{"extracts":[{"config":{"a":"TABLE t.one"}},{"config":{"b":"TABLE t.two"}}]}"#,
        );
        let config = ExtractsConfig::load(file.path()).unwrap();
        assert_eq!(config.extract_count(), 2);
    }
}
