use std::fs;
use std::path::Path;

use coupon_core::config::{
    read_env, resolve_config_path, AppConfig, LoadOptions, Setting, SETTINGS,
};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file_path = resolve_config_path(None);
    let file_doc = file_path.as_deref().and_then(load_file_doc);

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for setting in SETTINGS {
        let value = config.value(setting.key).unwrap_or_default();
        let source = setting_source(&setting, file_doc.as_ref(), file_path.as_deref());
        lines.push(format!("- {} = {value} (source: {source})", setting.key));
    }

    lines.join("\n")
}

fn load_file_doc(path: &Path) -> Option<Value> {
    fs::read_to_string(path).ok()?.parse::<Value>().ok()
}

fn setting_source(setting: &Setting, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    if let Some(var) = setting.env.iter().find(|var| read_env(var).is_some()) {
        return format!("env ({var})");
    }

    match (file_doc, file_path) {
        (Some(doc), Some(path)) if contains_path(doc, setting.key) => {
            format!("file ({})", path.display())
        }
        _ => "default".to_string(),
    }
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |current, key| current.get(key)).is_some()
}
