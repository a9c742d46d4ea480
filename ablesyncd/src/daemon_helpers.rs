fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

fn read_u64_setting<F>(lookup: &F, name: &str, default: u64) -> Result<u64, SyncError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    let value = raw.trim();
    if value.is_empty() {
        return Ok(default);
    }
    match value.parse::<u64>() {
        Ok(0) => Err(SyncError::Configuration(format!("{name} must be greater than zero"))),
        Ok(parsed) => Ok(parsed),
        Err(_) => Err(SyncError::Configuration(format!(
            "{name} is not a valid number: {value}"
        ))),
    }
}
