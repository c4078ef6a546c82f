use std::fs;
use std::path::{Path, PathBuf};

const SAMPLE_CONFIG: &str = include_str!("../../samples/sample-config.yml");

pub fn sample_config() -> &'static str {
    SAMPLE_CONFIG
}

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    if stdout {
        print!("{}", SAMPLE_CONFIG);
        return Ok(());
    }

    let config_path = default_write_path();
    write_config(&config_path, SAMPLE_CONFIG)?;
    println!("Config file written to {}", config_path.display());
    Ok(())
}

/// ~/.config/logship/config.yml when a home directory can be created,
/// /etc/logship/config.yml otherwise.
fn default_write_path() -> PathBuf {
    if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/logship/config.yml");
        if let Some(parent) = user_config.parent() {
            match fs::create_dir_all(parent) {
                Ok(()) => return user_config,
                Err(_) => {
                    eprintln!("Warning: Could not create directory {}", parent.display());
                    eprintln!("Falling back to /etc/logship/config.yml");
                }
            }
        }
    }

    PathBuf::from("/etc/logship/config.yml")
}

fn write_config(path: &Path, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        return Err(format!(
            "config file already exists at {}; remove it first or use --stdout",
            path.display()
        )
        .into());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

pub fn validate(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path.ok_or("No config file found. Use --config to specify a path.")?;

    println!("Validating config file: {}", path.display());

    let config = crate::config::load_config(&path)?;
    println!(
        "Config is valid: project '{}', {} file(s), indices {}YYYYMM on {}",
        config.project,
        config.logs.len(),
        config.es_index_prefix,
        config.es_host
    );
    Ok(())
}
