//! Multi-file configuration loading.
//!
//! A root file may pull in other files with `include`. Every top-level
//! section must come from exactly one file; nothing is deep-merged.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Loads a root configuration file together with its includes.
pub struct ConfigLoader {
	/// Directory relative includes are resolved against.
	base_path: PathBuf,
	/// Canonical paths already read, to stop include cycles.
	loaded_files: HashSet<PathBuf>,
	/// Which file each top-level section came from.
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads, merges and validates the configuration rooted at `config_path`.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let config_path = self.resolve_path(config_path)?;
		let root_content = self.read_file(&config_path).await?;
		let mut root: toml::Value = toml::from_str(&root_content)?;

		let includes = extract_includes(&root)?;
		if includes.is_empty() {
			return root_content.parse();
		}

		if let Some(table) = root.as_table_mut() {
			table.remove("include");
			for key in table.keys() {
				self.section_sources.insert(key.clone(), config_path.clone());
			}
		}

		for include in includes {
			let include_path = self.resolve_path(&include)?;
			let content = self.read_file(&include_path).await?;
			let included: toml::Value = toml::from_str(&content)?;
			let Some(included) = included.as_table() else {
				continue;
			};

			for (key, value) in included {
				if let Some(existing) = self.section_sources.get(key) {
					return Err(ConfigError::Validation(format!(
						"Duplicate section '{}' found in {} and {}",
						key,
						existing.display(),
						include_path.display()
					)));
				}
				self.section_sources
					.insert(key.clone(), include_path.clone());
				if let Some(table) = root.as_table_mut() {
					table.insert(key.clone(), value.clone());
				}
			}
		}

		let combined = toml::to_string(&root).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		combined.parse()
	}

	/// Reads a file once and resolves environment variables in it.
	async fn read_file(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await?;
		if !self.loaded_files.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		resolve_env_vars(&content)
	}

	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}
		Ok(resolved)
	}
}

/// Reads `include`, which may be a single path or a list of paths.
fn extract_includes(root: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	match root.get("include") {
		None => Ok(Vec::new()),
		Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
		Some(toml::Value::Array(items)) => items
			.iter()
			.map(|item| {
				item.as_str().map(PathBuf::from).ok_or_else(|| {
					ConfigError::Validation("Include array must contain only strings".into())
				})
			})
			.collect(),
		Some(_) => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	const SHOP: &str = r#"
[shop]
id = "shop-test"
"#;

	const STORAGE: &str = r#"
[storage]
primary = "memory"
cleanup_interval_seconds = 600
[storage.implementations.memory]
"#;

	const AUTH: &str = r#"
[auth]
sessions = "local"
roles = "local"
[auth.implementations.local]
[auth.implementations.local.roles]
u-admin = "admin"
"#;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");
		fs::write(&config_path, format!("{SHOP}{STORAGE}{AUTH}")).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config(&config_path).await.unwrap();

		assert_eq!(config.shop.id, "shop-test");
		assert_eq!(config.storage.cleanup_interval_seconds, 600);
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();
		let root = format!("include = [\"storage.toml\", \"auth.toml\"]\n{SHOP}");
		fs::write(temp_dir.path().join("main.toml"), root).unwrap();
		fs::write(temp_dir.path().join("storage.toml"), STORAGE).unwrap();
		fs::write(temp_dir.path().join("auth.toml"), AUTH).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();

		assert_eq!(config.shop.id, "shop-test");
		assert_eq!(config.storage.primary, "memory");
		assert_eq!(config.auth.roles, "local");
	}

	#[tokio::test]
	async fn test_single_string_include() {
		let temp_dir = TempDir::new().unwrap();
		let root = format!("include = \"rest.toml\"\n{SHOP}");
		fs::write(temp_dir.path().join("main.toml"), root).unwrap();
		fs::write(temp_dir.path().join("rest.toml"), format!("{STORAGE}{AUTH}")).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		assert!(loader.load_config("main.toml").await.is_ok());
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let temp_dir = TempDir::new().unwrap();
		let root = format!("include = [\"dup.toml\"]\n{SHOP}{STORAGE}{AUTH}");
		fs::write(temp_dir.path().join("main.toml"), root).unwrap();
		fs::write(temp_dir.path().join("dup.toml"), "[shop]\nid = \"other\"\n").unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config("main.toml").await.unwrap_err();
		assert!(err.to_string().contains("Duplicate section 'shop'"));
	}

	#[tokio::test]
	async fn test_self_include_detection() {
		let temp_dir = TempDir::new().unwrap();
		let root = format!("include = [\"self.toml\"]\n{SHOP}");
		fs::write(temp_dir.path().join("self.toml"), root).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config("self.toml").await.unwrap_err();
		assert!(err.to_string().contains("already loaded"));
	}

	#[tokio::test]
	async fn test_missing_include() {
		let temp_dir = TempDir::new().unwrap();
		let root = format!("include = [\"absent.toml\"]\n{SHOP}");
		fs::write(temp_dir.path().join("main.toml"), root).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		assert!(matches!(
			loader.load_config("main.toml").await,
			Err(ConfigError::Io(_))
		));
	}
}
