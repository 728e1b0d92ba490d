//! Loader for configurations split across several files.
//!
//! A file may name other files in a top-level `include` key (a string or an
//! array of strings, relative to the including file's directory). Included
//! files may include further files. Every top-level section must come from
//! exactly one file and a file may only be loaded once.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Configuration loader that handles multi-file configurations with includes.
pub struct ConfigLoader {
	/// Base path for resolving the entry file
	base_path: PathBuf,
	/// Canonical paths already read, to catch circular includes
	loaded_files: HashSet<PathBuf>,
	/// Which file each top-level section came from, for error reporting
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

	/// Loads a configuration file and everything it includes, then validates
	/// the merged result.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let entry = resolve_path(&self.base_path, config_path.as_ref())?;
		let mut merged = toml::Table::new();
		self.merge_file(&entry, &mut merged).await?;

		let combined = toml::to_string(&merged).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		combined.parse()
	}

	/// Reads `path`, merges its sections into `merged` and recurses into its
	/// includes.
	async fn merge_file(&mut self, path: &Path, merged: &mut toml::Table) -> Result<(), ConfigError> {
		let mut table = self.read_table(path).await?;
		let includes = extract_includes(table.remove("include"))?;

		for (section, value) in table {
			if let Some(existing) = self.section_sources.get(&section) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}. \
					Each top-level section must be unique across all configuration files.",
					section,
					existing.display(),
					path.display()
				)));
			}
			self.section_sources.insert(section.clone(), path.to_path_buf());
			merged.insert(section, value);
		}

		let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
		for include in includes {
			let resolved = resolve_path(&dir, &include)?;
			Box::pin(self.merge_file(&resolved, merged)).await?;
		}
		Ok(())
	}

	/// Reads one file with environment variables resolved.
	async fn read_table(&mut self, path: &Path) -> Result<toml::Table, ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;
		if !self.loaded_files.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(&canonical).await?;
		let resolved = resolve_env_vars(&content)?;
		Ok(toml::from_str(&resolved)?)
	}
}

fn extract_includes(value: Option<toml::Value>) -> Result<Vec<PathBuf>, ConfigError> {
	match value {
		None => Ok(Vec::new()),
		Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
		Some(toml::Value::Array(items)) => items
			.into_iter()
			.map(|item| match item {
				toml::Value::String(path) => Ok(PathBuf::from(path)),
				_ => Err(ConfigError::Validation(
					"Include array must contain only strings".into(),
				)),
			})
			.collect(),
		Some(_) => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}

fn resolve_path(base: &Path, path: &Path) -> Result<PathBuf, ConfigError> {
	let resolved = if path.is_absolute() {
		path.to_path_buf()
	} else {
		base.join(path)
	};
	if !resolved.exists() {
		return Err(ConfigError::Io(std::io::Error::new(
			std::io::ErrorKind::NotFound,
			format!("Configuration file not found: {}", resolved.display()),
		)));
	}
	Ok(resolved)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	const SHOP: &str = r#"
[shop]
id = "campus-shop"
"#;

	const STORAGE: &str = r#"
[storage]
primary = "memory"
[storage.implementations.memory]
"#;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("config.toml"),
			format!("{}{}", SHOP, STORAGE),
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("config.toml").await.unwrap();
		assert_eq!(config.shop.id, "campus-shop");
	}

	#[tokio::test]
	async fn test_nested_includes() {
		let temp_dir = TempDir::new().unwrap();
		fs::create_dir(temp_dir.path().join("conf.d")).unwrap();

		fs::write(
			temp_dir.path().join("main.toml"),
			format!("include = \"conf.d/storage.toml\"\n{}", SHOP),
		)
		.unwrap();
		fs::write(
			temp_dir.path().join("conf.d/storage.toml"),
			format!("include = [\"api.toml\"]\n{}", STORAGE),
		)
		.unwrap();
		fs::write(
			temp_dir.path().join("conf.d/api.toml"),
			"[api]\nenabled = true\nport = 8080\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();
		assert_eq!(config.storage.primary, "memory");
		assert_eq!(config.api.unwrap().port, 8080);
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("main.toml"),
			format!("include = [\"other.toml\"]\n{}{}", SHOP, STORAGE),
		)
		.unwrap();
		fs::write(temp_dir.path().join("other.toml"), SHOP).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let error = loader.load_config("main.toml").await.unwrap_err();
		assert!(error.to_string().contains("Duplicate section 'shop'"));
	}

	#[tokio::test]
	async fn test_circular_include_detection() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("a.toml"),
			format!("include = \"b.toml\"\n{}", SHOP),
		)
		.unwrap();
		fs::write(
			temp_dir.path().join("b.toml"),
			format!("include = \"a.toml\"\n{}", STORAGE),
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let error = loader.load_config("a.toml").await.unwrap_err();
		assert!(error.to_string().contains("already loaded"));
	}

	#[tokio::test]
	async fn test_missing_include() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("main.toml"),
			format!("include = \"nope.toml\"\n{}{}", SHOP, STORAGE),
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let error = loader.load_config("main.toml").await.unwrap_err();
		assert!(error.to_string().contains("not found"));
	}
}
