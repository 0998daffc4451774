//! Recipe registry - store and reuse pipeline recipes.
//!
//! Saves recipes to disk and matches them to datasets by column names,
//! so an analyst can rerun last season's pipeline against this season's
//! extract without rebuilding it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};
use crate::recipe::Recipe;

/// Directory where recipes are stored (relative to current dir).
const DEFAULT_REGISTRY_DIR: &str = ".surveytab/recipes";

/// A stored recipe with usage metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecipe {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// The pipeline recipe.
    pub recipe: Recipe,
    /// Input columns the recipe needs.
    pub columns: Vec<String>,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last time this recipe was run.
    pub last_used: Option<String>,
    /// Fraction of recent runs that succeeded (exponential moving average).
    pub success_rate: f64,
    /// Number of times run.
    pub use_count: u32,
}

/// On-disk registry of pipeline recipes.
pub struct RecipeRegistry {
    registry_dir: PathBuf,
    recipes: HashMap<String, StoredRecipe>,
}

impl RecipeRegistry {
    /// Open the default registry, loading existing recipes from disk.
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_REGISTRY_DIR)
    }

    /// Open a registry at a custom directory.
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            registry_dir: PathBuf::from(dir.as_ref()),
            recipes: HashMap::new(),
        };
        registry.load_all();
        registry
    }

    /// Load every readable recipe file; unreadable files are skipped.
    fn load_all(&mut self) {
        if !self.registry_dir.exists() {
            return;
        }
        let entries = match fs::read_dir(&self.registry_dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(stored) = serde_json::from_str::<StoredRecipe>(&content) {
                        self.recipes.insert(stored.id.clone(), stored);
                    }
                }
            }
        }
    }

    /// All stored recipes.
    pub fn list(&self) -> Vec<&StoredRecipe> {
        let mut recipes: Vec<&StoredRecipe> = self.recipes.values().collect();
        recipes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        recipes
    }

    /// A recipe by ID.
    pub fn get(&self, id: &str) -> Option<&StoredRecipe> {
        self.recipes.get(id)
    }

    /// Recipes whose required columns are all present in `csv_columns`
    /// (case-insensitive), ranked by success rate then usage.
    ///
    /// Unlike a fuzzy score, coverage must be complete: a recipe with
    /// even one missing column cannot run.
    pub fn find_compatible(&self, csv_columns: &[String]) -> Vec<&StoredRecipe> {
        let available: Vec<String> = csv_columns.iter().map(|c| c.to_lowercase()).collect();
        let mut compatible: Vec<&StoredRecipe> = self
            .recipes
            .values()
            .filter(|stored| {
                stored
                    .columns
                    .iter()
                    .all(|col| available.contains(&col.to_lowercase()))
            })
            .collect();
        compatible.sort_by(|a, b| {
            b.success_rate
                .partial_cmp(&a.success_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.use_count.cmp(&a.use_count))
        });
        compatible
    }

    /// Save a new recipe, returning its generated ID.
    pub fn save(&mut self, recipe: Recipe, name: &str) -> RegistryResult<String> {
        fs::create_dir_all(&self.registry_dir)?;

        let id = self.generate_id(name);
        let stored = StoredRecipe {
            id: id.clone(),
            name: name.to_string(),
            columns: recipe.required_columns(),
            recipe,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_used: None,
            success_rate: 1.0,
            use_count: 0,
        };

        let path = self.registry_dir.join(format!("{}.json", id));
        let content = serde_json::to_string_pretty(&stored)?;
        fs::write(&path, content)
            .map_err(|e| RegistryError::SaveError(e.to_string()))?;

        self.recipes.insert(id.clone(), stored);
        Ok(id)
    }

    /// Import a recipe from a JSON file.
    pub fn import(&mut self, path: &Path, name: Option<&str>) -> RegistryResult<String> {
        let content = fs::read_to_string(path)?;
        let recipe = Recipe::from_json(&content)
            .map_err(|e| RegistryError::InvalidRecipe(e.to_string()))?;

        let recipe_name = name.unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("imported")
        });
        self.save(recipe, recipe_name)
    }

    /// Update run statistics after executing a recipe.
    pub fn update_stats(&mut self, id: &str, success: bool) {
        if let Some(stored) = self.recipes.get_mut(id) {
            // Exponential moving average
            stored.success_rate = if success {
                stored.success_rate * 0.9 + 0.1
            } else {
                stored.success_rate * 0.9
            };
            stored.last_used = Some(chrono::Utc::now().to_rfc3339());
            stored.use_count += 1;

            let path = self.registry_dir.join(format!("{}.json", id));
            if let Ok(content) = serde_json::to_string_pretty(stored) {
                let _ = fs::write(&path, content);
            }
        }
    }

    /// Delete a recipe from disk and memory.
    pub fn delete(&mut self, id: &str) -> RegistryResult<()> {
        if self.recipes.remove(id).is_some() {
            let path = self.registry_dir.join(format!("{}.json", id));
            fs::remove_file(&path)?;
            Ok(())
        } else {
            Err(RegistryError::NotFound(id.to_string()))
        }
    }

    /// Slugified name plus a millisecond timestamp.
    fn generate_id(&self, name: &str) -> String {
        let slug: String = name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-");

        let timestamp = chrono::Utc::now().timestamp_millis();
        format!("{}-{}", slug, timestamp)
    }
}

impl Default for RecipeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::SortOrder;
    use crate::recipe::Step;
    use tempfile::tempdir;

    fn sort_recipe(column: &str) -> Recipe {
        Recipe::new(
            "sort by a column",
            vec![Step::Sort {
                by: column.into(),
                order: SortOrder::Descending,
            }],
        )
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();

        let id = {
            let mut registry = RecipeRegistry::with_dir(dir.path());
            registry.save(sort_recipe("Yield"), "rank by yield").unwrap()
        };

        // A fresh registry instance sees the persisted recipe.
        let registry = RecipeRegistry::with_dir(dir.path());
        let stored = registry.get(&id).unwrap();
        assert_eq!(stored.name, "rank by yield");
        assert_eq!(stored.columns, vec!["Yield"]);
        assert_eq!(stored.use_count, 0);
    }

    #[test]
    fn test_find_compatible_requires_full_coverage() {
        let dir = tempdir().unwrap();
        let mut registry = RecipeRegistry::with_dir(dir.path());
        registry.save(sort_recipe("Yield"), "rank by yield").unwrap();
        registry
            .save(sort_recipe("Distance"), "rank by distance")
            .unwrap();

        let columns = vec!["Crop".to_string(), "yield".to_string()];
        let compatible = registry.find_compatible(&columns);
        assert_eq!(compatible.len(), 1);
        assert_eq!(compatible[0].name, "rank by yield");
    }

    #[test]
    fn test_update_stats() {
        let dir = tempdir().unwrap();
        let mut registry = RecipeRegistry::with_dir(dir.path());
        let id = registry.save(sort_recipe("Yield"), "ranker").unwrap();

        registry.update_stats(&id, false);
        let stored = registry.get(&id).unwrap();
        assert_eq!(stored.use_count, 1);
        assert!(stored.success_rate < 1.0);
        assert!(stored.last_used.is_some());
    }

    #[test]
    fn test_delete_missing_recipe() {
        let dir = tempdir().unwrap();
        let mut registry = RecipeRegistry::with_dir(dir.path());
        assert!(matches!(
            registry.delete("nope"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_import_from_file() {
        let dir = tempdir().unwrap();
        let recipe_path = dir.path().join("season.json");
        fs::write(&recipe_path, sort_recipe("Yield").to_json().unwrap()).unwrap();

        let mut registry = RecipeRegistry::with_dir(dir.path().join("registry"));
        let id = registry.import(&recipe_path, None).unwrap();
        assert_eq!(registry.get(&id).unwrap().name, "season");
    }
}
