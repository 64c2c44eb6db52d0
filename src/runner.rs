//! Recipe selection and the top-level run loop.

use log::{error, info, warn};
use std::path::Path;

use crate::config::{Config, RecipeOption};
use crate::processor::run_recipe;

fn push_recipe<'a>(config: &'a Config, recipe_id: &str, selected: &mut Vec<&'a RecipeOption>) {
    match config.get_recipe(recipe_id) {
        None => warn!("Recipe '{}' not found, skipping", recipe_id),
        Some(recipe) if !recipe.enabled => warn!("Recipe '{}' is disabled, skipping", recipe_id),
        Some(recipe) => selected.push(recipe),
    }
}

/// Expands the requested presets and recipes into the recipes to run.
///
/// Presets come first, in request order, each contributing its enabled
/// references in declaration order; explicit recipe ids follow. Missing or
/// disabled entries are skipped with a warning. Duplicates are kept.
pub fn select_recipes<'a, S: AsRef<str>>(
    config: &'a Config,
    recipes: &[S],
    presets: &[S],
) -> Vec<&'a RecipeOption> {
    let mut selected = Vec::new();

    for preset_key in presets {
        let preset_key = preset_key.as_ref();
        let Some(preset) = config.get_preset(preset_key) else {
            warn!("Preset '{}' not found, skipping", preset_key);
            continue;
        };
        if !preset.enabled {
            warn!("Preset '{}' is disabled, skipping", preset_key);
            continue;
        }
        for reference in &preset.recipes {
            if reference.enabled {
                push_recipe(config, &reference.recipe, &mut selected);
            } else {
                warn!("Recipe '{}' is disabled in preset '{}', skipping", reference.recipe, preset.id);
            }
        }
    }

    for recipe_id in recipes {
        push_recipe(config, recipe_id.as_ref(), &mut selected);
    }

    selected
}

/// Runs the selected recipes against `input_path`.
///
/// A failing recipe is logged and the next one still runs.
///
/// # Returns
/// * `Vec<String>` - Ids of the recipes that completed, in execution order
pub fn run_processor<P: AsRef<Path>, S: AsRef<str>>(
    input_path: P,
    config: &Config,
    recipes: &[S],
    presets: &[S],
) -> Vec<String> {
    let input_path = input_path.as_ref();
    if recipes.is_empty() && presets.is_empty() {
        error!("No recipes or presets given, nothing to run");
        return Vec::new();
    }

    let mut completed = Vec::new();
    for recipe in select_recipes(config, recipes, presets) {
        info!("Running recipe '{}' ({})", recipe.id, recipe.name);
        match run_recipe(input_path, recipe) {
            Ok(outputs) => {
                info!("Recipe '{}' wrote {} file(s)", recipe.id, outputs.len());
                completed.push(recipe.id.clone());
            }
            Err(e) => error!("Recipe '{}' aborted: {}", recipe.id, e),
        }
    }
    completed
}
