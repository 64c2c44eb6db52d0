//! Recipe variables: intrinsic file and template facts plus regex captures
//! configured per recipe.

use indexmap::IndexMap;
use log::{error, warn};
use regex::{Captures, Regex};
use std::path::{Path, MAIN_SEPARATOR};
use std::sync::LazyLock;

use crate::config::{MatchIndex, PathSeparator, RecipeOption, VariableOption, VariableTarget};

/// Resolved variable names and values, in insertion order.
pub type Variables = IndexMap<String, String>;

fn render_path(path: &Path, separator: PathSeparator) -> String {
    let text = path.to_string_lossy();
    match separator {
        PathSeparator::Posix if MAIN_SEPARATOR != '/' => text.replace(MAIN_SEPARATOR, "/"),
        _ => text.into_owned(),
    }
}

fn os_str(value: Option<&std::ffi::OsStr>) -> String {
    value.map(|v| v.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Variables every file gets, whatever the recipe configures.
fn intrinsic_variables(file: &Path, recipe: &RecipeOption) -> Variables {
    let parent = file.parent().unwrap_or_else(|| Path::new(""));
    let extension = file
        .extension()
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let mut variables = Variables::new();
    variables.insert("fileName".to_string(), os_str(file.file_name()));
    variables.insert("fileExt".to_string(), extension);
    variables.insert("filePath".to_string(), render_path(file, PathSeparator::Native));
    variables.insert("parentName".to_string(), os_str(parent.file_name()));
    variables.insert("parentPath".to_string(), render_path(parent, PathSeparator::Native));
    variables.insert("templateName".to_string(), recipe.template.file.clone());
    variables.insert("templateFolder".to_string(), recipe.template.folder.clone());
    variables
}

/// Picks the capture selected by `index`, defaulting to the whole match.
///
/// A valid group that took no part in the match yields an empty string.
fn select_group(pattern: &Regex, captures: &Captures, index: &MatchIndex) -> String {
    let group = match index {
        MatchIndex::Position(pos) => match usize::try_from(*pos) {
            Ok(pos) if pos >= 1 && pos < captures.len() => captures.get(pos),
            _ => captures.get(0),
        },
        MatchIndex::Name(name) => {
            if pattern.capture_names().flatten().any(|n| n == name) {
                captures.name(name)
            } else {
                captures.get(0)
            }
        }
    };
    group.map(|m| m.as_str().to_string()).unwrap_or_default()
}

fn resolve_variable(file: &Path, content: &str, name: &str, variable: &VariableOption) -> Option<String> {
    let target = match &variable.target {
        VariableTarget::Filename => os_str(file.file_name()),
        VariableTarget::Filepath => render_path(file, variable.path_separator),
        VariableTarget::Content => content.to_string(),
        VariableTarget::Unknown(target) => {
            warn!("Unknown variable target: {}", target);
            return None;
        }
    };

    let pattern = match Regex::new(&variable.pattern) {
        Ok(pattern) => pattern,
        Err(e) => {
            error!("Invalid pattern for variable '{}': {}", name, e);
            return Some(String::new());
        }
    };

    Some(match pattern.captures(&target) {
        Some(captures) => select_group(&pattern, &captures, &variable.match_index),
        None => String::new(),
    })
}

/// Computes the variables of `file` for `recipe`.
///
/// Unknown variable targets are skipped, so the variable is absent from the
/// result rather than empty.
pub fn resolve_recipe_variables(file: &Path, content: &str, recipe: &RecipeOption) -> Variables {
    let mut variables = intrinsic_variables(file, recipe);
    let Some(options) = &recipe.variables else {
        return variables;
    };

    for (key, style) in &options.presets_overwrite {
        let value = match key.as_str() {
            "filePath" => render_path(file, style.path_separator),
            "parentPath" => {
                render_path(file.parent().unwrap_or_else(|| Path::new("")), style.path_separator)
            }
            _ => continue,
        };
        variables.insert(key.clone(), value);
    }

    for (name, variable) in &options.defined {
        if let Some(value) = resolve_variable(file, content, name, variable) {
            variables.insert(name.clone(), value);
        }
    }

    variables
}

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]*)\}").unwrap());

/// Replaces every `${name}` in `template` with the matching variable.
///
/// Substitution is literal and single pass. Placeholders without a variable are
/// left untouched.
pub fn substitute_placeholders(template: &str, variables: &Variables) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
