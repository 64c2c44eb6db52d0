//! Recipe execution: every matched input file goes through extraction,
//! parsing, variable resolution and rendering before being written out.

use globset::{GlobBuilder, GlobMatcher};
use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::{
    config::{OutputOption, RecipeOption, WriteMode},
    encoding,
    error::{Error, Result},
    extract::read_content,
    formats::parse_content,
    renderer::{MiniJinjaRenderer, TemplateRenderer},
    variables::{resolve_recipe_variables, substitute_placeholders, Variables},
};

/// Resolves a relative path against the current working directory.
pub fn absolutize<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    }
}

fn build_matcher(file_pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(file_pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| Error::ConfigError(format!("invalid file pattern '{}': {}", file_pattern, e)))
}

/// `/`-separated form of `path`, which is what file patterns are matched against.
fn pattern_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Lists the files a recipe works on.
///
/// A file is returned as is. A directory yields the regular files below it whose
/// relative path matches `file_pattern`, sorted by path. Symlinks are followed.
///
/// # Errors
/// * `Error::InputPathError` if `input_path` is neither a file nor a directory
/// * `Error::ConfigError` if `file_pattern` is not a valid glob
pub fn collect_input_files<P: AsRef<Path>>(input_path: P, file_pattern: &str) -> Result<Vec<PathBuf>> {
    let input_path = input_path.as_ref();
    if input_path.is_file() {
        return Ok(vec![input_path.to_path_buf()]);
    }
    if !input_path.is_dir() {
        return Err(Error::InputPathError { path: input_path.to_path_buf() });
    }

    let matcher = build_matcher(file_pattern)?;
    let mut files = Vec::new();
    for entry in WalkDir::new(input_path).min_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", input_path.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(input_path) else {
            continue;
        };
        if matcher.is_match(pattern_path(relative)) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Builds the context a recipe template is rendered with.
///
/// Keys are `content`, the parse result under `result_name` when there is one,
/// `variables` and `params`.
pub fn build_context(
    content: &str,
    parsed: Option<(&str, Value)>,
    variables: &Variables,
    recipe: &RecipeOption,
) -> Value {
    let mut context = Map::new();
    context.insert("content".to_string(), Value::String(content.to_string()));
    if let Some((result_name, value)) = parsed {
        context.insert(result_name.to_string(), value);
    }
    context.insert(
        "variables".to_string(),
        Value::Object(
            variables.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect(),
        ),
    );
    context.insert(
        "params".to_string(),
        Value::Object(
            recipe
                .additional_params
                .iter()
                .map(|(k, param)| (k.clone(), param.value.clone()))
                .collect(),
        ),
    );
    Value::Object(context)
}

/// Encodes `text` and writes it to `dest_path` with the configured write mode,
/// creating missing parent directories.
pub fn write_output<P: AsRef<Path>>(text: &str, dest_path: P, output: &OutputOption) -> Result<()> {
    let abs_path = absolutize(dest_path);
    if let Some(parent) = abs_path.parent() {
        fs::create_dir_all(parent).map_err(Error::IoError)?;
    }

    let bytes = encoding::encode(text, &output.encoding)?;
    let mut options = OpenOptions::new();
    match output.write_mode {
        WriteMode::Truncate => options.write(true).create(true).truncate(true),
        WriteMode::Append => options.append(true).create(true),
    };
    let mut file = options.open(&abs_path).map_err(Error::IoError)?;
    file.write_all(&bytes).map_err(Error::IoError)
}

/// Runs one recipe over one file and returns the path written.
fn process_file(renderer: &dyn TemplateRenderer, recipe: &RecipeOption, file: &Path) -> Result<PathBuf> {
    debug!("Processing {}", file.display());
    let content = read_content(file, recipe.read_content.as_ref(), recipe.content_encoding());

    let parsed = recipe.parse.as_ref().and_then(|parse| {
        parse_content(&content, &parse.format).map(|value| (parse.result_name.as_str(), value))
    });
    let variables = resolve_recipe_variables(file, &content, recipe);
    let context = build_context(&content, parsed, &variables, recipe);

    let rendered = renderer.render(&recipe.template.file, &context)?;
    let dest_path = absolutize(substitute_placeholders(&recipe.output.path, &variables));
    write_output(&rendered, &dest_path, &recipe.output)?;
    debug!("Wrote {}", dest_path.display());
    Ok(dest_path)
}

/// Executes `recipe` on `input_path`.
///
/// Failures on a single file are logged and the remaining files still run.
///
/// # Returns
/// * `Result<Vec<PathBuf>>` - Output paths written, in processing order
///
/// # Errors
/// * `Error::TemplateFolderError` if the template folder is unusable
/// * `Error::InputPathError` if the input is neither a file nor a directory
pub fn run_recipe<P: AsRef<Path>>(input_path: P, recipe: &RecipeOption) -> Result<Vec<PathBuf>> {
    let input_path = absolutize(input_path);
    let renderer =
        MiniJinjaRenderer::from_folder(absolutize(&recipe.template.folder), &recipe.template.encoding)?;
    let files = collect_input_files(&input_path, &recipe.input.file_pattern)?;
    info!("Recipe '{}': {} file(s) matched", recipe.id, files.len());

    let mut written = Vec::with_capacity(files.len());
    for file in &files {
        match process_file(&renderer, recipe, file) {
            Ok(path) => written.push(path),
            Err(e) => error!("Recipe '{}' failed on {}: {}", recipe.id, file.display(), e),
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdditionalParamOption, InputOption, TemplateOption};
    use serde_json::json;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_collect_single_file_ignores_pattern() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.log");
        touch(&file);
        assert_eq!(collect_input_files(&file, "*.txt").unwrap(), vec![file]);
    }

    #[test]
    fn test_collect_directory() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("b.txt"));
        touch(&dir.path().join("a.txt"));
        touch(&dir.path().join("c.log"));
        touch(&dir.path().join("sub/d.txt"));

        let top = collect_input_files(dir.path(), "*.txt").unwrap();
        assert_eq!(top, vec![dir.path().join("a.txt"), dir.path().join("b.txt")]);

        let all = collect_input_files(dir.path(), "**/*.txt").unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.contains(&dir.path().join("sub/d.txt")));
    }

    #[cfg(unix)]
    #[test]
    fn test_collect_follows_symlinks() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("real/a.txt"));
        touch(&dir.path().join("in/b.txt"));
        std::os::unix::fs::symlink("../real/a.txt", dir.path().join("in/link.txt")).unwrap();

        let files = collect_input_files(dir.path().join("in"), "*.txt").unwrap();
        assert_eq!(files, vec![dir.path().join("in/b.txt"), dir.path().join("in/link.txt")]);
    }

    #[test]
    fn test_collect_missing_path() {
        let dir = TempDir::new().unwrap();
        let result = collect_input_files(dir.path().join("missing"), "*");
        assert!(matches!(result, Err(Error::InputPathError { .. })));
    }

    #[test]
    fn test_build_context() {
        let mut recipe = RecipeOption::new(
            "r",
            "r",
            InputOption::new("*"),
            OutputOption::new("out"),
            TemplateOption::new("t", "t.j2"),
        );
        recipe
            .additional_params
            .insert("site".to_string(), AdditionalParamOption { value: json!({"code": 7}) });
        let mut variables = Variables::new();
        variables.insert("fileName".to_string(), "a.txt".to_string());

        let context = build_context("abc", Some(("rows", json!([1]))), &variables, &recipe);
        assert_eq!(
            context,
            json!({
                "content": "abc",
                "rows": [1],
                "variables": {"fileName": "a.txt"},
                "params": {"site": {"code": 7}}
            })
        );

        let context = build_context("abc", None, &variables, &recipe);
        assert!(context.get("rows").is_none());
    }

    #[test]
    fn test_write_output_modes() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("nested/out.txt");
        let mut output = OutputOption::new(dest.to_string_lossy());

        write_output("one", &dest, &output).unwrap();
        write_output("two", &dest, &output).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "two");

        output.write_mode = WriteMode::Append;
        write_output("three", &dest, &output).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "twothree");
    }

    #[test]
    fn test_write_output_encoding() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out.txt");
        let mut output = OutputOption::new(dest.to_string_lossy());
        output.encoding = "latin1".to_string();

        write_output("café", &dest, &output).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), vec![0x63, 0x61, 0x66, 0xe9]);

        output.encoding = "utf-16".to_string();
        write_output("ab", &dest, &output).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), vec![0xff, 0xfe, 0x61, 0x00, 0x62, 0x00]);
    }
}
