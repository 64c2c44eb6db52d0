//! Configuration handling for textbake.
//! This module provides the recipe and preset model, loading it from YAML or
//! JSON files and validating the invariants serde alone can't express.

use crate::encoding::{self, DEFAULT_ENCODING};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default configuration file name used by the CLI
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Default binding name of a parse result inside the template context
pub const DEFAULT_PARSE_RESULT_NAME: &str = "parse_result";

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

fn default_true() -> bool {
    true
}

fn default_parse_result_name() -> String {
    DEFAULT_PARSE_RESULT_NAME.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputOption {
    /// Glob applied relative to an input directory
    pub file_pattern: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

impl InputOption {
    pub fn new(file_pattern: impl Into<String>) -> Self {
        Self { file_pattern: file_pattern.into(), encoding: default_encoding() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum WriteMode {
    /// Create or truncate the output file
    #[default]
    #[serde(rename = "w")]
    Truncate,
    /// Create or append to the output file
    #[serde(rename = "a")]
    Append,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputOption {
    /// Output path template, `${name}` placeholders are replaced by variables
    pub path: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default)]
    pub write_mode: WriteMode,
}

impl OutputOption {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), encoding: default_encoding(), write_mode: WriteMode::default() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateOption {
    pub folder: String,
    pub file: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

impl TemplateOption {
    pub fn new(folder: impl Into<String>, file: impl Into<String>) -> Self {
        Self { folder: folder.into(), file: file.into(), encoding: default_encoding() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractType {
    Auto,
    Index,
    Line,
    Exact,
    Regex,
}

/// Where one edge of the content window sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Beginning of content for a start bound, end of content for an end bound
    Auto,
    /// Character offset
    Index(i64),
    /// 1-based line number
    Line(i64),
    /// First literal occurrence
    Exact(String),
    /// First regex match
    Regex(String),
}

#[derive(Debug, Deserialize)]
struct RawExtractBound {
    extract_type: ExtractType,
    #[serde(default, alias = "extract")]
    target: Option<serde_json::Value>,
    #[serde(default = "default_true")]
    include_match: bool,
}

/// One edge (start or end) of a content window.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawExtractBound")]
pub struct ExtractBound {
    pub locator: Locator,
    pub include_match: bool,
}

impl ExtractBound {
    pub fn new(locator: Locator, include_match: bool) -> Self {
        Self { locator, include_match }
    }
}

impl TryFrom<RawExtractBound> for ExtractBound {
    type Error = String;

    fn try_from(raw: RawExtractBound) -> std::result::Result<Self, Self::Error> {
        use serde_json::Value;

        let locator = match (raw.extract_type, raw.target) {
            (ExtractType::Auto, _) => Locator::Auto,
            (ExtractType::Index, Some(Value::Number(n))) if n.is_i64() => {
                Locator::Index(n.as_i64().unwrap_or_default())
            }
            (ExtractType::Line, Some(Value::Number(n))) if n.is_i64() => {
                Locator::Line(n.as_i64().unwrap_or_default())
            }
            (ExtractType::Exact, Some(Value::String(s))) => Locator::Exact(s),
            (ExtractType::Regex, Some(Value::String(s))) => Locator::Regex(s),
            (kind @ (ExtractType::Index | ExtractType::Line), target) => {
                return Err(format!("{:?} bound requires an integer target, got {:?}", kind, target))
            }
            (kind, target) => {
                return Err(format!("{:?} bound requires a string target, got {:?}", kind, target))
            }
        };

        Ok(Self { locator, include_match: raw.include_match })
    }
}

/// Content window applied to a file before parsing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadContentOption {
    #[serde(default)]
    pub start: Option<ExtractBound>,
    #[serde(default)]
    pub end: Option<ExtractBound>,
    /// Overrides the recipe input encoding when set
    #[serde(default)]
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JsonOption {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct YamlOption {}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct XmlOption {
    /// Key template for attributes, `{name}` is replaced by the attribute name
    pub attribute_key: String,
    /// Key holding an element's trimmed text
    pub text_key: String,
}

impl Default for XmlOption {
    fn default() -> Self {
        Self { attribute_key: "@{name}".to_string(), text_key: "#text".to_string() }
    }
}

/// Shape of tabular parse results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowShape {
    #[default]
    Dict,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DsvOption {
    pub parse_type: RowShape,
    pub enable_header: bool,
    pub delimiter: String,
    pub skip_empty_lines: bool,
    pub comment_line: Option<String>,
}

impl Default for DsvOption {
    fn default() -> Self {
        Self {
            parse_type: RowShape::Dict,
            enable_header: true,
            delimiter: "\t".to_string(),
            skip_empty_lines: true,
            comment_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TextFsmOption {
    pub template: PathBuf,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default)]
    pub parse_type: RowShape,
    #[serde(default = "default_true")]
    pub enable_header: bool,
}

impl TextFsmOption {
    pub fn new(template: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
            encoding: default_encoding(),
            parse_type: RowShape::Dict,
            enable_header: true,
        }
    }
}

/// The structured format a recipe parses its content as, with its options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFormat {
    Plain,
    Json(JsonOption),
    Yaml(YamlOption),
    Xml(XmlOption),
    Dsv(DsvOption),
    TextFsm(TextFsmOption),
    /// Unknown or missing `parse_type`, kept so the run can report it per file
    Unsupported(String),
}

#[derive(Debug, Deserialize)]
struct RawParseOption {
    #[serde(default)]
    parse_type: Option<String>,
    #[serde(default = "default_parse_result_name")]
    parse_result_name: String,
    #[serde(default)]
    json_options: Option<JsonOption>,
    #[serde(default)]
    yaml_options: Option<YamlOption>,
    #[serde(default)]
    xml_options: Option<XmlOption>,
    #[serde(default)]
    dsv_options: Option<DsvOption>,
    #[serde(default)]
    textfsm_options: Option<TextFsmOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawParseOption")]
pub struct ParseOption {
    pub format: ParseFormat,
    /// Name the parsed value is bound to in the template context
    pub result_name: String,
}

impl ParseOption {
    pub fn new(format: ParseFormat) -> Self {
        Self { format, result_name: default_parse_result_name() }
    }
}

impl TryFrom<RawParseOption> for ParseOption {
    type Error = String;

    fn try_from(raw: RawParseOption) -> std::result::Result<Self, Self::Error> {
        let parse_type = raw.parse_type.unwrap_or_default();
        let format = match parse_type.as_str() {
            "plain" => ParseFormat::Plain,
            "json" => ParseFormat::Json(raw.json_options.unwrap_or_default()),
            "yaml" => ParseFormat::Yaml(raw.yaml_options.unwrap_or_default()),
            "xml" => ParseFormat::Xml(raw.xml_options.unwrap_or_default()),
            "dsv" => ParseFormat::Dsv(raw.dsv_options.unwrap_or_default()),
            "textfsm" => ParseFormat::TextFsm(
                raw.textfsm_options
                    .ok_or("parse_type 'textfsm' requires textfsm_options")?,
            ),
            _ => {
                warn!("Unsupported parse_type '{}', parsing will be skipped", parse_type);
                ParseFormat::Unsupported(parse_type)
            }
        };

        Ok(Self { format, result_name: raw.parse_result_name })
    }
}

/// The text a variable pattern is searched in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum VariableTarget {
    Filename,
    Filepath,
    Content,
    Unknown(String),
}

impl From<String> for VariableTarget {
    fn from(value: String) -> Self {
        match value.as_str() {
            "filename" => VariableTarget::Filename,
            "filepath" => VariableTarget::Filepath,
            "content" => VariableTarget::Content,
            _ => VariableTarget::Unknown(value),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathSeparator {
    /// Always `/`
    Posix,
    /// Platform separator, also used for unrecognised values
    #[default]
    #[serde(other)]
    Native,
}

/// Capture group selector for a variable pattern.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum MatchIndex {
    Position(i64),
    Name(String),
}

impl Default for MatchIndex {
    fn default() -> Self {
        MatchIndex::Position(0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariableOption {
    pub target: VariableTarget,
    pub pattern: String,
    #[serde(default)]
    pub match_index: MatchIndex,
    #[serde(default)]
    pub path_separator: PathSeparator,
}

impl VariableOption {
    pub fn new(target: VariableTarget, pattern: impl Into<String>) -> Self {
        Self {
            target,
            pattern: pattern.into(),
            match_index: MatchIndex::default(),
            path_separator: PathSeparator::default(),
        }
    }

    pub fn with_match_index(mut self, match_index: MatchIndex) -> Self {
        self.match_index = match_index;
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathStyleOption {
    #[serde(default)]
    pub path_separator: PathSeparator,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariablesOption {
    /// Re-derives intrinsic path variables with another separator style
    #[serde(default)]
    pub presets_overwrite: IndexMap<String, PathStyleOption>,
    #[serde(default)]
    pub defined: IndexMap<String, VariableOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdditionalParamOption {
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeOption {
    pub enabled: bool,
    pub id: String,
    pub name: String,
    pub input: InputOption,
    pub output: OutputOption,
    pub template: TemplateOption,
    #[serde(default)]
    pub read_content: Option<ReadContentOption>,
    #[serde(default)]
    pub parse: Option<ParseOption>,
    #[serde(default)]
    pub variables: Option<VariablesOption>,
    #[serde(default)]
    pub additional_params: IndexMap<String, AdditionalParamOption>,
}

impl RecipeOption {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        input: InputOption,
        output: OutputOption,
        template: TemplateOption,
    ) -> Self {
        Self {
            enabled: true,
            id: id.into(),
            name: name.into(),
            input,
            output,
            template,
            read_content: None,
            parse: None,
            variables: None,
            additional_params: IndexMap::new(),
        }
    }

    /// Encoding used to read input files: the extract encoding wins over the input one.
    pub fn content_encoding(&self) -> &str {
        self.read_content
            .as_ref()
            .and_then(|r| r.encoding.as_deref())
            .unwrap_or(&self.input.encoding)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresetRecipeOption {
    pub recipe: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresetOption {
    pub enabled: bool,
    pub id: String,
    pub name: String,
    pub recipes: Vec<PresetRecipeOption>,
}

impl PresetOption {
    pub fn has_recipe(&self, recipe_id: &str) -> bool {
        self.recipes.iter().any(|r| r.recipe == recipe_id)
    }

    /// Ids of the enabled references, in declaration order.
    pub fn get_enabled_recipes(&self) -> Vec<&str> {
        self.recipes.iter().filter(|r| r.enabled).map(|r| r.recipe.as_str()).collect()
    }

    pub fn get_recipe(&self, recipe_id: &str) -> Option<&PresetRecipeOption> {
        self.recipes.iter().find(|r| r.recipe == recipe_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub recipes: Vec<RecipeOption>,
    #[serde(default)]
    pub presets: Vec<PresetOption>,
}

impl Config {
    pub fn has_recipe(&self, recipe_id: &str) -> bool {
        self.recipes.iter().any(|r| r.id == recipe_id)
    }

    pub fn has_preset(&self, preset_name: &str) -> bool {
        self.presets.iter().any(|p| p.name == preset_name)
    }

    pub fn get_enabled_recipes(&self) -> Vec<&str> {
        self.recipes.iter().filter(|r| r.enabled).map(|r| r.id.as_str()).collect()
    }

    pub fn get_enabled_presets(&self) -> Vec<&str> {
        self.presets.iter().filter(|p| p.enabled).map(|p| p.name.as_str()).collect()
    }

    pub fn get_recipe(&self, recipe_id: &str) -> Option<&RecipeOption> {
        self.recipes.iter().find(|r| r.id == recipe_id)
    }

    /// Looks a preset up by id, falling back to its display name.
    pub fn get_preset(&self, preset: &str) -> Option<&PresetOption> {
        self.presets
            .iter()
            .find(|p| p.id == preset)
            .or_else(|| self.presets.iter().find(|p| p.name == preset))
    }

    /// Checks invariants that span fields or need compilation.
    ///
    /// # Errors
    /// * `Error::ConfigError` naming the first offending recipe or preset
    pub fn validate(&self) -> Result<()> {
        let mut recipe_ids = HashSet::new();
        for recipe in &self.recipes {
            if !recipe_ids.insert(recipe.id.as_str()) {
                return Err(Error::ConfigError(format!("duplicate recipe id '{}'", recipe.id)));
            }
            validate_recipe(recipe)
                .map_err(|e| Error::ConfigError(format!("recipe '{}': {}", recipe.id, e)))?;
        }

        let mut preset_ids = HashSet::new();
        for preset in &self.presets {
            if !preset_ids.insert(preset.id.as_str()) {
                return Err(Error::ConfigError(format!("duplicate preset id '{}'", preset.id)));
            }
        }

        Ok(())
    }
}

fn validate_recipe(recipe: &RecipeOption) -> std::result::Result<(), String> {
    let mut labels = vec![
        recipe.input.encoding.as_str(),
        recipe.output.encoding.as_str(),
        recipe.template.encoding.as_str(),
    ];
    if let Some(label) = recipe.read_content.as_ref().and_then(|r| r.encoding.as_deref()) {
        labels.push(label);
    }
    if let Some(ParseOption { format: ParseFormat::TextFsm(options), .. }) = &recipe.parse {
        labels.push(options.encoding.as_str());
    }
    for label in labels {
        encoding::lookup(label).map_err(|e| e.to_string())?;
    }

    if let Some(read_content) = &recipe.read_content {
        for bound in [&read_content.start, &read_content.end].into_iter().flatten() {
            if let Locator::Regex(pattern) = &bound.locator {
                Regex::new(pattern).map_err(|e| format!("invalid extract regex: {}", e))?;
            }
        }
    }

    if let Some(variables) = &recipe.variables {
        for (name, variable) in &variables.defined {
            Regex::new(&variable.pattern)
                .map_err(|e| format!("invalid pattern for variable '{}': {}", name, e))?;
        }
    }

    globset::Glob::new(&recipe.input.file_pattern)
        .map_err(|e| format!("invalid file pattern: {}", e))?;

    Ok(())
}

/// Parses configuration content, trying JSON first and YAML second, then validates it.
///
/// # Errors
/// * `Error::ConfigError` if the content matches neither format or fails validation
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = match serde_json::from_str(content) {
        Ok(config) => config,
        Err(_) => serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Invalid configuration format: {}", e)))?,
    };
    config.validate()?;
    Ok(config)
}

/// Loads and validates the configuration file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    debug!("Loading configuration from {}", path.display());
    let content = std::fs::read_to_string(path).map_err(Error::IoError)?;
    parse_config(&content)
}
