//! A TextFSM template engine.
//!
//! Templates declare `Value` lines followed by named states made of `^regex`
//! rules. Running a template over text walks it line by line, captures values
//! and emits a row whenever a `Record` action fires (plus once at end of input,
//! unless the template declares its own `EOF` state).
//!
//! ```text
//! Value Required Interface (\S+)
//! Value Status (up|down)
//!
//! Start
//!   ^${Interface} is ${Status} -> Record
//! ```

use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

use crate::error::{Error, Result};

const LINE_OPS: [&str; 3] = ["Continue", "Next", "Error"];
const RECORD_OPS: [&str; 4] = ["Clear", "Clearall", "Record", "NoRecord"];

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*#").unwrap());
static STATE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w+$").unwrap());
static MATCH_ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<match>.*)\s->(?P<action>.*)$").unwrap());
static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\s+(?P<ln_op>Continue|Next|Error)(\.(?P<rec_op>Clear|Clearall|Record|NoRecord))?(\s+(?P<new_state>\w+|".*"))?$"#,
    )
    .unwrap()
});
static ACTION2_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s+(?P<rec_op>Clear|Clearall|Record|NoRecord)(\s+(?P<new_state>\w+|".*"))?$"#)
        .unwrap()
});
static ACTION3_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^(\s+(?P<new_state>\w+|".*"))?$"#).unwrap());

fn template_error(line: usize, message: impl AsRef<str>) -> Error {
    Error::TextFsmError(format!("template line {}: {}", line, message.as_ref()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueOption {
    Filldown,
    Fillup,
    Key,
    List,
    Required,
}

impl ValueOption {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "Filldown" => Some(Self::Filldown),
            "Fillup" => Some(Self::Fillup),
            "Key" => Some(Self::Key),
            "List" => Some(Self::List),
            "Required" => Some(Self::Required),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct ValueDef {
    name: String,
    /// Declared pattern with its outer group named after the value
    named_pattern: String,
    options: Vec<ValueOption>,
}

impl ValueDef {
    fn has(&self, option: ValueOption) -> bool {
        self.options.contains(&option)
    }

    fn parse(line: &str, line_num: usize) -> Result<Self> {
        let tokens: Vec<&str> = line.split(' ').collect();
        if tokens.len() < 3 {
            return Err(template_error(line_num, "expected at least 3 tokens on Value line"));
        }

        let (options, name, pattern) = if tokens[2].starts_with('(') {
            (Vec::new(), tokens[1], tokens[2..].join(" "))
        } else {
            let mut options = Vec::new();
            for option in tokens[1].split(',') {
                let parsed = ValueOption::parse(option).ok_or_else(|| {
                    template_error(line_num, format!("unknown Value option '{}'", option))
                })?;
                if options.contains(&parsed) {
                    return Err(template_error(line_num, format!("duplicate option '{}'", option)));
                }
                options.push(parsed);
            }
            if tokens.len() < 4 {
                return Err(template_error(line_num, "missing Value pattern"));
            }
            (options, tokens[2], tokens[3..].join(" "))
        };

        if !pattern.starts_with('(') || !pattern.ends_with(')') || pattern.ends_with("\\)") {
            return Err(template_error(
                line_num,
                format!("Value '{}' pattern must be wrapped in parentheses", name),
            ));
        }
        if !STATE_NAME_RE.is_match(name) {
            return Err(template_error(line_num, format!("invalid Value name '{}'", name)));
        }
        Regex::new(&pattern).map_err(|e| {
            template_error(line_num, format!("invalid pattern for Value '{}': {}", name, e))
        })?;

        let named_pattern = format!("(?P<{}>{}", name, &pattern[1..]);
        Ok(Self { name: name.to_string(), named_pattern, options })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum LineOp {
    #[default]
    Next,
    Continue,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum RecordOp {
    #[default]
    NoRecord,
    Record,
    Clear,
    Clearall,
}

#[derive(Debug, Clone)]
struct Rule {
    regex: Regex,
    line_op: LineOp,
    record_op: RecordOp,
    /// Target state, or the message of an `Error` action
    new_state: Option<String>,
    line_num: usize,
}

/// Expands `${name}`, `$name` and `$$` the way Python's `string.Template` does.
fn substitute(pattern: &str, vars: &IndexMap<String, String>, line_num: usize) -> Result<String> {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if let Some(stripped) = after.strip_prefix('$') {
            out.push('$');
            rest = stripped;
            continue;
        }
        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            let end = braced
                .find('}')
                .ok_or_else(|| template_error(line_num, "unterminated ${...} substitution"))?;
            (&braced[..end], end + 2)
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(template_error(line_num, "invalid placeholder in rule"));
        }
        let value = vars
            .get(name)
            .ok_or_else(|| template_error(line_num, format!("unknown Value '{}' in rule", name)))?;
        out.push_str(value);
        rest = &after[consumed..];
    }
    out.push_str(rest);
    Ok(out)
}

impl Rule {
    fn parse(line: &str, line_num: usize, vars: &IndexMap<String, String>) -> Result<Self> {
        let line = line.trim();
        let (matcher, action) = match MATCH_ACTION_RE.captures(line) {
            Some(caps) => (
                caps.name("match").map_or("", |m| m.as_str()),
                Some(caps.name("action").map_or("", |m| m.as_str())),
            ),
            None => (line, None),
        };

        let pattern = substitute(matcher, vars, line_num)?;
        let regex = Regex::new(&format!("^(?:{})", pattern))
            .map_err(|e| template_error(line_num, format!("invalid rule regex: {}", e)))?;

        let mut rule = Self {
            regex,
            line_op: LineOp::default(),
            record_op: RecordOp::default(),
            new_state: None,
            line_num,
        };
        let Some(action) = action else {
            return Ok(rule);
        };

        let caps = ACTION_RE
            .captures(action)
            .or_else(|| ACTION2_RE.captures(action))
            .or_else(|| ACTION3_RE.captures(action))
            .ok_or_else(|| template_error(line_num, format!("badly formatted rule '{}'", line)))?;

        if let Some(op) = caps.name("ln_op") {
            rule.line_op = match op.as_str() {
                "Continue" => LineOp::Continue,
                "Error" => LineOp::Error,
                _ => LineOp::Next,
            };
        }
        if let Some(op) = caps.name("rec_op") {
            rule.record_op = match op.as_str() {
                "Record" => RecordOp::Record,
                "Clear" => RecordOp::Clear,
                "Clearall" => RecordOp::Clearall,
                _ => RecordOp::NoRecord,
            };
        }
        rule.new_state = caps.name("new_state").map(|m| m.as_str().to_string());

        if rule.line_op == LineOp::Continue && rule.new_state.is_some() {
            return Err(template_error(line_num, "Continue actions can't change state"));
        }
        Ok(rule)
    }
}

/// One output cell: a scalar value, or the accumulated items of a `List` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    List(Vec<String>),
}

impl Cell {
    fn is_empty(&self) -> bool {
        match self {
            Cell::Text(text) => text.is_empty(),
            Cell::List(items) => items.is_empty(),
        }
    }
}

/// A compiled TextFSM template.
#[derive(Debug, Clone)]
pub struct TextFsm {
    values: Vec<ValueDef>,
    states: IndexMap<String, Vec<Rule>>,
}

impl TextFsm {
    /// Compiles template text.
    ///
    /// # Errors
    /// * `Error::TextFsmError` pointing at the offending template line
    pub fn new(template: &str) -> Result<Self> {
        let mut lines = template.lines().enumerate().map(|(i, line)| (i + 1, line.trim_end()));

        let mut values: Vec<ValueDef> = Vec::new();
        for (line_num, line) in lines.by_ref() {
            if line.is_empty() {
                break;
            }
            if COMMENT_RE.is_match(line) {
                continue;
            }
            if line.starts_with("Value ") {
                let value = ValueDef::parse(line, line_num)?;
                if values.iter().any(|v| v.name == value.name) {
                    return Err(template_error(
                        line_num,
                        format!("duplicate Value '{}'", value.name),
                    ));
                }
                values.push(value);
            } else if values.is_empty() {
                return Err(template_error(line_num, "no Value definitions found"));
            } else {
                return Err(template_error(line_num, "expected blank line after last Value"));
            }
        }
        if values.is_empty() {
            return Err(Error::TextFsmError("template declares no Values".to_string()));
        }

        let vars: IndexMap<String, String> =
            values.iter().map(|v| (v.name.clone(), v.named_pattern.clone())).collect();

        let mut states: IndexMap<String, Vec<Rule>> = IndexMap::new();
        let mut current: Option<String> = None;
        for (line_num, line) in lines {
            if line.is_empty() {
                current = None;
                continue;
            }
            if COMMENT_RE.is_match(line) {
                continue;
            }
            match &current {
                None => {
                    let reserved = LINE_OPS.contains(&line) || RECORD_OPS.contains(&line);
                    if !STATE_NAME_RE.is_match(line) || reserved {
                        return Err(template_error(line_num, format!("invalid state name '{}'", line)));
                    }
                    if states.contains_key(line) {
                        return Err(template_error(line_num, format!("duplicate state '{}'", line)));
                    }
                    states.insert(line.to_string(), Vec::new());
                    current = Some(line.to_string());
                }
                Some(state) => {
                    if !(line.starts_with(" ^") || line.starts_with("  ^") || line.starts_with("\t^")) {
                        return Err(template_error(
                            line_num,
                            "missing white space or caret before rule",
                        ));
                    }
                    let rule = Rule::parse(line, line_num, &vars)?;
                    if let Some(rules) = states.get_mut(state) {
                        rules.push(rule);
                    }
                }
            }
        }

        let fsm = Self { values, states };
        fsm.validate()?;
        Ok(fsm)
    }

    fn validate(&self) -> Result<()> {
        if !self.states.contains_key("Start") {
            return Err(Error::TextFsmError("missing 'Start' state".to_string()));
        }
        for reserved in ["End", "EOF"] {
            if self.states.get(reserved).is_some_and(|rules| !rules.is_empty()) {
                return Err(Error::TextFsmError(format!("'{}' state must be empty", reserved)));
            }
        }
        for rules in self.states.values() {
            for rule in rules {
                if rule.line_op == LineOp::Error {
                    continue;
                }
                if let Some(state) = &rule.new_state {
                    if state != "End" && state != "EOF" && !self.states.contains_key(state) {
                        return Err(template_error(
                            rule.line_num,
                            format!("undefined state '{}'", state),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Value names in declaration order.
    pub fn header(&self) -> Vec<&str> {
        self.values.iter().map(|v| v.name.as_str()).collect()
    }

    /// Runs the template over `text` and returns the recorded rows.
    ///
    /// # Errors
    /// * `Error::TextFsmError` when an `Error` action fires
    pub fn parse_text(&self, text: &str) -> Result<Vec<Vec<Cell>>> {
        let mut run = Run::new(&self.values);
        let mut state = "Start";

        'lines: for line in text.lines() {
            for rule in &self.states[state] {
                let Some(caps) = rule.regex.captures(line) else {
                    continue;
                };
                for (index, value) in self.values.iter().enumerate() {
                    if rule.regex.capture_names().flatten().any(|n| n == value.name) {
                        run.assign(index, caps.name(&value.name).map(|m| m.as_str().to_string()));
                    }
                }

                match rule.record_op {
                    RecordOp::Record => run.append_record(),
                    RecordOp::Clear => run.clear_record(),
                    RecordOp::Clearall => run.clear_all(),
                    RecordOp::NoRecord => {}
                }

                match rule.line_op {
                    LineOp::Error => {
                        let message = rule.new_state.as_deref().unwrap_or("state error raised");
                        return Err(Error::TextFsmError(format!(
                            "{} (rule line {}, input '{}')",
                            message.trim_matches('"'),
                            rule.line_num,
                            line
                        )));
                    }
                    LineOp::Continue => continue,
                    LineOp::Next => {
                        if let Some(next) = rule.new_state.as_deref() {
                            if next == "End" || next == "EOF" {
                                state = next;
                                break 'lines;
                            }
                            state = next;
                        }
                        continue 'lines;
                    }
                }
            }
        }

        if state != "End" && !self.states.contains_key("EOF") {
            run.append_record();
        }
        Ok(run.rows)
    }

    /// Runs the template and keys every row by value name.
    pub fn parse_text_to_dicts(&self, text: &str) -> Result<Vec<IndexMap<String, Cell>>> {
        let rows = self.parse_text(text)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                self.values.iter().map(|v| v.name.clone()).zip(row).collect::<IndexMap<_, _>>()
            })
            .collect())
    }
}

#[derive(Debug, Default)]
struct Slot {
    value: Option<String>,
    items: Vec<String>,
    filldown: Option<String>,
}

/// Mutable state of one `parse_text` call.
struct Run<'a> {
    values: &'a [ValueDef],
    slots: Vec<Slot>,
    rows: Vec<Vec<Cell>>,
}

impl<'a> Run<'a> {
    fn new(values: &'a [ValueDef]) -> Self {
        let slots = values.iter().map(|_| Slot::default()).collect();
        Self { values, slots, rows: Vec::new() }
    }

    fn assign(&mut self, index: usize, value: Option<String>) {
        let values = self.values;
        let def = &values[index];
        let slot = &mut self.slots[index];
        slot.value = value;
        for option in &def.options {
            match option {
                ValueOption::Filldown => slot.filldown = slot.value.clone(),
                ValueOption::List => {
                    if let Some(item) = &slot.value {
                        slot.items.push(item.clone());
                    }
                }
                ValueOption::Fillup => {
                    let Some(fill) = slot.value.clone().filter(|v| !v.is_empty()) else {
                        continue;
                    };
                    for row in self.rows.iter_mut().rev() {
                        if !row[index].is_empty() {
                            break;
                        }
                        row[index] = Cell::Text(fill.clone());
                    }
                }
                ValueOption::Key | ValueOption::Required => {}
            }
        }
    }

    fn append_record(&mut self) {
        let mut record = Vec::with_capacity(self.values.len());
        let mut unset = 0;
        for (def, slot) in self.values.iter().zip(&self.slots) {
            let cell = if def.has(ValueOption::List) {
                if slot.items.is_empty() {
                    unset += 1;
                }
                Cell::List(slot.items.clone())
            } else {
                if slot.value.is_none() {
                    unset += 1;
                }
                Cell::Text(slot.value.clone().unwrap_or_default())
            };
            if def.has(ValueOption::Required) && cell.is_empty() {
                self.clear_record();
                return;
            }
            record.push(cell);
        }

        if unset == record.len() {
            return;
        }
        self.rows.push(record);
        self.clear_record();
    }

    fn clear_record(&mut self) {
        for (def, slot) in self.values.iter().zip(self.slots.iter_mut()) {
            slot.value = None;
            if def.has(ValueOption::Filldown) {
                slot.value = slot.filldown.clone();
            } else if def.has(ValueOption::List) {
                slot.items.clear();
            }
        }
    }

    fn clear_all(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = Slot::default();
        }
    }
}
