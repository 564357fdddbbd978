//! Command-output parser driven by a tree of per-command regexes.
//!
//! The tree is keyed by vendor, then by the whitespace-separated tokens of a
//! command. A node holding a `regex` key is a leaf: its template describes
//! one line of that command's output. For example:
//!
//! ```yaml
//! cisco:
//!   show:
//!     interfaces:
//!       status:
//!         regex: ^(?P<short_type>[A-Za-z]+)(?P<port_number>\d+(?:/\d+)*) ...
//! ```
//!
//! Templates are compiled once when the tree is loaded, after all whitespace
//! is stripped from them, so they can be laid out across several lines in
//! the source document. The loaded tree is immutable and can be shared
//! between sessions behind an `Arc`.

use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ParserError;

/// Vendor root used unless another is selected.
pub const DEFAULT_VENDOR: &str = "cisco";

const REGEX_KEY: &str = "regex";

const BUILTIN_TREE: &str = r#"
cisco:
  show:
    interfaces:
      status:
        regex: >-
          ^(?P<short_type>[A-Za-z]+)(?P<port_number>\d+(?:/\d+)*)\s+
          (?P<name>.*?)\s*
          (?P<status>connected|notconnect|disabled|err-disabled|inactive|monitoring|suspended|sfpAbsent|xcvrAbsent|noOperMem)\s+
          (?P<vlan>\S+)\s+(?P<duplex>\S+)\s+(?P<speed>\S+)
          (?:\s+(?P<type>.*?))?\s*$
"#;

/// A compiled leaf template.
#[derive(Debug, Clone)]
struct Leaf {
    regex: Regex,
    names: Arc<Vec<Option<String>>>,
}

impl Leaf {
    fn compile(command: &str, template: &str) -> Result<Self, ParserError> {
        let stripped: String = template.chars().filter(|c| !c.is_whitespace()).collect();
        let regex = Regex::new(&stripped).map_err(|source| ParserError::InvalidTemplate {
            command: command.to_string(),
            source,
        })?;
        let names = regex
            .capture_names()
            .map(|name| name.map(str::to_string))
            .collect();
        Ok(Self {
            regex,
            names: Arc::new(names),
        })
    }

    fn apply(&self, line: &str) -> Option<MatchRecord> {
        let caps = self.regex.captures(line)?;
        Some(MatchRecord {
            line: line.to_string(),
            groups: caps
                .iter()
                .map(|group| group.map(|m| m.as_str().to_string()))
                .collect(),
            names: Arc::clone(&self.names),
        })
    }
}

/// One level of the tree.
#[derive(Debug, Clone, Default)]
pub struct ParserNode {
    children: IndexMap<String, ParserNode>,
    leaf: Option<Leaf>,
}

impl ParserNode {
    fn from_value(path: &mut Vec<String>, value: &Value) -> Result<Self, ParserError> {
        let Value::Object(map) = value else {
            return Err(ParserError::InvalidTree {
                message: format!("'{}' is not a mapping", path.join(" ")),
            });
        };

        let mut node = ParserNode::default();
        for (key, child) in map {
            if key == REGEX_KEY {
                let Value::String(template) = child else {
                    return Err(ParserError::InvalidTree {
                        message: format!("regex for '{}' is not a string", path.join(" ")),
                    });
                };
                node.leaf = Some(Leaf::compile(&path.join(" "), template)?);
                continue;
            }
            path.push(key.clone());
            let parsed = ParserNode::from_value(path, child);
            path.pop();
            node.children.insert(key.clone(), parsed?);
        }
        Ok(node)
    }

    /// True if this node carries a regex template.
    pub fn is_leaf(&self) -> bool {
        self.leaf.is_some()
    }

    /// The template as compiled (whitespace already stripped).
    pub fn pattern(&self) -> Option<&str> {
        self.leaf.as_ref().map(|leaf| leaf.regex.as_str())
    }

    /// Child for the next command token.
    pub fn child(&self, token: &str) -> Option<&ParserNode> {
        self.children.get(token)
    }

    /// Tokens that descend further from here, in source order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }
}

/// One output line matched against a leaf template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    line: String,
    groups: Vec<Option<String>>,
    names: Arc<Vec<Option<String>>>,
}

impl MatchRecord {
    /// Value of a named group, if the group exists and participated.
    pub fn get(&self, name: &str) -> Option<&str> {
        let index = self
            .names
            .iter()
            .position(|n| n.as_deref() == Some(name))?;
        self.group(index)
    }

    /// Value of a positional group. Group 0 is the whole match.
    pub fn group(&self, index: usize) -> Option<&str> {
        self.groups.get(index)?.as_deref()
    }

    /// Number of groups, including group 0.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The source line this record was matched from.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Named groups in pattern order, with their values.
    pub fn named(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.names
            .iter()
            .zip(&self.groups)
            .filter_map(|(name, value)| Some((name.as_deref()?, value.as_deref())))
    }
}

/// Result of parsing a command's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutput {
    /// The command resolved to a leaf: one record per matching line, in
    /// output order.
    Records(Vec<MatchRecord>),
    /// No leaf on the command's path: the output, unchanged.
    Raw(String),
}

impl ParseOutput {
    /// Records, if the command resolved to a leaf.
    pub fn records(&self) -> Option<&[MatchRecord]> {
        match self {
            ParseOutput::Records(records) => Some(records),
            ParseOutput::Raw(_) => None,
        }
    }

    /// Consume into records; raw output yields none.
    pub fn into_records(self) -> Vec<MatchRecord> {
        match self {
            ParseOutput::Records(records) => records,
            ParseOutput::Raw(_) => Vec::new(),
        }
    }

    /// Raw text, if no leaf was found.
    pub fn raw(&self) -> Option<&str> {
        match self {
            ParseOutput::Raw(text) => Some(text),
            ParseOutput::Records(_) => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, ParseOutput::Raw(_))
    }
}

/// Vendor-rooted tree of command output templates.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "Value")]
pub struct ParserTree {
    vendors: IndexMap<String, ParserNode>,
    vendor: String,
}

impl ParserTree {
    /// Load from an already-parsed document rooted at the default vendor.
    pub fn from_value(value: &Value) -> Result<Self, ParserError> {
        Self::from_value_with_vendor(value, DEFAULT_VENDOR)
    }

    /// Load from an already-parsed document and select `vendor` as root.
    pub fn from_value_with_vendor(value: &Value, vendor: &str) -> Result<Self, ParserError> {
        let Value::Object(map) = value else {
            return Err(ParserError::InvalidTree {
                message: "top level is not a mapping of vendors".to_string(),
            });
        };

        let mut vendors = IndexMap::with_capacity(map.len());
        for (name, root) in map {
            let mut path = Vec::new();
            vendors.insert(name.clone(), ParserNode::from_value(&mut path, root)?);
        }

        Self {
            vendors,
            vendor: String::new(),
        }
        .with_vendor(vendor)
    }

    /// Load from a JSON document.
    pub fn from_json_str(source: &str) -> Result<Self, ParserError> {
        let value: Value = serde_json::from_str(source)?;
        Self::from_value(&value)
    }

    /// Load from a YAML document.
    pub fn from_yaml_str(source: &str) -> Result<Self, ParserError> {
        let value: Value = serde_yaml::from_str(source)?;
        Self::from_value(&value)
    }

    /// The tree shipped with the crate, covering the commands the session
    /// helpers themselves parse (`show interfaces status`).
    pub fn builtin() -> Self {
        Self::from_yaml_str(BUILTIN_TREE).expect("builtin parser tree")
    }

    /// Select a different vendor root from the loaded document.
    pub fn with_vendor(mut self, vendor: &str) -> Result<Self, ParserError> {
        if !self.vendors.contains_key(vendor) {
            return Err(ParserError::MissingVendor {
                vendor: vendor.to_string(),
            });
        }
        self.vendor = vendor.to_string();
        Ok(self)
    }

    /// The selected vendor root name.
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    fn root(&self) -> &ParserNode {
        // with_vendor guarantees the key exists
        &self.vendors[self.vendor.as_str()]
    }

    /// Descend one token at a time while a matching child exists.
    ///
    /// Descent stops at the first token without a child, so trailing
    /// arguments that the tree does not know about are ignored.
    pub fn lookup(&self, command: &str) -> &ParserNode {
        let mut node = self.root();
        for token in command.split_whitespace() {
            match node.child(token) {
                Some(child) => node = child,
                None => break,
            }
        }
        node
    }

    /// Parse `output` as the output of `command`.
    ///
    /// If the command resolves to a leaf, every line is matched against the
    /// template and matching lines become records; other lines are dropped.
    /// Otherwise the output is returned unchanged.
    pub fn parse(&self, command: &str, output: &str) -> ParseOutput {
        let Some(leaf) = &self.lookup(command).leaf else {
            return ParseOutput::Raw(output.to_string());
        };

        ParseOutput::Records(
            output
                .lines()
                .map(|line| line.trim_end_matches('\r'))
                .filter_map(|line| leaf.apply(line))
                .collect(),
        )
    }
}

impl TryFrom<Value> for ParserTree {
    type Error = ParserError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value)
    }
}
