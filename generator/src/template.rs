//! Command templates: literal text interleaved with bracketed placeholders.

use crate::range::{parse_range, RangeBody};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, str::FromStr};
use thiserror::Error;
use tracing::debug;

/// shell variable holding the job array index at runtime
pub const TASK_ID_VARIABLE: &str = "${SLURM_ARRAY_TASK_ID}";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unbalanced bracket at offset {position}")]
    Unbalanced { position: usize },
    #[error("Empty range at offset {position}")]
    EmptyPlaceholder { position: usize },
    #[error("Range group {0} defined multiple times")]
    DuplicateGroup(String),
    #[error("Range group {0} not defined")]
    UndefinedGroup(String),
    #[error("Could not parse list [{0}]")]
    EmptyList(String),
    #[error("Range [{0}] has a step that never reaches its end")]
    InvalidStep(String),
}

/// One enumerated axis of the parameter space
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Dimension {
    /// placeholder body as written by the user, without group prefix
    pub source: String,
    pub values: Vec<String>,
}

impl Dimension {
    pub fn cardinality(&self) -> usize {
        self.values.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// reference into `Template::dimensions`
    Value(usize),
    TaskId,
}

impl Segment {
    /// shell text this segment expands to inside the generated script
    pub fn render(&self) -> String {
        match self {
            Self::Literal(text) => text.clone(),
            Self::Value(index) => format!("${{v{index}}}"),
            Self::TaskId => TASK_ID_VARIABLE.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    /// the invocation as given, arguments joined by single spaces
    pub source: String,
    pub segments: Vec<Segment>,
    pub dimensions: Vec<Dimension>,
}

impl Template {
    /// Build a template from the command line arguments following `--`
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, TemplateError> {
        args.iter().map(AsRef::<str>::as_ref).join(" ").parse()
    }

    /// The command with every placeholder replaced by its shell variable
    pub fn render(&self) -> String {
        self.segments.iter().map(Segment::render).collect()
    }

    pub fn has_task_id(&self) -> bool {
        self.segments.contains(&Segment::TaskId)
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let mut parser = TemplateParser::default();
        let mut segments = Vec::new();
        let mut literal = String::new();
        // offset of the currently open '['
        let mut open = None;

        for (position, c) in source.char_indices() {
            match (c, open) {
                ('[', None) => open = Some(position),
                ('[', Some(_)) | (']', None) => return Err(TemplateError::Unbalanced { position }),
                (']', Some(start)) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parser.placeholder(&source[start + 1..position], start)?);
                    open = None;
                }
                (_, Some(_)) => {}
                (c, None) => literal.push(c),
            }
        }

        if let Some(position) = open {
            return Err(TemplateError::Unbalanced { position });
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
            dimensions: parser.dimensions,
        })
    }
}

#[derive(Default)]
struct TemplateParser {
    groups: BTreeMap<String, Segment>,
    dimensions: Vec<Dimension>,
}

impl TemplateParser {
    /// Resolve the body of one `[...]` into a segment, registering new dimensions and groups
    fn placeholder(&mut self, body: &str, position: usize) -> Result<Segment, TemplateError> {
        if body.trim().is_empty() {
            return Err(TemplateError::EmptyPlaceholder { position });
        }

        let (group, range) = match body.split_once('=') {
            Some((name, range)) if !name.trim().is_empty() => (Some(name.trim()), range),
            _ => (None, body),
        };

        let segment = match group {
            Some(name) if range.trim().is_empty() => {
                return self
                    .groups
                    .get(name)
                    .cloned()
                    .ok_or_else(|| TemplateError::UndefinedGroup(name.to_string()));
            }
            Some(name) if self.groups.contains_key(name) => {
                return Err(TemplateError::DuplicateGroup(name.to_string()));
            }
            _ => self.define(range)?,
        };

        if let Some(name) = group {
            self.groups.insert(name.to_string(), segment.clone());
        }
        debug!(group = ?group, "Parsed range [{range}] at offset {position} as {segment:?}");

        Ok(segment)
    }

    fn define(&mut self, range: &str) -> Result<Segment, TemplateError> {
        match parse_range(range)? {
            RangeBody::TaskId => Ok(Segment::TaskId),
            RangeBody::Values(values) => {
                self.dimensions.push(Dimension {
                    source: range.trim().to_string(),
                    values,
                });

                Ok(Segment::Value(self.dimensions.len() - 1))
            }
        }
    }
}
