//! Parsing of placeholder bodies, i.e. everything between `[` and `]` after an optional
//! group prefix has been removed.
//!
//! A body is either the task id marker, a numeric range with an optional step or a comma
//! separated list of literal values.

use crate::template::TemplateError;
use itertools::Itertools;
use tracing::warn;

/// upper bound for the number of values a single numeric range may expand to
pub const MAX_RANGE_VALUES: usize = 10000;

/// tolerance used when comparing float ranges against their bounds
const EPSILON: f64 = 1e-9;

/// Result of parsing a placeholder body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeBody {
    /// `[id]`, fed directly by the scheduler
    TaskId,
    /// enumerated values in declaration order
    Values(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl StepOp {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Add),
            '-' => Some(Self::Sub),
            '*' => Some(Self::Mul),
            '/' => Some(Self::Div),
            _ => None,
        }
    }

    /// operator used when the range has no explicit one
    fn towards(ascending: bool) -> Self {
        if ascending {
            Self::Add
        } else {
            Self::Sub
        }
    }

    /// whether a step of this size can ever move a value
    fn makes_progress(self, step_is_zero: bool, step_is_one: bool) -> bool {
        match self {
            Self::Add | Self::Sub => !step_is_zero,
            Self::Mul | Self::Div => !step_is_zero && !step_is_one,
        }
    }
}

/// `NUM '-' NUM [ ':' [OP] NUM ]`, still in its textual form
#[derive(Debug, Clone, PartialEq, Eq)]
struct NumRange<'a> {
    source: &'a str,
    first: &'a str,
    last: &'a str,
    op: Option<StepOp>,
    step: Option<&'a str>,
}

/// length of the `DIGITS [ '.' [ DIGITS ] ]` prefix of `input`, 0 if there is none
fn number_prefix(input: &str) -> usize {
    let digits = input.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return 0;
    }

    match input[digits..].strip_prefix('.') {
        Some(fraction) => digits + 1 + fraction.bytes().take_while(|b| b.is_ascii_digit()).count(),
        None => digits,
    }
}

fn decimals(literal: &str) -> usize {
    literal
        .split_once('.')
        .map(|(_, fraction)| fraction.len())
        .unwrap_or(0)
}

fn parse_int(literal: &str) -> Option<i64> {
    if literal.contains('.') {
        None
    } else {
        literal.parse().ok()
    }
}

impl<'a> NumRange<'a> {
    /// Match the whole body as a numeric range. Partial matches are not ranges.
    fn parse(source: &'a str) -> Option<Self> {
        let first_len = number_prefix(source);
        if first_len == 0 {
            return None;
        }
        let (first, rest) = source.split_at(first_len);
        let rest = rest.strip_prefix('-')?;

        let last_len = number_prefix(rest);
        if last_len == 0 {
            return None;
        }
        let (last, rest) = rest.split_at(last_len);

        if rest.is_empty() {
            return Some(Self {
                source,
                first,
                last,
                op: None,
                step: None,
            });
        }

        let rest = rest.strip_prefix(':')?;
        let (op, step) = match rest.chars().next().and_then(StepOp::from_char) {
            Some(op) => (Some(op), &rest[1..]),
            None => (None, rest),
        };

        let step_len = number_prefix(step);
        if step_len == 0 || step_len != step.len() {
            return None;
        }

        Some(Self {
            source,
            first,
            last,
            op,
            step: Some(step),
        })
    }

    fn invalid_step(&self) -> TemplateError {
        TemplateError::InvalidStep(self.source.to_string())
    }

    fn expand(&self) -> Result<Vec<String>, TemplateError> {
        match (
            parse_int(self.first),
            parse_int(self.last),
            parse_int(self.step.unwrap_or("1")),
        ) {
            (Some(first), Some(last), Some(step)) => self.expand_int(first, last, step),
            _ => self.expand_float(),
        }
    }

    fn expand_int(&self, first: i64, last: i64, step: i64) -> Result<Vec<String>, TemplateError> {
        let op = self.op.unwrap_or(StepOp::towards(first <= last));
        if !op.makes_progress(step == 0, step == 1) {
            return Err(self.invalid_step());
        }

        let bounds = first.min(last)..=first.max(last);
        let mut values = Vec::new();
        let mut next = Some(first);

        while let Some(value) = next.filter(|value| bounds.contains(value)) {
            if values.len() == MAX_RANGE_VALUES {
                warn!(range = self.source, "Cut range at {MAX_RANGE_VALUES} elements");
                break;
            }
            values.push(value.to_string());

            // overflow ends the range just like leaving the bounds does
            next = match op {
                StepOp::Add => value.checked_add(step),
                StepOp::Sub => value.checked_sub(step),
                StepOp::Mul => value.checked_mul(step),
                StepOp::Div => value.checked_div(step),
            };
        }

        Ok(values)
    }

    fn expand_float(&self) -> Result<Vec<String>, TemplateError> {
        let step_literal = self.step.unwrap_or("1");
        let (first, last, step) = match (
            self.first.parse::<f64>(),
            self.last.parse::<f64>(),
            step_literal.parse::<f64>(),
        ) {
            (Ok(first), Ok(last), Ok(step)) => (first, last, step),
            _ => return Err(self.invalid_step()),
        };

        let op = self.op.unwrap_or(StepOp::towards(first <= last));
        if !op.makes_progress(step == 0.0, step == 1.0) {
            return Err(self.invalid_step());
        }

        let (low, high) = (first.min(last) - EPSILON, first.max(last) + EPSILON);
        let precision = [self.first, self.last, step_literal]
            .into_iter()
            .map(decimals)
            .max()
            .unwrap_or(0);
        let mut values = Vec::new();

        match op {
            StepOp::Add | StepOp::Sub => {
                // computed from the start value to keep rounding errors from accumulating
                let direction = if op == StepOp::Add { 1.0 } else { -1.0 };
                for n in 0.. {
                    let value = first + direction * (n as f64) * step;
                    if !(low..=high).contains(&value) {
                        break;
                    }
                    if values.len() == MAX_RANGE_VALUES {
                        warn!(range = self.source, "Cut range at {MAX_RANGE_VALUES} elements");
                        break;
                    }
                    let value = if value.abs() < EPSILON { 0.0 } else { value };
                    values.push(format!("{value:.precision$}"));
                }
            }
            StepOp::Mul | StepOp::Div => {
                let mut value = first;
                while (low..=high).contains(&value) {
                    if values.len() == MAX_RANGE_VALUES {
                        warn!(range = self.source, "Cut range at {MAX_RANGE_VALUES} elements");
                        break;
                    }
                    values.push(value.to_string());
                    value = if op == StepOp::Mul {
                        value * step
                    } else {
                        value / step
                    };
                }
            }
        }

        Ok(values)
    }
}

fn parse_list(body: &str) -> Result<Vec<String>, TemplateError> {
    let values = body
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
        .collect_vec();

    if values.is_empty() {
        Err(TemplateError::EmptyList(body.to_string()))
    } else {
        Ok(values)
    }
}

/// Parse a placeholder body, trying the task id marker, a numeric range and a list in
/// that order.
pub fn parse_range(body: &str) -> Result<RangeBody, TemplateError> {
    let body = body.trim();

    if body.eq_ignore_ascii_case("id") {
        Ok(RangeBody::TaskId)
    } else if let Some(range) = NumRange::parse(body) {
        range.expand().map(RangeBody::Values)
    } else {
        parse_list(body).map(RangeBody::Values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(body: &str) -> Vec<String> {
        match parse_range(body) {
            Ok(RangeBody::Values(values)) => values,
            other => panic!("expected values for [{body}], got {other:?}"),
        }
    }

    #[test]
    fn digit_range() {
        assert_eq!(values("0-9"), (0..10).map(|i| i.to_string()).collect_vec());
    }

    #[test]
    fn descending_range() {
        assert_eq!(values("2-0"), ["2", "1", "0"]);
        assert_eq!(values("5-1"), ["5", "4", "3", "2", "1"]);
    }

    #[test]
    fn stepped_ranges() {
        assert_eq!(values("1-5:1"), ["1", "2", "3", "4", "5"]);
        assert_eq!(values("1-5:+2"), ["1", "3", "5"]);
        assert_eq!(values("5-1:-2"), ["5", "3", "1"]);
        assert_eq!(values("2-8:*2"), ["2", "4", "8"]);
        assert_eq!(values("8-2:/2"), ["8", "4", "2"]);
        assert_eq!(values("1-16:*2"), ["1", "2", "4", "8", "16"]);
    }

    #[test]
    fn step_away_from_end_yields_start_only() {
        assert_eq!(values("5-1:+2"), ["5"]);
    }

    #[test]
    fn float_ranges() {
        assert_eq!(values("0.1-0.3"), ["0.1", "0.2", "0.3"]);
        assert_eq!(values("1-2:0.25"), ["1.00", "1.25", "1.50", "1.75", "2.00"]);
        assert_eq!(values("0.3-0:-0.1"), ["0.3", "0.2", "0.1", "0.0"]);
        assert_eq!(values("0.5-4:*2"), ["0.5", "1", "2", "4"]);
    }

    #[test]
    fn steps_without_progress_are_rejected() {
        for body in ["1-5:0", "1-5:*1", "8-2:/1", "0.1-0.5:0.0"] {
            assert_eq!(
                parse_range(body),
                Err(TemplateError::InvalidStep(body.to_string())),
                "{body}"
            );
        }
    }

    #[test]
    fn large_ranges_are_cut() {
        assert_eq!(values("0-20000").len(), MAX_RANGE_VALUES);
        // 0 * 2 never leaves the range
        assert_eq!(values("0-8:*2").len(), MAX_RANGE_VALUES);
    }

    #[test]
    fn task_id() {
        assert_eq!(parse_range("id"), Ok(RangeBody::TaskId));
        assert_eq!(parse_range("ID"), Ok(RangeBody::TaskId));
    }

    #[test]
    fn lists() {
        assert_eq!(values("foo,bar"), ["foo", "bar"]);
        assert_eq!(values("foo, bar,,baz"), ["foo", "bar", "baz"]);
        assert_eq!(values("single"), ["single"]);
        assert_eq!(values("id,x"), ["id", "x"]);
    }

    #[test]
    fn partial_numeric_range_is_a_list() {
        assert_eq!(values("1-5abc"), ["1-5abc"]);
        assert_eq!(values("1-5:"), ["1-5:"]);
        assert_eq!(values("1-5,7"), ["1-5", "7"]);
    }

    #[test]
    fn list_without_items() {
        assert_eq!(parse_range(",,"), Err(TemplateError::EmptyList(",,".to_string())));
    }
}
