//! crates/training_plan_core/src/parser.rs
//!
//! Decodes the model's free-form output into a `TrainingSchedule`.
//!
//! Model output is untrusted: the parser never panics and every failure comes
//! back as a classified `DecodeError` naming the offending path. Decoding is
//! all-or-nothing; `parse_salvaging` is the explicit opt-in for keeping the
//! well-formed weeks of a partially broken document.

use crate::domain::{Intensity, TrainingDay, TrainingSchedule, TrainingWeek, Workout};
use crate::error::{DecodeError, DecodeErrorKind};
use serde_json::{Map, Value};
use uuid::Uuid;

type Object = Map<String, Value>;

/// Weeks recovered from a partially valid document.
#[derive(Debug, Clone)]
pub struct SalvageReport {
    pub weeks: Vec<TrainingWeek>,
    pub rejected: Vec<DecodeError>,
}

#[derive(Debug, Clone, Copy)]
pub struct ScheduleParser {
    id_source: fn() -> Uuid,
}

impl Default for ScheduleParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleParser {
    /// A parser that assigns a fresh random identifier to every decoded entity.
    pub fn new() -> Self {
        Self {
            id_source: Uuid::new_v4,
        }
    }

    /// A parser that takes entity identifiers from `id_source`.
    pub fn with_id_source(id_source: fn() -> Uuid) -> Self {
        Self { id_source }
    }

    /// Strictly decodes `text`. Any invalid week rejects the whole document.
    pub fn parse(&self, text: &str) -> Result<TrainingSchedule, DecodeError> {
        let root = parse_root(text)?;
        let weeks = required_array(&root, "", "weeks")?;
        let weeks = weeks
            .iter()
            .enumerate()
            .map(|(i, week)| self.decode_week(week, &format!("weeks[{i}]")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TrainingSchedule::new(weeks))
    }

    /// Decodes every week independently, keeping the valid ones.
    ///
    /// Document-level problems (not JSON, no `weeks` array) still fail.
    pub fn parse_salvaging(&self, text: &str) -> Result<SalvageReport, DecodeError> {
        let root = parse_root(text)?;
        let weeks = required_array(&root, "", "weeks")?;
        let mut report = SalvageReport {
            weeks: Vec::new(),
            rejected: Vec::new(),
        };
        for (i, week) in weeks.iter().enumerate() {
            match self.decode_week(week, &format!("weeks[{i}]")) {
                Ok(week) => report.weeks.push(week),
                Err(e) => report.rejected.push(e),
            }
        }
        Ok(report)
    }

    fn decode_week(&self, value: &Value, path: &str) -> Result<TrainingWeek, DecodeError> {
        let week = expect_object(value, path)?;

        let week_number = expect_int(required(week, path, "weekNumber")?, &child(path, "weekNumber"))?;
        let week_number = u32::try_from(week_number)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                DecodeError::new(
                    DecodeErrorKind::InvalidValue,
                    child(path, "weekNumber"),
                    format!("week number must be a positive integer, found {week_number}"),
                )
            })?;

        let goal = expect_str(required(week, path, "goal")?, &child(path, "goal"))?;
        let days_path = child(path, "days");
        let days = required_array(week, path, "days")?
            .iter()
            .enumerate()
            .map(|(i, day)| self.decode_day(day, &format!("{days_path}[{i}]")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TrainingWeek {
            id: (self.id_source)(),
            week_number,
            goal: goal.to_string(),
            days,
            total_weekly_distance: optional_f64(week, path, "totalWeeklyDistance")?,
            weekly_goal: optional_string(week, path, "weeklyGoal")?,
        })
    }

    fn decode_day(&self, value: &Value, path: &str) -> Result<TrainingDay, DecodeError> {
        let day = expect_object(value, path)?;

        let day_number = match optional(day, "dayNumber") {
            None => None,
            Some(value) => {
                let number_path = child(path, "dayNumber");
                let number = expect_int(value, &number_path)?;
                let number = u8::try_from(number)
                    .ok()
                    .filter(|n| (1..=7).contains(n))
                    .ok_or_else(|| {
                        DecodeError::new(
                            DecodeErrorKind::InvalidValue,
                            number_path,
                            format!("day number must be between 1 and 7, found {number}"),
                        )
                    })?;
                Some(number)
            }
        };

        let workouts_path = child(path, "workouts");
        let workouts = required_array(day, path, "workouts")?
            .iter()
            .enumerate()
            .map(|(i, workout)| self.decode_workout(workout, &format!("{workouts_path}[{i}]")))
            .collect::<Result<Vec<_>, _>>()?;

        let recovery_focus = match optional(day, "recoveryFocus") {
            None => None,
            Some(value) => Some(expect_bool(value, &child(path, "recoveryFocus"))?),
        };

        Ok(TrainingDay {
            id: (self.id_source)(),
            day_number,
            workouts,
            notes: optional_string(day, path, "notes")?,
            recovery_focus,
        })
    }

    fn decode_workout(&self, value: &Value, path: &str) -> Result<Workout, DecodeError> {
        let workout = expect_object(value, path)?;

        let name = expect_str(required(workout, path, "name")?, &child(path, "name"))?;
        let description = expect_str(
            required(workout, path, "description")?,
            &child(path, "description"),
        )?;

        let intensity_path = child(path, "intensity");
        let label = expect_str(required(workout, path, "intensity")?, &intensity_path)?;
        let intensity = label.parse::<Intensity>().map_err(|e| {
            let allowed = Intensity::ALL.map(Intensity::label).join(", ");
            DecodeError::new(
                DecodeErrorKind::InvalidValue,
                intensity_path,
                format!("{e}, expected one of: {allowed}"),
            )
        })?;

        let duration_path = child(path, "duration");
        let duration = expect_f64(required(workout, path, "duration")?, &duration_path)?;
        if duration <= 0.0 {
            return Err(DecodeError::new(
                DecodeErrorKind::InvalidValue,
                duration_path,
                format!("duration must be positive, found {duration}"),
            ));
        }

        Ok(Workout {
            id: (self.id_source)(),
            name: name.to_string(),
            description: description.to_string(),
            intensity,
            duration,
            distance: optional_f64(workout, path, "distance")?,
            target_pace: optional_string(workout, path, "targetPace")?,
            heart_rate_zone: optional_string(workout, path, "heartRateZone")?,
        })
    }
}

/// Finds the JSON object inside the model's reply.
///
/// Models tend to wrap the document in markdown fences or a sentence of
/// prose; this accepts a bare object, a ```json block, a plain ``` block, or
/// the span from the first `{` to the last `}`.
pub fn locate_document(text: &str) -> Result<&str, DecodeError> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        return Ok(trimmed.rfind('}').map_or(trimmed, |end| &trimmed[..=end]));
    }

    if let Some(start) = text.find("```json") {
        let start = start + "```json".len();
        if let Some(end) = text[start..].find("```") {
            return Ok(text[start..start + end].trim());
        }
    }

    if let Some(start) = text.find("```") {
        let start = start + 3;
        // Skip a language identifier if present.
        let content_start = text[start..].find('\n').map_or(start, |i| start + i + 1);
        if let Some(end) = text[content_start..].find("```") {
            return Ok(text[content_start..content_start + end].trim());
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return Ok(&text[start..=end]);
        }
    }

    Err(DecodeError::new(
        DecodeErrorKind::Malformed,
        "",
        "no JSON object found in model output",
    ))
}

fn parse_root(text: &str) -> Result<Object, DecodeError> {
    let document = locate_document(text)?;
    let root: Value = serde_json::from_str(document)
        .map_err(|e| DecodeError::new(DecodeErrorKind::Malformed, "", e.to_string()))?;
    match root {
        Value::Object(object) => Ok(object),
        other => Err(type_mismatch("", "object", &other)),
    }
}

//=========================================================================================
// Value Helpers
//=========================================================================================

fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_mismatch(path: &str, expected: &str, found: &Value) -> DecodeError {
    DecodeError::new(
        DecodeErrorKind::TypeMismatch,
        path,
        format!("expected {expected}, found {}", type_name(found)),
    )
}

/// A required key; `null` counts as a missing value.
fn required<'a>(object: &'a Object, path: &str, key: &str) -> Result<&'a Value, DecodeError> {
    match object.get(key) {
        None => Err(DecodeError::new(
            DecodeErrorKind::MissingField,
            child(path, key),
            format!("missing field `{key}`"),
        )),
        Some(Value::Null) => Err(DecodeError::new(
            DecodeErrorKind::InvalidValue,
            child(path, key),
            "expected a value, found null",
        )),
        Some(value) => Ok(value),
    }
}

/// An optional key; absent and `null` are both `None`.
fn optional<'a>(object: &'a Object, key: &str) -> Option<&'a Value> {
    object.get(key).filter(|value| !value.is_null())
}

fn required_array<'a>(object: &'a Object, path: &str, key: &str) -> Result<&'a Vec<Value>, DecodeError> {
    let value = required(object, path, key)?;
    value
        .as_array()
        .ok_or_else(|| type_mismatch(&child(path, key), "array", value))
}

fn expect_object<'a>(value: &'a Value, path: &str) -> Result<&'a Object, DecodeError> {
    value
        .as_object()
        .ok_or_else(|| type_mismatch(path, "object", value))
}

fn expect_str<'a>(value: &'a Value, path: &str) -> Result<&'a str, DecodeError> {
    value
        .as_str()
        .ok_or_else(|| type_mismatch(path, "string", value))
}

fn expect_f64(value: &Value, path: &str) -> Result<f64, DecodeError> {
    value
        .as_f64()
        .ok_or_else(|| type_mismatch(path, "number", value))
}

fn expect_bool(value: &Value, path: &str) -> Result<bool, DecodeError> {
    value
        .as_bool()
        .ok_or_else(|| type_mismatch(path, "boolean", value))
}

/// Integers may arrive as `3` or `3.0`.
fn expect_int(value: &Value, path: &str) -> Result<i64, DecodeError> {
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Ok(n as i64),
        Some(n) if n.fract() == 0.0 => Err(DecodeError::new(
            DecodeErrorKind::InvalidValue,
            path,
            format!("{} is out of range", value),
        )),
        _ => Err(type_mismatch(path, "integer", value)),
    }
}

fn optional_f64(object: &Object, path: &str, key: &str) -> Result<Option<f64>, DecodeError> {
    optional(object, key)
        .map(|value| expect_f64(value, &child(path, key)))
        .transpose()
}

fn optional_string(object: &Object, path: &str, key: &str) -> Result<Option<String>, DecodeError> {
    optional(object, key)
        .map(|value| expect_str(value, &child(path, key)).map(str::to_string))
        .transpose()
}
