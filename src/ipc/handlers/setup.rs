use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::render::PrinterSettings;
use crate::template::Organization;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Organization,
    Exam,
    Printer,
}

impl SetupSection {
    const ALL: [SetupSection; 3] = [Self::Organization, Self::Exam, Self::Printer];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "organization" => Some(Self::Organization),
            "exam" => Some(Self::Exam),
            "printer" => Some(Self::Printer),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Exam => "exam",
            Self::Printer => "printer",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Organization => "setup.organization",
            Self::Exam => "setup.exam",
            Self::Printer => "setup.printer",
        }
    }
}

/// `exam` setup section: values used when an issue request leaves them out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExamDefaults {
    pub default_exam_name: String,
    pub default_exam_time: String,
}

impl Default for ExamDefaults {
    fn default() -> Self {
        Self {
            default_exam_name: "Haryana GK Exam 2025".into(),
            default_exam_time: "10:00 AM - 12:00 PM".into(),
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    let value = match section {
        SetupSection::Organization => serde_json::to_value(Organization::default()),
        SetupSection::Exam => serde_json::to_value(ExamDefaults::default()),
        SetupSection::Printer => serde_json::to_value(PrinterSettings::default()),
    };
    value.unwrap_or_else(|_| json!({}))
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_f64_range(v: &Value, key: &str, min: f64, max: f64) -> Result<f64, String> {
    let n = v.as_f64().ok_or_else(|| format!("{} must be a number", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.chars().count() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn parse_required_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = parse_string_max(v, key, max_len)?;
    if s.is_empty() {
        return Err(format!("{} must not be empty", key));
    }
    Ok(s)
}

fn parse_font_path(v: &Value, key: &str) -> Result<Value, String> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    let s = parse_string_max(v, key, 1024)?;
    if s.is_empty() {
        return Ok(Value::Null);
    }
    if !std::path::Path::new(&s).is_file() {
        return Err(format!("{} does not point to a file: {}", key, s));
    }
    Ok(Value::String(s))
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Organization => match k.as_str() {
                "nameEn" | "nameLocal" => {
                    obj.insert(k.clone(), Value::String(parse_required_string_max(v, k, 120)?));
                }
                "registrationNo" | "darpanId" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 60)?));
                }
                "address" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 240)?));
                }
                "phone" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 40)?));
                }
                _ => return Err(format!("unknown organization field: {}", k)),
            },
            SetupSection::Exam => match k.as_str() {
                "defaultExamName" => {
                    obj.insert(k.clone(), Value::String(parse_required_string_max(v, k, 120)?));
                }
                "defaultExamTime" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 60)?));
                }
                _ => return Err(format!("unknown exam field: {}", k)),
            },
            SetupSection::Printer => match k.as_str() {
                "exportScale" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 4)?));
                }
                "pageMarginMm" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 5, 30)?));
                }
                "printMarginCm" => {
                    obj.insert(k.clone(), Value::from(parse_f64_range(v, k, 0.0, 3.0)?));
                }
                "fontPath" => {
                    obj.insert(k.clone(), parse_font_path(v, k)?);
                }
                "pdfMode" => {
                    let mode = v.as_str().unwrap_or_default();
                    if !matches!(mode, "raster" | "vector") {
                        return Err(format!("{} must be \"raster\" or \"vector\"", k));
                    }
                    obj.insert(k.clone(), Value::String(mode.to_string()));
                }
                _ => return Err(format!("unknown printer field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Stored values that no longer validate fall back to defaults.
            if let Err(e) = merge_section_patch(section, &mut current, saved_obj) {
                tracing::warn!(section = section.name(), error = %e, "stored setup ignored");
                current = default_section(section);
            }
        }
    }
    Ok(current)
}

/// Typed view of a section; defaults without a workspace or on any error.
fn typed_section<T: DeserializeOwned + Default>(state: &AppState, section: SetupSection) -> T {
    let Some(conn) = state.db.as_ref() else {
        return T::default();
    };
    let loaded = load_section(conn, section)
        .and_then(|v| serde_json::from_value(v).map_err(anyhow::Error::from));
    match loaded {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(section = section.name(), error = %e, "setup unreadable; using defaults");
            T::default()
        }
    }
}

pub fn organization(state: &AppState) -> Organization {
    typed_section(state, SetupSection::Organization)
}

pub fn exam_defaults(state: &AppState) -> ExamDefaults {
    typed_section(state, SetupSection::Exam)
}

pub fn printer(state: &AppState) -> PrinterSettings {
    typed_section(state, SetupSection::Printer)
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let mut out = Map::new();
    for section in SetupSection::ALL {
        match load_section(conn, section) {
            Ok(v) => {
                out.insert(section.name().to_string(), v);
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    ok(&req.id, Value::Object(out))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(section = section.name(), "setup updated");
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
