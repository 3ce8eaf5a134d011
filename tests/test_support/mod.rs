#![allow(dead_code)]

#[path = "../../src/render/test_font.rs"]
pub mod test_font;

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub struct Sidecar {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Sidecar with `ADMITD_*` cleared and an empty font directory, so exports
/// depend only on the fonts a test configures.
pub fn spawn_sidecar() -> Sidecar {
    spawn_sidecar_with(&[])
}

pub fn spawn_sidecar_with(envs: &[(&str, &str)]) -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_admitd");
    let no_fonts = temp_dir("admitd-no-fonts");
    let mut cmd = Command::new(exe);
    cmd.env_remove("ADMITD_WORKSPACE")
        .env_remove("ADMITD_API_BASE_URL")
        .env_remove("ADMITD_API_TOKEN")
        .env_remove("ADMITD_HTTP_TIMEOUT_SECS")
        .env_remove("ADMITD_LOG_JSON")
        .env("ADMITD_FONT_DIRS", &no_fonts);
    for (key, value) in envs {
        cmd.env(key, value);
    }
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn admitd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
        next_id: 0,
    }
}

impl Sidecar {
    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");

        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .expect("read response line");
        assert!(!line.trim().is_empty(), "empty response for {}", method);
        let value: serde_json::Value =
            serde_json::from_str(line.trim()).expect("parse response json");
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_default()
    }

    /// Sends a request that must fail and returns the error code.
    pub fn request_err(&mut self, method: &str, params: serde_json::Value) -> (String, String) {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        let error = value.get("error").cloned().unwrap_or_default();
        (
            error
                .get("code")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            error
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        )
    }

    pub fn select_workspace(&mut self, path: &Path) {
        let _ = self.request_ok("workspace.select", json!({ "path": path.to_string_lossy() }));
    }

    /// Writes a font with Latin and Devanagari glyphs into `dir` and makes it
    /// the printer font.
    pub fn use_test_font(&mut self, dir: &Path) -> PathBuf {
        let font = test_font::write(dir, "card-font.ttf", test_font::FULL);
        let _ = self.request_ok(
            "setup.update",
            json!({ "section": "printer", "patch": { "fontPath": font.to_string_lossy() } }),
        );
        font
    }
}

/// Students whose id ends in `1` have no father's name on record.
pub fn student(id: &str, roll: Option<&str>, class: &str) -> serde_json::Value {
    let father: Option<String> = (!id.ends_with('1')).then(|| format!("Father {id}"));
    json!({
        "id": id,
        "registrationNumber": format!("MWS-{id}"),
        "rollNumber": roll,
        "fullName": format!("Student {id}"),
        "fatherName": father,
        "class": class,
        "feePaid": true
    })
}

/// Workspace with six students in classes 8, 9 and 10; two of them have no
/// roll number.
pub fn seeded_workspace(prefix: &str) -> (Sidecar, PathBuf) {
    let workspace = temp_dir(prefix);
    let mut sidecar = spawn_sidecar();
    sidecar.select_workspace(&workspace);
    let roster = json!([
        student("s1", Some("801"), "8"),
        student("s2", Some("802"), "8"),
        student("s3", None, "8"),
        student("s4", Some("901"), "9"),
        student("s5", Some(""), "9"),
        student("s6", Some("1001"), "10"),
    ]);
    let res = sidecar.request_ok("students.upsert", json!({ "students": roster }));
    assert_eq!(res.get("upserted").and_then(|v| v.as_u64()), Some(6));
    (sidecar, workspace)
}

pub fn card_count(sidecar: &mut Sidecar) -> u64 {
    sidecar
        .request_ok("admitCards.list", json!({}))
        .get("total")
        .and_then(|v| v.as_u64())
        .expect("total")
}

pub fn write_png(path: &Path) {
    // 1x1 red PNG
    const PNG: &[u8] = &[
        0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
        0x77, 0x53, 0xde, 0x00, 0x00, 0x00, 0x0c, 0x49, 0x44, 0x41, 0x54, 0x08, 0xd7, 0x63, 0xf8,
        0xcf, 0xc0, 0x00, 0x00, 0x03, 0x01, 0x01, 0x00, 0x18, 0xdd, 0x8d, 0xb0, 0x00, 0x00, 0x00,
        0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
    ];
    std::fs::write(path, PNG).expect("write png");
}
