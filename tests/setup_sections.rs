use serde_json::json;

mod test_support;

use test_support::{spawn_sidecar, temp_dir};

#[test]
fn setup_defaults_are_returned_for_a_fresh_workspace() {
    let mut sidecar = spawn_sidecar();
    let workspace = temp_dir("admitd-setup-defaults");
    sidecar.select_workspace(&workspace);

    let setup = sidecar.request_ok("setup.get", json!({}));
    assert_eq!(setup["printer"]["exportScale"], json!(2));
    assert_eq!(setup["printer"]["pageMarginMm"], json!(10));
    assert_eq!(setup["printer"]["printMarginCm"], json!(1.0));
    assert!(setup["printer"]["fontPath"].is_null());
    assert_eq!(setup["printer"]["pdfMode"], json!("raster"));
    assert_eq!(setup["exam"]["defaultExamName"], json!("Haryana GK Exam 2025"));
    assert!(setup["organization"]["nameEn"].as_str().is_some_and(|s| !s.is_empty()));
}

#[test]
fn setup_update_validates_and_persists() {
    let workspace = temp_dir("admitd-setup-update");
    {
        let mut sidecar = spawn_sidecar();
        sidecar.select_workspace(&workspace);
        let _ = sidecar.request_ok(
            "setup.update",
            json!({ "section": "printer", "patch": { "exportScale": 3, "printMarginCm": 0.5 } }),
        );
        let _ = sidecar.request_ok(
            "setup.update",
            json!({ "section": "exam", "patch": { "defaultExamName": "  Half Yearly  " } }),
        );

        for (section, patch) in [
            ("printer", json!({ "exportScale": 0 })),
            ("printer", json!({ "pageMarginMm": "wide" })),
            ("printer", json!({ "fontPath": "/no/such/font.ttf" })),
            ("printer", json!({ "paper": "A3" })),
            ("printer", json!({ "pdfMode": "svg" })),
            ("exam", json!({ "defaultExamName": "" })),
            ("organization", json!({ "motto": "x" })),
        ] {
            let (code, _) = sidecar.request_err(
                "setup.update",
                json!({ "section": section, "patch": patch }),
            );
            assert_eq!(code, "bad_params", "{section} {patch}");
        }
        let (code, _) = sidecar.request_err(
            "setup.update",
            json!({ "section": "grading", "patch": {} }),
        );
        assert_eq!(code, "bad_params");
    }

    let mut sidecar = spawn_sidecar();
    sidecar.select_workspace(&workspace);
    let setup = sidecar.request_ok("setup.get", json!({}));
    assert_eq!(setup["printer"]["exportScale"], json!(3));
    assert_eq!(setup["printer"]["printMarginCm"], json!(0.5));
    assert_eq!(setup["printer"]["pageMarginMm"], json!(10));
    assert_eq!(setup["exam"]["defaultExamName"], json!("Half Yearly"));
}
