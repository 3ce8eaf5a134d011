use std::path::PathBuf;

use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{on_store, optional_str, required_str, text_param};
use crate::ipc::types::{AppState, Request};
use crate::issue::{
    class_counts, issue_one, plan_bulk, run_bulk, CardFilter, IssueRequest, PhotoSource,
};
use crate::model::{AdmitCard, ClassSelector, ExamParameters};
use crate::template::document_for_card;

/// Exam fields from `params.exam`; name and time fall back to the `exam`
/// setup section.
fn exam_params(state: &AppState, req: &Request) -> ExamParameters {
    let defaults = setup::exam_defaults(state);
    let exam = req.params.get("exam").cloned().unwrap_or_default();
    let or_default = |value: String, fallback: &str| {
        if value.is_empty() {
            fallback.to_string()
        } else {
            value
        }
    };
    ExamParameters {
        exam_name: or_default(text_param(&exam, "examName"), &defaults.default_exam_name),
        exam_date: text_param(&exam, "examDate"),
        exam_time: or_default(text_param(&exam, "examTime"), &defaults.default_exam_time),
        exam_center: text_param(&exam, "examCenter"),
        generated_at: None,
    }
}

fn selector(req: &Request) -> ClassSelector {
    ClassSelector::parse(optional_str(req, "classFilter").as_deref())
}

pub(crate) fn find_card<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a AdmitCard, serde_json::Value> {
    let id = required_str(req, "admitCardId")?;
    state.records.find_card(&id).ok_or_else(|| {
        err(
            &req.id,
            "admit_card_not_found",
            format!("admit card {id} is not in the loaded records"),
            None,
        )
    })
}

fn reload_after_write(state: &mut AppState) {
    if let Some(Err(e)) = state.reload() {
        tracing::warn!(error = %e, "reload after write failed; snapshot is stale");
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let filter = CardFilter {
        search: optional_str(req, "search").unwrap_or_default(),
        class: selector(req),
    };
    let cards: Vec<&AdmitCard> = state
        .records
        .admit_cards
        .iter()
        .filter(|c| filter.matches(c))
        .collect();
    ok(
        &req.id,
        json!({
            "admitCards": cards,
            "total": state.records.admit_cards.len(),
        }),
    )
}

fn handle_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let selector = selector(req);
    let plan = plan_bulk(&state.records, &selector);
    ok(
        &req.id,
        json!({
            "total": state.records.admit_cards.len(),
            "byClass": class_counts(&state.records.admit_cards),
            "eligible": plan.eligible,
            "pending": plan.worklist.len(),
        }),
    )
}

fn handle_issue_one(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let photo = match (
        optional_str(req, "photoPath"),
        optional_str(req, "studentPhotoUrl"),
    ) {
        (Some(_), Some(_)) => {
            return err(
                &req.id,
                "bad_params",
                "pass either photoPath or studentPhotoUrl, not both",
                None,
            )
        }
        (Some(path), None) => PhotoSource::File(PathBuf::from(path)),
        (None, Some(url)) => PhotoSource::Uploaded(url),
        (None, None) => PhotoSource::None,
    };
    let issue = IssueRequest {
        student_id,
        exam: exam_params(state, req),
        photo,
    };

    let result = match on_store(state, req, |store| issue_one(store, &state.records, issue)) {
        Ok(r) => r,
        Err(e) => return e,
    };
    match result {
        Ok(card) => {
            reload_after_write(state);
            ok(&req.id, json!({ "admitCard": card }))
        }
        Err(e) => {
            tracing::warn!(error = %e, "admit card not issued");
            err(&req.id, e.code(), e.to_string(), None)
        }
    }
}

fn handle_bulk_preview(state: &mut AppState, req: &Request) -> serde_json::Value {
    let selector = selector(req);
    let plan = plan_bulk(&state.records, &selector);
    let ids: Vec<&str> = plan.worklist.iter().map(|s| s.id.as_str()).collect();
    ok(
        &req.id,
        json!({
            "targetClass": selector.as_str(),
            "eligible": plan.eligible,
            "alreadyIssued": plan.already_issued(),
            "pending": ids.len(),
            "studentIds": ids,
        }),
    )
}

fn handle_bulk_issue(state: &mut AppState, req: &Request) -> serde_json::Value {
    let selector = selector(req);
    let exam = exam_params(state, req);
    let summary = match on_store(state, req, |store| {
        let plan = plan_bulk(&state.records, &selector);
        run_bulk(store, &plan, &selector, &exam)
    }) {
        Ok(s) => s,
        Err(e) => return e,
    };
    reload_after_write(state);
    match serde_json::to_value(&summary) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "internal", e.to_string(), None),
    }
}

fn handle_document(state: &mut AppState, req: &Request) -> serde_json::Value {
    let card = match find_card(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let org = setup::organization(state);
    ok(
        &req.id,
        json!({ "document": document_for_card(&org, card) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "admitCards.list" => Some(handle_list(state, req)),
        "admitCards.summary" => Some(handle_summary(state, req)),
        "admitCards.issueOne" => Some(handle_issue_one(state, req)),
        "admitCards.bulkPreview" => Some(handle_bulk_preview(state, req)),
        "admitCards.bulkIssue" => Some(handle_bulk_issue(state, req)),
        "admitCards.document" => Some(handle_document(state, req)),
        _ => None,
    }
}
