//! Admit card document model.
//!
//! [`build_document`] is the single source of truth for what an admit card
//! says. The print-view and PDF renderers only decide how it looks.

use serde::{Deserialize, Serialize};

use crate::model::{AdmitCard, ExamParameters, StudentSnapshot};

pub const ACCENT: &str = "#c00";
pub const NOT_AVAILABLE: &str = "N/A";
pub const TO_BE_ANNOUNCED: &str = "To be announced";
pub const PHOTO_PLACEHOLDER: &str = "Photo";

const INSTRUCTIONS_EN: [&str; 5] = [
    "Bring this admit card to the examination center.",
    "Carry a valid photo ID for verification.",
    "Arrive at least 30 minutes before exam time.",
    "Mobile phones are strictly prohibited.",
    "Malpractice leads to disqualification.",
];

const INSTRUCTIONS_HI: [&str; 5] = [
    "इस प्रवेश पत्र को परीक्षा केंद्र पर लाएं।",
    "पहचान हेतु वैध फोटो आईडी साथ लाएं।",
    "परीक्षा से 30 मिनट पहले पहुंचें।",
    "मोबाइल फोन सख्त वर्जित है।",
    "नकल पर अयोग्य घोषित किया जाएगा।",
];

/// Issuing organization as printed in the header and footer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Organization {
    pub name_en: String,
    pub name_local: String,
    pub registration_no: String,
    pub darpan_id: String,
    pub address: String,
    pub phone: String,
}

impl Default for Organization {
    fn default() -> Self {
        Self {
            name_en: "MANAV WELFARE SEWA SOCIETY, BHUNA".into(),
            name_local: "मानव वेलफेयर सेवा सोसायटी, भुना (हरियाणा)".into(),
            registration_no: "HR/01/2024/01215".into(),
            darpan_id: "HR/2025/0866027".into(),
            address: "Laxmi Mata Mandir Wali Gali, Uklana Road, Shastri Mandi, Bhuna, Fatehabad - 125111"
                .into(),
            phone: "+91 98126 76818".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bilingual {
    pub en: String,
    pub local: String,
}

impl Bilingual {
    fn new(en: &str, local: &str) -> Self {
        Self {
            en: en.to_string(),
            local: local.to_string(),
        }
    }

    /// `English / local` as printed on a single line.
    pub fn joined(&self) -> String {
        format!("{} / {}", self.en, self.local)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PhotoSlot {
    Image { reference: String },
    Placeholder { label: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub title: String,
    pub subtitle_lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Instructions {
    pub heading: Bilingual,
    pub english_label: String,
    pub local_label: String,
    pub english: Vec<String>,
    pub local: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signature {
    pub line: String,
    pub caption: Bilingual,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmitCardDocument {
    pub title: String,
    pub file_stem: String,
    pub accent: String,
    pub header: Header,
    pub banner: Bilingual,
    pub identity: Vec<Field>,
    pub photo: PhotoSlot,
    pub exam_heading: Bilingual,
    pub exam: Vec<Field>,
    pub instructions: Instructions,
    pub signature: Signature,
    pub footer: Vec<String>,
}

impl AdmitCardDocument {
    /// Every piece of text on the card, in reading order.
    pub fn text_items(&self) -> Vec<String> {
        let mut out = vec![self.header.title.clone()];
        out.extend(self.header.subtitle_lines.iter().cloned());
        out.push(self.banner.joined());
        for f in &self.identity {
            out.push(f.label.clone());
            out.push(f.value.clone());
        }
        if let PhotoSlot::Placeholder { label } = &self.photo {
            out.push(label.clone());
        }
        out.push(self.exam_heading.joined());
        for f in &self.exam {
            out.push(f.label.clone());
            out.push(f.value.clone());
        }
        out.push(self.instructions.heading.joined());
        out.push(self.instructions.english_label.clone());
        out.extend(self.instructions.english.iter().cloned());
        out.push(self.instructions.local_label.clone());
        out.extend(self.instructions.local.iter().cloned());
        out.push(self.signature.line.clone());
        out.push(self.signature.caption.en.clone());
        out.push(self.signature.caption.local.clone());
        out.extend(self.footer.iter().cloned());
        out
    }
}

/// What goes on one card.
#[derive(Debug, Clone, Copy)]
pub struct CardContent<'a> {
    pub student: &'a StudentSnapshot,
    pub exam: Option<&'a ExamParameters>,
    /// Exam name recorded on the card itself, used when the exam payload has none.
    pub exam_name: &'a str,
    pub photo: Option<&'a str>,
}

fn or_fallback(value: Option<&str>, fallback: &str) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

fn field(label: &str, value: String) -> Field {
    Field {
        label: label.to_string(),
        value,
    }
}

fn numbered(points: &[&str]) -> Vec<String> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. {}", i + 1, p))
        .collect()
}

pub fn build_document(org: &Organization, content: &CardContent<'_>) -> AdmitCardDocument {
    let student = content.student;
    let exam = content.exam;

    let exam_name = or_fallback(
        exam.map(|e| e.exam_name.as_str())
            .filter(|v| !v.trim().is_empty())
            .or(Some(content.exam_name)),
        TO_BE_ANNOUNCED,
    );

    let photo = match content.photo.map(str::trim).filter(|p| !p.is_empty()) {
        Some(reference) => PhotoSlot::Image {
            reference: reference.to_string(),
        },
        None => PhotoSlot::Placeholder {
            label: PHOTO_PLACEHOLDER.to_string(),
        },
    };

    AdmitCardDocument {
        title: format!(
            "Admit Card - {}",
            or_fallback(Some(&student.full_name), NOT_AVAILABLE)
        ),
        file_stem: student.card_file_stem(),
        accent: ACCENT.to_string(),
        header: Header {
            title: org.name_en.clone(),
            subtitle_lines: vec![
                org.name_local.clone(),
                format!(
                    "Reg. No: {} | DARPAN ID: {}",
                    org.registration_no, org.darpan_id
                ),
                org.address.clone(),
                format!("Phone: {}", org.phone),
            ],
        },
        banner: Bilingual::new("ADMIT CARD", "प्रवेश पत्र"),
        identity: vec![
            field(
                "Roll Number:",
                or_fallback(student.roll_number.as_deref(), NOT_AVAILABLE),
            ),
            field(
                "Registration No:",
                or_fallback(Some(&student.registration_number), NOT_AVAILABLE),
            ),
            field(
                "Student Name:",
                or_fallback(Some(&student.full_name), NOT_AVAILABLE),
            ),
            field(
                "Father's Name:",
                or_fallback(student.father_name.as_deref(), NOT_AVAILABLE),
            ),
            field("Class:", or_fallback(Some(&student.class_name), NOT_AVAILABLE)),
        ],
        photo,
        exam_heading: Bilingual::new("Exam Details", "परीक्षा विवरण"),
        exam: vec![
            field("Exam Name:", exam_name),
            field(
                "Exam Date:",
                or_fallback(exam.map(|e| e.exam_date.as_str()), TO_BE_ANNOUNCED),
            ),
            field(
                "Exam Time:",
                or_fallback(exam.map(|e| e.exam_time.as_str()), TO_BE_ANNOUNCED),
            ),
            field(
                "Exam Center:",
                or_fallback(exam.map(|e| e.exam_center.as_str()), TO_BE_ANNOUNCED),
            ),
        ],
        instructions: Instructions {
            heading: Bilingual::new("Terms & Conditions", "नियम एवं शर्तें:"),
            english_label: "English:".into(),
            local_label: "हिंदी:".into(),
            english: numbered(&INSTRUCTIONS_EN),
            local: numbered(&INSTRUCTIONS_HI),
        },
        signature: Signature {
            line: "_____________________".into(),
            caption: Bilingual::new("Authorized Signature", "अधिकृत हस्ताक्षर"),
        },
        footer: vec![
            Bilingual::new(
                "This is a computer generated admit card",
                "यह कंप्यूटर जनित प्रवेश पत्र है",
            )
            .joined(),
            format!(
                "{} | Reg: {} | DARPAN: {}",
                org.name_en, org.registration_no, org.darpan_id
            ),
        ],
    }
}

/// Document for a stored card. Cards whose student record is gone still
/// render, with every identity field shown as unavailable.
pub fn document_for_card(org: &Organization, card: &AdmitCard) -> AdmitCardDocument {
    let orphan;
    let student = match &card.student {
        Some(s) => s,
        None => {
            orphan = StudentSnapshot {
                id: String::new(),
                full_name: String::new(),
                father_name: None,
                roll_number: None,
                registration_number: String::new(),
                class_name: String::new(),
            };
            &orphan
        }
    };
    let mut doc = build_document(
        org,
        &CardContent {
            student,
            exam: card.exam.as_ref(),
            exam_name: &card.exam_name,
            photo: card.student_photo_url.as_deref(),
        },
    );
    if card.student.is_none() {
        doc.file_stem = card.file_stem();
    }
    doc
}
