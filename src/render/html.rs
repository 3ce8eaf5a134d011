use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use minijinja::{context, Environment, UndefinedBehavior, Value};

use super::{PrinterSettings, RenderError};
use crate::template::{AdmitCardDocument, PhotoSlot};

const TEMPLATE_NAME: &str = "admit_card.html";

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{{ doc.title }}</title>
  <style>
    body { font-family: Arial, sans-serif; padding: 20px; max-width: 800px; margin: 0 auto; }
    .header { text-align: center; border-bottom: 2px solid {{ doc.accent }}; padding-bottom: 15px; margin-bottom: 20px; }
    .title { color: {{ doc.accent }}; font-size: 22px; font-weight: bold; margin: 10px 0; }
    .subtitle { color: #666; font-size: 13px; }
    .admit-title { background: {{ doc.accent }}; color: white; padding: 10px; text-align: center; font-size: 18px; font-weight: bold; margin: 20px 0; }
    .details { display: flex; gap: 30px; margin: 20px 0; }
    .details-left { flex: 1; }
    .details-right { width: 100px; height: 120px; border: 1px solid #ccc; display: flex; align-items: center; justify-content: center; color: #999; }
    .details-right img { width: 100%; height: 100%; object-fit: cover; }
    .row { display: flex; margin: 8px 0; }
    .label { font-weight: bold; width: 150px; }
    .value { flex: 1; }
    .exam-info { background: #f5f5f5; padding: 15px; margin: 20px 0; }
    .exam-info h3 { margin: 0 0 10px 0; color: #333; font-size: 14px; }
    .instructions { margin-top: 15px; padding: 12px; border: 1px solid #ddd; }
    .instructions h3 { margin: 0 0 8px 0; font-size: 13px; }
    .instructions-grid { display: flex; font-size: 10px; line-height: 1.4; }
    .instructions-col { flex: 1; padding-right: 10px; }
    .instructions-col:last-child { padding-left: 10px; border-left: 1px solid #ddd; }
    .signature { margin-top: 30px; text-align: right; }
    .footer { text-align: center; margin-top: 20px; padding-top: 15px; border-top: 1px solid #ddd; font-size: 10px; color: #666; }
    @media print { body { padding: 10px; } @page { margin: {{ print_margin_cm }}cm; } }
  </style>
</head>
<body>
  <div class="header">
    <div class="title">{{ doc.header.title }}</div>
    {%- for line in doc.header.subtitleLines %}
    <div class="subtitle">{{ line }}</div>
    {%- endfor %}
  </div>

  <div class="admit-title">{{ doc.banner.en ~ " / " ~ doc.banner.local }}</div>

  <div class="details">
    <div class="details-left">
      {%- for f in doc.identity %}
      <div class="row"><span class="label">{{ f.label }}</span><span class="value">{{ f.value }}</span></div>
      {%- endfor %}
    </div>
    <div class="details-right">
      {%- if photo_src %}<img src="{{ photo_src }}" alt="Photo">{% else %}{{ photo_label }}{% endif -%}
    </div>
  </div>

  <div class="exam-info">
    <h3>{{ doc.examHeading.en ~ " / " ~ doc.examHeading.local }}</h3>
    {%- for f in doc.exam %}
    <div class="row"><span class="label">{{ f.label }}</span><span class="value">{{ f.value }}</span></div>
    {%- endfor %}
  </div>

  <div class="instructions">
    <h3>{{ doc.instructions.heading.en ~ " / " ~ doc.instructions.heading.local }}</h3>
    <div class="instructions-grid">
      <div class="instructions-col">
        <div><strong>{{ doc.instructions.englishLabel }}</strong></div>
        {%- for p in doc.instructions.english %}
        <div>{{ p }}</div>
        {%- endfor %}
      </div>
      <div class="instructions-col">
        <div><strong>{{ doc.instructions.localLabel }}</strong></div>
        {%- for p in doc.instructions.local %}
        <div>{{ p }}</div>
        {%- endfor %}
      </div>
    </div>
  </div>

  <div class="signature">
    <p>{{ doc.signature.line }}</p>
    <p style="font-size: 12px;">{{ doc.signature.caption.en ~ " / " ~ doc.signature.caption.local }}</p>
  </div>

  <div class="footer">
    {%- for line in doc.footer %}
    <p>{{ line }}</p>
    {%- endfor %}
  </div>
  <script>window.onload = function () { window.print(); };</script>
</body>
</html>
"#;

/// `src` for the photo: fetched bytes inline as a data URI, else an absolute
/// URL reference, else nothing (the placeholder label is printed).
fn photo_src(doc: &AdmitCardDocument, photo: Option<&[u8]>) -> Option<Value> {
    let PhotoSlot::Image { reference } = &doc.photo else {
        return None;
    };
    if let Some(bytes) = photo {
        match image::guess_format(bytes) {
            Ok(format) => {
                // base64 output needs no escaping
                return Some(Value::from_safe_string(format!(
                    "data:{};base64,{}",
                    format.to_mime_type(),
                    B64.encode(bytes)
                )));
            }
            Err(e) => tracing::warn!(reference = %reference, error = %e, "photo is not a known image format"),
        }
    }
    if reference.starts_with("http://") || reference.starts_with("https://") {
        Some(Value::from(reference.as_str()))
    } else {
        None
    }
}

pub fn render(
    doc: &AdmitCardDocument,
    photo: Option<&[u8]>,
    settings: &PrinterSettings,
) -> Result<String, RenderError> {
    let mut env = Environment::new();
    // a misspelled field fails the render instead of printing an empty slot
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.add_template(TEMPLATE_NAME, TEMPLATE)?;
    let tmpl = env.get_template(TEMPLATE_NAME)?;
    let photo_label = match &doc.photo {
        PhotoSlot::Placeholder { label } => label.as_str(),
        PhotoSlot::Image { .. } => crate::template::PHOTO_PLACEHOLDER,
    };
    let html = tmpl.render(context! {
        doc => doc,
        photo_src => photo_src(doc, photo),
        photo_label => photo_label,
        print_margin_cm => settings.print_margin_cm,
    })?;
    Ok(html)
}
