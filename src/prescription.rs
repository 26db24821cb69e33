//! E-prescriptions: creation by doctors and the printable PDF with a
//! verification QR code.

use std::io::BufWriter;

use chrono::{DateTime, Utc};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Rect, Rgb,
};
use qrcode::QrCode;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::repository;
use crate::error::ServiceError;
use crate::models::*;
use crate::profile;

pub const PDF_TITLE: &str = "HealthConnect e-Prescription";

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const QR_SIZE_MM: f32 = 40.0;
const WRAP_CHARS: usize = 90;

#[derive(Debug, Clone, Deserialize)]
pub struct NewPrescription {
    pub patient_id: Uuid,
    #[serde(default)]
    pub appointment_id: Option<Uuid>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub items: Vec<PrescriptionItem>,
}

/// Link encoded in the QR code of the printed prescription.
pub fn verification_url(app_url: &str, prescription_id: &Uuid) -> String {
    format!("{}/prescriptions/{prescription_id}", app_url.trim_end_matches('/'))
}

fn clean_items(items: Vec<PrescriptionItem>) -> Vec<PrescriptionItem> {
    items
        .into_iter()
        .map(|item| PrescriptionItem {
            medication_name: item.medication_name.trim().to_string(),
            dosage: item.dosage.trim().to_string(),
            frequency: item.frequency.trim().to_string(),
            duration: item.duration.trim().to_string(),
        })
        .filter(|item| !item.medication_name.is_empty())
        .collect()
}

/// Issue a prescription. The caller must hold the doctor role; when an
/// appointment is referenced it must be between this doctor and patient.
pub fn create_prescription(
    conn: &mut Connection,
    doctor_id: &Uuid,
    request: NewPrescription,
    now: &DateTime<Utc>,
) -> Result<Prescription, ServiceError> {
    profile::require_doctor(conn, doctor_id)?;

    let items = clean_items(request.items);
    if items.is_empty() {
        return Err(ServiceError::InvalidInput(
            "At least one medication is required".into(),
        ));
    }
    if repository::get_user(conn, &request.patient_id)?.is_none() {
        return Err(ServiceError::NotFound(format!(
            "Patient not found: {}",
            request.patient_id
        )));
    }
    if let Some(appointment_id) = request.appointment_id {
        let appointment = repository::get_appointment(conn, &appointment_id)?.ok_or_else(|| {
            ServiceError::NotFound(format!("Appointment not found: {appointment_id}"))
        })?;
        if appointment.doctor_id != *doctor_id || appointment.patient_id != request.patient_id {
            return Err(ServiceError::Forbidden(
                "Appointment does not belong to this doctor and patient".into(),
            ));
        }
    }

    let prescription = Prescription {
        id: Uuid::new_v4(),
        doctor_id: *doctor_id,
        patient_id: request.patient_id,
        appointment_id: request.appointment_id,
        note: request
            .note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        created_at: *now,
        items,
    };
    repository::insert_prescription(conn, &prescription)?;

    tracing::info!(
        prescription_id = %prescription.id,
        items = prescription.items.len(),
        "Prescription issued"
    );
    Ok(prescription)
}

fn display_name(conn: &Connection, user_id: &Uuid) -> Result<String, ServiceError> {
    Ok(repository::get_profile(conn, user_id)?
        .and_then(|p| p.name)
        .unwrap_or_else(|| user_id.to_string()))
}

/// Render the prescription as an A4 PDF. Only the prescribing doctor and
/// the patient may view it.
pub fn render_prescription_pdf(
    conn: &Connection,
    app_url: &str,
    prescription_id: &Uuid,
    viewer_id: &Uuid,
) -> Result<Vec<u8>, ServiceError> {
    let prescription = repository::get_prescription(conn, prescription_id)?.ok_or_else(|| {
        ServiceError::NotFound(format!("Prescription not found: {prescription_id}"))
    })?;
    if prescription.doctor_id != *viewer_id && prescription.patient_id != *viewer_id {
        return Err(ServiceError::Forbidden(
            "Not allowed to view this prescription".into(),
        ));
    }

    let doctor = display_name(conn, &prescription.doctor_id)?;
    let patient = display_name(conn, &prescription.patient_id)?;
    let bytes = build_pdf(
        &prescription,
        &doctor,
        &patient,
        &verification_url(app_url, &prescription.id),
    )?;
    tracing::debug!(prescription_id = %prescription.id, size = bytes.len(), "Prescription PDF rendered");
    Ok(bytes)
}

fn pdf_error(e: impl std::fmt::Display) -> ServiceError {
    ServiceError::Internal(format!("PDF generation failed: {e}"))
}

/// Tracks the write position and starts a new page when the current one
/// is full.
struct PageCursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: Mm,
}

impl PageCursor<'_> {
    fn line(&mut self, text: &str, size: f32, indent: f32, font: &IndirectFontRef, advance: f32) {
        if self.y.0 < MARGIN {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = Mm(PAGE_HEIGHT - MARGIN);
        }
        self.layer.use_text(text, size, Mm(MARGIN + indent), self.y, font);
        self.y -= Mm(advance);
    }
}

fn build_pdf(
    prescription: &Prescription,
    doctor: &str,
    patient: &str,
    qr_payload: &str,
) -> Result<Vec<u8>, ServiceError> {
    let (doc, page1, layer1) =
        PdfDocument::new(PDF_TITLE, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let first_layer = doc.get_page(page1).get_layer(layer1);
    let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?;

    draw_qr(&first_layer, qr_payload)?;

    let mut cursor = PageCursor {
        doc: &doc,
        layer: first_layer,
        y: Mm(PAGE_HEIGHT - MARGIN),
    };

    cursor.line(PDF_TITLE, 16.0, 0.0, &bold, 10.0);
    cursor.line(&format!("Prescription ID: {}", prescription.id), 10.0, 0.0, &font, 6.0);
    cursor.line(
        &format!("Date: {}", prescription.created_at.format("%Y-%m-%d")),
        10.0,
        0.0,
        &font,
        6.0,
    );
    cursor.line(&format!("Doctor: {doctor}"), 10.0, 0.0, &font, 6.0);
    cursor.line(&format!("Patient: {patient}"), 10.0, 0.0, &font, 12.0);

    cursor.line("Medications:", 12.0, 0.0, &bold, 7.0);
    for item in &prescription.items {
        let text = format!(
            "- {} | {} | {} | {}",
            item.medication_name, item.dosage, item.frequency, item.duration
        );
        for line in wrap_text(&text, WRAP_CHARS) {
            cursor.line(&line, 10.0, 4.0, &font, 5.0);
        }
        cursor.y -= Mm(1.5);
    }

    cursor.y -= Mm(5.0);
    let note = format!("Note: {}", prescription.note.as_deref().unwrap_or("-"));
    for line in wrap_text(&note, WRAP_CHARS) {
        cursor.line(&line, 10.0, 0.0, &font, 5.0);
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf).map_err(pdf_error)?;
    buf.into_inner().map_err(pdf_error)
}

/// Draw `payload` as a QR code in the top-right corner, one filled square
/// per dark module.
fn draw_qr(layer: &PdfLayerReference, payload: &str) -> Result<(), ServiceError> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| ServiceError::Internal(format!("QR encoding failed: {e}")))?;
    let width = code.width();
    let module = QR_SIZE_MM / width as f32;
    let left = PAGE_WIDTH - MARGIN - QR_SIZE_MM;
    let top = PAGE_HEIGHT - MARGIN;

    layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
    for (index, color) in code.to_colors().into_iter().enumerate() {
        if color != qrcode::Color::Dark {
            continue;
        }
        let (col, row) = ((index % width) as f32, (index / width) as f32);
        let x = left + col * module;
        let y = top - (row + 1.0) * module;
        layer.add_rect(Rect::new(Mm(x), Mm(y), Mm(x + module), Mm(y + module)));
    }
    Ok(())
}

/// Word-wrap `text` into lines of at most `max_chars`.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + word.len() + 1 > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{make_doctor, make_user};
    use crate::db::sqlite::open_memory_database;

    fn item(name: &str) -> PrescriptionItem {
        PrescriptionItem {
            medication_name: name.into(),
            dosage: "500mg".into(),
            frequency: "twice daily".into(),
            duration: "5 days".into(),
        }
    }

    fn request(patient: Uuid, items: Vec<PrescriptionItem>) -> NewPrescription {
        NewPrescription {
            patient_id: patient,
            appointment_id: None,
            note: Some("  Take after meals ".into()),
            items,
        }
    }

    #[test]
    fn doctor_issues_prescription() {
        let mut conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "d@example.com", "Dr. D");
        let patient = make_user(&conn, "p@example.com");

        let rx = create_prescription(
            &mut conn,
            &doctor,
            request(patient, vec![item("Amoxicillin"), item("   ")]),
            &Utc::now(),
        )
        .unwrap();
        assert_eq!(rx.items.len(), 1);
        assert_eq!(rx.note.as_deref(), Some("Take after meals"));

        let stored = repository::get_prescription(&conn, &rx.id).unwrap().unwrap();
        assert_eq!(stored.items, rx.items);
    }

    #[test]
    fn patients_cannot_prescribe() {
        let mut conn = open_memory_database().unwrap();
        let patient = make_user(&conn, "p@example.com");
        let other = make_user(&conn, "o@example.com");
        let err = create_prescription(&mut conn, &patient, request(other, vec![item("X")]), &Utc::now())
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[test]
    fn empty_item_list_is_rejected() {
        let mut conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "d@example.com", "Dr. D");
        let patient = make_user(&conn, "p@example.com");
        let err = create_prescription(&mut conn, &doctor, request(patient, vec![]), &Utc::now())
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[test]
    fn unrelated_appointment_is_forbidden() {
        let mut conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "d@example.com", "Dr. D");
        let patient = make_user(&conn, "p@example.com");
        let mut req = request(patient, vec![item("X")]);
        req.appointment_id = Some(Uuid::new_v4());
        let err = create_prescription(&mut conn, &doctor, req, &Utc::now()).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn pdf_is_rendered_for_parties_only() {
        let mut conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "d@example.com", "Dr. D");
        let patient = make_user(&conn, "p@example.com");
        let stranger = make_user(&conn, "x@example.com");
        let items = (0..40).map(|i| item(&format!("Medicine {i}"))).collect();
        let rx = create_prescription(&mut conn, &doctor, request(patient, items), &Utc::now())
            .unwrap();

        for viewer in [doctor, patient] {
            let pdf = render_prescription_pdf(&conn, "http://localhost:3000", &rx.id, &viewer)
                .unwrap();
            assert!(pdf.starts_with(b"%PDF"));
        }

        let err = render_prescription_pdf(&conn, "http://localhost:3000", &rx.id, &stranger)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = render_prescription_pdf(&conn, "http://localhost:3000", &Uuid::new_v4(), &doctor)
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn verification_url_has_single_slash() {
        let id = Uuid::nil();
        assert_eq!(
            verification_url("https://hc.example/", &id),
            format!("https://hc.example/prescriptions/{id}")
        );
    }

    #[test]
    fn wrap_text_splits_long_lines() {
        let lines = wrap_text("alpha beta gamma delta", 11);
        assert_eq!(lines, vec!["alpha beta", "gamma delta"]);
        assert_eq!(wrap_text("", 10), vec![String::new()]);
    }
}
