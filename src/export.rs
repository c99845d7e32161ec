//! PDF export — preformatted report text plus an identifying QR code.
//!
//! The QR code is rasterized to a temporary PNG next to the output file,
//! read back and embedded at a fixed position. The PNG is held by a
//! `NamedTempFile`, so it is removed on every exit path, including a failed
//! embed. Output names carry a second-resolution timestamp; same-second
//! collisions get a numeric suffix and the file is claimed with
//! `create_new`.
//!
//! Opening the result in a viewer is best effort and reported separately
//! from the export itself.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{Local, NaiveDateTime};
use ::image::{DynamicImage, GrayImage, ImageFormat, Luma};
use printpdf::*;
use qrcode::QrCode;
use tempfile::NamedTempFile;

use crate::config::{
    BODY_FONT_SIZE, EXPORT_FILE_PREFIX, EXPORT_TIMESTAMP_FORMAT, LINE_HEIGHT_MM, PAGE_HEIGHT_MM,
    PAGE_MARGIN_MM, PAGE_WIDTH_MM, QR_MODULE_PX, QR_SIZE_MM, QR_TOP_MM, QR_X_MM,
};
use crate::report::{qr_payload, ReportRecord};

/// Light modules surrounding the symbol, per the QR specification.
const QR_QUIET_ZONE: usize = 4;
/// Upper bound on `_N` suffixes tried for one timestamp.
const MAX_NAME_ATTEMPTS: u32 = 1000;
const SPECIMEN_CAPTION: &str = "SYNTHETIC SPECIMEN";

// ─── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Directory receiving the PDF (and, briefly, the QR scratch file).
    pub out_dir: PathBuf,
    /// Try to open the written file in the platform viewer.
    pub open_preview: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
            open_preview: true,
        }
    }
}

/// Result of the best-effort viewer launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewStatus {
    Opened,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub preview: PreviewStatus,
}

/// Errors from PDF export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("No report to save")]
    NothingToExport,
    #[error("QR generation failed: {0}")]
    Qr(String),
    #[error("QR image error: {0}")]
    Image(String),
    #[error("PDF error: {0}")]
    Pdf(String),
    #[error("No free file name for {0}")]
    NameExhausted(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Entry points ─────────────────────────────────────────────────────────────

/// Exports a composed record.
pub fn export_record(
    record: &ReportRecord,
    options: &ExportOptions,
) -> Result<ExportOutcome, ExportError> {
    export_pdf(
        &record.render(),
        &record.patient_name,
        &record.lab_number,
        options,
    )
}

/// Exports report text, stamping the file name with the local time.
pub fn export_pdf(
    report_text: &str,
    patient_name: &str,
    lab_number: &str,
    options: &ExportOptions,
) -> Result<ExportOutcome, ExportError> {
    export_pdf_at(
        report_text,
        patient_name,
        lab_number,
        options,
        Local::now().naive_local(),
    )
}

/// Exports report text with an explicit timestamp for the file name.
pub fn export_pdf_at(
    report_text: &str,
    patient_name: &str,
    lab_number: &str,
    options: &ExportOptions,
    now: NaiveDateTime,
) -> Result<ExportOutcome, ExportError> {
    if report_text.trim().is_empty() {
        return Err(ExportError::NothingToExport);
    }

    let payload = qr_payload(patient_name, lab_number);
    let bytes = render_pdf(report_text, &payload, lab_number, &options.out_dir)?;

    let stamp = now.format(EXPORT_TIMESTAMP_FORMAT).to_string();
    let (path, file) = claim_output_file(&options.out_dir, &stamp)?;
    if let Err(e) = write_all(file, &bytes) {
        let _ = std::fs::remove_file(&path);
        return Err(e.into());
    }
    tracing::info!(path = %path.display(), bytes = bytes.len(), "Report PDF written");

    let preview = if options.open_preview {
        match open_in_viewer(&path) {
            Ok(()) => PreviewStatus::Opened,
            Err(reason) => {
                tracing::warn!(%reason, "Preview failed; PDF was still written");
                PreviewStatus::Failed(reason)
            }
        }
    } else {
        PreviewStatus::Skipped
    };

    Ok(ExportOutcome { path, preview })
}

fn write_all(file: File, bytes: &[u8]) -> std::io::Result<()> {
    let mut w = BufWriter::new(file);
    w.write_all(bytes)?;
    w.flush()
}

// ─── PDF generation ───────────────────────────────────────────────────────────

/// Builds the PDF in memory. `scratch_dir` hosts the temporary QR PNG.
pub fn render_pdf(
    report_text: &str,
    qr_data: &str,
    lab_number: &str,
    scratch_dir: &Path,
) -> Result<Vec<u8>, ExportError> {
    let (doc, page1, layer1) = PdfDocument::new(
        format!("Medical Report {lab_number}"),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let mut layer = doc.get_page(page1).get_layer(layer1);
    let courier = doc
        .add_builtin_font(BuiltinFont::Courier)
        .map_err(|e| ExportError::Pdf(format!("font error: {e}")))?;

    embed_qr(&layer, qr_data, scratch_dir)?;
    let caption_y = PAGE_HEIGHT_MM - QR_TOP_MM - QR_SIZE_MM - 4.0;
    layer.use_text(SPECIMEN_CAPTION, 7.0, Mm(QR_X_MM), Mm(caption_y), &courier);

    // First page text starts below the QR block.
    let mut y = caption_y - LINE_HEIGHT_MM;
    for line in report_text.lines() {
        if y < PAGE_MARGIN_MM {
            let (page, page_layer) =
                doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            layer = doc.get_page(page).get_layer(page_layer);
            y = PAGE_HEIGHT_MM - PAGE_MARGIN_MM;
        }
        layer.use_text(
            pdf_safe(line),
            BODY_FONT_SIZE,
            Mm(PAGE_MARGIN_MM),
            Mm(y),
            &courier,
        );
        y -= LINE_HEIGHT_MM;
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ExportError::Pdf(format!("save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| ExportError::Pdf(format!("buffer error: {e}")))
}

/// Rasterizes the QR code through a scratch PNG and places it on the layer.
/// The scratch file is gone when this returns, whatever the outcome.
fn embed_qr(layer: &PdfLayerReference, data: &str, scratch_dir: &Path) -> Result<(), ExportError> {
    let raster = rasterize_qr(data)?;
    let scratch = write_scratch_png(&raster, scratch_dir)?;
    let xobject = load_qr_xobject(scratch.path())?;

    let dpi = xobject.width.0 as f32 * 25.4 / QR_SIZE_MM;
    Image::from(xobject).add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(QR_X_MM)),
            translate_y: Some(Mm(PAGE_HEIGHT_MM - QR_TOP_MM - QR_SIZE_MM)),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
    tracing::debug!(path = %scratch.path().display(), "QR embedded; removing scratch PNG");
    Ok(())
}

/// Black-on-white raster with a quiet zone, `QR_MODULE_PX` pixels per module.
pub fn rasterize_qr(data: &str) -> Result<GrayImage, ExportError> {
    let code = QrCode::new(data.as_bytes()).map_err(|e| ExportError::Qr(e.to_string()))?;
    let modules = code.width();
    let colors = code.to_colors();
    let side = (modules + 2 * QR_QUIET_ZONE) as u32 * QR_MODULE_PX;

    Ok(GrayImage::from_fn(side, side, |x, y| {
        let mx = (x / QR_MODULE_PX) as usize;
        let my = (y / QR_MODULE_PX) as usize;
        let in_symbol = (QR_QUIET_ZONE..QR_QUIET_ZONE + modules).contains(&mx)
            && (QR_QUIET_ZONE..QR_QUIET_ZONE + modules).contains(&my);
        let dark = in_symbol
            && colors[(my - QR_QUIET_ZONE) * modules + (mx - QR_QUIET_ZONE)]
                == qrcode::Color::Dark;
        Luma([if dark { 0 } else { 255 }])
    }))
}

fn write_scratch_png(raster: &GrayImage, dir: &Path) -> Result<NamedTempFile, ExportError> {
    let scratch = tempfile::Builder::new()
        .prefix("qr_")
        .suffix(".png")
        .tempfile_in(dir)?;
    raster
        .save_with_format(scratch.path(), ImageFormat::Png)
        .map_err(|e| ExportError::Image(e.to_string()))?;
    Ok(scratch)
}

fn load_qr_xobject(path: &Path) -> Result<ImageXObject, ExportError> {
    let gray = match ::image::open(path).map_err(|e| ExportError::Image(e.to_string()))? {
        DynamicImage::ImageLuma8(buf) => buf,
        _ => return Err(ExportError::Image("QR raster is not 8-bit grayscale".into())),
    };
    let (width, height) = gray.dimensions();
    Ok(ImageXObject {
        width: Px(width as usize),
        height: Px(height as usize),
        color_space: ColorSpace::Greyscale,
        bits_per_component: ColorBits::Bit8,
        interpolate: false,
        image_data: gray.into_raw(),
        image_filter: None,
        smask: None,
        clipping_bbox: None,
    })
}

/// Builtin PDF fonts cover Latin-1 only; anything above U+00FF that has no
/// ASCII spelling becomes `?`.
fn pdf_safe(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for c in line.chars() {
        match c {
            '≥' => out.push_str(">="),
            '≤' => out.push_str("<="),
            'μ' | 'µ' => out.push('u'),
            '–' | '—' => out.push('-'),
            c if u32::from(c) <= 0xFF => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

// ─── File naming & preview ────────────────────────────────────────────────────

/// Creates `Medical_Report_<stamp>.pdf`, or `..._<n>.pdf` when taken.
fn claim_output_file(dir: &Path, stamp: &str) -> Result<(PathBuf, File), ExportError> {
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let name = if attempt == 1 {
            format!("{EXPORT_FILE_PREFIX}{stamp}.pdf")
        } else {
            format!("{EXPORT_FILE_PREFIX}{stamp}_{attempt}.pdf")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(ExportError::NameExhausted(stamp.to_string()))
}

fn open_in_viewer(path: &Path) -> Result<(), String> {
    // `explorer` exits 1 even on success, so Windows goes through `start`.
    #[cfg(target_os = "windows")]
    let command = {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]).arg(path);
        c
    };
    #[cfg(target_os = "macos")]
    let command = {
        let mut c = Command::new("open");
        c.arg(path);
        c
    };
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let command = {
        let mut c = Command::new("xdg-open");
        c.arg(path);
        c
    };

    run_viewer(command).map_err(|e| format!("Failed to open {}: {e}", path.display()))
}

/// Waits for the launcher so a non-zero exit is reported, not just a
/// failed spawn.
fn run_viewer(mut command: Command) -> Result<(), String> {
    let status = command.status().map_err(|e| e.to_string())?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("viewer exited with {status}"))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn options(dir: &Path) -> ExportOptions {
        ExportOptions {
            out_dir: dir.to_path_buf(),
            open_preview: false,
        }
    }

    fn stamp_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 9)
            .unwrap()
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    const TEXT: &str = "HEADER\nGlucose Fasting | 85.3 | 70-100\n- Fasting glucose ≥126 mg/dL";

    #[test]
    fn empty_text_is_nothing_to_export() {
        let tmp = tempfile::tempdir().unwrap();
        for text in ["", "  \n\t "] {
            let err = export_pdf_at(text, "Jane", "LAB123456", &options(tmp.path()), stamp_time())
                .unwrap_err();
            assert!(matches!(err, ExportError::NothingToExport));
            assert_eq!(err.to_string(), "No report to save");
        }
        assert!(dir_entries(tmp.path()).is_empty());
    }

    #[test]
    fn export_writes_timestamped_pdf() {
        let tmp = tempfile::tempdir().unwrap();
        let outcome =
            export_pdf_at(TEXT, "Jane Doe", "LAB123456", &options(tmp.path()), stamp_time())
                .unwrap();

        assert_eq!(
            outcome.path.file_name().unwrap().to_str().unwrap(),
            "Medical_Report_20260305_140709.pdf"
        );
        let bytes = std::fs::read(&outcome.path).unwrap();
        assert_eq!(&bytes[0..4], b"%PDF");
        assert_eq!(outcome.preview, PreviewStatus::Skipped);
    }

    #[test]
    fn qr_scratch_file_is_removed() {
        let tmp = tempfile::tempdir().unwrap();
        export_pdf_at(TEXT, "Jane Doe", "LAB123456", &options(tmp.path()), stamp_time()).unwrap();
        assert_eq!(
            dir_entries(tmp.path()),
            vec!["Medical_Report_20260305_140709.pdf".to_string()]
        );
    }

    #[test]
    fn same_second_exports_do_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let opts = options(tmp.path());
        let a = export_pdf_at(TEXT, "Jane", "LAB111111", &opts, stamp_time()).unwrap();
        let b = export_pdf_at(TEXT, "Jane", "LAB222222", &opts, stamp_time()).unwrap();
        assert_ne!(a.path, b.path);
        assert_eq!(
            b.path.file_name().unwrap().to_str().unwrap(),
            "Medical_Report_20260305_140709_2.pdf"
        );
        assert_eq!(dir_entries(tmp.path()).len(), 2);
    }

    #[test]
    fn export_into_missing_dir_fails_cleanly() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        let err =
            export_pdf_at(TEXT, "Jane", "LAB123456", &options(&missing), stamp_time()).unwrap_err();
        assert!(matches!(err, ExportError::Io(_)));
        assert!(!missing.exists());
    }

    #[test]
    fn long_reports_span_pages() {
        let tmp = tempfile::tempdir().unwrap();
        let text: String = (0..200).map(|i| format!("line {i}\n")).collect();
        let bytes = render_pdf(&text, "JANE | LAB1", "LAB1", tmp.path()).unwrap();
        assert_eq!(&bytes[0..4], b"%PDF");
        assert!(dir_entries(tmp.path()).is_empty());
    }

    #[test]
    fn qr_raster_has_quiet_zone_and_finder() {
        let raster = rasterize_qr("JANE DOE | LAB123456").unwrap();
        let (w, h) = raster.dimensions();
        assert_eq!(w, h);
        assert_eq!(w % QR_MODULE_PX, 0);
        // Quiet zone corner is light; first symbol module is a dark finder corner.
        assert_eq!(raster.get_pixel(0, 0)[0], 255);
        let first = QR_QUIET_ZONE as u32 * QR_MODULE_PX;
        assert_eq!(raster.get_pixel(first, first)[0], 0);
    }

    #[test]
    fn scratch_png_deleted_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let raster = rasterize_qr("X | LAB1").unwrap();
        let scratch = write_scratch_png(&raster, tmp.path()).unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.exists());
        let xobject = load_qr_xobject(&path).unwrap();
        assert_eq!(xobject.width.0 as u32, raster.width());
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn pdf_safe_transliterates() {
        assert_eq!(pdf_safe("≥126 mg/dL"), ">=126 mg/dL");
        assert_eq!(pdf_safe("cells/μL"), "cells/uL");
        assert_eq!(pdf_safe("plain"), "plain");
        assert_eq!(pdf_safe("日"), "?");
    }

    #[test]
    fn pdf_safe_keeps_latin1_names() {
        assert_eq!(pdf_safe("JOSÉ | LAB123456"), "JOSÉ | LAB123456");
        assert_eq!(pdf_safe("Zoë Müller"), "Zoë Müller");
        assert_eq!(pdf_safe("José 日本"), "José ??");
    }

    #[test]
    fn rendered_pdf_embeds_qr_image() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = render_pdf("HELLO LINE\nSECOND", "JANE | LAB1", "LAB1", dir.path()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(
            bytes.windows(6).any(|w| w == b"/Image"),
            "no image XObject in output"
        );
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn viewer_exit_status_is_checked() {
        assert!(run_viewer(Command::new("true")).is_ok());
        let err = run_viewer(Command::new("false")).unwrap_err();
        assert!(err.contains("exited"), "{err}");
        assert!(run_viewer(Command::new("medreport-no-such-viewer")).is_err());
    }

    #[test]
    fn export_record_renders_and_writes() {
        use crate::catalog::Catalog;
        use crate::report::{compose, PatientForm};
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let tmp = tempfile::tempdir().unwrap();
        let form = PatientForm {
            name: "Jane Doe".into(),
            age: "34".into(),
            gender: "Female".into(),
            test: "fever".into(),
            rest_days: String::new(),
        };
        let catalog = Catalog::builtin().unwrap();
        let record =
            compose(&form, &catalog, &mut StdRng::seed_from_u64(4), stamp_time()).unwrap();
        let outcome = export_record(&record, &options(tmp.path())).unwrap();
        assert!(outcome.path.exists());
        assert_eq!(dir_entries(tmp.path()).len(), 1);
    }

    #[test]
    fn claim_output_file_suffixes() {
        let tmp = tempfile::tempdir().unwrap();
        let (p1, _) = claim_output_file(tmp.path(), "S").unwrap();
        let (p2, _) = claim_output_file(tmp.path(), "S").unwrap();
        let (p3, _) = claim_output_file(tmp.path(), "S").unwrap();
        assert!(p1.ends_with("Medical_Report_S.pdf"));
        assert!(p2.ends_with("Medical_Report_S_2.pdf"));
        assert!(p3.ends_with("Medical_Report_S_3.pdf"));
    }
}
