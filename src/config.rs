/// Application-level constants
pub const APP_NAME: &str = "MedReport";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Width of every banner and centred line in the text report.
pub const REPORT_WIDTH: usize = 90;

/// Results table column widths: test name, result, reference range.
pub const COL_TEST: usize = 40;
pub const COL_RESULT: usize = 15;
pub const COL_RANGE: usize = 30;

/// Reporting timestamp trails collection by this many hours.
pub const REPORTING_DELAY_HOURS: i64 = 2;

/// `DD/MM/YYYY hh:mm AM/PM`
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %I:%M %p";

/// Lab numbers are `LAB` + a six digit integer.
pub const LAB_NUMBER_PREFIX: &str = "LAB";
pub const LAB_NUMBER_MIN: u32 = 100_000;
pub const LAB_NUMBER_MAX: u32 = 999_999;

/// Export file naming: `Medical_Report_<YYYYMMDD_HHMMSS>.pdf`
pub const EXPORT_FILE_PREFIX: &str = "Medical_Report_";
pub const EXPORT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// PDF page geometry (A4, millimetres).
pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
pub const PAGE_MARGIN_MM: f32 = 12.0;
pub const LINE_HEIGHT_MM: f32 = 4.0;
pub const BODY_FONT_SIZE: f32 = 8.0;

/// QR code placement: left edge, distance from the top edge, rendered width.
pub const QR_X_MM: f32 = 160.0;
pub const QR_TOP_MM: f32 = 10.0;
pub const QR_SIZE_MM: f32 = 40.0;
/// Raster pixels per QR module in the temporary PNG.
pub const QR_MODULE_PX: u32 = 8;

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "medreport=info,medreport_lib=info"
}
