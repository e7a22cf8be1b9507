//! Label renderer
//!
//! Turns a stored label record into a sink-ready ZPL document for an
//! 812x609 dot label printed bottom-up. Everything above the `Printed:`
//! footer is a pure function of the record and [`RenderConfig`]; the footer
//! carries the render time and is left out of the content hash.

use chrono::{DateTime, Utc};
use label_printer::{Orientation, ZplBuilder};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use shared::models::{Document, LabelRecord};
use thiserror::Error;
use uuid::Uuid;

/// Default prefix of the product-details QR link
pub const DEFAULT_QR_BASE_URL: &str = "https://madeinindia.qcin.org/product-details";
/// Default plant unit written into the data QR
pub const DEFAULT_PLANT_UNIT: &str = "SAIL-BSP";

const LABEL_WIDTH: u32 = 812;
const LABEL_LENGTH: u32 = 609;
const DEFAULT_HEADING: &str = "CHANNEL";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Label {label_id} is missing required field {field}")]
    MissingField { label_id: Uuid, field: &'static str },
}

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub qr_base_url: String,
    pub plant_unit: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            qr_base_url: DEFAULT_QR_BASE_URL.to_string(),
            plant_unit: DEFAULT_PLANT_UNIT.to_string(),
        }
    }
}

/// Label document renderer
#[derive(Debug, Clone, Default)]
pub struct LabelRenderer {
    config: RenderConfig,
}

impl LabelRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render with the current time in the footer
    pub fn render(&self, record: &LabelRecord) -> RenderResult<Document> {
        self.render_at(record, Utc::now())
    }

    pub fn render_at(&self, record: &LabelRecord, rendered_at: DateTime<Utc>) -> RenderResult<Document> {
        if record.business_id.trim().is_empty() {
            return Err(RenderError::MissingField {
                label_id: record.internal_id,
                field: "business_id",
            });
        }

        let attrs = &record.attributes;
        let text = |value: &Option<String>| value.clone().unwrap_or_default();

        let mut zpl = ZplBuilder::new();
        zpl.media_tear_off()
            .print_width(LABEL_WIDTH)
            .label_length(LABEL_LENGTH)
            .label_shift(0);

        // Made-in-India block and heading box
        zpl.field_origin(161, 16).graphic_box(65, 556, 3);
        zpl.field_origin(16, 410).graphic_box(130, 160, 3);
        caption(&mut zpl, 53, 528, 30, "MADE");
        caption(&mut zpl, 91, 504, 30, "IN");
        caption(&mut zpl, 130, 525, 30, "INDIA");
        let heading = attrs.product_heading.as_deref().unwrap_or(DEFAULT_HEADING);
        caption(&mut zpl, 206, 343, 32, heading);

        // ISI marks
        zpl.field_typeset(260, 343)
            .font(Orientation::Bottom, 14, 15)
            .text(&text(&attrs.isi_top));
        zpl.field_typeset(345, 340)
            .font(Orientation::Bottom, 14, 15)
            .text(&text(&attrs.isi_bottom));

        // Heat, section, grade, bundle id
        zpl.field_typeset(262, 570)
            .font(Orientation::Bottom, 34, 33)
            .text("HEAT NO.");
        zpl.field_typeset(295, 569)
            .font(Orientation::Bottom, 34, 33)
            .text(&text(&attrs.heat_no));
        caption(&mut zpl, 339, 570, 25, "SECTION");
        caption(&mut zpl, 365, 570, 25, &text(&attrs.section));
        caption(&mut zpl, 411, 570, 25, "GRADE");
        caption(&mut zpl, 440, 570, 25, &text(&attrs.grade));
        caption(&mut zpl, 483, 570, 25, "ID");
        zpl.field_typeset(516, 570)
            .font(Orientation::Bottom, 31, 30)
            .text(&self.bundle_id(record));

        zpl.field_origin(536, 1).graphic_box(0, 570, 3);

        // Mill and length/date/time block
        zpl.field_typeset(590, 218)
            .font(Orientation::Bottom, 34, 33)
            .text(&text(&attrs.mill));
        let rows = [
            (643, "LENGTH", format_decimal(attrs.length)),
            (683, "DATE", text(&attrs.date)),
            (718, "TIME", text(&attrs.time)),
        ];
        for (x, name, value) in rows {
            caption(&mut zpl, x, 310, 25, name);
            caption(&mut zpl, x, 199, 25, ":");
            caption(&mut zpl, x, 182, 25, &value);
        }

        zpl.field_typeset(570, 580).qr_code(4, &self.url_payload(record));
        zpl.field_typeset(245, 275).qr_code(5, &self.data_payload(record));

        let content_hash = hex::encode(Sha256::digest(zpl.as_str().as_bytes()));

        zpl.field_typeset(790, 570)
            .font(Orientation::Bottom, 18, 18)
            .text(&format!("Printed: {}", rendered_at.format("%Y-%m-%d %H:%M:%S")));
        zpl.print_quantity(1);

        Ok(Document {
            content: zpl.build(),
            content_hash,
            rendered_at,
        })
    }

    /// Product-details link: `<base>/<internal_id>/<mill>_<heat_no>_<pqd>`
    pub fn url_payload(&self, record: &LabelRecord) -> String {
        let attrs = &record.attributes;
        format!(
            "{}/{}/{}_{}_{}",
            self.config.qr_base_url.trim_end_matches('/'),
            record.internal_id,
            attrs.mill.as_deref().unwrap_or_default(),
            attrs.heat_no.as_deref().unwrap_or_default(),
            attrs.pqd.as_deref().unwrap_or_default(),
        )
    }

    /// Key:value payload with the label's traceability fields
    pub fn data_payload(&self, record: &LabelRecord) -> String {
        let attrs = &record.attributes;
        let unit = attrs.unit.as_deref().unwrap_or(&self.config.plant_unit);
        let fields = [
            ("UNIT", unit.to_string()),
            ("MILL", attrs.mill.clone().unwrap_or_default()),
            ("HEAT", attrs.heat_no.clone().unwrap_or_default()),
            ("SECTION", attrs.section.clone().unwrap_or_default()),
            ("GRADE", attrs.grade.clone().unwrap_or_default()),
            ("ID", self.bundle_id(record)),
            ("LENGTH", format_decimal(attrs.length)),
            ("WEIGHT", format_decimal(attrs.weight)),
            ("LOCATION", attrs.location.clone().unwrap_or_default()),
            ("PQD", attrs.pqd.clone().unwrap_or_default()),
            ("DATE", attrs.date.clone().unwrap_or_default()),
            ("TIME", attrs.time.clone().unwrap_or_default()),
        ];

        let mut payload = String::new();
        for (key, value) in fields {
            payload.push_str(key);
            payload.push(':');
            // ';' separates pairs
            payload.extend(value.chars().filter(|c| *c != ';'));
            payload.push(';');
        }
        payload
    }

    /// Bundle number printed as the label's ID, falling back to the business id
    fn bundle_id(&self, record: &LabelRecord) -> String {
        record
            .attributes
            .bundle_no
            .clone()
            .unwrap_or_else(|| record.business_id.clone())
    }
}

fn caption(zpl: &mut ZplBuilder, x: u32, y: u32, size: u32, value: &str) {
    zpl.field_typeset(x, y)
        .font(Orientation::Bottom, size, size)
        .text(value);
}

/// Plain decimal text: no grouping, `.` separator, no trailing zeros
fn format_decimal(value: Option<Decimal>) -> String {
    value.map(|d| d.normalize().to_string()).unwrap_or_default()
}
