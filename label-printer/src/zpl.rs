//! ZPL command builder
//!
//! Provides a fluent API for building ZPL II label programs. Every value
//! interpolated into a field goes through [`sanitize_field`] so that data
//! can never inject or terminate a command.

/// Field orientation for scalable fonts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// N - normal
    Normal,
    /// R - rotated 90 degrees clockwise
    Rotated,
    /// I - inverted 180 degrees
    Inverted,
    /// B - read from bottom up, 270 degrees
    Bottom,
}

impl Orientation {
    fn code(&self) -> char {
        match self {
            Self::Normal => 'N',
            Self::Rotated => 'R',
            Self::Inverted => 'I',
            Self::Bottom => 'B',
        }
    }
}

/// Strip characters that ZPL treats as command prefixes, plus control chars
pub fn sanitize_field(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '^' && *c != '~' && !c.is_control())
        .collect()
}

/// Sanitize and escape for a field written under `^FH\`
fn escape_field(value: &str) -> String {
    sanitize_field(value).replace('\\', "\\5C")
}

/// ZPL command builder
///
/// `new()` opens the label with `^XA`; [`ZplBuilder::build`] closes it with
/// `^XZ`. Each command group is written on its own line.
pub struct ZplBuilder {
    buf: String,
}

impl Default for ZplBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ZplBuilder {
    pub fn new() -> Self {
        let mut buf = String::with_capacity(2048);
        buf.push_str("^XA\n");
        Self { buf }
    }

    /// Program text written so far (without the closing `^XZ`)
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    fn line(&mut self, cmd: &str) -> &mut Self {
        self.buf.push_str(cmd);
        self.buf.push('\n');
        self
    }

    // === Label Setup ===

    /// `^MMT` tear-off media handling
    pub fn media_tear_off(&mut self) -> &mut Self {
        self.line("^MMT")
    }

    /// `^PW` print width in dots
    pub fn print_width(&mut self, dots: u32) -> &mut Self {
        self.line(&format!("^PW{dots}"))
    }

    /// `^LL` label length in dots
    pub fn label_length(&mut self, dots: u32) -> &mut Self {
        self.line(&format!("^LL{dots}"))
    }

    /// `^LS` label shift
    pub fn label_shift(&mut self, dots: i32) -> &mut Self {
        self.line(&format!("^LS{dots}"))
    }

    // === Positioning ===
    //
    // Positioning and font commands are buffered on the current line and
    // flushed by the field data command that follows them.

    /// `^FT` field typeset (baseline origin)
    pub fn field_typeset(&mut self, x: u32, y: u32) -> &mut Self {
        self.buf.push_str(&format!("^FT{x},{y}"));
        self
    }

    /// `^FO` field origin (top-left origin)
    pub fn field_origin(&mut self, x: u32, y: u32) -> &mut Self {
        self.buf.push_str(&format!("^FO{x},{y}"));
        self
    }

    /// `^A0` scalable font
    pub fn font(&mut self, orientation: Orientation, height: u32, width: u32) -> &mut Self {
        self.buf
            .push_str(&format!("^A0{},{height},{width}", orientation.code()));
        self
    }

    // === Fields ===

    /// Text field in UTF-8 (`^CI28`), restoring the default charset after
    pub fn text(&mut self, value: &str) -> &mut Self {
        let data = escape_field(value);
        self.line(&format!("^FH\\^CI28^FD{data}^FS^CI27"))
    }

    /// `^GB` graphic box; a zero width or height draws a line
    pub fn graphic_box(&mut self, width: u32, height: u32, thickness: u32) -> &mut Self {
        self.line(&format!("^GB{width},{height},{thickness}^FS"))
    }

    /// `^BQN` QR code, model 2, error correction M, automatic input mode
    pub fn qr_code(&mut self, magnification: u8, data: &str) -> &mut Self {
        let magnification = magnification.clamp(1, 10);
        let data = escape_field(data);
        self.line(&format!("^BQN,2,{magnification}"));
        self.line(&format!("^FH\\^FDMA,{data}^FS"))
    }

    // === Output ===

    /// `^PQ` print quantity, no pause, no replicates
    pub fn print_quantity(&mut self, quantity: u32) -> &mut Self {
        self.line(&format!("^PQ{},0,1,Y", quantity.max(1)))
    }

    /// Close the label and return the program
    pub fn build(mut self) -> String {
        self.buf.push_str("^XZ\n");
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_command_prefixes() {
        assert_eq!(sanitize_field("H^12~3"), "H123");
        assert_eq!(sanitize_field("Fe500D"), "Fe500D");
        assert_eq!(sanitize_field("A\nB\tC\u{7}"), "ABC");
        assert_eq!(sanitize_field("12 MM"), "12 MM");
    }

    #[test]
    fn test_label_frame() {
        let mut zpl = ZplBuilder::new();
        zpl.media_tear_off()
            .print_width(812)
            .label_length(609)
            .label_shift(0)
            .print_quantity(1);
        let out = zpl.build();
        assert_eq!(out, "^XA\n^MMT\n^PW812\n^LL609\n^LS0\n^PQ1,0,1,Y\n^XZ\n");
    }

    #[test]
    fn test_text_field() {
        let mut zpl = ZplBuilder::new();
        zpl.field_typeset(295, 569)
            .font(Orientation::Bottom, 34, 33)
            .text("H^EAT");
        assert!(
            zpl.as_str()
                .ends_with("^FT295,569^A0B,34,33^FH\\^CI28^FDHEAT^FS^CI27\n")
        );
    }

    #[test]
    fn test_backslash_is_hex_escaped() {
        let mut zpl = ZplBuilder::new();
        zpl.field_origin(10, 10).text(r"A\B");
        assert!(zpl.as_str().contains(r"^FDA\5CB^FS"));
    }

    #[test]
    fn test_qr_code() {
        let mut zpl = ZplBuilder::new();
        zpl.field_typeset(570, 580)
            .qr_code(4, "https://example.test/a^b");
        let out = zpl.build();
        assert!(out.contains("^FT570,580^BQN,2,4\n^FH\\^FDMA,https://example.test/ab^FS\n"));
    }

    #[test]
    fn test_qr_magnification_is_clamped() {
        let mut zpl = ZplBuilder::new();
        zpl.qr_code(42, "x");
        assert!(zpl.as_str().contains("^BQN,2,10"));
    }

    #[test]
    fn test_graphic_box() {
        let mut zpl = ZplBuilder::new();
        zpl.field_origin(536, 1).graphic_box(0, 570, 3);
        assert!(zpl.as_str().ends_with("^FO536,1^GB0,570,3^FS\n"));
    }
}
