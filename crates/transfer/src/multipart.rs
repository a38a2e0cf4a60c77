use uuid::Uuid;

const CRLF: &[u8] = b"\r\n";

/// Builder for a `multipart/form-data` body (RFC 7578).
///
/// Parts are encoded as they are added; [`finish`](Self::finish) writes the
/// closing delimiter.
#[derive(Debug)]
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

/// An encoded multipart body ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartBody {
    /// Value for the `Content-Type` header, boundary included.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    /// Creates a form with a random boundary.
    pub fn new() -> Self {
        Self::with_boundary(format!("printpush-{}", Uuid::new_v4().simple()))
    }

    /// Creates a form with a fixed boundary.
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            body: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Appends a plain text field.
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.open_part(&format!("form-data; name=\"{}\"", escape(name)), None);
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(CRLF);
        self
    }

    /// Appends a file field. `data` is carried unmodified.
    pub fn file(mut self, name: &str, file_name: &str, data: &[u8]) -> Self {
        self.body.reserve(data.len() + 256);
        self.open_part(
            &format!(
                "form-data; name=\"{}\"; filename=\"{}\"",
                escape(name),
                escape(file_name)
            ),
            Some("application/octet-stream"),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(CRLF);
        self
    }

    /// Writes the closing delimiter and returns the body.
    pub fn finish(mut self) -> MultipartBody {
        self.body.extend_from_slice(b"--");
        self.body.extend_from_slice(self.boundary.as_bytes());
        self.body.extend_from_slice(b"--");
        self.body.extend_from_slice(CRLF);

        MultipartBody {
            content_type: format!("multipart/form-data; boundary={}", self.boundary),
            bytes: self.body,
        }
    }

    fn open_part(&mut self, disposition: &str, content_type: Option<&str>) {
        self.body.extend_from_slice(b"--");
        self.body.extend_from_slice(self.boundary.as_bytes());
        self.body.extend_from_slice(CRLF);
        self.body.extend_from_slice(b"Content-Disposition: ");
        self.body.extend_from_slice(disposition.as_bytes());
        self.body.extend_from_slice(CRLF);
        if let Some(ct) = content_type {
            self.body.extend_from_slice(b"Content-Type: ");
            self.body.extend_from_slice(ct.as_bytes());
            self.body.extend_from_slice(CRLF);
        }
        self.body.extend_from_slice(CRLF);
    }
}

impl MultipartBody {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Percent-escapes the characters that would break a quoted header value.
fn escape(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_text(body: &MultipartBody) -> String {
        String::from_utf8(body.bytes.clone()).unwrap()
    }

    #[test]
    fn encodes_fields_and_file() {
        let body = MultipartForm::with_boundary("XYZ")
            .text("select", "false")
            .text("print", "false")
            .file("file", "part.gcode", b"G1 X0\nG1 X10\n")
            .finish();

        let expected = "--XYZ\r\n\
            Content-Disposition: form-data; name=\"select\"\r\n\r\n\
            false\r\n\
            --XYZ\r\n\
            Content-Disposition: form-data; name=\"print\"\r\n\r\n\
            false\r\n\
            --XYZ\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"part.gcode\"\r\n\
            Content-Type: application/octet-stream\r\n\r\n\
            G1 X0\nG1 X10\n\r\n\
            --XYZ--\r\n";
        assert_eq!(as_text(&body), expected);
        assert_eq!(body.content_type, "multipart/form-data; boundary=XYZ");
    }

    #[test]
    fn file_bytes_are_untouched() {
        let data: Vec<u8> = (0..=255).collect();
        let body = MultipartForm::with_boundary("b").file("file", "x", &data).finish();
        assert!(body.bytes.windows(data.len()).any(|w| w == data.as_slice()));
    }

    #[test]
    fn random_boundaries_differ() {
        let a = MultipartForm::new();
        let b = MultipartForm::new();
        assert_ne!(a.boundary(), b.boundary());
        assert!(a.boundary().starts_with("printpush-"));
    }

    #[test]
    fn quotes_and_newlines_are_escaped() {
        let body = MultipartForm::with_boundary("b")
            .file("file", "evil\"\r\nX-Injected: 1.gcode", b"")
            .finish();
        let text = as_text(&body);
        assert!(text.contains("filename=\"evil%22%0D%0AX-Injected: 1.gcode\""));
        assert!(!text.contains("\r\nX-Injected"));
    }

    #[test]
    fn empty_form_is_just_the_closing_delimiter() {
        let body = MultipartForm::with_boundary("b").finish();
        assert_eq!(as_text(&body), "--b--\r\n");
        assert!(!body.is_empty());
    }
}
