use serde::Serialize;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";
/// 10 MiB upload ceiling, inclusive.
pub const MAX_PDF_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FileRejection {
    NotPdf { media_type: String },
    TooLarge { size: u64, max: u64 },
}

impl std::fmt::Display for FileRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileRejection::NotPdf { media_type } => {
                write!(f, "expected {PDF_MEDIA_TYPE}, got '{media_type}'")
            }
            FileRejection::TooLarge { size, max } => {
                write!(f, "file is {size} bytes, limit is {max} bytes")
            }
        }
    }
}

/// True iff the declared media type is PDF and the size is within the ceiling.
pub fn is_valid_pdf(media_type: &str, size: u64) -> bool {
    check_pdf(media_type, size).is_ok()
}

/// Same predicate as [`is_valid_pdf`], but says why a file was rejected.
pub fn check_pdf(media_type: &str, size: u64) -> Result<(), FileRejection> {
    if media_type != PDF_MEDIA_TYPE {
        return Err(FileRejection::NotPdf {
            media_type: media_type.to_string(),
        });
    }
    if size > MAX_PDF_BYTES {
        return Err(FileRejection::TooLarge {
            size,
            max: MAX_PDF_BYTES,
        });
    }
    Ok(())
}
