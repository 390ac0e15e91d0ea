use axum::body::Bytes;
use mime_guess::{mime, Mime};

use super::FieldErrors;

/// A file received under a multipart field
#[derive(Debug, Clone)]
pub struct Upload {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// An upload that passed validation, ready to be written to the blob store
#[derive(Debug, Clone)]
pub struct ValidUpload {
    pub extension: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Copy)]
pub struct UploadRules {
    pub max_bytes: usize,
}

impl Upload {
    /// Content type sent with the part. `application/octet-stream` says
    /// nothing about the file and counts as undeclared.
    fn declared_type(&self) -> Option<Mime> {
        self.content_type
            .as_deref()?
            .parse::<Mime>()
            .ok()
            .filter(|ty| ty.essence_str() != mime::APPLICATION_OCTET_STREAM.essence_str())
    }

    /// Lowercased extension of the client file name, if it is a known one
    fn name_extension(&self) -> Option<String> {
        self.file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| mime_guess::from_ext(ext).first().is_some())
    }

    /// Extension to keep on the stored file. When both the file name and
    /// the content type say something they must agree; the client's own
    /// extension wins, otherwise the content type's preferred one is used.
    /// Only raster `image/*` types are accepted.
    pub fn extension(&self) -> Option<String> {
        let resolved = match (self.name_extension(), self.declared_type()) {
            (Some(ext), Some(declared)) => {
                let agrees = mime_guess::from_ext(&ext)
                    .iter()
                    .any(|guess| guess.essence_str() == declared.essence_str());
                agrees.then_some((ext, declared))
            }
            (Some(ext), None) => {
                let guess = mime_guess::from_ext(&ext).first()?;
                Some((ext, guess))
            }
            (None, Some(declared)) => {
                let ext = preferred_extension(&declared)?;
                Some((ext, declared))
            }
            (None, None) => None,
        };

        resolved
            .filter(|(_, ty)| is_raster_image(ty))
            .map(|(ext, _)| ext)
    }

    /// Checks the file is a non-empty image within the size limit and
    /// returns it along with the extension to store it under.
    pub fn validate(&self, rules: UploadRules) -> Result<ValidUpload, FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.bytes.is_empty() {
            errors.insert(self.field.clone(), format!("The {} failed to upload.", self.field));
            return Err(errors);
        }

        if self.bytes.len() > rules.max_bytes {
            errors.insert(
                self.field.clone(),
                format!(
                    "The {} may not be greater than {} kilobytes.",
                    self.field,
                    rules.max_bytes / 1024
                ),
            );
            return Err(errors);
        }

        match self.extension() {
            Some(extension) => Ok(ValidUpload {
                extension,
                bytes: self.bytes.clone(),
            }),
            None => {
                errors.insert(self.field.clone(), format!("The {} must be an image.", self.field));
                Err(errors)
            }
        }
    }
}

fn is_raster_image(ty: &Mime) -> bool {
    ty.type_() == mime::IMAGE && ty.essence_str() != mime::IMAGE_SVG.essence_str()
}

fn preferred_extension(ty: &Mime) -> Option<String> {
    let extensions = mime_guess::get_mime_extensions_str(ty.essence_str())?;
    extensions
        .iter()
        .find(|ext| **ext == ty.subtype().as_str())
        .or_else(|| extensions.first())
        .map(|ext| ext.to_string())
}
