use std::sync::Arc;

/// Provides the file extension (without the leading dot) an artifact carries.
///
/// `None` means the artifact is extension-less, e.g. a copied directory.
pub trait FileExtProvider {
    fn file_ext(&self) -> Option<Arc<str>>;
}
