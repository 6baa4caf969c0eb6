use std::io::{BufWriter, Error, IntoInnerError, Seek, Write};
use zip::ZipWriter;

/// Consumes a layered writer, flushing its trailer, and hands back the inner
/// writer.
pub trait Finish<O> {
    fn finish(self) -> Result<O, Error>;
}

impl<W: Write + Seek> Finish<W> for ZipWriter<W> {
    fn finish(self) -> Result<W, Error> {
        ZipWriter::finish(self).map_err(Error::other)
    }
}

impl<W: Write> Finish<W> for BufWriter<W> {
    fn finish(self) -> Result<W, Error> {
        self.into_inner().map_err(IntoInnerError::into_error)
    }
}
