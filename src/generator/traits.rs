//! Seams between the batch engine and its inputs.

use std::path::Path;

use crate::dataset::{Field, Record};
use crate::template::RenderError;

/// Something that yields string records, in a stable order, any number of times.
pub trait RecordSource {
    fn fields(&self) -> &[Field];

    fn record_count(&self) -> usize;

    /// Start a fresh pass over all records.
    fn records(&self) -> Box<dyn Iterator<Item = Record> + '_>;
}

/// Turns one record into one document on disk.
pub trait Renderer {
    /// Extension of produced files, without the dot.
    fn extension(&self) -> &str;

    fn render(&self, record: &Record, output: &Path) -> Result<(), RenderError>;
}
