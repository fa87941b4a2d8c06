/*!
 * Book document model and EPUB container.
 *
 * - `model`: ordered chapters held in memory while the pipeline runs
 * - `epub`: reading chapters out of an EPUB archive and writing them back
 */

pub mod epub;
pub mod model;

pub use epub::{EpubContainer, ManifestItem};
pub use model::{Chapter, Document};
