// Keijiban library exports

pub mod command_processor;
pub mod config;
pub mod export;
pub mod file_manager;
pub mod gradients;
pub mod history;
pub mod issuers;
pub mod measure;
pub mod model;
pub mod notices;
pub mod pagination;
pub mod pdf;
pub mod portable_key;
pub mod preview;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod storage;
pub mod templates;
pub mod text_width;

pub use config::Config;
pub use export::{PageRasterizer, RasterFormat, RasterOptions};
pub use model::{Document, Layout, Section, SectionKind};
pub use pagination::{Page, Pagination, Paginator};
pub use preview::RenderedPage;
pub use session::{Confirm, Session, SessionOptions};
pub use snapshot::StateSnapshot;
pub use storage::Store;
