//! paperlens-ingestion — Getting papers in front of the summarizer.
//! - PDF text extraction (lopdf)
//! - Page-aware chunking for model context limits
//! - PubMed discovery of recent papers
//! - Processed-paper tracking so discovery only reports new work

pub mod sources;
pub mod chunker;
pub mod dedup;
pub mod models;
pub mod pdf_parser;

pub use chunker::{chunk_text, estimate_tokens};
pub use dedup::{discover_new_papers, ProcessedPapers};
pub use models::{DateWindow, PaperMetadata};
pub use pdf_parser::{extract_text, ExtractedText, PdfMetadata};
