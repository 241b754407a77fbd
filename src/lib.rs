//! Evidence retrieval for citation verification: segment a reference article,
//! locate citation contexts in the citing article, and rank the reference
//! paragraphs most likely to support each citation.

pub mod citation;
pub mod config;
pub mod embedding;
pub mod embedding_cache;
pub mod error;
pub mod hybrid;
pub mod jats;
pub mod lexical;
pub mod model;
pub mod pipeline;
pub mod quality;
pub mod reweight;
pub mod sections;
pub mod segmenter;
pub mod semantic;
pub mod text;

#[cfg(test)]
mod fixtures;
