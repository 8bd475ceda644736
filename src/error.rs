// Setup errors
//
// Every failure in the negotiation pipeline is terminal for the whole setup
// sequence. Variants follow the four failure classes (unsupported hardware,
// incomplete negotiation, resource creation, missing asset) plus the loader
// and layer failures that can happen before a device is even considered.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

pub type SetupResult<T> = std::result::Result<T, SetupError>;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Failed to load the Vulkan library: {0}")]
    Loader(#[from] ash::LoadingError),

    #[error("Requested validation layer is not available: {0}")]
    MissingLayer(String),

    #[error("No suitable GPU found ({candidates} candidate(s) examined)")]
    UnsupportedHardware { candidates: usize },

    #[error("Negotiation incomplete: {0}")]
    IncompleteNegotiation(String),

    #[error("Failed to create {what}: {result:?}")]
    ResourceCreation {
        what: &'static str,
        result: vk::Result,
    },

    #[error("Failed to query {what}: {result:?}")]
    Query {
        what: &'static str,
        result: vk::Result,
    },

    #[error("Shader binary {path:?} could not be read: {source}")]
    AssetMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SetupError {
    pub(crate) fn creation(what: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::ResourceCreation { what, result }
    }

    pub(crate) fn query(what: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Query { what, result }
    }
}
