//! The browse response model.

use serde::Serialize;

/// Response payload for a browse request. `err` and `out` are indexed by
/// block position; the id fields appear only when the matching reuse flag was
/// set on the request.
#[derive(Debug, Default, Serialize)]
pub struct BrowseResult {
    pub err: Vec<String>,
    pub out: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_id: Option<String>,
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
}

impl BrowseResult {
    /// A result with one (empty) slot per block.
    pub fn sized(blocks: usize) -> Self {
        Self {
            err: vec![String::new(); blocks],
            out: vec![Vec::new(); blocks],
            tab_id: None,
            window_id: None,
            image: None,
        }
    }

    /// Selects the response encoding: a PNG buffer wins over JSON.
    pub fn into_body(mut self) -> ResultBody {
        match self.image.take() {
            Some(bytes) => ResultBody::Png(bytes),
            None => ResultBody::Json(self),
        }
    }
}

pub enum ResultBody {
    Json(BrowseResult),
    Png(Vec<u8>),
}
