mod types;

pub use types::*;

use crate::{Error, Result};
use tracing::debug;

impl Request {
    /// Decode the raw command-line argument.
    ///
    /// `modelId`, `message` and `config` are all required, and `modelId`
    /// must not be empty.
    pub fn from_arg(arg: Option<&str>) -> Result<Self> {
        let raw = arg.ok_or_else(|| Error::request("missing request argument"))?;
        let request: Request = serde_json::from_str(raw)?;

        if request.model_id.trim().is_empty() {
            return Err(Error::request("'modelId' must not be empty"));
        }

        debug!(
            model_id = %request.model_id,
            message_len = request.message.len(),
            "Decoded request"
        );

        Ok(request)
    }
}
