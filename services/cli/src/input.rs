use std::fs;
use std::path::Path;

use dpae_edi::error::AppError;
use dpae_edi::workflows::dpae::DeclarationSession;

/// Reads a declaration file in the service's JSON input format.
pub fn load_declaration(path: &Path) -> Result<DeclarationSession, AppError> {
    let raw = fs::read_to_string(path)?;
    let session = serde_json::from_str(&raw)?;
    Ok(session)
}
