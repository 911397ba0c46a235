use serde::{Deserialize, Serialize};

/// The bridge's mirror of what the editor last reported.
///
/// All fields are optional: a freshly started bridge knows nothing until the
/// editor plugin pushes its first event, and an editor with no focused file or
/// open folder reports `None` for the corresponding field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorState {
    /// Path (or bare name) of the focused file.
    pub file_name: Option<String>,
    /// Editor language identifier of the focused file, e.g. `"rust"`.
    pub language_id: Option<String>,
    /// Name of the first workspace folder.
    pub workspace_name: Option<String>,
}
