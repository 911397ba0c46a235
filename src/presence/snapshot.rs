//! Derives the activity snapshot from mirrored editor state and settings.

use crate::editor::EditorState;
use crate::settings::Settings;

use super::traits::Activity;

/// Compute the presence payload for the current editor/workspace state.
///
/// Empty strings count as absent everywhere: an editor that reports an empty
/// workspace name gets the `"No workspace"` fallback, and an empty configured
/// small image key falls through to the language-based icon.
pub fn build_snapshot(editor: &EditorState, settings: &Settings, start_timestamp: i64) -> Activity {
    let file_name = match editor.file_name.as_deref() {
        Some(path) => file_display_name(path),
        None => "No file open".to_string(),
    };

    let workspace = editor
        .workspace_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or("No workspace");

    let language = editor.language_id.as_deref().filter(|id| !id.is_empty());

    let (small_image_key, small_image_text) = if !settings.small_image_key.is_empty() {
        (
            Some(settings.small_image_key.clone()),
            Some(settings.small_image_text.clone()),
        )
    } else if let Some(language) = language {
        (Some(language.to_string()), Some(language.to_uppercase()))
    } else {
        (None, None)
    };

    Activity {
        details: format!("Editing {}", file_name),
        state: format!("Workspace: {}", workspace),
        start_timestamp,
        large_image_key: settings.large_image_key.clone(),
        large_image_text: settings.large_image_text.clone(),
        small_image_key,
        small_image_text,
        instance: false,
    }
}

/// Last path segment, tolerant of both separators. A degenerate path (empty,
/// or ending in a separator) shows as `"Unknown file"`.
fn file_display_name(path: &str) -> String {
    path.rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("Unknown file")
        .to_string()
}
