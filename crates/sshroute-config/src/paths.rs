use std::path::PathBuf;

/// Expand a leading `~` to the current user's home directory.
///
/// Paths without a leading `~`, and paths on systems where the home
/// directory cannot be determined, are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~')
        && let Some(home) = dirs::home_dir()
    {
        let rest = rest.trim_start_matches(['/', '\\']);
        if rest.is_empty() {
            return home;
        }
        return home.join(rest);
    }
    PathBuf::from(path)
}
