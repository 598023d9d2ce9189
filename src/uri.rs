//! String based helpers for archive paths. Epub paths always use `/`.

/// Directory part of `path`, empty for entries at the archive root.
pub(crate) fn parent(path: &str) -> &str {
    path.rfind('/').map_or("", |index| &path[..index])
}

/// Joins `relative` to `dir` and normalizes the result.
pub(crate) fn join(dir: &str, relative: &str) -> String {
    let relative = relative.trim();
    if dir.is_empty() {
        normalize(relative)
    } else {
        normalize(&format!("{}/{}", dir, relative))
    }
}

/// Like [`join`] but leaves `href` alone if it already starts with `dir`.
pub(crate) fn resolve(dir: &str, href: &str) -> String {
    let href = href.trim();
    if dir.is_empty() || href.starts_with(&format!("{}/", dir)) {
        normalize(href)
    } else {
        join(dir, href)
    }
}

/// Drops `.` and empty segments and folds `..` into its parent. A `..`
/// above the archive root is dropped.
pub(crate) fn normalize(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            s => stack.push(s),
        }
    }
    stack.join("/")
}
