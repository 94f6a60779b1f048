/// True for sources such as `webpack:///src/a.ts` or `file:///abs/a.ts`
pub fn is_url_like(path: &str) -> bool {
    path.contains("://") || path.starts_with("data:")
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || path.starts_with('\\') || path.get(1..3) == Some(":\\")
}

/// Prefixes a source with the map's `sourceRoot`
/// Example: ("src/", "app.ts") -> "src/app.ts"
pub fn join_source_root(root: Option<&str>, source: &str) -> String {
    match root {
        Some(root) if !root.is_empty() && !is_url_like(source) && !is_absolute(source) => {
            format!("{}/{}", root.trim_end_matches('/'), source)
        }
        _ => source.to_string(),
    }
}

/// Directory part of a generated path, without the trailing separator
pub fn parent_dir(path: &str) -> &str {
    path.rfind(['/', '\\']).map(|i| &path[..i]).unwrap_or("")
}

/// Collapses `.` and `..` segments, keeping leading `..` that cannot be resolved
/// Example: "dist/../src/./app.ts" -> "src/app.ts"
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            _ => parts.push(part),
        }
    }
    let joined = parts.join("/");
    if absolute { format!("/{joined}") } else { joined }
}

/// Resolves a source-map source to the path it is reported under
/// Example: ("dist/app.js", "../src/app.ts") -> "src/app.ts"
pub fn resolve_original_path(generated: &str, source: &str, relative_sources: bool) -> String {
    if !relative_sources || is_url_like(source) {
        return source.to_string();
    }
    if is_absolute(source) {
        return normalize(source);
    }
    let dir = parent_dir(generated);
    if dir.is_empty() {
        normalize(source)
    } else {
        normalize(&format!("{dir}/{source}"))
    }
}
