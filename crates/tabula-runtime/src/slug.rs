//! Route slug normalization and name derivation from table names.

/// Normalize a route slug.
///
/// Keeps `[A-Za-z0-9_-]`, turns whitespace, `/`, `\` and `.` into `-`, drops
/// everything else, collapses runs of `-` and trims `-` from both ends.
/// The result is a fixed point: normalizing it again yields the same string.
pub fn normalize_slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
        } else if ch == '-' || ch.is_whitespace() || matches!(ch, '/' | '\\' | '.') {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
        }
    }

    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Normalize a `/`-separated route prefix segment by segment.
pub fn normalize_route_prefix(input: &str) -> String {
    input
        .split('/')
        .map(normalize_slug)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Slug derived from a table name (`admin_articles` becomes `admin-articles`).
pub fn slug_from_table(table: &str) -> String {
    normalize_slug(&table.replace('_', "-"))
}

fn words(table: &str) -> impl Iterator<Item = &str> {
    table
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
        None => String::new(),
    }
}

/// `admin_articles` becomes `AdminArticles`.
pub fn model_name_from_table(table: &str) -> String {
    words(table).map(capitalize).collect()
}

/// `admin_articles` becomes `AdminArticlesController`.
pub fn controller_name_from_table(table: &str) -> String {
    format!("{}Controller", model_name_from_table(table))
}

/// `admin_articles` becomes `Admin Articles`.
pub fn module_name_from_table(table: &str) -> String {
    words(table).map(capitalize).collect::<Vec<_>>().join(" ")
}

/// `created_at` becomes `Created At`.
pub fn humanize(name: &str) -> String {
    module_name_from_table(name)
}
