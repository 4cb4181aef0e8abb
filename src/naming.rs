//! Name mapping between model classes, resource paths and external keys.
//!
//! Classes are `PascalCase` (`UserProfile`), resource paths are plural and dashed
//! (`user-profiles`), fields are `snake_case` internally and `camelCase` on the wire.

/// Pluggable naming rules. Every domain has one; resources may override it.
pub trait NameMapper: Send + Sync + std::fmt::Debug {
    /// `UserProfile` -> `user-profiles`
    fn class_to_path(&self, class_name: &str) -> String;
    /// `user-profiles` -> `UserProfile`
    fn path_to_class(&self, path: &str) -> String;
    /// `created_at` -> `createdAt`
    fn field_to_key(&self, field: &str) -> String;
    /// `UserProfile` -> `userProfile`; names the object in session responses.
    fn class_to_singular(&self, class_name: &str) -> String;
}

/// Plain English rules: regular plurals only.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultNameMapper;

impl NameMapper for DefaultNameMapper {
    fn class_to_path(&self, class_name: &str) -> String {
        pluralize(&to_snake_case(class_name)).replace('_', "-")
    }

    fn path_to_class(&self, path: &str) -> String {
        let snake = singularize(&path.replace('-', "_"));
        let camel = to_camel_case(&snake);
        let mut chars = camel.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    fn field_to_key(&self, field: &str) -> String {
        to_camel_case(field)
    }

    fn class_to_singular(&self, class_name: &str) -> String {
        let mut chars = class_name.chars();
        let lowered: String = match chars.next() {
            Some(first) => first.to_lowercase().chain(chars).collect(),
            None => String::new(),
        };
        singularize(&lowered)
    }
}

/// Convert a single identifier from snake_case to camelCase.
/// e.g. "user_id" -> "userId", "created_at" -> "createdAt"
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = !out.is_empty();
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a single identifier from camelCase or PascalCase to snake_case.
/// e.g. "userId" -> "user_id", "HTTPServer" -> "http_server"
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.map(|n| n.is_lowercase()).unwrap_or(false),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else if c == '-' {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Pluralize the last word of a snake_case identifier.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    if word.ends_with("ss")
        || word.ends_with('x')
        || word.ends_with('z')
        || word.ends_with("ch")
        || word.ends_with("sh")
    {
        return format!("{}es", word);
    }
    if word.ends_with('s') {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix('y') {
        if stem.chars().last().map(|c| !is_vowel(c)).unwrap_or(false) {
            return format!("{}ies", stem);
        }
    }
    format!("{}s", word)
}

/// Inverse of [`pluralize`] for regular plurals.
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{}y", stem);
        }
    }
    for suffix in ["sses", "xes", "zes", "ches", "shes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") {
        return word.to_string();
    }
    match word.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_names_become_plural_dashed_paths() {
        let m = DefaultNameMapper;
        assert_eq!(m.class_to_path("Song"), "songs");
        assert_eq!(m.class_to_path("UserProfile"), "user-profiles");
        assert_eq!(m.class_to_path("Category"), "categories");
        assert_eq!(m.class_to_path("Box"), "boxes");
        assert_eq!(m.class_to_path("Address"), "addresses");
    }

    #[test]
    fn paths_map_back_to_class_names() {
        let m = DefaultNameMapper;
        assert_eq!(m.path_to_class("songs"), "Song");
        assert_eq!(m.path_to_class("user-profiles"), "UserProfile");
        assert_eq!(m.path_to_class("categories"), "Category");
        assert_eq!(m.path_to_class("addresses"), "Address");
    }

    #[test]
    fn field_names_and_keys_round_trip() {
        let m = DefaultNameMapper;
        assert_eq!(m.field_to_key("created_at"), "createdAt");
        assert_eq!(to_snake_case("createdAt"), "created_at");
        assert_eq!(to_snake_case("name"), "name");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
    }

    #[test]
    fn singular_resource_name_is_lower_camel() {
        let m = DefaultNameMapper;
        assert_eq!(m.class_to_singular("User"), "user");
        assert_eq!(m.class_to_singular("UserProfile"), "userProfile");
    }
}
