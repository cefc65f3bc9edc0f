//! English pluralization for table names, used to name nested-children
//! fields in level queries.

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Pluralize a (lowercase) table name.
/// e.g. "post" -> "posts", "category" -> "categories", "quiz" -> "quizzes"
pub fn pluralize(name: &str) -> String {
    let mut chars = name.chars().rev();
    let last = match chars.next() {
        Some(c) => c,
        None => return String::new(),
    };
    let prev = chars.next();

    if matches!(last, 's' | 'z') && prev.map(is_vowel).unwrap_or(false) {
        // vowel + s/z doubles the final consonant
        format!("{}{}es", name, last)
    } else if matches!(last, 'o' | 's' | 'x' | 'z')
        || name.ends_with("sh")
        || name.ends_with("ch")
    {
        format!("{}es", name)
    } else if last == 'y' && !prev.map(is_vowel).unwrap_or(true) {
        format!("{}ies", &name[..name.len() - 1])
    } else {
        format!("{}s", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_nouns_append_s() {
        assert_eq!(pluralize("post"), "posts");
        assert_eq!(pluralize("member"), "members");
    }

    #[test]
    fn sibilant_endings_append_es() {
        assert_eq!(pluralize("class"), "classes");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("hero"), "heroes");
        assert_eq!(pluralize("dish"), "dishes");
        assert_eq!(pluralize("church"), "churches");
    }

    #[test]
    fn vowel_before_final_s_or_z_doubles() {
        assert_eq!(pluralize("quiz"), "quizzes");
        assert_eq!(pluralize("gas"), "gasses");
    }

    #[test]
    fn consonant_y_becomes_ies() {
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("boy"), "boys");
    }

    #[test]
    fn empty_name_stays_empty() {
        assert_eq!(pluralize(""), "");
    }
}
