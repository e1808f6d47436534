use std::path::Path;

pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return format!("~/{}", relative.display());
        }
    }
    path.display().to_string()
}

pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_string("héllo", 2), "h");
        assert_eq!(truncate_string("héllo", 3), "hé");
        assert_eq!(truncate_string("short", 10), "short");
    }

    #[test]
    fn display_path_abbreviates_home() {
        let home = Path::new("/home/dev");
        assert_eq!(
            display_path(Path::new("/home/dev/.openclaw/openclaw.json"), Some(home)),
            "~/.openclaw/openclaw.json"
        );
        assert_eq!(display_path(Path::new("/etc/hosts"), Some(home)), "/etc/hosts");
    }
}
