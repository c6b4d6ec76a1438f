//! Canonicalization of window titles. Browsers decorate every tab title with their own name and a
//! tab counter, which would otherwise split one page into many buckets.

use std::{path::Path, sync::LazyLock};

use regex::Regex;

/// Executable name -> suffixes the browser appends to its window titles. Order matters, the first
/// matching suffix wins.
const BROWSER_SUFFIXES: &[(&str, &[&str])] = &[
    ("msedge.exe", &[" - Microsoft Edge"]),
    ("chrome.exe", &[" - Google Chrome"]),
    ("firefox.exe", &[" - Mozilla Firefox"]),
    ("brave.exe", &[" - Brave"]),
    ("opera.exe", &[" - Opera"]),
    ("msedge", &[" - Microsoft Edge"]),
    ("chrome", &[" - Google Chrome"]),
    ("chromium", &[" - Chromium"]),
    ("firefox", &[" — Mozilla Firefox", " - Mozilla Firefox"]),
    ("brave", &[" - Brave"]),
    ("opera", &[" - Opera"]),
];

static TAB_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*\band\s+\d+\s+more\s+pages?\b").expect("tab count pattern is valid")
});

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("whitespace pattern is valid"));

fn browser_suffixes(process_name: Option<&str>) -> &'static [&'static str] {
    let Some(process_name) = process_name else {
        return &[];
    };
    let file_name = Path::new(process_name.trim())
        .file_name()
        .map(|v| v.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    BROWSER_SUFFIXES
        .iter()
        .find(|(executable, _)| *executable == file_name)
        .map(|(_, suffixes)| *suffixes)
        .unwrap_or(&[])
}

fn clean_once(suffixes: &[&str], title: &str) -> String {
    let mut title = title.trim();

    if let Some(stripped) = suffixes
        .iter()
        .find_map(|suffix| title.strip_suffix(*suffix))
    {
        title = stripped.trim_end_matches([' ', '-']);
    }

    let without_tab_count = TAB_COUNT.replace_all(title, "");
    WHITESPACE_RUN
        .replace_all(&without_tab_count, " ")
        .trim()
        .to_string()
}

/// Cleans `raw_title` of a window owned by `process_name`. Returns `None` when nothing meaningful
/// is left.
///
/// Cleaning is repeated until the title stops changing, so the result is a fixed point:
/// `normalize_title(p, normalize_title(p, t)) == normalize_title(p, t)`.
pub fn normalize_title(process_name: Option<&str>, raw_title: Option<&str>) -> Option<String> {
    let suffixes = browser_suffixes(process_name);
    let mut current = raw_title?.trim().to_string();

    loop {
        let next = clean_once(suffixes, &current);
        if next == current {
            break;
        }
        current = next;
    }

    (!current.is_empty()).then_some(current)
}

/// Key used to match processes against project mappings.
pub fn normalize_process(process_name: Option<&str>) -> Option<String> {
    let lowered = process_name?.trim().to_lowercase();
    (!lowered.is_empty()).then_some(lowered)
}
