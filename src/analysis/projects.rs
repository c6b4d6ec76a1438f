use std::collections::{BTreeSet, HashMap};

use crate::{
    daemon::{
        collection::normalize::{normalize_process, normalize_title},
        storage::entities::{NewProjectMapping, ProjectMapping},
    },
    error::TrackerError,
};

type MappingKey = (Option<String>, Option<String>);

/// Mapping table prepared for lookups.
#[derive(Debug, Default, Clone)]
pub struct ProjectLookup {
    rules: HashMap<MappingKey, String>,
}

impl ProjectLookup {
    pub fn from_mappings<'a>(mappings: impl IntoIterator<Item = &'a ProjectMapping>) -> Self {
        let rules = mappings
            .into_iter()
            .filter_map(|mapping| {
                let project = mapping.project_name.trim();
                if project.is_empty() {
                    return None;
                }
                let title = mapping
                    .window_title
                    .clone()
                    .filter(|v| !v.is_empty());
                Some((
                    (normalize_process(mapping.process_name.as_deref()), title),
                    project.to_string(),
                ))
            })
            .collect();
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Finds the project of an active bucket. The most specific rule wins: exact process and
    /// title, then the process alone, then the title alone.
    pub fn resolve(&self, process_name: Option<&str>, window_title: Option<&str>) -> Option<&str> {
        let process = normalize_process(process_name);
        let title = window_title.filter(|v| !v.is_empty()).map(str::to_string);

        [
            (process.clone(), title.clone()),
            (process, None),
            (None, title),
        ]
        .iter()
        .find_map(|key| self.rules.get(key))
        .map(String::as_str)
    }
}

/// Validates a mapping submitted by the user and derives its lookup keys: the process key is
/// trimmed and lowercased, the title key normalized the same way recorded titles are.
pub fn prepare_mapping(
    project_name: &str,
    process_name: Option<&str>,
    window_title: Option<&str>,
) -> Result<NewProjectMapping, TrackerError> {
    let project_name = project_name.trim();
    if project_name.is_empty() {
        return Err(TrackerError::validation("project_name is required"));
    }

    let process_name = process_name.map(str::trim).filter(|v| !v.is_empty());
    let title_key = normalize_title(process_name, window_title);
    let process_key = normalize_process(process_name);
    if process_key.is_none() && title_key.is_none() {
        return Err(TrackerError::validation(
            "either process_name or window_title is required",
        ));
    }

    Ok(NewProjectMapping {
        project_name: project_name.to_string(),
        process_key,
        title_key,
    })
}

/// Distinct project names, sorted case-insensitively.
pub fn project_names(mappings: &[ProjectMapping]) -> Vec<String> {
    let mut names = mappings
        .iter()
        .map(|v| v.project_name.clone())
        .filter(|v| !v.trim().is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();
    names.sort_by_key(|v| v.to_lowercase());
    names
}
