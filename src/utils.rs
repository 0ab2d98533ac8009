use std::{
    fs::{File, create_dir_all},
    io::{BufRead, BufReader, Write},
    path::Path,
};

use serde::{Serialize, de::DeserializeOwned};

use crate::tool::error_analysis::LoadError;

/// Canonical forward-slash form of a path, used so that separator style never
/// decides a parameter comparison. Empty input stays empty.
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                // `..` at the root of an absolute path stays at the root
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Run id of a results file: the folder the run was written into, or the file
/// stem when the path has no parent folder.
pub fn run_id_of(results_path: &Path) -> Option<String> {
    results_path
        .parent()
        .and_then(Path::file_name)
        .or_else(|| results_path.file_stem())
        .map(|name| name.to_string_lossy().into_owned())
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

pub fn load_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: display_path(path),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| LoadError::Json {
        path: display_path(path),
        source,
    })
}

/// Blank lines are skipped.
pub fn load_json_lines<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: display_path(path),
        source,
    })?;
    let mut results = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| LoadError::Io {
            path: display_path(path),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line).map_err(|source| LoadError::JsonLine {
            path: display_path(path),
            line: index + 1,
            source,
        })?;
        results.push(entry);
    }
    Ok(results)
}

pub fn write_json_pretty<T: Serialize + ?Sized>(
    path: impl AsRef<Path>,
    value: &T,
) -> Result<(), LoadError> {
    let path = path.as_ref();
    let write_error = |source| LoadError::Write {
        path: display_path(path),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent).map_err(write_error)?;
        }
    }
    let serialized = serde_json::to_string_pretty(value).map_err(|source| LoadError::Json {
        path: display_path(path),
        source,
    })?;
    let mut file = File::create(path).map_err(write_error)?;
    writeln!(file, "{}", serialized).map_err(write_error)?;
    file.flush().map_err(write_error)?;
    Ok(())
}
