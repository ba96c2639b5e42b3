//! Read-only filesystem tools the model can call before suggesting a
//! command. Every tool is sandboxed to the working directory and returns
//! a human-readable string; failures come back as `Error: ...` strings
//! and never abort the conversation.

use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use serde_json::{json, Value};

use crate::models::tool::Tool;

const MAX_FILE_SIZE: u64 = 100 * 1024;
const MAX_RESULTS: usize = 50;
const MAX_DEPTH: usize = 3;
const MAX_GREP_FILES: usize = 200;

/// Directory names never worth traversing.
const NOISE_DIRS: &[&str] = &[
    "node_modules",
    "__pycache__",
    ".git",
    "target",
    "build",
    "dist",
];

pub struct Toolbox {
    root: PathBuf,
    max_file_lines: usize,
}

impl Toolbox {
    pub fn new(root: impl Into<PathBuf>, max_file_lines: usize) -> Self {
        Self {
            root: root.into(),
            max_file_lines,
        }
    }

    /// Schemas advertised to the model for every tool in the dispatch table.
    pub fn schemas() -> Vec<Tool> {
        vec![
            Tool::new(
                "read_file",
                "Read the contents of a text file. Returns the full file content (truncated past the line limit).",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Path to the file, relative to working directory"
                        }
                    },
                    "required": ["path"]
                }),
            ),
            Tool::new(
                "list_directory",
                "List files and directories at a path. Shows file sizes. Use depth>1 to see subdirectories.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Directory path, relative to working directory. Use '.' for current directory."
                        },
                        "depth": {
                            "type": "integer",
                            "description": "How many levels deep to list (default 1, max 3)"
                        }
                    },
                    "required": ["path"]
                }),
            ),
            Tool::new(
                "search_files",
                "Search for files matching a glob pattern (e.g., '*.rs', 'Makefile', '*.json'). Returns file paths only, not contents.",
                json!({
                    "type": "object",
                    "properties": {
                        "pattern": {
                            "type": "string",
                            "description": "Glob pattern to match (e.g., '*.rs', 'README*', '*.config.js')"
                        },
                        "path": {
                            "type": "string",
                            "description": "Directory to search in, relative to working directory. Default: '.'"
                        }
                    },
                    "required": ["pattern"]
                }),
            ),
            Tool::new(
                "grep_files",
                "Search file contents for a text pattern (like grep). Returns matching lines with file paths and line numbers. Use this to find where a string appears in the codebase.",
                json!({
                    "type": "object",
                    "properties": {
                        "pattern": {
                            "type": "string",
                            "description": "Text to search for in file contents (case-insensitive)"
                        },
                        "path": {
                            "type": "string",
                            "description": "Directory to search in, relative to working directory. Default: '.'"
                        }
                    },
                    "required": ["pattern"]
                }),
            ),
            Tool::new(
                "read_lines",
                "Read a specific range of lines from a file (1-indexed). Useful for inspecting part of a large file.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Path to the file, relative to working directory"
                        },
                        "start": {
                            "type": "integer",
                            "description": "Starting line number (1-indexed)"
                        },
                        "end": {
                            "type": "integer",
                            "description": "Ending line number (inclusive)"
                        }
                    },
                    "required": ["path", "start", "end"]
                }),
            ),
        ]
    }

    /// Dispatch a tool call by name.
    pub fn execute(&self, name: &str, args: &Value) -> String {
        match name {
            "read_file" => match str_arg(args, "path") {
                Ok(path) => self.read_file(&path),
                Err(e) => e,
            },
            "list_directory" => {
                let path = opt_str_arg(args, "path").unwrap_or_else(|| ".".to_string());
                let depth = args.get("depth").and_then(Value::as_u64).unwrap_or(1) as usize;
                self.list_directory(&path, depth)
            }
            "search_files" => match str_arg(args, "pattern") {
                Ok(pattern) => {
                    let path = opt_str_arg(args, "path").unwrap_or_else(|| ".".to_string());
                    self.search_files(&pattern, &path)
                }
                Err(e) => e,
            },
            "grep_files" => match str_arg(args, "pattern") {
                Ok(pattern) => {
                    let path = opt_str_arg(args, "path").unwrap_or_else(|| ".".to_string());
                    self.grep_files(&pattern, &path)
                }
                Err(e) => e,
            },
            "read_lines" => {
                match (
                    str_arg(args, "path"),
                    int_arg(args, "start"),
                    int_arg(args, "end"),
                ) {
                    (Ok(path), Ok(start), Ok(end)) => self.read_lines(&path, start, end),
                    (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => e,
                }
            }
            other => format!("Error: Unknown tool '{}'", other),
        }
    }

    /// Resolve a path relative to the sandbox root, rejecting anything
    /// that escapes it. This is a security boundary: the check runs
    /// before any read, and symlink targets are verified too.
    fn resolve_safe(&self, path_str: &str) -> Result<PathBuf, String> {
        let root = self
            .root
            .canonicalize()
            .map_err(|e| format!("Error: cannot resolve working directory: {}", e))?;

        let joined = if Path::new(path_str).is_absolute() {
            PathBuf::from(path_str)
        } else {
            root.join(path_str)
        };

        let normalized = normalize(&joined);
        if !normalized.starts_with(&root) {
            return Err(format!("Error: Path traversal blocked: {}", path_str));
        }

        // A symlink inside the tree can still point outside of it
        match normalized.canonicalize() {
            Ok(real) if !real.starts_with(&root) => {
                Err(format!("Error: Path traversal blocked: {}", path_str))
            }
            Ok(real) => Ok(real),
            // Nonexistent targets surface as not-found in the tools
            Err(_) => Ok(normalized),
        }
    }

    fn read_file(&self, path: &str) -> String {
        let target = match self.resolve_safe(path) {
            Ok(t) => t,
            Err(e) => return e,
        };

        if !target.exists() {
            return format!("Error: File not found: {}", path);
        }
        if !target.is_file() {
            return format!("Error: Not a file: {}", path);
        }
        match target.metadata() {
            Ok(meta) if meta.len() > MAX_FILE_SIZE => {
                return format!("Error: File too large (>{}KB): {}", MAX_FILE_SIZE / 1024, path);
            }
            Ok(_) => {}
            Err(e) => return format!("Error reading file: {}", e),
        }
        if is_binary(&target) {
            return format!("Error: Binary file, cannot read: {}", path);
        }

        match fs::read(&target) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let lines: Vec<&str> = text.lines().collect();
                if lines.len() > self.max_file_lines {
                    format!(
                        "{}\n\n[Truncated: showing {}/{} lines]",
                        lines[..self.max_file_lines].join("\n"),
                        self.max_file_lines,
                        lines.len()
                    )
                } else {
                    lines.join("\n")
                }
            }
            Err(e) => format!("Error reading file: {}", e),
        }
    }

    fn list_directory(&self, path: &str, depth: usize) -> String {
        let target = match self.resolve_safe(path) {
            Ok(t) => t,
            Err(e) => return e,
        };

        if !target.exists() {
            return format!("Error: Directory not found: {}", path);
        }
        if !target.is_dir() {
            return format!("Error: Not a directory: {}", path);
        }

        let depth = depth.clamp(1, MAX_DEPTH);
        let mut lines = Vec::new();
        walk_listing(&target, 1, depth, "", &mut lines);

        if lines.is_empty() {
            return "(empty directory)".to_string();
        }
        let truncated = lines.len() > MAX_RESULTS;
        lines.truncate(MAX_RESULTS);
        let mut result = lines.join("\n");
        if truncated {
            result.push_str(&format!(
                "\n\n[Truncated: showing first {} entries]",
                MAX_RESULTS
            ));
        }
        result
    }

    fn search_files(&self, pattern: &str, path: &str) -> String {
        let target = match self.resolve_safe(path) {
            Ok(t) => t,
            Err(e) => return e,
        };

        if !target.exists() || !target.is_dir() {
            return format!("Error: Directory not found: {}", path);
        }

        let matcher = match glob::Pattern::new(pattern) {
            Ok(m) => m,
            Err(e) => return format!("Error: invalid pattern '{}': {}", pattern, e),
        };

        let mut matches = Vec::new();
        collect_name_matches(&target, &target, &matcher, 1, &mut matches);

        if matches.is_empty() {
            return format!("No files matching '{}' found in {}", pattern, path);
        }

        let truncated = matches.len() > MAX_RESULTS;
        matches.truncate(MAX_RESULTS);
        let mut result = matches.join("\n");
        if truncated {
            result.push_str(&format!(
                "\n\n[Truncated: showing first {} results]",
                MAX_RESULTS
            ));
        }
        result
    }

    fn grep_files(&self, pattern: &str, path: &str) -> String {
        let target = match self.resolve_safe(path) {
            Ok(t) => t,
            Err(e) => return e,
        };

        if !target.exists() || !target.is_dir() {
            return format!("Error: Directory not found: {}", path);
        }

        let needle = pattern.to_lowercase();
        let mut matches = Vec::new();
        let mut files_scanned = 0usize;
        grep_walk(&target, &target, &needle, 1, &mut matches, &mut files_scanned);

        if matches.is_empty() {
            return format!(
                "No matches for '{}' in {} ({} files searched)",
                pattern, path, files_scanned
            );
        }

        let truncated = matches.len() > MAX_RESULTS;
        matches.truncate(MAX_RESULTS);
        let mut result = matches.join("\n");
        if truncated {
            result.push_str(&format!(
                "\n\n[Truncated: showing first {} matches]",
                MAX_RESULTS
            ));
        }
        result
    }

    fn read_lines(&self, path: &str, start: i64, end: i64) -> String {
        let target = match self.resolve_safe(path) {
            Ok(t) => t,
            Err(e) => return e,
        };

        if !target.exists() {
            return format!("Error: File not found: {}", path);
        }
        if !target.is_file() {
            return format!("Error: Not a file: {}", path);
        }
        if is_binary(&target) {
            return format!("Error: Binary file: {}", path);
        }

        let bytes = match fs::read(&target) {
            Ok(b) => b,
            Err(e) => return format!("Error reading lines: {}", e),
        };
        let text = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = text.lines().collect();
        let total = lines.len();

        let start = start.max(1) as usize;
        let end = end.clamp(0, total as i64) as usize;

        if start > total {
            return format!(
                "Error: Start line {} exceeds file length ({} lines)",
                start, total
            );
        }
        if end < start {
            return format!("Error: Invalid line range {}-{}", start, end);
        }

        let numbered: Vec<String> = lines[start - 1..end]
            .iter()
            .enumerate()
            .map(|(offset, line)| format!("{}: {}", start + offset, line))
            .collect();
        format!("Lines {}-{} of {}:\n{}", start, end, total, numbered.join("\n"))
    }
}

fn str_arg(args: &Value, key: &str) -> Result<String, String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("Error: missing required argument '{}'", key))
}

fn opt_str_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_string)
}

fn int_arg(args: &Value, key: &str) -> Result<i64, String> {
    args.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| format!("Error: missing required argument '{}'", key))
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn is_binary(path: &Path) -> bool {
    let mut buffer = [0u8; 8192];
    match fs::File::open(path).and_then(|mut f| f.read(&mut buffer)) {
        Ok(n) => buffer[..n].contains(&0),
        Err(_) => true,
    }
}

fn is_noise(name: &str) -> bool {
    name.starts_with('.') || NOISE_DIRS.contains(&name)
}

/// Directory entries sorted directories-first, then by name.
fn sorted_entries(dir: &Path) -> Result<Vec<fs::DirEntry>, std::io::Error> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| (!e.path().is_dir(), e.file_name()));
    Ok(entries)
}

fn format_size(size: u64) -> String {
    if size < 1024 {
        format!("{}B", size)
    } else if size < 1024 * 1024 {
        format!("{}KB", size / 1024)
    } else {
        format!("{}MB", size / (1024 * 1024))
    }
}

fn walk_listing(dir: &Path, current: usize, depth: usize, prefix: &str, lines: &mut Vec<String>) {
    let entries = match sorted_entries(dir) {
        Ok(entries) => entries,
        Err(_) => {
            lines.push(format!("{}[permission denied]", prefix));
            return;
        }
    };

    for entry in entries {
        if lines.len() > MAX_RESULTS {
            return;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if is_noise(&name) {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            lines.push(format!("{}{}/", prefix, name));
            if current < depth {
                walk_listing(&path, current + 1, depth, &format!("{}  ", prefix), lines);
            }
        } else {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            lines.push(format!("{}{}  ({})", prefix, name, format_size(size)));
        }
    }
}

fn collect_name_matches(
    root: &Path,
    dir: &Path,
    matcher: &glob::Pattern,
    current: usize,
    matches: &mut Vec<String>,
) {
    let entries = match sorted_entries(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    for entry in entries {
        // One entry past the cap, so the caller can tell a full page
        // from a truncated one
        if matches.len() > MAX_RESULTS {
            return;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if is_noise(&name) {
            continue;
        }
        let path = entry.path();
        if matcher.matches(&name) {
            if let Ok(rel) = path.strip_prefix(root) {
                matches.push(rel.to_string_lossy().to_string());
            }
        }
        if path.is_dir() && current < MAX_DEPTH {
            collect_name_matches(root, &path, matcher, current + 1, matches);
        }
    }
}

fn grep_walk(
    root: &Path,
    dir: &Path,
    needle: &str,
    current: usize,
    matches: &mut Vec<String>,
    files_scanned: &mut usize,
) {
    let entries = match sorted_entries(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    for entry in entries {
        if matches.len() > MAX_RESULTS || *files_scanned >= MAX_GREP_FILES {
            return;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if is_noise(&name) {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            if current < MAX_DEPTH {
                grep_walk(root, &path, needle, current + 1, matches, files_scanned);
            }
            continue;
        }
        if entry.metadata().map(|m| m.len()).unwrap_or(u64::MAX) > MAX_FILE_SIZE {
            continue;
        }
        if is_binary(&path) {
            continue;
        }

        *files_scanned += 1;
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(_) => continue,
        };
        let text = String::from_utf8_lossy(&bytes);
        let rel = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .to_string();

        for (line_num, line) in text.lines().enumerate() {
            if line.to_lowercase().contains(needle) {
                matches.push(format!("{}:{}: {}", rel, line_num + 1, line.trim()));
                if matches.len() > MAX_RESULTS {
                    break;
                }
            }
        }
    }
}
