//! Language tag and content heuristics for picking file extensions.

/// Exact language tag → extension mapping.
const EXTENSIONS: &[(&str, &str)] = &[
    ("python", "py"),
    ("python3", "py"),
    ("py", "py"),
    ("javascript", "js"),
    ("js", "js"),
    ("jsx", "jsx"),
    ("typescript", "ts"),
    ("ts", "ts"),
    ("tsx", "tsx"),
    ("java", "java"),
    ("c", "c"),
    ("h", "h"),
    ("cpp", "cpp"),
    ("c++", "cpp"),
    ("csharp", "cs"),
    ("c#", "cs"),
    ("cs", "cs"),
    ("php", "php"),
    ("ruby", "rb"),
    ("rb", "rb"),
    ("go", "go"),
    ("golang", "go"),
    ("rust", "rs"),
    ("rs", "rs"),
    ("swift", "swift"),
    ("kotlin", "kt"),
    ("kt", "kt"),
    ("scala", "scala"),
    ("html", "html"),
    ("html5", "html"),
    ("htm", "html"),
    ("markup", "html"),
    ("css", "css"),
    ("scss", "scss"),
    ("json", "json"),
    ("xml", "xml"),
    ("yaml", "yaml"),
    ("yml", "yml"),
    ("toml", "toml"),
    ("ini", "ini"),
    ("markdown", "md"),
    ("md", "md"),
    ("sql", "sql"),
    ("bash", "sh"),
    ("sh", "sh"),
    ("shell", "sh"),
    ("zsh", "sh"),
    ("powershell", "ps1"),
    ("ps1", "ps1"),
    ("r", "r"),
    ("dart", "dart"),
    ("elixir", "ex"),
    ("perl", "pl"),
    ("lua", "lua"),
    ("dockerfile", "dockerfile"),
    ("requirements", "txt"),
    ("text", "txt"),
    ("txt", "txt"),
    ("plaintext", "txt"),
];

/// Conventional file names that carry no extension.
const EXTENSIONLESS_NAMES: &[&str] = &[
    "Dockerfile",
    "Makefile",
    "Procfile",
    "Gemfile",
    "Rakefile",
    "Jenkinsfile",
    "Vagrantfile",
    "LICENSE",
    "README",
    ".gitignore",
    ".dockerignore",
    ".env",
    ".editorconfig",
];

/// Map a fence language tag to an extension (without the dot).
///
/// Tries an exact match first, then the first table key contained in the tag
/// (`python-repl` → `py`). Single-letter keys only match exactly.
pub fn extension_for_language(tag: &str) -> Option<&'static str> {
    let tag = tag.trim().trim_matches('`').to_ascii_lowercase();
    if tag.is_empty() {
        return None;
    }
    if let Some((_, ext)) = EXTENSIONS.iter().find(|(key, _)| *key == tag) {
        return Some(ext);
    }
    EXTENSIONS
        .iter()
        .filter(|(key, _)| key.len() > 2)
        .find(|(key, _)| tag.contains(key))
        .map(|(_, ext)| *ext)
}

/// Guess an extension from file content when no usable language tag exists.
pub fn infer_extension_from_content(content: &str) -> Option<&'static str> {
    let lower = content.to_ascii_lowercase();
    let trimmed = lower.trim_start();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("<!doctype html") || lower.contains("<html") || lower.contains("<body")
    {
        return Some("html");
    }
    if trimmed.starts_with("#!/bin/bash") || trimmed.starts_with("#!/bin/sh") {
        return Some("sh");
    }
    if trimmed.starts_with("#!") && trimmed.lines().next().is_some_and(|l| l.contains("python")) {
        return Some("py");
    }
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(content).is_ok()
    {
        return Some("json");
    }
    if lower.contains("fn main(") || lower.contains("pub fn ") || lower.contains("impl ") {
        return Some("rs");
    }
    if lower.contains("def ")
        || lower.starts_with("import ")
        || lower.contains("\nimport ")
        || lower.contains("from __future__")
        || lower.contains("@app.")
    {
        return Some("py");
    }
    if lower.contains("function ")
        || lower.contains("const ")
        || lower.contains("document.")
        || lower.contains("addeventlistener")
        || lower.contains("fetch(")
    {
        return Some("js");
    }
    if content.contains('{') && content.contains(':') && content.contains(';') {
        return Some("css");
    }
    None
}

/// Return the extension of `name` if it is recognizable.
///
/// Recognizable means a non-empty stem followed by a dot and 1 to 10 ASCII
/// alphanumeric characters.
pub fn recognizable_extension(name: &str) -> Option<&str> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || stem.ends_with('.') {
        return None;
    }
    if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext)
}

/// True if `name` either has a recognizable extension or is a conventional
/// extension-less file name.
pub fn has_recognizable_name(name: &str) -> bool {
    recognizable_extension(name).is_some() || EXTENSIONLESS_NAMES.contains(&name)
}
